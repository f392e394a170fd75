/// 同步引擎配置
///
/// # 环境变量
///
/// 所有配置项都可以通过环境变量覆盖：
///
/// | 环境变量 | 默认值 | 说明 |
/// |----------|--------|------|
/// | POLL_INTERVAL_SECS | 30 | 全量对账轮询间隔（秒） |
/// | WRITE_TIMEOUT_MS | 5000 | 持久化写入超时（毫秒） |
/// | DEDUP_RETENTION_HOURS | 24 | 去重台账保留时长（小时） |
/// | PRUNE_INTERVAL_SECS | 600 | 台账清理任务间隔（秒） |
/// | BROADCAST_CAPACITY | 1024 | 本机广播通道容量 |
/// | ENVIRONMENT | development | 运行环境 |
#[derive(Debug, Clone)]
pub struct Config {
    /// 全量对账轮询间隔（秒）- 可靠性兜底，不受推送链路状态影响
    pub poll_interval_secs: u64,
    /// 持久化写入超时（毫秒）- 单次尝试，超时视为失败并回滚
    pub write_timeout_ms: u64,
    /// 去重台账保留时长（小时）
    pub dedup_retention_hours: u64,
    /// 台账清理任务间隔（秒）
    pub prune_interval_secs: u64,
    /// 本机广播通道容量
    pub broadcast_capacity: usize,
    /// 运行环境: development | staging | production
    pub environment: String,
}

impl Config {
    /// 从环境变量加载配置，未设置时使用默认值
    pub fn from_env() -> Self {
        Self {
            poll_interval_secs: std::env::var("POLL_INTERVAL_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(30),
            write_timeout_ms: std::env::var("WRITE_TIMEOUT_MS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(5000),
            dedup_retention_hours: std::env::var("DEDUP_RETENTION_HOURS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(24),
            prune_interval_secs: std::env::var("PRUNE_INTERVAL_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(600),
            broadcast_capacity: std::env::var("BROADCAST_CAPACITY")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(1024),
            environment: std::env::var("ENVIRONMENT").unwrap_or_else(|_| "development".into()),
        }
    }

    /// 使用自定义值覆盖部分配置
    ///
    /// 常用于测试场景
    pub fn with_overrides(poll_interval_secs: u64, write_timeout_ms: u64) -> Self {
        let mut config = Self::from_env();
        config.poll_interval_secs = poll_interval_secs;
        config.write_timeout_ms = write_timeout_ms;
        config
    }

    /// 持久化写入超时
    pub fn write_timeout(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.write_timeout_ms)
    }

    /// 去重台账保留窗口
    pub fn dedup_retention(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.dedup_retention_hours * 3600)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::from_env()
    }
}
