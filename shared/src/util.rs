/// 获取当前 UTC 时间戳（毫秒）
pub fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

/// Business-day stamp (`YYYYMMDD`, local time) for a unix-millis timestamp.
///
/// Receipt-style scoping: dedup retention and event identity are bounded to
/// one working day, so identifiers only need to be unique within it.
pub fn business_day(millis: i64) -> String {
    use chrono::TimeZone;
    match chrono::Local.timestamp_millis_opt(millis) {
        chrono::LocalResult::Single(dt) | chrono::LocalResult::Ambiguous(dt, _) => {
            dt.format("%Y%m%d").to_string()
        }
        chrono::LocalResult::None => "00000000".to_string(),
    }
}
