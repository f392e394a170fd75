//! Engine infrastructure - config, errors, background tasks, logging

pub mod config;
pub mod error;
pub mod logger;
pub mod tasks;

pub use config::Config;
pub use error::{EngineError, EngineResult};
pub use logger::{init_logger, init_logger_with_file};
pub use tasks::{BackgroundTasks, TaskKind};
