//! 日志初始化模块
//!
//! 为嵌入宿主进程的引擎提供统一的日志订阅器初始化。

use tracing_subscriber::{EnvFilter, fmt};

use crate::config::LoggingConfig;

/// 从配置初始化日志系统
///
/// 优先使用环境变量 `RUST_LOG`，未设置时回退到配置文件的日志级别；
/// 配置为 None 时使用默认配置（debug 级别）。
pub fn init_tracing_from_config(logging_config: Option<&LoggingConfig>) {
    let env_filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => {
            let level = logging_config.map(|c| c.level.as_str()).unwrap_or("debug");
            EnvFilter::new(level)
        }
    };

    let default_config = LoggingConfig::default();
    let config = logging_config.unwrap_or(&default_config);

    fmt::Subscriber::builder()
        .with_target(config.with_target)
        .with_thread_ids(config.with_thread_ids)
        .with_file(config.with_file)
        .with_line_number(config.with_line_number)
        .with_env_filter(env_filter)
        .init();
}
