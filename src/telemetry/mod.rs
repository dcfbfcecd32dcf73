//! 日志与可观测性
//!
//! - [`LogSink`]: 拦截器写日志的输出端
//! - [`init_tracing`]: 按配置安装进程级 subscriber
//! - [`EventRecorder`]: 内存事件记录器

pub mod recorder;
pub mod sink;

pub use recorder::{EventRecorder, RecordedEvent};
pub use sink::LogSink;

use crate::config::{LogFormat, LoggingConfig};
use anyhow::{Context, Result};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// 初始化全局 tracing
///
/// `RUST_LOG` 优先于配置中的级别。
pub fn init_tracing(config: &LoggingConfig) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.level))
        .with_context(|| format!("invalid log level directive: {}", config.level))?;

    let registry = tracing_subscriber::registry().with(filter);

    match config.format {
        LogFormat::Json => registry
            .with(fmt::layer().json().with_target(true).with_current_span(true))
            .try_init()
            .context("Failed to initialize tracing subscriber")?,
        LogFormat::Pretty => registry
            .with(fmt::layer().with_target(true))
            .try_init()
            .context("Failed to initialize tracing subscriber")?,
    }

    Ok(())
}
