use crate::error::{Result, ScraperError};
use std::fs;
use std::path::Path;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

const DEFAULT_DIRECTIVE: &str = "live_weather=info";

/// Initializes the logging system with both console and file output.
///
/// The returned guard flushes the file writer when dropped, so keep it alive
/// for the life of the process.
pub fn init_logging(log_dir: &Path) -> Result<WorkerGuard> {
    let file_appender = daily_appender(log_dir)?;
    let (non_blocking_writer, guard) = tracing_appender::non_blocking(file_appender);
    let file_layer = fmt::layer().json().with_writer(non_blocking_writer);

    // Human readable console output on stderr; stdout carries run summaries
    let console_layer = fmt::layer().with_writer(std::io::stderr);

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_DIRECTIVE));

    tracing_subscriber::registry()
        .with(filter)
        .with(file_layer)
        .with(console_layer)
        .try_init()
        .map_err(|e| ScraperError::Config(format!("Failed to install log subscriber: {}", e)))?;

    Ok(guard)
}

/// Daily rotated `live_weather.<date>.log` files under `log_dir`
fn daily_appender(log_dir: &Path) -> Result<RollingFileAppender> {
    fs::create_dir_all(log_dir).map_err(|e| {
        ScraperError::Config(format!("Failed to create log directory '{}': {}", log_dir.display(), e))
    })?;
    RollingFileAppender::builder()
        .rotation(Rotation::DAILY)
        .filename_prefix("live_weather")
        .filename_suffix("log")
        .build(log_dir)
        .map_err(|e| ScraperError::Config(format!("Failed to open log file in '{}': {}", log_dir.display(), e)))
}
