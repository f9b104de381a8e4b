//! Logging setup with file rotation.

use crate::error::{CliError, CliResult};

use std::path::Path;

use sv_config::LoggingConfig;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{
    EnvFilter, fmt, prelude::__tracing_subscriber_SubscriberExt, util::SubscriberInitExt,
};

const MAX_LOG_FILES: usize = 7;

/// Setup logging with console and rotating file output.
///
/// # Log Layers
/// - Console: human-readable, colored unless disabled in config
/// - File: plain text, daily rotation, 7-day retention
///
/// `RUST_LOG` wins over the configured level.
pub fn setup_logging(config: &LoggingConfig, logs_dir: &Path) -> CliResult<()> {
    std::fs::create_dir_all(logs_dir).map_err(|e| {
        CliError::logging(format!("cannot create {}: {e}", logs_dir.display()))
    })?;

    let console_layer = fmt::layer()
        .with_target(true)
        .with_level(true)
        .with_ansi(config.colored)
        .with_writer(std::io::stderr);

    let file_appender = RollingFileAppender::builder()
        .rotation(Rotation::DAILY)
        .max_log_files(MAX_LOG_FILES)
        .filename_prefix(&config.file_prefix)
        .filename_suffix("log")
        .build(logs_dir)
        .map_err(|e| CliError::logging(e.to_string()))?;

    let file_layer = fmt::layer()
        .with_target(true)
        .with_level(true)
        .with_ansi(false)
        .with_writer(file_appender);

    tracing_subscriber::registry()
        .with(default_filter(config))
        .with(console_layer)
        .with(file_layer)
        .try_init()
        .map_err(|e| CliError::logging(e.to_string()))?;

    Ok(())
}

fn default_filter(config: &LoggingConfig) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(config.level.as_directive()))
}
