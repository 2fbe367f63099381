//! Tracing subscriber installation.
//!
//! Records go to stdout with colors and to a daily log file under
//! `LOGS_PATH`. `RUST_LOG` overrides the default filter.

use std::fmt::Display;
use std::path::Path;

use tracing_appender::non_blocking::NonBlocking;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::RollingFileAppender;
use tracing_appender::rolling::Rotation;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use crate::config::Config;
use crate::error::AppError;

const LOG_FILE_PREFIX: &str = "alert-relay";
const LOG_FILE_SUFFIX: &str = "log";
/// Days of rotated files kept on disk.
const LOG_RETENTION: usize = 7;
const DEFAULT_DIRECTIVE: &str = "alert_relay=info";

/// Installs the global subscriber. Fails if one is already installed.
pub fn setup_logging(config: &Config) -> Result<(), AppError> {
    let (file_writer, guard) = file_writer(&config.logs_path)?;
    // Dropping the guard stops the writer thread, and shutdown still logs.
    std::mem::forget(guard);

    tracing_subscriber::registry()
        .with(env_filter())
        .with(fmt::layer().with_writer(std::io::stdout).with_ansi(true))
        .with(fmt::layer().with_writer(file_writer).with_ansi(false))
        .try_init()
        .map_err(|e| AppError::ConfigurationError {
            msg: format!("Failed to install global logger: {e}"),
        })
}

/// Opens a non-blocking writer onto the rotated log files in `dir`,
/// creating the directory first.
fn file_writer(dir: &Path) -> Result<(NonBlocking, WorkerGuard), AppError> {
    std::fs::create_dir_all(dir).map_err(|e| setup_error("create logs directory", dir, e))?;

    let appender = RollingFileAppender::builder()
        .rotation(Rotation::DAILY)
        .filename_prefix(LOG_FILE_PREFIX)
        .filename_suffix(LOG_FILE_SUFFIX)
        .max_log_files(LOG_RETENTION)
        .build(dir)
        .map_err(|e| setup_error("open log file", dir, e))?;

    Ok(tracing_appender::non_blocking(appender))
}

fn env_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_DIRECTIVE))
}

fn setup_error(action: &str, path: &Path, e: impl Display) -> AppError {
    AppError::ConfigurationError {
        msg: format!("Failed to {action} at '{}': {e}", path.display()),
    }
}
