//! Logging setup with file rotation.

use crate::config::LoggingSettings;
use crate::{ControlError, ControlResult};

use std::panic::Location;
use std::path::{Path, PathBuf};

use error_location::ErrorLocation;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{
    EnvFilter, fmt, prelude::__tracing_subscriber_SubscriberExt, util::SubscriberInitExt,
};

/// Setup logging with console and rotating file output.
///
/// # Log Layers
/// - Console: Human-readable, colored output
/// - File: plain text, daily rotation, `max_log_files` retention
///
/// `RUST_LOG` overrides the configured level.
pub fn setup_logging(base_dir: &Path, settings: &LoggingSettings) -> ControlResult<PathBuf> {
    let logs_dir = base_dir.join(&settings.directory);
    std::fs::create_dir_all(&logs_dir).map_err(|e| ControlError::Io {
        path: logs_dir.clone(),
        source: e,
        location: ErrorLocation::from(Location::caller()),
    })?;

    let console_layer = fmt::layer()
        .with_target(true)
        .with_level(true)
        .with_ansi(true);

    let file_appender = RollingFileAppender::builder()
        .rotation(Rotation::DAILY)
        .max_log_files(settings.max_log_files)
        .filename_prefix(&settings.file_prefix)
        .filename_suffix("log")
        .build(&logs_dir)
        .map_err(|e| ControlError::Logging {
            message: format!("Failed to create log appender: {e}"),
            location: ErrorLocation::from(Location::caller()),
        })?;

    let file_layer = fmt::layer()
        .with_target(true)
        .with_level(true)
        .with_ansi(false)
        .with_writer(file_appender);

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("{},servctl=debug", settings.level)));

    tracing_subscriber::registry()
        .with(filter)
        .with(console_layer)
        .with(file_layer)
        .try_init()
        .map_err(|e| ControlError::Logging {
            message: format!("Failed to install subscriber: {e}"),
            location: ErrorLocation::from(Location::caller()),
        })?;

    Ok(logs_dir)
}

/// Get path to current log file (for diagnostics export).
pub fn current_log_path(base_dir: &Path, settings: &LoggingSettings) -> PathBuf {
    let today = chrono::Local::now().format("%Y-%m-%d");
    base_dir
        .join(&settings.directory)
        .join(format!("{}.{}.log", settings.file_prefix, today))
}
