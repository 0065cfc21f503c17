//! Tracing subscriber setup.
//!
//! Two outputs: a daily rolling file under the configured log directory, and
//! stderr. The file receives everything the filter allows; stderr only shows
//! warnings unless verbose output is requested. `RUST_LOG` overrides the
//! configured filter.

use std::fs;
use std::path::PathBuf;

use thiserror::Error;
use time::format_description::well_known::Rfc3339;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::fmt::time::LocalTime;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

use crate::config::LoggingSettings;

/// File name prefix of the log files.
pub const LOG_FILE_PREFIX: &str = "stacmosaic";

#[derive(Debug, Error)]
pub enum LoggingError {
    #[error("Failed to create log directory {path}: {source}")]
    Directory {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to open log file: {0}")]
    Appender(String),

    #[error("Invalid log filter '{filter}': {reason}")]
    Filter { filter: String, reason: String },

    #[error("Logging already initialized")]
    AlreadyInitialized,
}

/// Keeps the background log writer alive; logs are flushed when dropped.
#[must_use = "dropping the guard stops file logging"]
pub struct LogGuard {
    _worker: WorkerGuard,
    directory: PathBuf,
}

impl LogGuard {
    /// Directory the log files are written to.
    pub fn directory(&self) -> &std::path::Path {
        &self.directory
    }
}

/// Parses the effective filter: `RUST_LOG` if set, else `configured`.
pub fn build_filter(configured: &str) -> Result<EnvFilter, LoggingError> {
    if let Ok(filter) = EnvFilter::try_from_default_env() {
        return Ok(filter);
    }
    EnvFilter::try_new(configured).map_err(|e| LoggingError::Filter {
        filter: configured.to_string(),
        reason: e.to_string(),
    })
}

/// Installs the global subscriber.
pub fn init_logging(settings: &LoggingSettings, verbose: bool) -> Result<LogGuard, LoggingError> {
    let directory = settings.directory.clone();
    fs::create_dir_all(&directory).map_err(|e| LoggingError::Directory {
        path: directory.clone(),
        source: e,
    })?;

    let appender = RollingFileAppender::builder()
        .rotation(Rotation::DAILY)
        .filename_prefix(LOG_FILE_PREFIX)
        .filename_suffix("log")
        .build(&directory)
        .map_err(|e| LoggingError::Appender(e.to_string()))?;
    let (file_writer, worker) = tracing_appender::non_blocking(appender);

    let file_filter = build_filter(&settings.filter)?;
    let console_filter = if verbose {
        file_filter.clone()
    } else {
        EnvFilter::new("warn")
    };

    tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_writer(file_writer)
                .with_ansi(false)
                .with_timer(LocalTime::new(Rfc3339))
                .with_filter(file_filter),
        )
        .with(
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false)
                .with_timer(LocalTime::new(Rfc3339))
                .with_filter(console_filter),
        )
        .try_init()
        .map_err(|_| LoggingError::AlreadyInitialized)?;

    Ok(LogGuard {
        _worker: worker,
        directory,
    })
}
