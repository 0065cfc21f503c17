//! CLI error type.

use stacmosaic::catalog::{HttpError, RequestError};
use stacmosaic::config::ConfigError;
use stacmosaic::executor::RunnerError;
use stacmosaic::geo::GeoError;
use stacmosaic::logging::LoggingError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CliError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error(transparent)]
    ConfigFile(#[from] ConfigError),

    #[error("Invalid area of interest: {0}")]
    Area(String),

    #[error("Invalid search: {0}")]
    Request(#[from] RequestError),

    #[error("Failed to create HTTP client: {0}")]
    Http(#[from] HttpError),

    #[error("Failed to initialize logging: {0}")]
    Logging(#[from] LoggingError),

    #[error("{0}")]
    Runner(#[from] RunnerError),

    /// The run ended without producing mosaics.
    #[error("{0}")]
    Run(String),
}

impl From<GeoError> for CliError {
    fn from(e: GeoError) -> Self {
        CliError::Area(e.to_string())
    }
}
