//! Run-level errors.

use std::path::PathBuf;

use thiserror::Error;

use crate::catalog::CatalogError;

/// Why a run ended in the `Failed` state.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum PipelineError {
    /// A catalog page timed out on every attempt.
    #[error("Catalog request for page {page} timed out after {attempts} attempt(s)")]
    Timeout { page: usize, attempts: u32 },

    #[error("Catalog search failed: {0}")]
    Catalog(#[from] CatalogError),

    /// The output directory or footprint layer could not be written.
    #[error("Failed to write {path}: {reason}")]
    Output { path: PathBuf, reason: String },

    #[error("Pipeline stage panicked: {0}")]
    Panicked(String),
}

impl PipelineError {
    pub(crate) fn output(path: impl Into<PathBuf>, error: std::io::Error) -> Self {
        PipelineError::Output {
            path: path.into(),
            reason: error.to_string(),
        }
    }
}
