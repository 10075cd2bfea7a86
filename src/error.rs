//! Error handling for FAERS conversion runs.
//!
//! Only run-level failures surface as [`Error`]. Per-task failures are
//! folded into a [`crate::models::ConversionResult`] by the converter.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Input root not found: {path}")]
    InputRootNotFound { path: PathBuf },

    #[error("Configuration error: {message}")]
    Configuration { message: String },

    #[error("Conversion failed for file: {path} - {reason}")]
    Conversion { path: PathBuf, reason: String },

    #[error("Worker {worker_id} panicked: {message}")]
    WorkerPanicked { worker_id: usize, message: String },
}

impl Error {
    /// Create a configuration error
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Create a conversion error for a specific file
    pub fn conversion(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::Conversion {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Whether this error should abort the whole run
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Error::InputRootNotFound { .. } | Error::Configuration { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, Error>;
