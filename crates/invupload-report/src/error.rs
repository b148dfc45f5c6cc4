//! Error types for invupload-report

use std::path::PathBuf;

use thiserror::Error;

/// Errors that can occur while producing a report
#[derive(Error, Debug)]
pub enum ReportError {
    /// Failed to read host data or write the report
    #[error("I/O error on {}: {source}", path.display())]
    Io {
        /// File being read or written
        path: PathBuf,
        /// Underlying error
        source: std::io::Error,
    },

    /// Host batch could not be decoded
    #[error("invalid host data: {0}")]
    InvalidHosts(#[from] serde_json::Error),
}
