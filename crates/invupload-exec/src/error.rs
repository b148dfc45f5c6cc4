//! Error types for invupload-exec

use std::time::Duration;

use thiserror::Error;

/// Errors that can occur while running an external process
#[derive(Error, Debug, Clone)]
pub enum ExecError {
    /// Process could not be started
    #[error("failed to spawn process: {0}")]
    SpawnError(String),

    /// I/O error while reading output or waiting for exit
    #[error("I/O error: {0}")]
    IoError(String),

    /// Process did not finish in time
    #[error("command timed out after {timeout:?}")]
    Timeout {
        /// Timeout duration that was exceeded
        timeout: Duration,
    },

    /// Invalid configuration
    #[error("invalid configuration: {0}")]
    ConfigError(String),
}
