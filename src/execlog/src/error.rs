//! Error types for execlog.
//!
//! Only contract violations reach the caller. I/O faults on the write path
//! are absorbed by the writer and reported through `tracing`.

use std::path::PathBuf;
use thiserror::Error;

/// Logger error types.
#[derive(Debug, Error)]
pub enum LoggerError {
    /// Session identifier is empty or cannot be embedded in a file name.
    #[error("Invalid session id {id:?}: {reason}")]
    InvalidSessionId { id: String, reason: &'static str },

    /// Component tag is empty.
    #[error("Component tag must not be empty")]
    InvalidComponent,

    /// Some other argument has the wrong shape.
    #[error("Invalid argument '{name}': {message}")]
    InvalidArgument { name: &'static str, message: String },

    /// IO error outside the write path (directory creation, listing).
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Failed to read a configuration file.
    #[error("Failed to read config file '{path}': {source}")]
    ConfigRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Failed to parse TOML configuration.
    #[error("Failed to parse config: {0}")]
    ConfigParse(#[from] toml::de::Error),

    /// The writer thread has been shut down or could not be started.
    #[error("Writer is not running")]
    WriterStopped,
}

impl LoggerError {
    pub(crate) fn invalid_id(id: &str, reason: &'static str) -> Self {
        Self::InvalidSessionId {
            id: id.to_string(),
            reason,
        }
    }
}

/// Result type for logger operations.
pub type Result<T> = std::result::Result<T, LoggerError>;
