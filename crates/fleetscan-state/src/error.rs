//! Error types for registry loading and report persistence.

use std::path::PathBuf;

use thiserror::Error;

/// Result type alias for registry and sink operations.
pub type StateResult<T> = Result<T, StateError>;

/// Errors that can occur while loading the registry or writing results.
#[derive(Debug, Error)]
pub enum StateError {
    #[error("failed to read registry snapshot {}: {source}", .path.display())]
    RegistryRead {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse registry snapshot {}: {reason}", .path.display())]
    RegistryParse { path: PathBuf, reason: String },

    #[error("serialization error: {0}")]
    Serialize(String),

    #[error("failed to write {}: {source}", .path.display())]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },
}
