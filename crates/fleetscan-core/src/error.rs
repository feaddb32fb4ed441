//! Error types for fleetscan core values and configuration.

use std::path::PathBuf;

use thiserror::Error;

/// Errors produced when turning raw registry strings into typed values.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ParseError {
    #[error("worker identity is empty")]
    EmptyIdentity,

    #[error("worker identity {value:?} is not valid hex: {reason}")]
    InvalidHex { value: String, reason: String },

    #[error("cluster id is empty")]
    EmptyCluster,

    #[error("endpoint url is empty")]
    EmptyEndpoint,
}

/// Errors that abort a scan before any probe is sent.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("no registry snapshot configured (set [registry].snapshot or pass --registry)")]
    MissingRegistry,

    #[error("invalid duration {0:?} (expected e.g. \"3s\", \"500ms\", \"1m\")")]
    InvalidDuration(String),

    #[error("timeout must be greater than zero")]
    ZeroTimeout,

    #[error("probe concurrency must be at least 1")]
    InvalidConcurrency,

    #[error("failed to read config {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse config {}: {source}", .path.display())]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
}
