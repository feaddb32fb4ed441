//! Probe transport errors.
//!
//! The `Display` text of these errors is what ends up in an unhealthy
//! verdict's reason, so messages are written for operators.

use fleetscan_core::ParseError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ProbeError {
    #[error("invalid endpoint {endpoint}: {reason}")]
    InvalidEndpoint { endpoint: String, reason: String },

    #[error("connection failed: {0}")]
    Connect(#[source] std::io::Error),

    #[error("handshake failed: {0}")]
    Handshake(#[source] hyper::Error),

    #[error("failed to build request: {0}")]
    BuildRequest(#[source] http::Error),

    #[error("request failed: {0}")]
    Request(#[source] hyper::Error),

    #[error("unexpected status {0}")]
    Status(http::StatusCode),

    #[error("failed to read response body: {0}")]
    Body(#[source] hyper::Error),

    #[error("malformed info response: {0}")]
    Decode(#[source] serde_json::Error),

    #[error("endpoint reported an unusable identity: {0}")]
    InvalidIdentity(#[source] ParseError),
}
