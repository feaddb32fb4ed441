//! fleetscan-core — shared types for the fleet health diagnostic.
//!
//! Holds the scan-scoped domain model (worker identities, endpoints,
//! verdicts, cluster reports) and the `fleetscan.toml` configuration
//! that resolves into [`ScanSettings`] for a single scan.

pub mod config;
pub mod error;
pub mod types;

pub use config::{FleetscanConfig, ResolvedConfig, ScanSettings};
pub use error::{ConfigError, ParseError};
pub use types::*;
