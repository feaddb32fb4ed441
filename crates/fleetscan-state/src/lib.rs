//! fleetscan-state — the scan's external collaborators.
//!
//! Loads the registry snapshot a scan starts from (membership, endpoint
//! directory, reference height) and persists what the scan produced (the
//! cluster report and a completion marker in a status document).
//!
//! # Architecture
//!
//! ```text
//! Registry::load()            → RegistrySnapshot
//!   └── FileRegistry            TOML or JSON file, malformed entries skipped
//!
//! ReportSink::write_report()  → full replace of the report document
//! ReportSink::mark_completed() → marker appended to the status document
//!   └── FileReportSink
//! ```
//!
//! Snapshots and reports are scan-scoped; nothing here caches across scans.

pub mod error;
pub mod registry;
pub mod sink;

pub use error::{StateError, StateResult};
pub use registry::{FileRegistry, Registry, RegistrySnapshot};
pub use sink::{FileReportSink, ReportSink};
