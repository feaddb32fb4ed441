//! fleetscan-health — the fleet diagnostic engine.
//!
//! Probes every claimed worker endpoint under a fixed time budget, checks
//! that each endpoint answers with the identity it is registered under and
//! is not too far behind the scan's reference height, then folds the
//! verdicts into per-cluster lists of healthy endpoints.
//!
//! # Architecture
//!
//! ```text
//! FleetScanner::scan(targets, reference_height)
//!   ├── diagnose() per target, all in flight together
//!   │   ├── ProbeClient::probe() raced against the timeout
//!   │   └── classify() → identity + lag checks → Verdict
//!   └── Vec<Verdict> (unordered)
//!
//! aggregate(membership, verdicts)
//!   ├── verdicts indexed by WorkerId
//!   └── Aggregation { ClusterReport, ReportLine per member, ScanTally }
//! ```
//!
//! # Failure isolation
//!
//! Every diagnosis resolves to a [`Verdict`](fleetscan_core::Verdict).
//! Timeouts, transport errors, identity mismatches, and lag are all encoded
//! in its reason, so one bad endpoint never aborts the scan.

pub mod aggregate;
pub mod diagnoser;
pub mod error;
pub mod probe;
pub mod scanner;

#[cfg(test)]
mod test_support;

pub use aggregate::{Aggregation, ReportLine, ScanTally, aggregate};
pub use diagnoser::{classify, diagnose};
pub use error::ProbeError;
pub use probe::{HttpProbeClient, ProbeClient, ProbeFuture};
pub use scanner::FleetScanner;
