//! Registry snapshots — the scan's view of who should be where.
//!
//! A snapshot carries cluster membership, the endpoint directory, and the
//! reference height every probe in the scan is compared against. Raw
//! entries are validated into typed values here; anything malformed is
//! skipped with a warning rather than failing the scan.

use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::Deserialize;
use serde::de::IgnoredAny;
use tracing::{debug, warn};

use fleetscan_core::{ClusterId, EndpointUrl, Membership, ProbeTarget, WorkerId};

use crate::error::{StateError, StateResult};

/// Source of registry snapshots.
pub trait Registry {
    /// Fetch the current snapshot. Failing here aborts the scan.
    fn load(&self) -> StateResult<RegistrySnapshot>;
}

/// Registry document as written on disk, before validation.
#[derive(Debug, Deserialize)]
struct RawSnapshot {
    reference_height: u64,
    #[serde(default)]
    clusters: BTreeMap<String, RawMembers>,
    #[serde(default)]
    endpoints: BTreeMap<String, RawEntry>,
}

/// A single raw string slot. Wrong-typed values are kept as `Other` so
/// they can be skipped without rejecting the whole document.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawEntry {
    Text(String),
    Absent,
    Other(IgnoredAny),
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawMembers {
    List(Vec<RawEntry>),
    Other(IgnoredAny),
}

/// Validated registry state for one scan.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RegistrySnapshot {
    pub reference_height: u64,
    pub membership: Membership,
    pub directory: BTreeMap<WorkerId, EndpointUrl>,
    /// Raw entries dropped during validation.
    pub skipped: usize,
}

impl RegistrySnapshot {
    /// One probe target per directory entry, ordered by worker identity.
    pub fn probe_targets(&self) -> Vec<ProbeTarget> {
        self.directory
            .iter()
            .map(|(worker, endpoint)| ProbeTarget::new(worker.clone(), endpoint.clone()))
            .collect()
    }

    pub fn endpoint(&self, worker: &WorkerId) -> Option<&EndpointUrl> {
        self.directory.get(worker)
    }

    fn from_raw(raw: RawSnapshot) -> Self {
        let mut snapshot = RegistrySnapshot {
            reference_height: raw.reference_height,
            ..Default::default()
        };

        for (worker, endpoint) in raw.endpoints {
            let worker = match WorkerId::parse_hex(&worker) {
                Ok(w) => w,
                Err(e) => {
                    warn!(%worker, error = %e, "skipping directory entry with malformed identity");
                    snapshot.skipped += 1;
                    continue;
                }
            };
            let endpoint = match endpoint {
                RawEntry::Text(endpoint) => endpoint,
                RawEntry::Absent => {
                    debug!(%worker, "worker has no registered endpoint");
                    continue;
                }
                RawEntry::Other(_) => {
                    warn!(%worker, "skipping directory entry that is not a string");
                    snapshot.skipped += 1;
                    continue;
                }
            };
            match EndpointUrl::new(&endpoint) {
                Ok(url) => {
                    if let Some(previous) = snapshot.directory.insert(worker.clone(), url) {
                        warn!(%worker, %previous, "identity listed twice in directory; keeping last");
                    }
                }
                Err(e) => {
                    warn!(%worker, error = %e, "skipping malformed directory entry");
                    snapshot.skipped += 1;
                }
            }
        }

        for (raw_cluster, members) in raw.clusters {
            let cluster = match ClusterId::new(&raw_cluster) {
                Ok(c) => c,
                Err(e) => {
                    warn!(error = %e, "skipping cluster with malformed id");
                    snapshot.skipped += 1;
                    continue;
                }
            };
            let RawMembers::List(members) = members else {
                warn!(%cluster, "skipping cluster whose members are not a list");
                snapshot.skipped += 1;
                continue;
            };

            // Keys that differ only in surrounding whitespace name the same
            // cluster; their members are merged in document order.
            if snapshot.membership.contains_key(&cluster) {
                warn!(%cluster, key = %raw_cluster, "cluster listed twice; merging members");
            }
            let workers = snapshot.membership.entry(cluster.clone()).or_default();
            for member in members {
                let member = match member {
                    RawEntry::Text(member) => member,
                    RawEntry::Absent | RawEntry::Other(_) => {
                        warn!(%cluster, "skipping cluster member that is not a string");
                        snapshot.skipped += 1;
                        continue;
                    }
                };
                match WorkerId::parse_hex(&member) {
                    Ok(w) if workers.contains(&w) => {
                        warn!(%cluster, worker = %w, "duplicate cluster member ignored");
                    }
                    Ok(w) => workers.push(w),
                    Err(e) => {
                        warn!(%cluster, %member, error = %e, "skipping malformed cluster member");
                        snapshot.skipped += 1;
                    }
                }
            }
        }

        snapshot
    }
}

/// Registry backed by a TOML or JSON snapshot file.
///
/// ```toml
/// reference_height = 100
///
/// [clusters]
/// "cluster-1" = ["0xaa01", "0xaa02"]
///
/// [endpoints]
/// "0xaa01" = "http://10.0.0.1:8000"
/// ```
#[derive(Debug, Clone)]
pub struct FileRegistry {
    path: PathBuf,
}

impl FileRegistry {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    fn parse(&self, content: &str) -> StateResult<RawSnapshot> {
        let is_json = self
            .path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));
        let parse_err = |reason: String| StateError::RegistryParse {
            path: self.path.clone(),
            reason,
        };
        if is_json {
            serde_json::from_str(content).map_err(|e| parse_err(e.to_string()))
        } else {
            toml::from_str(content).map_err(|e| parse_err(e.to_string()))
        }
    }
}

impl Registry for FileRegistry {
    fn load(&self) -> StateResult<RegistrySnapshot> {
        let content =
            std::fs::read_to_string(&self.path).map_err(|source| StateError::RegistryRead {
                path: self.path.clone(),
                source,
            })?;
        let snapshot = RegistrySnapshot::from_raw(self.parse(&content)?);
        debug!(
            path = ?self.path,
            clusters = snapshot.membership.len(),
            endpoints = snapshot.directory.len(),
            skipped = snapshot.skipped,
            reference_height = snapshot.reference_height,
            "registry snapshot loaded"
        );
        Ok(snapshot)
    }
}
