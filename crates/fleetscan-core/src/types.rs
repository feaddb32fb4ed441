//! Shared types used across fleetscan crates.
//!
//! Everything here is scan-scoped: built from a registry snapshot at the
//! start of a scan and dropped once the report has been written.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::ParseError;

// ── Identities ─────────────────────────────────────────────────────

/// Fixed identity of a worker, rendered as `0x`-prefixed lowercase hex.
///
/// Both the registered identity and the identity an endpoint reports about
/// itself are normalised through [`WorkerId::parse_hex`], so comparison is
/// on raw bytes and ignores prefix and case.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct WorkerId(Vec<u8>);

impl WorkerId {
    pub fn from_bytes(bytes: impl Into<Vec<u8>>) -> Self {
        Self(bytes.into())
    }

    /// Parse a hex identity with or without a `0x` prefix.
    pub fn parse_hex(s: &str) -> Result<Self, ParseError> {
        let trimmed = s.trim();
        let digits = trimmed
            .strip_prefix("0x")
            .or_else(|| trimmed.strip_prefix("0X"))
            .unwrap_or(trimmed);
        if digits.is_empty() {
            return Err(ParseError::EmptyIdentity);
        }
        hex::decode(digits)
            .map(Self)
            .map_err(|e| ParseError::InvalidHex {
                value: s.to_string(),
                reason: e.to_string(),
            })
    }
}

impl fmt::Display for WorkerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(&self.0))
    }
}

impl FromStr for WorkerId {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse_hex(s)
    }
}

impl Serialize for WorkerId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for WorkerId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::parse_hex(&s).map_err(serde::de::Error::custom)
    }
}

/// Opaque cluster identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ClusterId(String);

impl ClusterId {
    pub fn new(id: &str) -> Result<Self, ParseError> {
        let id = id.trim();
        if id.is_empty() {
            return Err(ParseError::EmptyCluster);
        }
        Ok(Self(id.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ClusterId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Network address a worker claims to be reachable at.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EndpointUrl(String);

impl EndpointUrl {
    pub fn new(url: &str) -> Result<Self, ParseError> {
        let url = url.trim();
        if url.is_empty() {
            return Err(ParseError::EmptyEndpoint);
        }
        Ok(Self(url.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EndpointUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Cluster membership snapshot: cluster → members in registry order.
pub type Membership = BTreeMap<ClusterId, Vec<WorkerId>>;

/// One (identity, endpoint) pair to diagnose.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeTarget {
    pub worker: WorkerId,
    pub endpoint: EndpointUrl,
}

impl ProbeTarget {
    pub fn new(worker: WorkerId, endpoint: EndpointUrl) -> Self {
        Self { worker, endpoint }
    }
}

/// What an endpoint says about itself when probed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeInfo {
    pub identity: WorkerId,
    pub height: u64,
}

// ── Verdicts ───────────────────────────────────────────────────────

/// Why an endpoint was judged unhealthy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureReason {
    /// The probe did not answer within the scan's timeout budget.
    Timeout,
    /// The transport failed; holds the underlying error text.
    Transport(String),
    /// The endpoint answered as a different worker.
    IdentityMismatch { reported: WorkerId },
    /// The endpoint is further behind the reference height than tolerated.
    Lagging { by: u64 },
}

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureReason::Timeout => f.write_str("timeout; endpoint may be offline"),
            FailureReason::Transport(e) => f.write_str(e),
            FailureReason::IdentityMismatch { .. } => {
                f.write_str("reported identity does not match registered identity")
            }
            FailureReason::Lagging { by } => write!(f, "lagging by {by} blocks"),
        }
    }
}

/// Health classification of one worker's endpoint.
///
/// `reason` is `None` exactly when the endpoint is healthy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Verdict {
    pub worker: WorkerId,
    pub endpoint: EndpointUrl,
    pub reason: Option<FailureReason>,
}

impl Verdict {
    pub fn healthy(target: &ProbeTarget) -> Self {
        Self {
            worker: target.worker.clone(),
            endpoint: target.endpoint.clone(),
            reason: None,
        }
    }

    pub fn unhealthy(target: &ProbeTarget, reason: FailureReason) -> Self {
        Self {
            worker: target.worker.clone(),
            endpoint: target.endpoint.clone(),
            reason: Some(reason),
        }
    }

    pub fn is_healthy(&self) -> bool {
        self.reason.is_none()
    }
}

// ── Report ─────────────────────────────────────────────────────────

/// Healthy endpoints per cluster, in membership order.
///
/// Serializes as a plain JSON object keyed by cluster id.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ClusterReport {
    clusters: BTreeMap<ClusterId, Vec<EndpointUrl>>,
}

impl ClusterReport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make sure `cluster` appears in the report, even with no endpoints.
    pub fn add_cluster(&mut self, cluster: ClusterId) {
        self.clusters.entry(cluster).or_default();
    }

    pub fn push_endpoint(&mut self, cluster: &ClusterId, endpoint: EndpointUrl) {
        self.clusters
            .entry(cluster.clone())
            .or_default()
            .push(endpoint);
    }

    pub fn endpoints(&self, cluster: &ClusterId) -> Option<&[EndpointUrl]> {
        self.clusters.get(cluster).map(Vec::as_slice)
    }

    pub fn cluster_count(&self) -> usize {
        self.clusters.len()
    }

    pub fn endpoint_count(&self) -> usize {
        self.clusters.values().map(Vec::len).sum()
    }
}
