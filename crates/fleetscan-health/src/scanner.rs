//! Fleet scanner — diagnoses every claimed endpoint concurrently.
//!
//! All diagnoses share one reference height and one set of
//! [`ScanSettings`]. Each diagnosis resolves to a verdict on its own, so the
//! join can never fail because of a single endpoint, and the total latency
//! of an uncapped scan is bounded by the probe timeout.

use std::time::Instant;

use futures::StreamExt;
use futures::future::join_all;
use futures::stream;
use tracing::info;

use fleetscan_core::{ProbeTarget, ScanSettings, Verdict};

use crate::diagnoser::diagnose;
use crate::probe::ProbeClient;

/// Runs one diagnostic pass over a set of probe targets.
pub struct FleetScanner<P> {
    client: P,
    settings: ScanSettings,
}

impl<P: ProbeClient> FleetScanner<P> {
    pub fn new(client: P, settings: ScanSettings) -> Self {
        Self { client, settings }
    }

    /// Diagnose every target and return one verdict per target.
    ///
    /// The order of the returned verdicts is unspecified; look them up by
    /// worker identity.
    pub async fn scan(&self, targets: &[ProbeTarget], reference_height: u64) -> Vec<Verdict> {
        let started = Instant::now();
        info!(
            targets = targets.len(),
            reference_height,
            timeout_ms = self.settings.timeout.as_millis() as u64,
            max_lag = self.settings.max_lag,
            concurrency = ?self.settings.concurrency,
            "fleet scan starting"
        );

        let probes = targets
            .iter()
            .map(|target| diagnose(&self.client, target, reference_height, &self.settings));

        let verdicts: Vec<Verdict> = match self.settings.concurrency {
            Some(limit) => stream::iter(probes).buffer_unordered(limit.max(1)).collect().await,
            None => join_all(probes).await,
        };

        let healthy = verdicts.iter().filter(|v| v.is_healthy()).count();
        info!(
            healthy,
            unhealthy = verdicts.len() - healthy,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "fleet scan finished"
        );
        verdicts
    }
}
