//! Endpoint diagnosis: one bounded-time probe, one verdict.
//!
//! The probe is raced against the scan's timeout. Whichever finishes first
//! decides the verdict; on timeout the probe future is dropped, which with
//! [`HttpProbeClient`](crate::HttpProbeClient) also tears down its
//! connection. Nothing here returns an error: every failure becomes the
//! reason of an unhealthy [`Verdict`].

use tracing::debug;

use fleetscan_core::{FailureReason, ProbeInfo, ProbeTarget, ScanSettings, Verdict};

use crate::probe::ProbeClient;

/// Probe `target` once and classify the result against `reference_height`.
pub async fn diagnose<P>(
    client: &P,
    target: &ProbeTarget,
    reference_height: u64,
    settings: &ScanSettings,
) -> Verdict
where
    P: ProbeClient + ?Sized,
{
    let outcome = tokio::time::timeout(settings.timeout, client.probe(&target.endpoint)).await;

    let verdict = match outcome {
        Err(_) => Verdict::unhealthy(target, FailureReason::Timeout),
        Ok(Err(e)) => Verdict::unhealthy(target, FailureReason::Transport(e.to_string())),
        Ok(Ok(info)) => classify(target, &info, reference_height, settings.max_lag),
    };

    match &verdict.reason {
        None => debug!(worker = %target.worker, endpoint = %target.endpoint, "endpoint healthy"),
        Some(reason) => debug!(
            worker = %target.worker,
            endpoint = %target.endpoint,
            %reason,
            "endpoint unhealthy"
        ),
    }
    verdict
}

/// Apply the identity and lag checks to a successful probe.
///
/// Identity is checked first, so an impostor is reported as a mismatch no
/// matter how current its height is. An endpoint ahead of the reference
/// height has zero lag.
pub fn classify(
    target: &ProbeTarget,
    info: &ProbeInfo,
    reference_height: u64,
    max_lag: u64,
) -> Verdict {
    if info.identity != target.worker {
        return Verdict::unhealthy(
            target,
            FailureReason::IdentityMismatch {
                reported: info.identity.clone(),
            },
        );
    }

    let lag = reference_height.saturating_sub(info.height);
    if lag > max_lag {
        return Verdict::unhealthy(target, FailureReason::Lagging { by: lag });
    }

    Verdict::healthy(target)
}
