//! `fleetscan scan` — one diagnostic pass over the whole fleet.
//!
//! Resolves configuration, loads the registry snapshot, probes every
//! registered endpoint, prints the per-worker report to stdout, and hands
//! the cluster report to the sink. Configuration and registry failures
//! abort before anything is written.

use std::io::Write;
use std::path::PathBuf;

use anyhow::{Context, Result};
use chrono::Utc;
use clap::Args;
use tracing::info;

use fleetscan_core::{FleetscanConfig, ScanSettings};
use fleetscan_health::{FleetScanner, HttpProbeClient, ProbeClient, ScanTally, aggregate};
use fleetscan_state::{FileRegistry, FileReportSink, Registry, ReportSink};

#[derive(Debug, Default, Args)]
pub struct ScanArgs {
    /// Path to fleetscan.toml
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Registry snapshot (TOML or JSON). Overrides [registry].snapshot.
    #[arg(short, long)]
    pub registry: Option<PathBuf>,

    /// Where to write the cluster report. Overrides [report].output.
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Status document to append a completion marker to.
    #[arg(long)]
    pub status: Option<PathBuf>,

    /// Per-probe time budget, e.g. "3s" or "500ms".
    #[arg(long)]
    pub timeout: Option<String>,

    /// Largest tolerated lag behind the reference height, in blocks.
    #[arg(long)]
    pub max_lag: Option<u64>,

    /// Maximum number of probes in flight (default: all at once).
    #[arg(long)]
    pub concurrency: Option<usize>,

    /// Path appended to each endpoint to fetch its identity and height.
    #[arg(long)]
    pub info_path: Option<String>,

    /// Exit with status 2 when any cluster member is not healthy.
    #[arg(long)]
    pub fail_on_unhealthy: bool,
}

impl ScanArgs {
    /// Load the config file (if any) and layer command-line flags on top.
    fn load_config(&self) -> Result<FleetscanConfig> {
        let mut config = match &self.config {
            Some(path) => FleetscanConfig::from_file(path)?,
            None => FleetscanConfig::default(),
        };

        if let Some(registry) = &self.registry {
            config.registry_mut().snapshot = Some(registry.clone());
        }
        if let Some(timeout) = &self.timeout {
            config.probe_mut().timeout = Some(timeout.clone());
        }
        if let Some(max_lag) = self.max_lag {
            config.probe_mut().max_lag = Some(max_lag);
        }
        if let Some(concurrency) = self.concurrency {
            config.probe_mut().concurrency = Some(concurrency);
        }
        if let Some(info_path) = &self.info_path {
            config.probe_mut().info_path = Some(info_path.clone());
        }
        if let Some(output) = &self.output {
            config.report_mut().output = Some(output.clone());
        }
        if let Some(status) = &self.status {
            config.report_mut().status = Some(status.clone());
        }

        Ok(config)
    }
}

/// Run the `fleetscan scan` command.
pub async fn scan(args: &ScanArgs) -> Result<ScanTally> {
    let resolved = args.load_config()?.resolve()?;

    let registry = FileRegistry::new(&resolved.registry);
    let client = HttpProbeClient::new(resolved.info_path.clone());
    let mut sink = FileReportSink::new(&resolved.output);
    if let Some(status) = &resolved.status {
        sink = sink.with_status(status);
    }

    run(
        &registry,
        client,
        &sink,
        resolved.settings,
        &mut std::io::stdout().lock(),
    )
    .await
}

/// Scan pipeline over explicit collaborators.
async fn run<R, P, S, W>(
    registry: &R,
    client: P,
    sink: &S,
    settings: ScanSettings,
    out: &mut W,
) -> Result<ScanTally>
where
    R: Registry,
    P: ProbeClient,
    S: ReportSink,
    W: Write,
{
    let snapshot = registry
        .load()
        .context("failed to load registry snapshot")?;

    let scanner = FleetScanner::new(client, settings);
    let verdicts = scanner
        .scan(&snapshot.probe_targets(), snapshot.reference_height)
        .await;

    let aggregation = aggregate(&snapshot.membership, &verdicts);
    for line in &aggregation.lines {
        writeln!(out, "{line}")?;
    }
    writeln!(out, "{}", aggregation.tally)?;
    out.flush()?;

    sink.write_report(&aggregation.report)
        .context("failed to write cluster report")?;
    sink.mark_completed(Utc::now())
        .context("failed to record scan completion")?;

    info!(
        clusters = aggregation.report.cluster_count(),
        healthy = aggregation.tally.healthy,
        unhealthy = aggregation.tally.unhealthy,
        not_found = aggregation.tally.not_found,
        "scan complete"
    );
    Ok(aggregation.tally)
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::Mutex;
    use std::time::Duration;

    use chrono::{DateTime, Utc};
    use fleetscan_core::{
        ClusterId, ClusterReport, EndpointUrl, Membership, ProbeInfo, WorkerId,
    };
    use fleetscan_health::{ProbeError, ProbeFuture};
    use fleetscan_state::{RegistrySnapshot, StateError, StateResult};

    use super::*;

    struct StaticRegistry(Option<RegistrySnapshot>);

    impl Registry for StaticRegistry {
        fn load(&self) -> StateResult<RegistrySnapshot> {
            self.0.clone().ok_or_else(|| StateError::RegistryRead {
                path: PathBuf::from("registry.toml"),
                source: std::io::Error::new(std::io::ErrorKind::NotFound, "unreachable"),
            })
        }
    }

    #[derive(Default)]
    struct RecordingSink {
        reports: Mutex<Vec<ClusterReport>>,
        marks: Mutex<Vec<DateTime<Utc>>>,
    }

    impl ReportSink for RecordingSink {
        fn write_report(&self, report: &ClusterReport) -> StateResult<()> {
            self.reports.lock().unwrap().push(report.clone());
            Ok(())
        }

        fn mark_completed(&self, at: DateTime<Utc>) -> StateResult<()> {
            self.marks.lock().unwrap().push(at);
            Ok(())
        }
    }

    /// Every endpoint answers with a fixed identity and height.
    struct EchoProbe(HashMap<EndpointUrl, ProbeInfo>);

    impl ProbeClient for EchoProbe {
        fn probe<'a>(&'a self, endpoint: &'a EndpointUrl) -> ProbeFuture<'a> {
            let answer = self.0.get(endpoint).cloned();
            Box::pin(async move {
                answer.ok_or_else(|| {
                    ProbeError::Connect(std::io::Error::new(
                        std::io::ErrorKind::ConnectionRefused,
                        "connection refused",
                    ))
                })
            })
        }
    }

    fn worker(n: u8) -> WorkerId {
        WorkerId::from_bytes(vec![n])
    }

    fn url(n: u8) -> EndpointUrl {
        EndpointUrl::new(&format!("http://u{n}")).unwrap()
    }

    fn snapshot() -> RegistrySnapshot {
        let c1 = ClusterId::new("C1").unwrap();
        RegistrySnapshot {
            reference_height: 100,
            membership: Membership::from([(c1, vec![worker(1), worker(2), worker(3)])]),
            directory: [(worker(1), url(1)), (worker(2), url(2))].into(),
            skipped: 0,
        }
    }

    fn settings() -> ScanSettings {
        ScanSettings {
            timeout: Duration::from_millis(200),
            ..ScanSettings::default()
        }
    }

    #[tokio::test]
    async fn run_prints_lines_and_writes_report() {
        let probe = EchoProbe(HashMap::from([
            (url(1), ProbeInfo { identity: worker(1), height: 95 }),
            (url(2), ProbeInfo { identity: worker(1), height: 100 }),
        ]));
        let sink = RecordingSink::default();
        let mut out = Vec::new();

        let tally = run(
            &StaticRegistry(Some(snapshot())),
            probe,
            &sink,
            settings(),
            &mut out,
        )
        .await
        .unwrap();

        assert_eq!(tally.healthy, 1);
        assert_eq!(tally.unhealthy, 1);
        assert_eq!(tally.not_found, 1);

        let printed = String::from_utf8(out).unwrap();
        let lines: Vec<&str> = printed.lines().collect();
        assert_eq!(lines[0], "▸ cluster C1 (3 workers)");
        assert_eq!(lines[1], "  ✅ 0x01 http://u1");
        assert!(lines[2].contains("0x02") && lines[2].contains("does not match"));
        assert_eq!(lines[3], "  ❓ 0x03: worker not found");
        assert_eq!(lines[4], "1 healthy, 1 unhealthy, 1 not found");

        let reports = sink.reports.lock().unwrap();
        assert_eq!(reports.len(), 1);
        assert_eq!(
            reports[0].endpoints(&ClusterId::new("C1").unwrap()),
            Some(&[url(1)][..])
        );
        assert_eq!(sink.marks.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn registry_failure_writes_nothing() {
        let sink = RecordingSink::default();
        let mut out = Vec::new();

        let err = run(
            &StaticRegistry(None),
            EchoProbe(HashMap::new()),
            &sink,
            settings(),
            &mut out,
        )
        .await
        .unwrap_err();

        assert!(err.to_string().contains("failed to load registry snapshot"));
        assert!(sink.reports.lock().unwrap().is_empty());
        assert!(sink.marks.lock().unwrap().is_empty());
        assert!(out.is_empty());
    }

    #[tokio::test]
    async fn scan_without_registry_is_config_error() {
        let err = scan(&ScanArgs::default()).await.unwrap_err();
        assert!(err.to_string().contains("no registry snapshot configured"));
    }

    #[test]
    fn flags_override_config_file() {
        let dir = tempfile::tempdir().unwrap();
        let config_path = dir.path().join("fleetscan.toml");
        std::fs::write(
            &config_path,
            r#"
[registry]
snapshot = "from-file.toml"

[probe]
timeout = "5s"
max_lag = 20
"#,
        )
        .unwrap();

        let args = ScanArgs {
            config: Some(config_path),
            registry: Some(PathBuf::from("from-flag.json")),
            max_lag: Some(3),
            concurrency: Some(8),
            status: Some(PathBuf::from("STATUS.md")),
            ..ScanArgs::default()
        };
        let resolved = args.load_config().unwrap().resolve().unwrap();
        assert_eq!(resolved.registry, PathBuf::from("from-flag.json"));
        assert_eq!(resolved.settings.timeout, Duration::from_secs(5));
        assert_eq!(resolved.settings.max_lag, 3);
        assert_eq!(resolved.settings.concurrency, Some(8));
        assert_eq!(resolved.status, Some(PathBuf::from("STATUS.md")));
    }

    #[tokio::test]
    async fn scan_end_to_end_against_files() {
        let dir = tempfile::tempdir().unwrap();
        let registry = dir.path().join("registry.toml");
        // Nothing listens on port 1, so the only endpoint is unhealthy.
        std::fs::write(
            &registry,
            r#"
reference_height = 10

[clusters]
"C1" = ["0x01", "0x02"]

[endpoints]
"0x01" = "http://127.0.0.1:1"
"#,
        )
        .unwrap();
        let output = dir.path().join("clusters.json");

        let args = ScanArgs {
            registry: Some(registry),
            output: Some(output.clone()),
            timeout: Some("500ms".to_string()),
            ..ScanArgs::default()
        };
        let tally = scan(&args).await.unwrap();
        assert_eq!(tally.unhealthy, 1);
        assert_eq!(tally.not_found, 1);
        assert_eq!(
            std::fs::read_to_string(&output).unwrap(),
            "{\n  \"C1\": []\n}\n"
        );
    }
}
