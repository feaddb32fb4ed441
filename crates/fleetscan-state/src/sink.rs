//! Report sink — persists the cluster report and records completed scans.

use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::{DateTime, SecondsFormat, Utc};
use tracing::{debug, info};

use fleetscan_core::ClusterReport;

use crate::error::{StateError, StateResult};

/// Convert any `Display` error into a `StateError` variant via a closure factory.
macro_rules! map_err {
    ($variant:ident) => {
        |e| StateError::$variant(e.to_string())
    };
}

/// Destination for scan results.
pub trait ReportSink {
    /// Replace the persisted report with `report`.
    fn write_report(&self, report: &ClusterReport) -> StateResult<()>;

    /// Record that a scan finished at `at`.
    fn mark_completed(&self, at: DateTime<Utc>) -> StateResult<()>;
}

/// Writes the report as a JSON document and appends completion markers to
/// an optional status document.
#[derive(Debug, Clone)]
pub struct FileReportSink {
    output: PathBuf,
    status: Option<PathBuf>,
}

impl FileReportSink {
    pub fn new(output: impl Into<PathBuf>) -> Self {
        Self {
            output: output.into(),
            status: None,
        }
    }

    pub fn with_status(mut self, status: impl Into<PathBuf>) -> Self {
        self.status = Some(status.into());
        self
    }

    pub fn output(&self) -> &Path {
        &self.output
    }

    pub fn status(&self) -> Option<&Path> {
        self.status.as_deref()
    }

    /// Path of the scratch file the report is staged in before the rename.
    fn staging_path(&self) -> PathBuf {
        let mut name = self
            .output
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_else(|| "report".into());
        name.push(".tmp");
        self.output.with_file_name(name)
    }
}

impl ReportSink for FileReportSink {
    fn write_report(&self, report: &ClusterReport) -> StateResult<()> {
        let mut body = serde_json::to_vec_pretty(report).map_err(map_err!(Serialize))?;
        body.push(b'\n');

        let write_err = |path: &Path| {
            let path = path.to_path_buf();
            move |source| StateError::Write { path, source }
        };

        if let Some(parent) = self.output.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(write_err(parent))?;
        }

        // Stage then rename so readers never see a half-written report.
        let staging = self.staging_path();
        std::fs::write(&staging, &body).map_err(write_err(&staging))?;
        std::fs::rename(&staging, &self.output).map_err(write_err(&self.output))?;

        info!(
            path = ?self.output,
            clusters = report.cluster_count(),
            endpoints = report.endpoint_count(),
            "cluster report written"
        );
        Ok(())
    }

    fn mark_completed(&self, at: DateTime<Utc>) -> StateResult<()> {
        let Some(status) = &self.status else {
            return Ok(());
        };
        let write_err = |source| StateError::Write {
            path: status.clone(),
            source,
        };

        let needs_newline = match std::fs::read(status) {
            Ok(existing) => existing.last().is_some_and(|b| *b != b'\n'),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => false,
            Err(e) => return Err(write_err(e)),
        };

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(status)
            .map_err(write_err)?;
        if needs_newline {
            writeln!(file).map_err(write_err)?;
        }
        writeln!(
            file,
            "Last fleet scan completed at {}",
            at.to_rfc3339_opts(SecondsFormat::Secs, true)
        )
        .map_err(write_err)?;

        debug!(path = ?status, "status marker appended");
        Ok(())
    }
}
