//! fleetscan.toml configuration parser.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::error::ConfigError;

/// Probe budget used when nothing else is configured.
pub const DEFAULT_PROBE_TIMEOUT: Duration = Duration::from_secs(3);

/// Largest tolerated distance between the reference height and an
/// endpoint's reported height.
pub const MAX_TOLERATED_LAG: u64 = 10;

pub const DEFAULT_INFO_PATH: &str = "/info";
pub const DEFAULT_REPORT_OUTPUT: &str = "clusters.json";

#[derive(Debug, Clone, Default, Deserialize)]
pub struct FleetscanConfig {
    pub registry: Option<RegistryConfig>,
    pub probe: Option<ProbeConfig>,
    pub report: Option<ReportConfig>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RegistryConfig {
    pub snapshot: Option<PathBuf>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProbeConfig {
    pub timeout: Option<String>,
    pub max_lag: Option<u64>,
    pub concurrency: Option<usize>,
    pub info_path: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ReportConfig {
    pub output: Option<PathBuf>,
    pub status: Option<PathBuf>,
}

/// Values the diagnoser and scanner need for one scan.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScanSettings {
    /// Budget for a single probe, connection included.
    pub timeout: Duration,
    /// Lag above this many blocks is unhealthy.
    pub max_lag: u64,
    /// Cap on in-flight probes; `None` starts every probe at once.
    pub concurrency: Option<usize>,
}

impl Default for ScanSettings {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_PROBE_TIMEOUT,
            max_lag: MAX_TOLERATED_LAG,
            concurrency: None,
        }
    }
}

/// Fully merged configuration with every default applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedConfig {
    pub registry: PathBuf,
    pub settings: ScanSettings,
    pub info_path: String,
    pub output: PathBuf,
    pub status: Option<PathBuf>,
}

impl FleetscanConfig {
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn registry_mut(&mut self) -> &mut RegistryConfig {
        self.registry.get_or_insert_with(RegistryConfig::default)
    }

    pub fn probe_mut(&mut self) -> &mut ProbeConfig {
        self.probe.get_or_insert_with(ProbeConfig::default)
    }

    pub fn report_mut(&mut self) -> &mut ReportConfig {
        self.report.get_or_insert_with(ReportConfig::default)
    }

    /// Apply defaults and validate. Fails if no registry is configured.
    pub fn resolve(&self) -> Result<ResolvedConfig, ConfigError> {
        let registry = self
            .registry
            .as_ref()
            .and_then(|r| r.snapshot.clone())
            .ok_or(ConfigError::MissingRegistry)?;

        let probe = self.probe.clone().unwrap_or_default();
        let timeout = match probe.timeout.as_deref() {
            Some(s) => parse_duration(s).ok_or_else(|| ConfigError::InvalidDuration(s.to_string()))?,
            None => DEFAULT_PROBE_TIMEOUT,
        };
        if timeout.is_zero() {
            return Err(ConfigError::ZeroTimeout);
        }
        if probe.concurrency == Some(0) {
            return Err(ConfigError::InvalidConcurrency);
        }

        let report = self.report.clone().unwrap_or_default();

        Ok(ResolvedConfig {
            registry,
            settings: ScanSettings {
                timeout,
                max_lag: probe.max_lag.unwrap_or(MAX_TOLERATED_LAG),
                concurrency: probe.concurrency,
            },
            info_path: probe
                .info_path
                .unwrap_or_else(|| DEFAULT_INFO_PATH.to_string()),
            output: report
                .output
                .unwrap_or_else(|| PathBuf::from(DEFAULT_REPORT_OUTPUT)),
            status: report.status,
        })
    }
}

/// Parse a duration string like "3s", "500ms", "1m", or bare seconds.
pub fn parse_duration(s: &str) -> Option<Duration> {
    let s = s.trim();
    if let Some(secs) = s.strip_suffix('s') {
        if let Some(ms) = secs.strip_suffix('m') {
            ms.parse::<u64>().ok().map(Duration::from_millis)
        } else {
            secs.parse::<u64>().ok().map(Duration::from_secs)
        }
    } else if let Some(mins) = s.strip_suffix('m') {
        mins.parse::<u64>()
            .ok()
            .and_then(|m| m.checked_mul(60))
            .map(Duration::from_secs)
    } else {
        s.parse::<u64>().ok().map(Duration::from_secs)
    }
}
