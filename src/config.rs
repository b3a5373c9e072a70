use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::error::{Error, Result};

/// Container image running the metrics collector.
pub const PROMETHEUS_IMAGE: &str = "prom/prometheus:latest";
/// Container image running the dashboard server.
pub const GRAFANA_IMAGE: &str = "grafana/grafana:latest";

/// Tunables for the monitoring extension.
///
/// Everything here has a default matching the reference environment, so a
/// harness can use `MonitoringConfig::default()` and never touch this file.
/// The struct also deserializes from a TOML fragment for harnesses that want
/// to pin images or stretch the readiness budgets on slow CI machines.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct MonitoringConfig {
    /// Image for the metrics-collector container.
    pub prometheus_image: String,

    /// Image for the dashboard container.
    pub grafana_image: String,

    /// Global scrape interval written into the generated document.
    #[serde(with = "humantime_serde")]
    pub scrape_interval: Duration,

    /// Global rule evaluation interval written into the generated document.
    #[serde(with = "humantime_serde")]
    pub evaluation_interval: Duration,

    /// Budget for the Prometheus readiness poll before Grafana is started.
    #[serde(with = "humantime_serde")]
    pub prometheus_ready_timeout: Duration,

    /// Budget for the Grafana readiness poll at the end of bring-up.
    #[serde(with = "humantime_serde")]
    pub grafana_ready_timeout: Duration,

    /// Delay between readiness probe attempts.
    #[serde(with = "humantime_serde")]
    pub probe_interval: Duration,

    /// Directory with dashboard/datasource provisioning documents overriding
    /// the embedded defaults. Must contain the same relative layout as the
    /// crate's `assets/grafana` directory.
    pub assets_dir: Option<PathBuf>,
}

impl Default for MonitoringConfig {
    fn default() -> Self {
        Self {
            prometheus_image: PROMETHEUS_IMAGE.to_string(),
            grafana_image: GRAFANA_IMAGE.to_string(),
            scrape_interval: Duration::from_secs(15),
            evaluation_interval: Duration::from_secs(15),
            // Budgets match the fixed settle delays of the reference
            // environment (30s before Grafana, a short tail after it).
            prometheus_ready_timeout: Duration::from_secs(30),
            grafana_ready_timeout: Duration::from_secs(10),
            probe_interval: Duration::from_millis(500),
            assets_dir: None,
        }
    }
}

impl MonitoringConfig {
    /// Load the configuration from a TOML file.
    pub fn from_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path).map_err(|source| Error::ConfigWrite {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&raw).map_err(|source| Error::ConfigWrite {
            path: path.to_path_buf(),
            source: std::io::Error::new(std::io::ErrorKind::InvalidData, source),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn defaults_match_reference_environment() {
        let config = MonitoringConfig::default();
        assert_eq!(config.prometheus_image, PROMETHEUS_IMAGE);
        assert_eq!(config.grafana_image, GRAFANA_IMAGE);
        assert_eq!(config.scrape_interval, Duration::from_secs(15));
        assert_eq!(config.prometheus_ready_timeout, Duration::from_secs(30));
        assert!(config.assets_dir.is_none());
    }

    #[test]
    fn partial_toml_falls_back_to_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "prometheus-image = \"prom/prometheus:v2.45.0\"\nprometheus-ready-timeout = \"1m\""
        )
        .unwrap();

        let config = MonitoringConfig::from_file(file.path()).unwrap();
        assert_eq!(config.prometheus_image, "prom/prometheus:v2.45.0");
        assert_eq!(config.prometheus_ready_timeout, Duration::from_secs(60));
        assert_eq!(config.grafana_image, GRAFANA_IMAGE);
    }

    #[test]
    fn missing_file_is_an_artifact_error() {
        let err = MonitoringConfig::from_file(Path::new("/no/such/monitoring.toml")).unwrap_err();
        assert!(matches!(err, Error::ConfigWrite { .. }));
    }
}
