//! Serde model of the Prometheus scrape configuration.
//!
//! Field names and nesting follow the `prometheus.yml` format verbatim so the
//! generated document is consumed by an unmodified Prometheus. The document is
//! built exactly once per provisioning run, written to disk and never mutated
//! afterwards.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScrapeDocument {
    pub global: GlobalConfig,
    pub scrape_configs: Vec<ScrapeConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GlobalConfig {
    #[serde(with = "humantime_serde")]
    pub scrape_interval: Duration,
    #[serde(with = "humantime_serde")]
    pub evaluation_interval: Duration,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScrapeConfig {
    pub job_name: String,
    pub scheme: Scheme,
    pub static_configs: Vec<StaticScrapeConfig>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tls_config: Option<TlsConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StaticScrapeConfig {
    pub targets: Vec<String>,
}

/// TLS material reference for a secured scrape job.
///
/// Every path in here is an in-container path: the host-side crypto directory
/// is rewritten to the fixed mount point before the block is attached to a
/// job, so no host-absolute path ever reaches the serialized document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TlsConfig {
    pub ca_file: String,
    pub cert_file: String,
    pub key_file: String,
    pub server_name: String,
    pub insecure_skip_verify: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Scheme {
    Http,
    Https,
}

impl ScrapeDocument {
    /// Job names must be unique within one document; Prometheus refuses the
    /// configuration otherwise. Checked before anything is written.
    pub fn ensure_unique_job_names(&self) -> Result<()> {
        let mut seen = std::collections::HashSet::new();
        for job in &self.scrape_configs {
            if !seen.insert(job.job_name.as_str()) {
                return Err(Error::DuplicateJobName(job.job_name.clone()));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn document(jobs: Vec<ScrapeConfig>) -> ScrapeDocument {
        ScrapeDocument {
            global: GlobalConfig {
                scrape_interval: Duration::from_secs(15),
                evaluation_interval: Duration::from_secs(15),
            },
            scrape_configs: jobs,
        }
    }

    fn job(name: &str) -> ScrapeConfig {
        ScrapeConfig {
            job_name: name.to_string(),
            scheme: Scheme::Http,
            static_configs: vec![StaticScrapeConfig {
                targets: vec!["127.0.0.1:8080".to_string()],
            }],
            tls_config: None,
        }
    }

    #[test]
    fn intervals_serialize_in_prometheus_notation() {
        let yaml = serde_yaml::to_string(&document(vec![])).unwrap();
        assert!(yaml.contains("scrape_interval: 15s"), "{yaml}");
        assert!(yaml.contains("evaluation_interval: 15s"), "{yaml}");
    }

    #[test]
    fn tls_block_is_omitted_for_plain_jobs() {
        let yaml = serde_yaml::to_string(&document(vec![job("plain")])).unwrap();
        assert!(!yaml.contains("tls_config"), "{yaml}");
    }

    #[test]
    fn duplicate_job_names_are_rejected() {
        let doc = document(vec![job("a"), job("b"), job("a")]);
        let err = doc.ensure_unique_job_names().unwrap_err();
        assert!(matches!(err, Error::DuplicateJobName(name) if name == "a"));
    }

    #[test]
    fn unique_job_names_pass() {
        let doc = document(vec![job("a"), job("b")]);
        assert!(doc.ensure_unique_job_names().is_ok());
    }
}
