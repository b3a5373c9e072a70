//! Walks the live topology and produces the ordered list of scrape jobs.

use tracing::debug;

use crate::config::MonitoringConfig;
use crate::prometheus::{
    GlobalConfig, Scheme, ScrapeConfig, ScrapeDocument, StaticScrapeConfig, TlsConfig,
};
use crate::topology::{PathRewrite, TopologyRegistry};

/// Build the full scrape-config document for one provisioning run.
pub fn scrape_document(config: &MonitoringConfig, registry: &TopologyRegistry) -> ScrapeDocument {
    ScrapeDocument {
        global: GlobalConfig {
            scrape_interval: config.scrape_interval,
            evaluation_interval: config.evaluation_interval,
        },
        scrape_configs: collect_scrape_jobs(registry),
    }
}

/// Reflect the topology into scrape jobs.
///
/// Emits, in this order: one job covering all ordering-service endpoints, one
/// job per peer organization (declaration order), one secured job per
/// application node (declaration order). The ordering is a design choice for
/// deterministic output, not something Prometheus requires.
///
/// A group whose topology reports zero members still yields a job with an
/// empty target list rather than being dropped, so the document shape stays
/// predictable.
pub fn collect_scrape_jobs(registry: &TopologyRegistry) -> Vec<ScrapeConfig> {
    let mut jobs = Vec::new();

    if let Some(ledger) = registry.ledger() {
        jobs.push(ScrapeConfig {
            job_name: "orderers".to_string(),
            scheme: Scheme::Http,
            static_configs: vec![StaticScrapeConfig {
                targets: ledger
                    .orderers
                    .iter()
                    .map(|orderer| orderer.operations_address.clone())
                    .collect(),
            }],
            tls_config: None,
        });

        for org in &ledger.organizations {
            jobs.push(ScrapeConfig {
                job_name: format!("Peers in {}", org.name),
                scheme: Scheme::Http,
                static_configs: vec![StaticScrapeConfig {
                    targets: org
                        .peers
                        .iter()
                        .map(|peer| peer.operations_address.clone())
                        .collect(),
                }],
                tls_config: None,
            });
        }
    }

    if let Some(nodes) = registry.nodes() {
        // Application nodes only expose their operations listener over TLS;
        // the scraper reaches their certificates through the crypto mount.
        let rewrite = PathRewrite::new(&nodes.crypto_root);
        for node in &nodes.nodes {
            jobs.push(ScrapeConfig {
                job_name: format!("Node {}", node.name),
                scheme: Scheme::Https,
                static_configs: vec![StaticScrapeConfig {
                    targets: vec![node.operations_address.clone()],
                }],
                tls_config: Some(TlsConfig {
                    ca_file: rewrite.apply(&node.tls_dir.join("ca.crt")),
                    cert_file: rewrite.apply(&node.tls_dir.join("server.crt")),
                    key_file: rewrite.apply(&node.tls_dir.join("server.key")),
                    server_name: String::new(),
                    insecure_skip_verify: true,
                }),
            });
        }
    }

    debug!(jobs = jobs.len(), "Reflected topology into scrape jobs");
    jobs
}
