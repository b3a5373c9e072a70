//! Container bring-up for the metrics collector and the dashboard server.
//!
//! One synchronous control path: create, attach to the pre-existing virtual
//! network (a separate, explicit step), start. Any failing step aborts the
//! run; already-created resources are not rolled back, cleanup is external.
//!
//! The fixed settle delay of the reference environment is replaced by a
//! bounded readiness poll against the service's own health endpoint. On
//! timeout the run continues with a warning, which degenerates to the old
//! behavior: under a very slow container start the dashboard can still come
//! up before the collector ingests anything. That residual race is accepted,
//! not corrected.

use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

use bollard::container::{Config, CreateContainerOptions, StartContainerOptions};
use bollard::models::{
    EndpointSettings, HostConfig, Mount, MountTypeEnum, PortBinding, RestartPolicy,
    RestartPolicyNameEnum,
};
use bollard::network::{ConnectNetworkOptions, InspectNetworkOptions};
use bollard::Docker;
use once_cell::sync::Lazy;
use tokio::time::{sleep, Instant};
use tracing::{debug, info, warn};

use crate::artifacts::ArtifactLayout;
use crate::config::MonitoringConfig;
use crate::error::{Error, Result};
use crate::topology::CRYPTO_MOUNT_POINT;

/// Shared client for readiness probes; keep-alives make the repeated polls
/// against the same endpoint cheap.
static PROBE_CLIENT: Lazy<reqwest::Client> = Lazy::new(|| {
    reqwest::Client::builder()
        .connect_timeout(Duration::from_secs(2))
        .timeout(Duration::from_secs(2))
        .build()
        .expect("Unable to create probe client")
});

/// A host directory or file bind-mounted into a container.
#[derive(Debug, Clone)]
pub struct BindMount {
    pub source: std::path::PathBuf,
    pub target: String,
    pub read_only: bool,
}

/// Everything needed to create and start one auxiliary container.
///
/// Specs are transient: constructed, consumed by [`ContainerOrchestrator::launch`]
/// and discarded. Repeated runs against the same network need distinct
/// container names or an external cleanup step.
#[derive(Debug, Clone)]
pub struct ContainerSpec {
    pub name: String,
    pub image: String,
    pub hostname: String,
    pub env: Vec<String>,
    /// Published TCP port; caller-chosen, bound 1:1 on the host, not probed
    /// for availability.
    pub port: u16,
    pub mounts: Vec<BindMount>,
    pub extra_hosts: Vec<String>,
    pub links: Vec<String>,
    pub network: String,
    pub always_restart: bool,
}

/// The virtual network the containers attach to. It must already exist;
/// resolution never creates it.
#[derive(Debug, Clone)]
pub struct ResolvedNetwork {
    pub name: String,
    pub id: String,
    pub gateway: Option<String>,
}

impl ResolvedNetwork {
    /// Extra-host entry giving a container a stable `fabric` alias for the
    /// host side of the ledger network. Falls back to Docker's
    /// `host-gateway` sentinel when the network reports no gateway.
    pub fn ledger_alias(&self) -> String {
        match &self.gateway {
            Some(gateway) => format!("fabric:{gateway}"),
            None => "fabric:host-gateway".to_string(),
        }
    }
}

pub struct ContainerOrchestrator {
    docker: Docker,
}

impl ContainerOrchestrator {
    pub fn new(docker: Docker) -> Self {
        Self { docker }
    }

    /// Verify the pinned images are present locally before provisioning
    /// anything; pulling is left to the environment setup.
    pub async fn ensure_images(&self, images: &[&str]) -> Result<()> {
        for image in images {
            self.docker
                .inspect_image(image)
                .await
                .map_err(|_| Error::ImageMissing(image.to_string()))?;
            debug!(image, "Image is available");
        }
        Ok(())
    }

    /// Look up the pre-existing virtual network by identifier.
    pub async fn resolve_network(&self, network_id: &str) -> Result<ResolvedNetwork> {
        let network = self
            .docker
            .inspect_network(network_id, None::<InspectNetworkOptions<String>>)
            .await
            .map_err(|source| Error::NetworkAttach {
                name: "network lookup".to_string(),
                network: network_id.to_string(),
                source,
            })?;

        let gateway = network
            .ipam
            .and_then(|ipam| ipam.config)
            .and_then(|configs| configs.into_iter().find_map(|config| config.gateway));

        Ok(ResolvedNetwork {
            name: network_id.to_string(),
            id: network.id.unwrap_or_else(|| network_id.to_string()),
            gateway,
        })
    }

    /// Create the container, attach it to the virtual network and start it.
    ///
    /// Returns the container id. Each step maps to its own error category and
    /// fails the run immediately.
    pub async fn launch(&self, spec: &ContainerSpec) -> Result<String> {
        info!(container = %spec.name, image = %spec.image, "Creating container");

        let exposed = format!("{}/tcp", spec.port);

        let mounts = spec
            .mounts
            .iter()
            .map(|mount| Mount {
                source: Some(mount.source.display().to_string()),
                target: Some(mount.target.clone()),
                typ: Some(MountTypeEnum::BIND),
                read_only: Some(mount.read_only),
                ..Default::default()
            })
            .collect();

        let port_bindings = HashMap::from([(
            exposed.clone(),
            Some(vec![PortBinding {
                host_ip: Some("0.0.0.0".to_string()),
                host_port: Some(spec.port.to_string()),
            }]),
        )]);

        let host_config = HostConfig {
            mounts: Some(mounts),
            port_bindings: Some(port_bindings),
            extra_hosts: (!spec.extra_hosts.is_empty()).then(|| spec.extra_hosts.clone()),
            links: (!spec.links.is_empty()).then(|| spec.links.clone()),
            restart_policy: spec.always_restart.then(|| RestartPolicy {
                name: Some(RestartPolicyNameEnum::ALWAYS),
                maximum_retry_count: None,
            }),
            ..Default::default()
        };

        let config = Config {
            hostname: Some(spec.hostname.clone()),
            image: Some(spec.image.clone()),
            env: Some(spec.env.clone()),
            exposed_ports: Some(HashMap::from([(exposed, HashMap::new())])),
            host_config: Some(host_config),
            ..Default::default()
        };

        let created = self
            .docker
            .create_container(
                Some(CreateContainerOptions {
                    name: spec.name.clone(),
                    platform: None,
                }),
                config,
            )
            .await
            .map_err(|source| Error::ContainerCreate {
                name: spec.name.clone(),
                source,
            })?;

        // Attachment is deliberately not inferred from creation.
        self.docker
            .connect_network(
                &spec.network,
                ConnectNetworkOptions {
                    container: created.id.clone(),
                    endpoint_config: EndpointSettings::default(),
                },
            )
            .await
            .map_err(|source| Error::NetworkAttach {
                name: spec.name.clone(),
                network: spec.network.clone(),
                source,
            })?;

        self.docker
            .start_container(&created.id, None::<StartContainerOptions<String>>)
            .await
            .map_err(|source| Error::ContainerStart {
                name: spec.name.clone(),
                source,
            })?;

        info!(container = %spec.name, id = %created.id, "Container started");
        Ok(created.id)
    }
}

/// Poll `url` until it answers 2xx or the budget runs out. Timing out is not
/// an error: the run continues after the settle budget, as with the fixed
/// delay this poll replaces.
pub async fn await_ready(name: &str, url: &str, timeout: Duration, interval: Duration) {
    let deadline = Instant::now() + timeout;
    loop {
        match PROBE_CLIENT.get(url).send().await {
            Ok(response) if response.status().is_success() => {
                info!(container = %name, "Service is ready");
                return;
            }
            Ok(response) => {
                debug!(container = %name, status = %response.status(), "Not ready yet");
            }
            Err(err) => {
                debug!(container = %name, %err, "Readiness probe failed");
            }
        }
        if Instant::now() >= deadline {
            warn!(
                container = %name,
                url,
                budget = ?timeout,
                "Readiness probe timed out, continuing"
            );
            return;
        }
        sleep(interval).await;
    }
}

/// Spec for the metrics-collector container.
pub fn prometheus_spec(
    config: &MonitoringConfig,
    layout: &ArtifactLayout,
    network: &ResolvedNetwork,
    port: u16,
    crypto_root: &Path,
) -> ContainerSpec {
    ContainerSpec {
        name: format!("{}-prometheus", network.name),
        image: config.prometheus_image.clone(),
        hostname: "prometheus".to_string(),
        env: vec![],
        port,
        mounts: vec![
            BindMount {
                source: layout.prometheus_config_path(),
                target: "/etc/prometheus/prometheus.yml".to_string(),
                read_only: false,
            },
            // TLS material is only ever read by the scraper.
            BindMount {
                source: crypto_root.to_path_buf(),
                target: CRYPTO_MOUNT_POINT.to_string(),
                read_only: true,
            },
        ],
        extra_hosts: vec![network.ledger_alias()],
        links: vec![],
        network: network.name.clone(),
        always_restart: true,
    }
}

/// Spec for the dashboard container. Linked to the collector by name; auth
/// runs in reverse-proxy mode so the harness can open dashboards without a
/// login flow.
pub fn grafana_spec(
    config: &MonitoringConfig,
    layout: &ArtifactLayout,
    network: &ResolvedNetwork,
    port: u16,
) -> ContainerSpec {
    ContainerSpec {
        name: format!("{}-grafana", network.name),
        image: config.grafana_image.clone(),
        hostname: "grafana".to_string(),
        env: vec![
            "GF_AUTH_PROXY_ENABLED=true".to_string(),
            "GF_PATHS_PROVISIONING=/var/lib/grafana/provisioning/".to_string(),
        ],
        port,
        mounts: vec![
            BindMount {
                source: layout.grafana_provisioning_dir(),
                target: "/var/lib/grafana/provisioning/".to_string(),
                read_only: false,
            },
            BindMount {
                source: layout.grafana_dashboards_dir(),
                target: "/var/lib/grafana/dashboards/".to_string(),
                read_only: false,
            },
        ],
        extra_hosts: vec![],
        links: vec![format!("{}-prometheus", network.name)],
        network: network.name.clone(),
        always_restart: false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn network() -> ResolvedNetwork {
        ResolvedNetwork {
            name: "testnet".to_string(),
            id: "abc123".to_string(),
            gateway: Some("172.20.0.1".to_string()),
        }
    }

    #[test]
    fn ledger_alias_uses_the_network_gateway() {
        assert_eq!(network().ledger_alias(), "fabric:172.20.0.1");
    }

    #[test]
    fn ledger_alias_falls_back_to_host_gateway() {
        let mut net = network();
        net.gateway = None;
        assert_eq!(net.ledger_alias(), "fabric:host-gateway");
    }

    #[test]
    fn prometheus_spec_mounts_config_and_crypto() {
        let config = MonitoringConfig::default();
        let layout = ArtifactLayout::new("/tmp/testnet");
        let spec = prometheus_spec(
            &config,
            &layout,
            &network(),
            9090,
            &PathBuf::from("/tmp/testnet/crypto"),
        );

        assert_eq!(spec.name, "testnet-prometheus");
        assert_eq!(spec.hostname, "prometheus");
        assert_eq!(spec.port, 9090);
        assert!(spec.always_restart);
        assert_eq!(spec.extra_hosts, vec!["fabric:172.20.0.1".to_string()]);

        assert_eq!(spec.mounts.len(), 2);
        assert_eq!(spec.mounts[0].target, "/etc/prometheus/prometheus.yml");
        assert_eq!(
            spec.mounts[0].source,
            PathBuf::from("/tmp/testnet/prometheus/prometheus.yml")
        );
        assert_eq!(spec.mounts[1].target, CRYPTO_MOUNT_POINT);
        assert!(spec.mounts[1].read_only);
    }

    #[test]
    fn grafana_spec_links_to_the_collector() {
        let config = MonitoringConfig::default();
        let layout = ArtifactLayout::new("/tmp/testnet");
        let spec = grafana_spec(&config, &layout, &network(), 3000);

        assert_eq!(spec.name, "testnet-grafana");
        assert_eq!(spec.links, vec!["testnet-prometheus".to_string()]);
        assert!(spec
            .env
            .iter()
            .any(|var| var == "GF_AUTH_PROXY_ENABLED=true"));
        assert!(spec
            .env
            .iter()
            .any(|var| var.starts_with("GF_PATHS_PROVISIONING=")));
        assert!(!spec.always_restart);
        assert_eq!(spec.mounts.len(), 2);
        assert_eq!(spec.mounts[0].target, "/var/lib/grafana/provisioning/");
        assert_eq!(spec.mounts[1].target, "/var/lib/grafana/dashboards/");
    }

    #[tokio::test]
    async fn await_ready_gives_up_after_the_budget() {
        // Nothing listens on this port; the poll must return, not hang.
        let started = std::time::Instant::now();
        await_ready(
            "probe-test",
            "http://127.0.0.1:1/-/ready",
            Duration::from_millis(200),
            Duration::from_millis(50),
        )
        .await;
        assert!(started.elapsed() < Duration::from_secs(5));
    }
}
