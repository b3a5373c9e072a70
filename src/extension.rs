//! The monitoring extension itself: the three harness phases wired together.
//!
//! The harness drives `check_topology` while the network description is
//! assembled, `generate_artifacts` when configuration is materialized on
//! disk, and `post_run` once the network is up. Every phase is a no-op when
//! monitoring is disabled.

use std::path::Path;

use bollard::Docker;
use tracing::{info, warn};

use crate::artifacts::ArtifactLayout;
use crate::config::MonitoringConfig;
use crate::containers::{
    await_ready, grafana_spec, prometheus_spec, ContainerOrchestrator, ResolvedNetwork,
};
use crate::error::Result;
use crate::logs::{spawn_forwarder, ContainerHandle};
use crate::reflector::scrape_document;
use crate::topology::TopologyRegistry;

/// Read-only capability surface the extension consumes from the enclosing
/// test harness. The harness owns all of this; the extension never mutates
/// any of it.
pub trait Platform {
    /// Whether the Prometheus/Grafana pair should be provisioned at all.
    fn monitoring_enabled(&self) -> bool;

    /// Whether the harness also runs the ledger explorer UI. Consumed for
    /// operator hints only; explorer provisioning lives elsewhere.
    fn explorer_enabled(&self) -> bool;

    /// Typed platform handles, registered once at composition time.
    fn topologies(&self) -> &TopologyRegistry;

    /// Root directory for generated configuration artifacts.
    fn config_root(&self) -> &Path;

    /// Handle to the container runtime.
    fn docker(&self) -> &Docker;

    /// Identifier of the pre-existing virtual network.
    fn network_id(&self) -> &str;

    /// Published host port for the metrics collector.
    fn prometheus_port(&self) -> u16;

    /// Published host port for the dashboard server.
    fn grafana_port(&self) -> u16;
}

/// Handles to the two provisioned containers.
///
/// Dropping this leaves both containers running and their log forwarders
/// detached; [`Monitoring::shutdown`] stops only the forwarders. Stopping or
/// removing the containers themselves is the harness's teardown concern.
#[derive(Debug)]
pub struct Monitoring {
    pub prometheus: ContainerHandle,
    pub grafana: ContainerHandle,
}

impl Monitoring {
    pub async fn shutdown(self) {
        self.prometheus.stop_forwarding().await;
        self.grafana.stop_forwarding().await;
    }
}

pub struct Extension<P> {
    platform: P,
    config: MonitoringConfig,
}

impl<P: Platform> Extension<P> {
    pub fn new(platform: P) -> Self {
        Self::with_config(platform, MonitoringConfig::default())
    }

    pub fn with_config(platform: P, config: MonitoringConfig) -> Self {
        Self { platform, config }
    }

    /// Verify the pinned container images are available. Called while the
    /// topology is still being assembled so a missing image fails fast.
    pub async fn check_topology(&self) -> Result<()> {
        if !self.platform.monitoring_enabled() {
            return Ok(());
        }
        let orchestrator = ContainerOrchestrator::new(self.platform.docker().clone());
        orchestrator
            .ensure_images(&[&self.config.prometheus_image, &self.config.grafana_image])
            .await
    }

    /// Reflect the topology into the scrape-config document and write every
    /// artifact under the configuration root. Runs exactly once; the written
    /// document is never mutated afterwards.
    pub fn generate_artifacts(&self) -> Result<()> {
        if !self.platform.monitoring_enabled() {
            return Ok(());
        }

        let document = scrape_document(&self.config, self.platform.topologies());
        let layout = self.layout();
        layout.provision()?;
        layout.write_scrape_config(&document)?;
        layout.write_dashboard_assets(self.config.assets_dir.as_deref())?;
        Ok(())
    }

    /// Bring up the metrics collector, wait for it to become ready, then
    /// bring up the dashboard server. Log forwarders are spawned for both and
    /// their handles returned; `Ok(None)` means monitoring is disabled.
    pub async fn post_run(&self) -> Result<Option<Monitoring>> {
        if !self.platform.monitoring_enabled() {
            return Ok(None);
        }
        if self.platform.explorer_enabled() {
            info!("Explorer UI is enabled; its provisioning is handled outside monitoring");
        }

        let docker = self.platform.docker().clone();
        let orchestrator = ContainerOrchestrator::new(docker.clone());
        let network = orchestrator
            .resolve_network(self.platform.network_id())
            .await?;
        let layout = self.layout();

        let prometheus = self
            .launch_prometheus(&orchestrator, &docker, &network, &layout)
            .await?;

        // Grafana's datasource provisioning expects a reachable collector;
        // start it only after the readiness budget has been spent.
        let prometheus_port = self.platform.prometheus_port();
        await_ready(
            &prometheus.name,
            &format!("http://127.0.0.1:{prometheus_port}/-/ready"),
            self.config.prometheus_ready_timeout,
            self.config.probe_interval,
        )
        .await;

        let spec = grafana_spec(&self.config, &layout, &network, self.platform.grafana_port());
        let id = orchestrator.launch(&spec).await?;
        let grafana = spawn_forwarder(&docker, &spec.name, &id).await?;

        let grafana_port = self.platform.grafana_port();
        await_ready(
            &grafana.name,
            &format!("http://127.0.0.1:{grafana_port}/api/health"),
            self.config.grafana_ready_timeout,
            self.config.probe_interval,
        )
        .await;

        info!(
            prometheus = %prometheus.name,
            grafana = %grafana.name,
            "Monitoring stack is up"
        );
        Ok(Some(Monitoring {
            prometheus,
            grafana,
        }))
    }

    async fn launch_prometheus(
        &self,
        orchestrator: &ContainerOrchestrator,
        docker: &Docker,
        network: &ResolvedNetwork,
        layout: &ArtifactLayout,
    ) -> Result<ContainerHandle> {
        let crypto_root = match self.platform.topologies().nodes() {
            Some(nodes) => nodes.crypto_root.clone(),
            None => {
                // Nothing to scrape over TLS; mount the (empty) config root
                // so the container spec keeps its fixed shape.
                warn!("No application-node topology registered, crypto mount will be empty");
                self.platform.config_root().to_path_buf()
            }
        };

        let spec = prometheus_spec(
            &self.config,
            layout,
            network,
            self.platform.prometheus_port(),
            &crypto_root,
        );
        let id = orchestrator.launch(&spec).await?;
        spawn_forwarder(docker, &spec.name, &id).await
    }

    fn layout(&self) -> ArtifactLayout {
        ArtifactLayout::new(self.platform.config_root())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::topology::{Endpoint, LedgerTopology};
    use std::path::PathBuf;

    struct FakePlatform {
        enabled: bool,
        registry: TopologyRegistry,
        root: PathBuf,
        docker: Docker,
    }

    impl FakePlatform {
        fn new(enabled: bool, root: PathBuf) -> Self {
            let mut registry = TopologyRegistry::new();
            registry.register_ledger(LedgerTopology {
                orderers: vec![Endpoint::new("orderer0", "127.0.0.1:8101")],
                organizations: vec![],
            });
            Self {
                enabled,
                registry,
                root,
                // Never contacted by the artifact phases under test.
                docker: Docker::connect_with_local_defaults().unwrap(),
            }
        }
    }

    impl Platform for FakePlatform {
        fn monitoring_enabled(&self) -> bool {
            self.enabled
        }
        fn explorer_enabled(&self) -> bool {
            false
        }
        fn topologies(&self) -> &TopologyRegistry {
            &self.registry
        }
        fn config_root(&self) -> &Path {
            &self.root
        }
        fn docker(&self) -> &Docker {
            &self.docker
        }
        fn network_id(&self) -> &str {
            "testnet"
        }
        fn prometheus_port(&self) -> u16 {
            9090
        }
        fn grafana_port(&self) -> u16 {
            3000
        }
    }

    #[test]
    fn generate_artifacts_writes_the_whole_tree() {
        let root = tempfile::tempdir().unwrap();
        let platform = FakePlatform::new(true, root.path().to_path_buf());
        let extension = Extension::new(platform);

        extension.generate_artifacts().unwrap();

        for relative in [
            "prometheus/prometheus.yml",
            "grafana/provisioning/dashboards/dashboard.yaml",
            "grafana/provisioning/datasources/datasource.yaml",
            "grafana/dashboards/fabric_backed.json",
            "grafana/dashboards/fabric_business.json",
        ] {
            assert!(
                root.path().join(relative).is_file(),
                "missing {relative}"
            );
        }
        assert!(root
            .path()
            .join("grafana/provisioning/notifiers")
            .is_dir());
    }

    #[test]
    fn generate_artifacts_is_repeatable() {
        let root = tempfile::tempdir().unwrap();
        let platform = FakePlatform::new(true, root.path().to_path_buf());
        let extension = Extension::new(platform);

        extension.generate_artifacts().unwrap();
        extension.generate_artifacts().unwrap();
        assert!(root.path().join("prometheus/prometheus.yml").is_file());
    }

    #[test]
    fn disabled_monitoring_writes_nothing() {
        let root = tempfile::tempdir().unwrap();
        let platform = FakePlatform::new(false, root.path().to_path_buf());
        let extension = Extension::new(platform);

        extension.generate_artifacts().unwrap();
        assert!(!root.path().join("prometheus").exists());
        assert!(!root.path().join("grafana").exists());
    }

    #[tokio::test]
    async fn disabled_monitoring_skips_post_run() {
        let root = tempfile::tempdir().unwrap();
        let platform = FakePlatform::new(false, root.path().to_path_buf());
        let extension = Extension::new(platform);

        let result = extension.post_run().await.unwrap();
        assert!(result.is_none());
    }
}
