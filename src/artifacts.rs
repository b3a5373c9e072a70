//! On-disk artifact generation: the scrape-config document plus the static
//! dashboard provisioning tree.
//!
//! This stage executes once during environment bring-up. Any filesystem or
//! serialization failure aborts the provisioning run; there is no retry or
//! partial-recovery path.

use std::fs;
use std::path::{Path, PathBuf};

use include_dir::{include_dir, Dir, DirEntry};
use tracing::{debug, info};

use crate::error::{Error, Result};
use crate::prometheus::ScrapeDocument;

/// Dashboard and datasource provisioning documents, version-pinned and not
/// derived from the topology. The embedded copies ship with the crate; a
/// harness can swap them for an external directory without a rebuild.
static GRAFANA_ASSETS: Dir<'_> = include_dir!("$CARGO_MANIFEST_DIR/assets/grafana");

/// The fixed filesystem layout under a configuration root.
#[derive(Debug, Clone)]
pub struct ArtifactLayout {
    root: PathBuf,
}

impl ArtifactLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn prometheus_dir(&self) -> PathBuf {
        self.root.join("prometheus")
    }

    pub fn prometheus_config_path(&self) -> PathBuf {
        self.prometheus_dir().join("prometheus.yml")
    }

    pub fn grafana_dir(&self) -> PathBuf {
        self.root.join("grafana")
    }

    pub fn grafana_provisioning_dir(&self) -> PathBuf {
        self.grafana_dir().join("provisioning")
    }

    pub fn grafana_dashboards_dir(&self) -> PathBuf {
        self.grafana_dir().join("dashboards")
    }

    /// Create every directory of the layout, ancestors included. Safe to call
    /// repeatedly against the same root.
    pub fn provision(&self) -> Result<()> {
        let dirs = [
            self.prometheus_dir(),
            self.grafana_dashboards_dir(),
            self.grafana_provisioning_dir().join("dashboards"),
            self.grafana_provisioning_dir().join("datasources"),
            // Created for Grafana's provisioning scanner, never populated.
            self.grafana_provisioning_dir().join("notifiers"),
        ];
        for dir in dirs {
            fs::create_dir_all(&dir).map_err(|source| Error::ConfigWrite { path: dir, source })?;
        }
        debug!(root = %self.root.display(), "Provisioned monitoring artifact directories");
        Ok(())
    }

    /// Serialize the scrape-config document to `prometheus/prometheus.yml`.
    ///
    /// The document is validated first: a duplicate job name would make
    /// Prometheus reject the whole file at startup.
    pub fn write_scrape_config(&self, document: &ScrapeDocument) -> Result<()> {
        document.ensure_unique_job_names()?;

        let path = self.prometheus_config_path();
        let yaml = serde_yaml::to_string(document)?;
        fs::write(&path, yaml).map_err(|source| Error::ConfigWrite {
            path: path.clone(),
            source,
        })?;

        info!(path = %path.display(), jobs = document.scrape_configs.len(), "Wrote scrape configuration");
        Ok(())
    }

    /// Write the dashboard provisioning tree under `grafana/`.
    ///
    /// With `override_dir` set, documents are loaded from that directory
    /// (same relative layout as the embedded assets) instead of the compiled
    /// defaults. Dashboard definitions are checked for JSON well-formedness
    /// before they are written: Grafana would silently skip a malformed one.
    pub fn write_dashboard_assets(&self, override_dir: Option<&Path>) -> Result<()> {
        match override_dir {
            Some(dir) => {
                info!(assets = %dir.display(), "Writing dashboard assets from external directory");
                copy_asset_tree(dir, &self.grafana_dir())
            }
            None => {
                debug!("Writing embedded dashboard assets");
                write_embedded_tree(&GRAFANA_ASSETS, &self.grafana_dir())
            }
        }
    }
}

fn write_embedded_tree(dir: &Dir<'_>, dest_root: &Path) -> Result<()> {
    for entry in dir.entries() {
        match entry {
            DirEntry::Dir(sub) => write_embedded_tree(sub, dest_root)?,
            DirEntry::File(file) => {
                let dest = dest_root.join(file.path());
                write_asset(&dest, file.contents())?;
            }
        }
    }
    Ok(())
}

fn copy_asset_tree(src: &Path, dest: &Path) -> Result<()> {
    let entries = fs::read_dir(src).map_err(|source| Error::ConfigWrite {
        path: src.to_path_buf(),
        source,
    })?;
    for entry in entries {
        let entry = entry.map_err(|source| Error::ConfigWrite {
            path: src.to_path_buf(),
            source,
        })?;
        let src_path = entry.path();
        let dest_path = dest.join(entry.file_name());
        if src_path.is_dir() {
            copy_asset_tree(&src_path, &dest_path)?;
        } else {
            let contents = fs::read(&src_path).map_err(|source| Error::ConfigWrite {
                path: src_path.clone(),
                source,
            })?;
            if src_path.extension().is_some_and(|ext| ext == "json") {
                serde_json::from_slice::<serde_json::Value>(&contents).map_err(|source| {
                    Error::DashboardFormat {
                        path: src_path.clone(),
                        source,
                    }
                })?;
            }
            write_asset(&dest_path, &contents)?;
        }
    }
    Ok(())
}

fn write_asset(dest: &Path, contents: &[u8]) -> Result<()> {
    if let Some(parent) = dest.parent() {
        fs::create_dir_all(parent).map_err(|source| Error::ConfigWrite {
            path: parent.to_path_buf(),
            source,
        })?;
    }
    fs::write(dest, contents).map_err(|source| Error::ConfigWrite {
        path: dest.to_path_buf(),
        source,
    })
}
