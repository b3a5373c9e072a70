use std::path::PathBuf;

use thiserror::Error;

/// Errors surfaced while provisioning the monitoring stack.
///
/// Every variant is fatal to the provisioning run and is returned at the
/// point of failure. Nothing here is retried: this code executes once during
/// environment bring-up, not on a steady-state request path, and no
/// compensation of already-created containers takes place on partial failure.
#[derive(Debug, Error)]
pub enum Error {
    /// Filesystem failure while generating monitoring artifacts.
    #[error("unable to write monitoring artifact {path}")]
    ConfigWrite {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The scrape-config document could not be serialized.
    #[error("unable to serialize scrape configuration")]
    ConfigSerialize(#[from] serde_yaml::Error),

    /// Two scrape jobs ended up with the same name, which Prometheus rejects.
    #[error("duplicate scrape job name: {0}")]
    DuplicateJobName(String),

    /// A dashboard definition is not well-formed JSON.
    #[error("dashboard definition {path} is not valid JSON")]
    DashboardFormat {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// A required container image is not available locally.
    #[error("required image {0} is not available, pull it before running")]
    ImageMissing(String),

    /// The container runtime rejected the create request.
    #[error("unable to create container {name}")]
    ContainerCreate {
        name: String,
        #[source]
        source: bollard::errors::Error,
    },

    /// The container could not be attached to the virtual network.
    #[error("unable to attach container {name} to network {network}")]
    NetworkAttach {
        name: String,
        network: String,
        #[source]
        source: bollard::errors::Error,
    },

    /// The container runtime rejected the start request.
    #[error("unable to start container {name}")]
    ContainerStart {
        name: String,
        #[source]
        source: bollard::errors::Error,
    },

    /// The combined stdout/stderr stream could not be attached.
    #[error("unable to attach log stream for container {name}")]
    LogStreamAttach {
        name: String,
        #[source]
        source: bollard::errors::Error,
    },
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
