//! Background forwarding of container output into the structured log sink.

use bollard::container::LogsOptions;
use bollard::Docker;
use futures_util::StreamExt;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::error::{Error, Result};

/// A provisioned container together with its log-forwarding task.
///
/// Lifecycle termination of the container itself is the caller's business;
/// this handle only owns the forwarder, which normally runs until the log
/// stream closes with the container.
#[derive(Debug)]
pub struct ContainerHandle {
    pub name: String,
    pub id: String,
    forwarder: JoinHandle<()>,
}

impl ContainerHandle {
    /// Stop the log forwarder without touching the container.
    pub async fn stop_forwarding(self) {
        self.forwarder.abort();
        // A JoinError here is the expected abort; anything else already
        // happened inside a detached task and was logged there.
        let _ = self.forwarder.await;
    }
}

/// Attach the combined stdout/stderr stream of a started container and
/// forward each line to the log sink from a detached task.
///
/// Failure to attach is fatal and surfaces here, synchronously. Once the
/// stream is established, read errors only degrade observability: they are
/// logged and swallowed, never propagated.
pub async fn spawn_forwarder(docker: &Docker, name: &str, id: &str) -> Result<ContainerHandle> {
    // The stream itself is built lazily, so inspect first: a container the
    // runtime cannot see means the stream could never be established.
    docker
        .inspect_container(id, None)
        .await
        .map_err(|source| Error::LogStreamAttach {
            name: name.to_string(),
            source,
        })?;

    let docker = docker.clone();
    let container = name.to_string();
    let container_id = id.to_string();
    let forwarder = tokio::spawn(async move {
        let mut stream = docker.logs(
            &container_id,
            Some(LogsOptions::<String> {
                stdout: true,
                stderr: true,
                follow: true,
                timestamps: false,
                ..Default::default()
            }),
        );
        while let Some(chunk) = stream.next().await {
            match chunk {
                Ok(output) => {
                    let text = output.to_string();
                    for line in text.lines() {
                        debug!(container = %container, "{}", line);
                    }
                }
                Err(err) => {
                    // Mid-stream failures must never abort the run.
                    debug!(container = %container, %err, "Log stream read failed");
                }
            }
        }
        info!(container = %container, "Log stream closed");
    });

    Ok(ContainerHandle {
        name: name.to_string(),
        id: id.to_string(),
        forwarder,
    })
}
