use std::io;

use anyhow::{Context, Result};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Registry};

/// Install the process-wide structured log sink.
///
/// Called once at harness start; every component (config generator,
/// orchestrator, log forwarders) emits through the subscriber installed here
/// instead of fetching a logger by name. `RUST_LOG` controls verbosity, e.g.
/// `RUST_LOG=testnet_monitoring=debug,info` to surface forwarded container
/// output.
pub fn init() -> Result<()> {
    let filter_layer = EnvFilter::from_default_env();
    let log_layer = tracing_subscriber::fmt::layer().with_writer(io::stderr);

    Registry::default()
        .with(filter_layer)
        .with(log_layer)
        .try_init()
        .context("unable to initialize logger")?;

    Ok(())
}
