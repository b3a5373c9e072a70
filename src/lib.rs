//! Monitoring provisioning for dynamically assembled ledger test networks.
//!
//! Reflects the live topology (ordering service, peer organizations,
//! application nodes) into a Prometheus scrape configuration, writes the
//! Grafana provisioning tree next to it, and brings up the two containers on
//! the harness's virtual network with background log capture.
//!
//! Data flows one way: [`reflector`] output feeds [`artifacts`]; the on-disk
//! artifacts feed [`containers`] as bind-mount sources; started containers
//! feed [`logs`]. The [`extension`] module wires the phases to the harness.

pub mod artifacts;
pub mod config;
pub mod containers;
pub mod error;
pub mod extension;
pub mod logging;
pub mod logs;
pub mod prometheus;
pub mod reflector;
pub mod topology;

pub use config::MonitoringConfig;
pub use error::{Error, Result};
pub use extension::{Extension, Monitoring, Platform};
