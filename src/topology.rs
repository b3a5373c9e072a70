//! Read-only view of the assembled test network.
//!
//! The harness builds the actual topology elsewhere; this module only defines
//! the narrow surface the monitoring extension consumes. Platform handles are
//! registered once, at composition time, into a [`TopologyRegistry`] with a
//! typed slot per topology kind, so lookups carry no dynamic type assertions.

use std::path::{Path, PathBuf};

/// In-container mount point for the crypto-material directory.
pub const CRYPTO_MOUNT_POINT: &str = "/etc/prometheus/crypto";

/// A scrapeable network address (`host:port` of a node's operations listener).
#[derive(Debug, Clone)]
pub struct Endpoint {
    pub name: String,
    pub operations_address: String,
}

impl Endpoint {
    pub fn new(name: impl Into<String>, operations_address: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            operations_address: operations_address.into(),
        }
    }
}

/// An organization and its member nodes, in declaration order.
#[derive(Debug, Clone)]
pub struct Organization {
    pub name: String,
    pub peers: Vec<Endpoint>,
}

impl Organization {
    pub fn new(name: impl Into<String>, peers: Vec<Endpoint>) -> Self {
        Self {
            name: name.into(),
            peers,
        }
    }
}

/// Ledger side of the network: ordering service plus peer organizations.
#[derive(Debug, Clone, Default)]
pub struct LedgerTopology {
    pub orderers: Vec<Endpoint>,
    pub organizations: Vec<Organization>,
}

/// An application node with its own TLS certificate set.
#[derive(Debug, Clone)]
pub struct AppNode {
    pub name: String,
    pub operations_address: String,
    /// Host-absolute directory holding `ca.crt`, `server.crt`, `server.key`.
    pub tls_dir: PathBuf,
}

/// Application-node side of the network.
#[derive(Debug, Clone)]
pub struct NodeTopology {
    /// Host-absolute root of the crypto material, mounted into the metrics
    /// collector at [`CRYPTO_MOUNT_POINT`].
    pub crypto_root: PathBuf,
    pub nodes: Vec<AppNode>,
}

/// Typed platform handles, one slot per topology kind.
///
/// Replaces a lookup-by-kind-then-downcast scheme: the harness registers the
/// concrete handles it assembled and the reflector receives them with their
/// real types.
#[derive(Debug, Default)]
pub struct TopologyRegistry {
    ledger: Option<LedgerTopology>,
    nodes: Option<NodeTopology>,
}

impl TopologyRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register_ledger(&mut self, ledger: LedgerTopology) {
        self.ledger = Some(ledger);
    }

    pub fn register_nodes(&mut self, nodes: NodeTopology) {
        self.nodes = Some(nodes);
    }

    pub fn ledger(&self) -> Option<&LedgerTopology> {
        self.ledger.as_ref()
    }

    pub fn nodes(&self) -> Option<&NodeTopology> {
        self.nodes.as_ref()
    }
}

/// Fixed substitution from the host crypto directory to the in-container
/// mount point, applied to every TLS path before it reaches the document.
#[derive(Debug, Clone)]
pub struct PathRewrite {
    host_prefix: String,
}

impl PathRewrite {
    pub fn new(host_prefix: &Path) -> Self {
        Self {
            host_prefix: host_prefix.to_string_lossy().into_owned(),
        }
    }

    /// Rewrite one host path to its container-side equivalent.
    pub fn apply(&self, path: &Path) -> String {
        path.to_string_lossy()
            .replace(&self.host_prefix, CRYPTO_MOUNT_POINT)
    }
}
