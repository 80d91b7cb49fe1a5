//! Configuration management for a peermesh node.
//!
//! Hierarchical loading with priority:
//! 1. Default values (hardcoded)
//! 2. Optional config file (`peermesh.toml` unless a path is given)
//! 3. Environment variables with the `PEERMESH` prefix (highest priority)

mod network;
mod node;
mod reconcile;
mod retry;
pub use network::*;
pub use node::*;
pub use reconcile::*;
pub use retry::*;


//---
use config::Config;
use config::ConfigError;
use config::Environment;
use config::File;
use serde::Deserialize;

use crate::Result;

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Settings {
    /// Node identity and registry placement
    #[serde(default)]
    pub node: NodeConfig,

    /// Tunnel and front-end network parameters
    #[serde(default)]
    pub network: NetworkConfig,

    /// Worker counts and channel sizing for the reconcilers
    #[serde(default)]
    pub reconcile: ReconcileConfig,

    /// Retry policies for registry writes and queue requeues
    #[serde(default)]
    pub retry: RetryPolicies,
}

impl Settings {
    /// Load configuration from an optional file path, then environment
    /// overrides (`PEERMESH_NODE__LISTEN_PORT=9000` style).
    pub fn load(config_path: Option<String>) -> Result<Self> {
        let mut builder = Config::builder();
        builder = match config_path {
            Some(path) => builder.add_source(File::with_name(&path)),
            None => builder.add_source(File::with_name("peermesh").required(false)),
        };
        builder = builder.add_source(Environment::with_prefix("PEERMESH").separator("__"));

        let settings: Settings = builder.build()?.try_deserialize()?;
        settings.validate()?;
        Ok(settings)
    }

    /// Validates configuration consistency
    pub fn validate(&self) -> Result<()> {
        if self.node.namespace.is_empty() {
            return Err(ConfigError::Message("node.namespace cannot be empty".into()).into());
        }
        if self.node.listen_port == 0 {
            return Err(ConfigError::Message("node.listen_port cannot be 0".into()).into());
        }
        if self.reconcile.peer_workers == 0 || self.reconcile.catalog_workers == 0 {
            return Err(ConfigError::Message("reconcile worker counts must be at least 1".into()).into());
        }
        Ok(())
    }
}
