use std::path::PathBuf;

use serde::Deserialize;
use serde::Serialize;

use crate::DEFAULT_NAMESPACE;

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct NodeConfig {
    /// Registry namespace this node registers into and watches
    #[serde(default = "default_namespace")]
    pub namespace: String,

    /// Port the tunnel front end listens on. Other peers dial it, so it is
    /// baked into this node's registry identity.
    #[serde(default = "default_listen_port")]
    pub listen_port: u16,

    /// Advertised IPv4 address. Empty means detect the first non-loopback
    /// address at startup.
    #[serde(default)]
    pub advertise_ip: String,

    #[serde(default = "default_log_dir")]
    pub log_dir: PathBuf,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            namespace: default_namespace(),
            listen_port: default_listen_port(),
            advertise_ip: String::new(),
            log_dir: default_log_dir(),
        }
    }
}

fn default_namespace() -> String {
    DEFAULT_NAMESPACE.to_string()
}
fn default_listen_port() -> u16 {
    8123
}
fn default_log_dir() -> PathBuf {
    PathBuf::from("./logs")
}
