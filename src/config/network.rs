use std::time::Duration;

use serde::Deserialize;
use serde::Serialize;

#[derive(Debug, Serialize, Deserialize, Clone, Copy)]
pub struct NetworkConfig {
    /// Default timeout handed to `SessionManager::dial` when the proxy caller
    /// does not supply one (unit: seconds)
    #[serde(default = "default_dial_timeout_secs")]
    pub dial_timeout_secs: u64,

    /// Single request timeout against the registry store (unit: milliseconds)
    #[serde(default = "default_request_timeout_in_ms")]
    pub request_timeout_in_ms: u64,
}

impl NetworkConfig {
    pub fn dial_timeout(&self) -> Duration {
        Duration::from_secs(self.dial_timeout_secs)
    }
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            dial_timeout_secs: default_dial_timeout_secs(),
            request_timeout_in_ms: default_request_timeout_in_ms(),
        }
    }
}

fn default_dial_timeout_secs() -> u64 {
    15
}
fn default_request_timeout_in_ms() -> u64 {
    1000
}
