use std::time::Duration;

use serde::Deserialize;

/// Basic retry policy template
#[derive(Debug, Deserialize, Clone, Copy)]
pub struct BackoffPolicy {
    /// Maximum number of attempts before a write gives up; queue requeues
    /// only use the delay curve and never stop retrying
    #[serde(default = "default_max_retries")]
    pub max_retries: usize,

    /// Backoff base (unit: milliseconds)
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,

    /// Maximum backoff time (unit: milliseconds)
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,
}

impl BackoffPolicy {
    /// Exponential delay for the nth retry (1-based), capped at
    /// `max_delay_ms`.
    pub fn delay_for(&self, retries: usize) -> Duration {
        let exp = retries.saturating_sub(1).min(32) as u32;
        let delay = self.base_delay_ms.saturating_mul(1u64 << exp);
        Duration::from_millis(delay.min(self.max_delay_ms))
    }
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            base_delay_ms: default_base_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
        }
    }
}

/// Divide strategies by business domain
#[derive(Debug, Deserialize, Clone, Copy)]
pub struct RetryPolicies {
    // Requeue curve for failed peer syncs
    #[serde(default = "default_peer_queue")]
    pub peer_queue: BackoffPolicy,

    // Requeue curve for failed catalog syncs
    #[serde(default = "default_catalog_queue")]
    pub catalog_queue: BackoffPolicy,

    // Version-conflict retries on registry writes
    #[serde(default = "default_registry_write")]
    pub registry_write: BackoffPolicy,
}

impl Default for RetryPolicies {
    fn default() -> Self {
        Self {
            peer_queue: default_peer_queue(),
            catalog_queue: default_catalog_queue(),
            registry_write: default_registry_write(),
        }
    }
}

fn default_peer_queue() -> BackoffPolicy {
    BackoffPolicy {
        max_retries: 0,
        base_delay_ms: 5,
        max_delay_ms: 1000,
    }
}
fn default_catalog_queue() -> BackoffPolicy {
    BackoffPolicy {
        max_retries: 0,
        base_delay_ms: 5,
        max_delay_ms: 1000,
    }
}
fn default_registry_write() -> BackoffPolicy {
    BackoffPolicy {
        max_retries: 5,
        base_delay_ms: 50,
        max_delay_ms: 2000,
    }
}
fn default_max_retries() -> usize {
    3
}
fn default_base_delay_ms() -> u64 {
    50
}
fn default_max_delay_ms() -> u64 {
    1000
}
