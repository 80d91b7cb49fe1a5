use serde::Deserialize;
use serde::Serialize;

use crate::MAX_PEER_EVENTS;

#[derive(Debug, Serialize, Deserialize, Clone, Copy)]
pub struct ReconcileConfig {
    /// Worker loops pulling from the peer work queue
    #[serde(default = "default_peer_workers")]
    pub peer_workers: usize,

    /// Worker loops pulling from the catalog work queue
    #[serde(default = "default_catalog_workers")]
    pub catalog_workers: usize,

    /// Event buffer of each change-feed subscription; a consumer that falls
    /// further behind than this sees a lag warning and relies on the next
    /// resync
    #[serde(default = "default_feed_buffer")]
    pub feed_buffer: usize,

    /// Capacity of the registrar mailbox
    #[serde(default = "default_mailbox_capacity")]
    pub mailbox_capacity: usize,
}

impl Default for ReconcileConfig {
    fn default() -> Self {
        Self {
            peer_workers: default_peer_workers(),
            catalog_workers: default_catalog_workers(),
            feed_buffer: default_feed_buffer(),
            mailbox_capacity: default_mailbox_capacity(),
        }
    }
}

fn default_peer_workers() -> usize {
    2
}
fn default_catalog_workers() -> usize {
    2
}
fn default_feed_buffer() -> usize {
    256
}
fn default_mailbox_capacity() -> usize {
    MAX_PEER_EVENTS
}
