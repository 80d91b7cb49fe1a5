//! Turns peer change events into tunnel session lifecycle actions.
//!
//! Status transitions, not raw events, drive the session table. Duplicate
//! deliveries and version-equal echoes collapse into no-ops, and anything a
//! transition misses is corrected on the next full resync because `on_added`
//! re-evaluates status from scratch. Every event also feeds the
//! level-triggered work queue, whose handler repairs drift between the
//! registry and the live session table.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;
use tracing::info;
use tracing::warn;

use crate::tunnel_url;
use crate::FeedHandler;
use crate::PeerRecord;
use crate::RegistryStore;
use crate::Resource;
use crate::ResourceKey;
use crate::ResourceStatus;
use crate::Result;
use crate::SessionManager;
use crate::SyncHandler;
use crate::WorkQueue;

pub struct PeerReconciler {
    sessions: Arc<dyn SessionManager>,
    queue: Arc<WorkQueue>,
    self_identity: String,
}

impl PeerReconciler {
    pub fn new(sessions: Arc<dyn SessionManager>, queue: Arc<WorkQueue>, self_identity: impl Into<String>) -> Self {
        Self {
            sessions,
            queue,
            self_identity: self_identity.into(),
        }
    }

    async fn establish(&self, record: &PeerRecord) {
        if self.sessions.has_session(&record.identity) {
            warn!(peer = %record.name, identity = %record.identity, "session already exists, skipping add");
            return;
        }
        match self
            .sessions
            .add_session(&tunnel_url(&record.identity), &record.identity, &record.token)
            .await
        {
            Ok(()) => info!(peer = %record.name, identity = %record.identity, "session established"),
            Err(e) if e.is_already_exists() => {
                // benign: another task won the establish race
                warn!(peer = %record.name, identity = %record.identity, "session already exists");
            }
            Err(e) => {
                warn!(peer = %record.name, identity = %record.identity, error = %e, "session establish failed, next resync retries")
            }
        }
    }
}

#[async_trait]
impl FeedHandler<PeerRecord> for PeerReconciler {
    async fn on_added(&self, record: PeerRecord) {
        if record.identity == self.self_identity {
            // our own record is managed by the registrar
            return;
        }
        debug!(peer = %record.name, status = %record.status, "peer added");
        if record.status == ResourceStatus::Available {
            self.establish(&record).await;
        }
        self.queue.add(record.key());
    }

    async fn on_updated(&self, old: PeerRecord, new: PeerRecord) {
        if old.version == new.version {
            // feed echo, nothing actually changed
            return;
        }
        if old.namespace != new.namespace {
            // out-of-scope drift
            return;
        }
        if new.identity == self.self_identity {
            return;
        }
        match (old.status, new.status) {
            (ResourceStatus::UnAvailable, ResourceStatus::Available) => {
                info!(peer = %new.name, "status UnAvailable -> Available");
                self.establish(&new).await;
            }
            (ResourceStatus::Available, ResourceStatus::UnAvailable) => {
                info!(peer = %new.name, "status Available -> UnAvailable");
                let _ = self.sessions.remove_session(&new.identity).await;
            }
            _ => {}
        }
        self.queue.add(new.key());
    }

    async fn on_deleted(&self, record: PeerRecord) {
        info!(peer = %record.name, identity = %record.identity, "peer deleted, tearing down session");
        let _ = self.sessions.remove_session(&record.identity).await;
        self.queue.add(record.key());
    }
}

/// Level-triggered repair pass for one peer key: re-reads the record and
/// brings the session table in line with its status.
pub struct PeerSyncHandler {
    store: Arc<dyn RegistryStore<PeerRecord>>,
    sessions: Arc<dyn SessionManager>,
    self_identity: String,
}

impl PeerSyncHandler {
    pub fn new(
        store: Arc<dyn RegistryStore<PeerRecord>>,
        sessions: Arc<dyn SessionManager>,
        self_identity: impl Into<String>,
    ) -> Self {
        Self {
            store,
            sessions,
            self_identity: self_identity.into(),
        }
    }
}

#[async_trait]
impl SyncHandler for PeerSyncHandler {
    async fn sync(&self, key: &ResourceKey) -> Result<()> {
        let record = match self.store.get(&key.namespace, &key.name).await {
            Ok(record) => record,
            Err(e) if e.is_not_found() => {
                // deleted: the event path already tore the session down
                debug!(%key, "peer record gone, nothing to repair");
                return Ok(());
            }
            Err(e) => return Err(e),
        };
        if record.identity == self.self_identity {
            return Ok(());
        }
        match record.status {
            ResourceStatus::Available if !self.sessions.has_session(&record.identity) => {
                info!(peer = %record.name, identity = %record.identity, "repairing missing session");
                match self
                    .sessions
                    .add_session(&tunnel_url(&record.identity), &record.identity, &record.token)
                    .await
                {
                    Err(e) if !e.is_already_exists() => return Err(e),
                    _ => {}
                }
            }
            ResourceStatus::UnAvailable if self.sessions.has_session(&record.identity) => {
                info!(peer = %record.name, identity = %record.identity, "dropping session for unavailable peer");
                self.sessions.remove_session(&record.identity).await?;
            }
            _ => {}
        }
        Ok(())
    }
}
