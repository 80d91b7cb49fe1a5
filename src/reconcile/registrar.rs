//! Owns this node's registry identity.
//!
//! Every peer-record write this process makes funnels through one
//! single-consumer loop, so our own writes never race each other on version
//! tokens. The loop serializes two request kinds: the process exit signal,
//! and involuntary-disconnect notifications surfaced by the session layer.
//! Identity partitioning keeps this independent of other nodes writing
//! their own records.

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::time::sleep;
use tracing::debug;
use tracing::error;
use tracing::info;
use tracing::warn;

use crate::utils::util;
use crate::BackoffPolicy;
use crate::PeerRecord;
use crate::RegistryError;
use crate::RegistryStore;
use crate::ResourceStatus;
use crate::Result;
use crate::TOKEN_BYTES;

/// Requests serialized through the registrar mailbox.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegistrarEvent {
    /// Graceful process exit: deregister and stop
    Shutdown,
    /// The session layer lost this peer involuntarily
    PeerDisconnected(String),
}

pub struct SelfRegistrar {
    store: Arc<dyn RegistryStore<PeerRecord>>,
    namespace: String,
    identity: String,
    token: String,
    info: String,
    write_backoff: BackoffPolicy,
}

impl SelfRegistrar {
    /// `identity` is the advertised "ip:port" address; the tunnel token is
    /// generated fresh on every boot.
    pub fn new(
        store: Arc<dyn RegistryStore<PeerRecord>>,
        namespace: impl Into<String>,
        identity: impl Into<String>,
        write_backoff: BackoffPolicy,
    ) -> Self {
        Self {
            store,
            namespace: namespace.into(),
            identity: identity.into(),
            token: util::rand_token(TOKEN_BYTES),
            info: util::host_info(),
            write_backoff,
        }
    }

    pub fn identity(&self) -> &str {
        &self.identity
    }

    pub fn token(&self) -> &str {
        &self.token
    }

    /// Publish this node's own record as Available. Failure here is a fatal
    /// startup error for the caller.
    pub async fn register(&self) -> Result<()> {
        self.upsert_self(ResourceStatus::Available).await?;
        Ok(())
    }

    /// Drain the mailbox until `Shutdown` (or all senders dropping), then
    /// deregister. The caller awaits this before letting the process exit.
    pub async fn run(self, mut events: mpsc::Receiver<RegistrarEvent>) -> Result<()> {
        info!(identity = %self.identity, "registrar loop started");
        while let Some(event) = events.recv().await {
            match event {
                RegistrarEvent::PeerDisconnected(identity) => {
                    info!(peer = %identity, "involuntary disconnect reported");
                    self.mark_peer_unavailable(&identity).await;
                }
                RegistrarEvent::Shutdown => break,
            }
        }
        info!(identity = %self.identity, "registrar loop ended, deregistering");
        self.deregister().await
    }

    async fn upsert_self(&self, status: ResourceStatus) -> Result<PeerRecord> {
        let record = PeerRecord::new(&self.namespace, &self.identity, status, &self.token, &self.info);
        self.upsert(record).await
    }

    /// Replace-style upsert of the self-owned record: always overwrites
    /// status/token/info, carrying the fetched version token through
    /// conflicts.
    async fn upsert(&self, desired: PeerRecord) -> Result<PeerRecord> {
        let max_retries = self.write_backoff.max_retries.max(1);
        for attempt in 0..max_retries {
            match self.store.get(&desired.namespace, &desired.name).await {
                Err(e) if e.is_not_found() => match self.store.create(desired.clone()).await {
                    Ok(created) => {
                        info!(peer = %created.name, status = %created.status, "created own registry record");
                        return Ok(created);
                    }
                    Err(e) if e.is_already_exists() => {
                        debug!(peer = %desired.name, attempt, "lost create race, retrying as update");
                    }
                    Err(e) => return Err(e),
                },
                Ok(current) => {
                    let mut next = desired.clone();
                    next.version = current.version;
                    match self.store.update(next).await {
                        Ok(updated) => {
                            info!(peer = %updated.name, status = %updated.status, "updated own registry record");
                            return Ok(updated);
                        }
                        Err(e) if e.is_conflict() => {
                            debug!(peer = %desired.name, attempt, "version conflict, refetching");
                        }
                        Err(e) => return Err(e),
                    }
                }
                Err(e) => return Err(e),
            }
            if attempt + 1 < max_retries {
                sleep(self.write_backoff.delay_for(attempt + 1)).await;
            }
        }
        Err(RegistryError::RetryExhausted {
            namespace: desired.namespace,
            name: desired.name,
            retries: max_retries,
        }
        .into())
    }

    /// Best-effort flip of a remote peer's record after an involuntary
    /// disconnect. Existing records get a status-only update: the peer still
    /// owns everything else in them.
    async fn mark_peer_unavailable(&self, identity: &str) {
        let name = PeerRecord::name_for_identity(identity);
        let max_retries = self.write_backoff.max_retries.max(1);
        for attempt in 0..max_retries {
            match self.store.get(&self.namespace, &name).await {
                Ok(mut current) => {
                    if current.status == ResourceStatus::UnAvailable {
                        return;
                    }
                    current.status = ResourceStatus::UnAvailable;
                    match self.store.update(current).await {
                        Ok(_) => {
                            info!(peer = %name, "marked UnAvailable after disconnect");
                            return;
                        }
                        Err(e) if e.is_conflict() => {
                            debug!(peer = %name, attempt, "version conflict, refetching");
                        }
                        Err(e) => {
                            warn!(peer = %name, error = %e, "disconnect status write failed");
                            return;
                        }
                    }
                }
                Err(e) if e.is_not_found() => {
                    let record = PeerRecord::new(&self.namespace, identity, ResourceStatus::UnAvailable, "", "");
                    match self.store.create(record).await {
                        Ok(_) => {
                            info!(peer = %name, "created UnAvailable record after disconnect");
                            return;
                        }
                        Err(e) if e.is_already_exists() => {
                            debug!(peer = %name, attempt, "record appeared meanwhile, retrying as update");
                        }
                        Err(e) => {
                            warn!(peer = %name, error = %e, "disconnect record create failed");
                            return;
                        }
                    }
                }
                Err(e) => {
                    warn!(peer = %name, error = %e, "disconnect lookup failed");
                    return;
                }
            }
            if attempt + 1 < max_retries {
                sleep(self.write_backoff.delay_for(attempt + 1)).await;
            }
        }
        warn!(peer = %name, "gave up flipping peer to UnAvailable");
    }

    /// Ordered teardown: flip the own record to UnAvailable (best effort),
    /// then delete it. NotFound anywhere means already clean.
    async fn deregister(&self) -> Result<()> {
        if let Err(e) = self.upsert_self(ResourceStatus::UnAvailable).await {
            warn!(identity = %self.identity, error = %e, "could not mark own record UnAvailable before delete");
        }
        let name = PeerRecord::name_for_identity(&self.identity);
        match self.store.delete(&self.namespace, &name).await {
            Ok(()) => info!(peer = %name, "deregistered"),
            Err(e) if e.is_not_found() => info!(peer = %name, "own record already deleted"),
            Err(e) => {
                error!(peer = %name, error = %e, "deregistration failed");
                return Err(e);
            }
        }
        Ok(())
    }
}
