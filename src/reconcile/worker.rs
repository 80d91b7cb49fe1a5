//! Level-triggered sync driver shared by the peer and catalog paths.
//!
//! N worker loops pull deduplicated keys off one [`WorkQueue`] and apply a
//! resource-specific [`SyncHandler`]. Success resets the key's backoff
//! counter; failure requeues with an increasing delay. Workers only start
//! after the backing change feed has delivered its initial snapshot.

use std::sync::Arc;

use async_trait::async_trait;
#[cfg(test)]
use mockall::automock;
use tokio::sync::watch;
use tracing::debug;
use tracing::info;
use tracing::warn;

use crate::wait_for_sync;
use crate::ResourceKey;
use crate::Result;
use crate::WorkQueue;

/// Per-resource diff/apply policy.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait SyncHandler: Send + Sync + 'static {
    /// Reconcile one resource toward its desired state. `NotFound` from the
    /// store means the resource was deleted: apply the deletion side effect
    /// and report success.
    async fn sync(&self, key: &ResourceKey) -> Result<()>;
}

pub struct QueueReconciler {
    name: &'static str,
    queue: Arc<WorkQueue>,
    handler: Arc<dyn SyncHandler>,
    sync_barrier: watch::Receiver<bool>,
}

impl QueueReconciler {
    pub fn new(
        name: &'static str,
        queue: Arc<WorkQueue>,
        handler: Arc<dyn SyncHandler>,
        sync_barrier: watch::Receiver<bool>,
    ) -> Self {
        Self {
            name,
            queue,
            handler,
            sync_barrier,
        }
    }

    /// Blocks until the feed's initial snapshot lands, then runs `workers`
    /// independent pull loops until the graceful signal fires. In-flight
    /// syncs finish; pending keys are dropped.
    pub async fn run(self, workers: usize, mut graceful_rx: watch::Receiver<()>) -> Result<()> {
        let mut barrier = self.sync_barrier.clone();
        if !wait_for_sync(&mut barrier, &mut graceful_rx).await {
            warn!(reconciler = self.name, "shutdown before initial sync completed");
            self.queue.shut_down();
            return Ok(());
        }

        info!(reconciler = self.name, workers, "initial sync complete, starting workers");
        let mut handles = Vec::with_capacity(workers);
        for worker in 0..workers {
            let queue = Arc::clone(&self.queue);
            let handler = Arc::clone(&self.handler);
            let name = self.name;
            handles.push(tokio::spawn(async move {
                while let Some(key) = queue.get().await {
                    match handler.sync(&key).await {
                        Ok(()) => {
                            queue.forget(&key);
                            debug!(reconciler = name, worker, %key, "synced");
                        }
                        Err(e) => {
                            warn!(reconciler = name, worker, %key, error = %e, "sync failed, requeueing");
                            queue.add_rate_limited(key.clone());
                        }
                    }
                    queue.done(&key);
                }
            }));
        }

        let queue = Arc::clone(&self.queue);
        tokio::spawn(async move {
            let _ = graceful_rx.changed().await;
            queue.shut_down();
        });

        futures::future::join_all(handles).await;
        info!(reconciler = self.name, "workers drained");
        Ok(())
    }
}
