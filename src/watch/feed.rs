//! Change feed over one registry collection.
//!
//! Delivery model: a full initial snapshot as a sequence of `on_added`
//! calls, then live incremental events until cancellation. The sync barrier
//! flips to true once the snapshot is fully delivered so level-triggered
//! consumers know when the picture is complete.
//!
//! Delivery is at-least-once: a handler may observe a duplicate `Added` or
//! an `Updated` whose versions are equal (a feed echo) and must treat both
//! as no-ops. Events for one identity arrive in causal order. Handlers run
//! sequentially on the feed task, so a slow handler stalls delivery for the
//! whole feed.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::watch;
use tokio_stream::wrappers::errors::BroadcastStreamRecvError;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::StreamExt;
use tracing::debug;
use tracing::info;
use tracing::warn;

use crate::RegistryError;
use crate::RegistryStore;
use crate::Resource;
use crate::Result;

/// Tagged change notification for one record.
#[derive(Debug, Clone)]
pub enum FeedEvent<R> {
    Added(R),
    Updated { old: R, new: R },
    Deleted(R),
}

/// Consumer side of a [`ChangeFeed`] subscription.
#[async_trait]
pub trait FeedHandler<R: Resource>: Send + Sync + 'static {
    async fn on_added(&self, record: R);
    async fn on_updated(&self, old: R, new: R);
    async fn on_deleted(&self, record: R);
}

pub struct ChangeFeed<R: Resource> {
    store: Arc<dyn RegistryStore<R>>,
    namespace: String,
    handlers: Vec<Arc<dyn FeedHandler<R>>>,
    synced_tx: watch::Sender<bool>,
    synced_rx: watch::Receiver<bool>,
}

impl<R: Resource> ChangeFeed<R> {
    pub fn new(store: Arc<dyn RegistryStore<R>>, namespace: impl Into<String>) -> Self {
        let (synced_tx, synced_rx) = watch::channel(false);
        Self {
            store,
            namespace: namespace.into(),
            handlers: Vec::new(),
            synced_tx,
            synced_rx,
        }
    }

    pub fn subscribe(&mut self, handler: Arc<dyn FeedHandler<R>>) {
        self.handlers.push(handler);
    }

    /// Barrier that flips to true once the initial snapshot is delivered.
    pub fn sync_barrier(&self) -> watch::Receiver<bool> {
        self.synced_rx.clone()
    }

    /// Deliver the snapshot, then live events, until the graceful signal.
    ///
    /// The live subscription is opened before the snapshot is listed so no
    /// change can fall between the two; the overlap this creates is absorbed
    /// by handler idempotence.
    pub async fn run(self, mut graceful_rx: watch::Receiver<()>) -> Result<()> {
        let mut live = BroadcastStream::new(self.store.subscribe());

        let snapshot = self.store.list(&self.namespace).await?;
        debug!(kind = R::KIND, namespace = %self.namespace, records = snapshot.len(), "delivering initial snapshot");
        for record in snapshot {
            self.dispatch(FeedEvent::Added(record)).await;
        }
        let _ = self.synced_tx.send(true);
        info!(kind = R::KIND, namespace = %self.namespace, "initial sync complete, switching to live events");

        loop {
            tokio::select! {
                _ = graceful_rx.changed() => {
                    info!(kind = R::KIND, namespace = %self.namespace, "change feed stopped");
                    return Ok(());
                }
                event = live.next() => match event {
                    Some(Ok(event)) => self.dispatch(event).await,
                    Some(Err(BroadcastStreamRecvError::Lagged(skipped))) => {
                        // dropped events are healed by the next full resync
                        warn!(kind = R::KIND, namespace = %self.namespace, skipped, "change feed lagged");
                    }
                    None => {
                        warn!(kind = R::KIND, namespace = %self.namespace, "change feed source closed");
                        return Err(RegistryError::Closed.into());
                    }
                }
            }
        }
    }

    /// Namespace-scoped, sequential dispatch to every handler.
    async fn dispatch(&self, event: FeedEvent<R>) {
        match event {
            FeedEvent::Added(record) => {
                if record.namespace() != self.namespace {
                    return;
                }
                for handler in &self.handlers {
                    handler.on_added(record.clone()).await;
                }
            }
            FeedEvent::Updated { old, new } => {
                if new.namespace() != self.namespace {
                    return;
                }
                for handler in &self.handlers {
                    handler.on_updated(old.clone(), new.clone()).await;
                }
            }
            FeedEvent::Deleted(record) => {
                if record.namespace() != self.namespace {
                    return;
                }
                for handler in &self.handlers {
                    handler.on_deleted(record.clone()).await;
                }
            }
        }
    }
}

/// Block until a feed's initial snapshot has been delivered or the graceful
/// signal fires. Returns false on cancellation.
pub async fn wait_for_sync(barrier: &mut watch::Receiver<bool>, graceful_rx: &mut watch::Receiver<()>) -> bool {
    loop {
        if *barrier.borrow() {
            return true;
        }
        tokio::select! {
            changed = barrier.changed() => {
                if changed.is_err() {
                    // feed task is gone; it will never sync
                    return false;
                }
            }
            _ = graceful_rx.changed() => return false,
        }
    }
}
