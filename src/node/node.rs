//! Runtime assembly of one peermesh node.
//!
//! ## Startup order
//! 1. Publish this node's own registry record (fatal on failure, no partial
//!    state)
//! 2. Start the change feeds, the queue reconcilers and the tunnel front end
//! 3. Bridge the graceful signal into the registrar mailbox
//!
//! ## Shutdown order
//! The graceful signal stops feeds, workers and the HTTP server, and lands a
//! `Shutdown` in the registrar mailbox. [`Node::run`] blocks on the
//! registrar finishing — its last act is deleting this node's own record —
//! before reaping the remaining tasks, so deregistration always completes
//! before the process exits.

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::sync::watch;
use tracing::error;
use tracing::info;
use tracing::warn;

use crate::network;
use crate::CatalogManager;
use crate::CatalogRecord;
use crate::ChangeFeed;
use crate::PeerRecord;
use crate::QueueReconciler;
use crate::RegistrarEvent;
use crate::Result;
use crate::SelfRegistrar;
use crate::Settings;
use crate::SystemError;
use crate::TunnelHub;

pub struct Node {
    pub(crate) settings: Settings,
    pub(crate) identity: String,
    pub(crate) hub: Arc<TunnelHub>,
    pub(crate) registrar: SelfRegistrar,
    pub(crate) registrar_tx: mpsc::Sender<RegistrarEvent>,
    pub(crate) registrar_rx: mpsc::Receiver<RegistrarEvent>,
    pub(crate) peer_feed: ChangeFeed<PeerRecord>,
    pub(crate) catalog_feed: ChangeFeed<CatalogRecord>,
    pub(crate) peer_reconciler: QueueReconciler,
    pub(crate) catalog_reconciler: QueueReconciler,
    pub(crate) catalogs: CatalogManager,
    pub(crate) graceful_rx: watch::Receiver<()>,
}

impl Node {
    /// The "ip:port" identity this node registers under.
    pub fn identity(&self) -> &str {
        &self.identity
    }

    /// Live session table, shared with the front end.
    pub fn sessions(&self) -> Arc<TunnelHub> {
        self.hub.clone()
    }

    /// Catalog mutation API for embedders.
    pub fn catalogs(&self) -> CatalogManager {
        self.catalogs.clone()
    }

    /// Run until the graceful signal fires and deregistration completes.
    pub async fn run(self) -> Result<()> {
        let Node {
            settings,
            identity,
            hub,
            registrar,
            registrar_tx,
            registrar_rx,
            peer_feed,
            catalog_feed,
            peer_reconciler,
            catalog_reconciler,
            graceful_rx,
            ..
        } = self;

        // 1. Self-registration gates everything else: a node that cannot
        //    publish its record must not serve tunnels.
        registrar.register().await?;
        info!(identity = %identity, "node registered, starting reconcilers");

        let registrar_handle = tokio::spawn(registrar.run(registrar_rx));

        // Bridge the process-level graceful signal into the mailbox.
        {
            let mut graceful_rx = graceful_rx.clone();
            let registrar_tx = registrar_tx.clone();
            tokio::spawn(async move {
                let _ = graceful_rx.changed().await;
                if registrar_tx.send(RegistrarEvent::Shutdown).await.is_err() {
                    warn!("registrar mailbox closed before shutdown could be delivered");
                }
            });
        }

        let mut handles = Vec::new();
        handles.push(tokio::spawn(peer_feed.run(graceful_rx.clone())));
        handles.push(tokio::spawn(catalog_feed.run(graceful_rx.clone())));
        handles.push(tokio::spawn(network::start_server(
            hub.clone(),
            settings.node.listen_port,
            settings.network.dial_timeout(),
            graceful_rx.clone(),
        )));
        handles.push(tokio::spawn(
            peer_reconciler.run(settings.reconcile.peer_workers, graceful_rx.clone()),
        ));
        handles.push(tokio::spawn(
            catalog_reconciler.run(settings.reconcile.catalog_workers, graceful_rx.clone()),
        ));

        // 2. The registrar finishing is the gate for process exit: its last
        //    act is deleting this node's own record.
        match registrar_handle.await {
            Ok(Ok(())) => info!(identity = %identity, "registrar drained, node deregistered"),
            Ok(Err(e)) => error!(identity = %identity, error = %e, "registrar shutdown failed"),
            Err(e) => return Err(SystemError::Join(e).into()),
        }

        for handle in handles {
            match handle.await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => warn!(error = %e, "background task ended with error"),
                Err(e) => warn!(error = %e, "background task panicked"),
            }
        }
        info!(identity = %identity, "node stopped");
        Ok(())
    }
}
