//! Wires the control-plane components together.
//!
//! Construction is cheap and infallible until [`NodeBuilder::build`], which
//! derives the node's identity (fatal when no routable address exists) and
//! assembles the store, hub, registrar, feeds and queue reconcilers in
//! dependency order. Stores default to the in-memory registry and can be
//! overridden for tests or embedded runs.

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::sync::watch;

use crate::utils::net;
use crate::CatalogManager;
use crate::CatalogReconciler;
use crate::CatalogRecord;
use crate::CatalogSyncHandler;
use crate::ChangeFeed;
use crate::Error;
use crate::MemoryRegistry;
use crate::Node;
use crate::PeerReconciler;
use crate::PeerRecord;
use crate::PeerSyncHandler;
use crate::QueueReconciler;
use crate::RegistryStore;
use crate::Result;
use crate::SelfRegistrar;
use crate::SessionManager;
use crate::Settings;
use crate::TunnelHub;
use crate::WorkQueue;

pub struct NodeBuilder {
    settings: Settings,
    graceful_rx: watch::Receiver<()>,
    peer_store: Option<Arc<dyn RegistryStore<PeerRecord>>>,
    catalog_store: Option<Arc<dyn RegistryStore<CatalogRecord>>>,
}

impl NodeBuilder {
    pub fn new(settings: Settings, graceful_rx: watch::Receiver<()>) -> Self {
        Self {
            settings,
            graceful_rx,
            peer_store: None,
            catalog_store: None,
        }
    }

    /// Override the default in-memory peer registry.
    pub fn peer_store(mut self, store: Arc<dyn RegistryStore<PeerRecord>>) -> Self {
        self.peer_store = Some(store);
        self
    }

    /// Override the default in-memory catalog registry.
    pub fn catalog_store(mut self, store: Arc<dyn RegistryStore<CatalogRecord>>) -> Self {
        self.catalog_store = Some(store);
        self
    }

    pub fn build(self) -> Result<Node> {
        let settings = self.settings;
        settings.validate()?;

        let identity = net::advertise_identity(&settings.node)
            .map_err(|e| Error::Fatal(format!("cannot derive node identity: {}", e)))?;
        let namespace = settings.node.namespace.clone();

        let peer_store = self
            .peer_store
            .unwrap_or_else(|| Arc::new(MemoryRegistry::new(settings.reconcile.feed_buffer)));
        let catalog_store = self
            .catalog_store
            .unwrap_or_else(|| Arc::new(MemoryRegistry::new(settings.reconcile.feed_buffer)));

        // All self-record writes funnel through the registrar mailbox.
        let (registrar_tx, registrar_rx) = mpsc::channel(settings.reconcile.mailbox_capacity.max(1));
        let hub = Arc::new(TunnelHub::new(registrar_tx.clone()));
        let registrar = SelfRegistrar::new(
            peer_store.clone(),
            &namespace,
            identity.clone(),
            settings.retry.registry_write,
        );

        // peer path: feed handlers + level-triggered queue branch
        let peer_queue = WorkQueue::new(settings.retry.peer_queue);
        let mut peer_feed = ChangeFeed::new(peer_store.clone(), &namespace);
        peer_feed.subscribe(Arc::new(PeerReconciler::new(
            hub.clone() as Arc<dyn SessionManager>,
            peer_queue.clone(),
            identity.clone(),
        )));
        let peer_reconciler = QueueReconciler::new(
            "peers",
            peer_queue,
            Arc::new(PeerSyncHandler::new(
                peer_store.clone(),
                hub.clone() as Arc<dyn SessionManager>,
                identity.clone(),
            )),
            peer_feed.sync_barrier(),
        );

        // catalog path: same shape, pluggable diff policy
        let catalog_queue = WorkQueue::new(settings.retry.catalog_queue);
        let mut catalog_feed = ChangeFeed::new(catalog_store.clone(), &namespace);
        catalog_feed.subscribe(Arc::new(CatalogReconciler::new(catalog_queue.clone())));
        let catalog_reconciler = QueueReconciler::new(
            "catalogs",
            catalog_queue,
            Arc::new(CatalogSyncHandler::new(catalog_store.clone())),
            catalog_feed.sync_barrier(),
        );

        let catalogs = CatalogManager::new(catalog_store, settings.retry.registry_write);

        Ok(Node {
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
            catalogs,
            graceful_rx: self.graceful_rx,
        })
    }
}
