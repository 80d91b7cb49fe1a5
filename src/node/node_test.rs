use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;

use super::NodeBuilder;
use crate::MemoryRegistry;
use crate::PeerRecord;
use crate::RegistryStore;
use crate::ResourceStatus;
use crate::session::SessionManager;
use crate::Settings;

// each test binds its own front-end port
const MOCK_NODE_PORT_BASE: u16 = 18920;

fn settings(port: u16) -> Settings {
    let mut settings = Settings::default();
    settings.node.advertise_ip = "127.0.0.1".to_string();
    settings.node.listen_port = port;
    settings.retry.registry_write.base_delay_ms = 1;
    settings
}

async fn wait_until<F>(mut condition: F) -> bool
where
    F: FnMut() -> bool,
{
    for _ in 0..200 {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    false
}

async fn wait_for_record(store: &MemoryRegistry<PeerRecord>, namespace: &str, name: &str) -> bool {
    for _ in 0..200 {
        if store.get(namespace, name).await.is_ok() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    false
}

/// # Case 1: full lifecycle round trip
///
/// ## Setup
/// 1. Node built against in-memory stores
///
/// ## Validation criteria
/// 1. Own record appears as Available once running
/// 2. After the graceful signal, run() returns and the record is gone
#[tokio::test]
async fn test_node_lifecycle_round_trip() {
    let port = MOCK_NODE_PORT_BASE;
    let store = Arc::new(MemoryRegistry::<PeerRecord>::new(64));
    let (graceful_tx, graceful_rx) = watch::channel(());

    let node = NodeBuilder::new(settings(port), graceful_rx)
        .peer_store(store.clone())
        .build()
        .expect("should build");
    let own_name = format!("127.0.0.1-{}", port);
    let run = tokio::spawn(node.run());

    assert!(
        wait_for_record(&store, "default", &own_name).await,
        "own record should be registered"
    );
    let record = store.get("default", &own_name).await.expect("should exist");
    assert_eq!(record.status, ResourceStatus::Available);
    assert_eq!(record.identity, format!("127.0.0.1:{}", port));

    graceful_tx.send(()).expect("should signal");
    run.await.expect("join").expect("clean run");

    assert!(
        store.get("default", &own_name).await.expect_err("gone").is_not_found(),
        "graceful shutdown must deregister"
    );
}

/// # Case 2: a remote Available peer appearing in the registry gets a session
///
/// ## Validation criteria
/// 1. Creating the record establishes a session keyed by its identity
/// 2. Deleting the record tears the session down
#[tokio::test]
async fn test_remote_peer_drives_session_lifecycle() {
    let port = MOCK_NODE_PORT_BASE + 1;
    let store = Arc::new(MemoryRegistry::<PeerRecord>::new(64));
    let (graceful_tx, graceful_rx) = watch::channel(());

    let node = NodeBuilder::new(settings(port), graceful_rx)
        .peer_store(store.clone())
        .build()
        .expect("should build");
    let hub = node.sessions();
    let run = tokio::spawn(node.run());

    let own_name = format!("127.0.0.1-{}", port);
    assert!(
        wait_for_record(&store, "default", &own_name).await,
        "node should finish registering first"
    );

    store
        .create(PeerRecord::new(
            "default",
            "10.9.9.9:8123",
            ResourceStatus::Available,
            "remote-token",
            "",
        ))
        .await
        .expect("should create");

    let hub_probe = hub.clone();
    assert!(
        wait_until(move || hub_probe.has_session("10.9.9.9:8123")).await,
        "session should be established for the new peer"
    );

    store.delete("default", "10.9.9.9-8123").await.expect("should delete");
    let hub_probe = hub.clone();
    assert!(
        wait_until(move || !hub_probe.has_session("10.9.9.9:8123")).await,
        "session should be torn down with the record"
    );

    graceful_tx.send(()).expect("should signal");
    run.await.expect("join").expect("clean run");
}
