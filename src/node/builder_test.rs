use std::sync::Arc;

use tokio::sync::watch;

use super::NodeBuilder;
use crate::MemoryRegistry;
use crate::Settings;

fn settings(port: u16) -> Settings {
    let mut settings = Settings::default();
    settings.node.advertise_ip = "127.0.0.1".to_string();
    settings.node.listen_port = port;
    settings
}

#[tokio::test]
async fn test_build_derives_identity_from_config() {
    let (_graceful_tx, graceful_rx) = watch::channel(());
    let node = NodeBuilder::new(settings(8123), graceful_rx)
        .peer_store(Arc::new(MemoryRegistry::new(16)))
        .catalog_store(Arc::new(MemoryRegistry::new(16)))
        .build()
        .expect("should build");

    assert_eq!(node.identity(), "127.0.0.1:8123");
    assert!(node.sessions().is_empty());
}

#[tokio::test]
async fn test_build_rejects_invalid_settings() {
    let (_graceful_tx, graceful_rx) = watch::channel(());
    let mut bad = settings(8123);
    bad.node.namespace = String::new();
    assert!(NodeBuilder::new(bad, graceful_rx).build().is_err());
}
