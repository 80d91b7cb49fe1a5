use super::MemoryRegistry;
use crate::FeedEvent;
use crate::PeerRecord;
use crate::RegistryStore;
use crate::ResourceStatus;

fn peer(namespace: &str, identity: &str) -> PeerRecord {
    PeerRecord::new(namespace, identity, ResourceStatus::Available, "tok", "info")
}

#[tokio::test]
async fn test_create_then_get_round_trip() {
    let store = MemoryRegistry::new(16);
    let created = store.create(peer("default", "10.0.0.1:8123")).await.expect("should create");
    assert!(created.version > 0);

    let fetched = store.get("default", "10.0.0.1-8123").await.expect("should exist");
    assert_eq!(fetched, created);
}

#[tokio::test]
async fn test_get_missing_is_not_found() {
    let store: MemoryRegistry<PeerRecord> = MemoryRegistry::new(16);
    let err = store.get("default", "nope").await.expect_err("should be missing");
    assert!(err.is_not_found());
}

#[tokio::test]
async fn test_duplicate_create_is_already_exists() {
    let store = MemoryRegistry::new(16);
    store.create(peer("default", "10.0.0.1:8123")).await.expect("should create");
    let err = store
        .create(peer("default", "10.0.0.1:8123"))
        .await
        .expect_err("duplicate should fail");
    assert!(err.is_already_exists());
}

#[tokio::test]
async fn test_update_with_stale_version_conflicts() {
    let store = MemoryRegistry::new(16);
    let created = store.create(peer("default", "10.0.0.1:8123")).await.expect("should create");

    // first writer advances the version
    let mut fresh = created.clone();
    fresh.status = ResourceStatus::UnAvailable;
    store.update(fresh).await.expect("fresh version should win");

    // second writer still carries the old token
    let mut stale = created;
    stale.info = "stale writer".to_string();
    let err = store.update(stale).await.expect_err("stale version should lose");
    assert!(err.is_conflict());
}

#[tokio::test]
async fn test_update_missing_is_not_found() {
    let store = MemoryRegistry::new(16);
    let err = store
        .update(peer("default", "10.0.0.1:8123"))
        .await
        .expect_err("should be missing");
    assert!(err.is_not_found());
}

#[tokio::test]
async fn test_delete_is_not_found_when_absent() {
    let store: MemoryRegistry<PeerRecord> = MemoryRegistry::new(16);
    let err = store.delete("default", "nope").await.expect_err("should be missing");
    assert!(err.is_not_found());
}

#[tokio::test]
async fn test_list_scopes_to_namespace_and_sorts() {
    let store = MemoryRegistry::new(16);
    store.create(peer("default", "10.0.0.2:8123")).await.expect("should create");
    store.create(peer("default", "10.0.0.1:8123")).await.expect("should create");
    store.create(peer("other", "10.0.0.3:8123")).await.expect("should create");

    let records = store.list("default").await.expect("should list");
    assert_eq!(records.len(), 2);
    assert_eq!(records[0].name, "10.0.0.1-8123");
    assert_eq!(records[1].name, "10.0.0.2-8123");
}

#[tokio::test]
async fn test_subscribe_observes_lifecycle_events() {
    let store = MemoryRegistry::new(16);
    let mut events = store.subscribe();

    let created = store.create(peer("default", "10.0.0.1:8123")).await.expect("should create");
    let mut next = created.clone();
    next.status = ResourceStatus::UnAvailable;
    let updated = store.update(next).await.expect("should update");
    store.delete("default", "10.0.0.1-8123").await.expect("should delete");

    match events.try_recv().expect("added event") {
        FeedEvent::Added(record) => assert_eq!(record, created),
        other => panic!("expected Added, got {:?}", other),
    }
    match events.try_recv().expect("updated event") {
        FeedEvent::Updated { old, new } => {
            assert_eq!(old, created);
            assert_eq!(new, updated);
            assert!(new.version > old.version);
        }
        other => panic!("expected Updated, got {:?}", other),
    }
    match events.try_recv().expect("deleted event") {
        FeedEvent::Deleted(record) => assert_eq!(record.name, "10.0.0.1-8123"),
        other => panic!("expected Deleted, got {:?}", other),
    }
}
