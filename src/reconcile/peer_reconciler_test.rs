use std::sync::Arc;

use mockall::predicate::eq;
use mockall::Sequence;

use super::PeerReconciler;
use super::PeerSyncHandler;
use super::SyncHandler;
use super::WorkQueue;
use crate::BackoffPolicy;
use crate::FeedHandler;
use crate::MockRegistryStore;
use crate::MockSessionManager;
use crate::PeerRecord;
use crate::RegistryError;
use crate::ResourceKey;
use crate::ResourceStatus;

const SELF_IDENTITY: &str = "10.0.0.1:8123";
const REMOTE_IDENTITY: &str = "10.0.0.2:8123";

fn peer(identity: &str, status: ResourceStatus) -> PeerRecord {
    PeerRecord::new("default", identity, status, "token-1", "info")
}

fn versioned(mut record: PeerRecord, version: u64) -> PeerRecord {
    record.version = version;
    record
}

fn queue() -> Arc<WorkQueue> {
    WorkQueue::new(BackoffPolicy::default())
}

#[tokio::test]
async fn test_on_added_establishes_session_for_available_peer() {
    let mut sessions = MockSessionManager::new();
    sessions.expect_has_session().with(eq(REMOTE_IDENTITY)).return_const(false);
    sessions
        .expect_add_session()
        .withf(|address, identity, token| {
            address == "ws://10.0.0.2:8123/connect" && identity == REMOTE_IDENTITY && token == "token-1"
        })
        .times(1)
        .returning(|_, _, _| Ok(()));

    let queue = queue();
    let reconciler = PeerReconciler::new(Arc::new(sessions), queue.clone(), SELF_IDENTITY);
    reconciler.on_added(peer(REMOTE_IDENTITY, ResourceStatus::Available)).await;

    assert_eq!(queue.len(), 1, "event must also feed the level-triggered branch");
}

#[tokio::test]
async fn test_on_added_ignores_self() {
    let sessions = MockSessionManager::new();
    let queue = queue();
    let reconciler = PeerReconciler::new(Arc::new(sessions), queue.clone(), SELF_IDENTITY);

    reconciler.on_added(peer(SELF_IDENTITY, ResourceStatus::Available)).await;
    assert!(queue.is_empty(), "self events never reach the queue");
}

#[tokio::test]
async fn test_on_added_skips_unavailable_peer() {
    let sessions = MockSessionManager::new();
    let queue = queue();
    let reconciler = PeerReconciler::new(Arc::new(sessions), queue.clone(), SELF_IDENTITY);

    reconciler.on_added(peer(REMOTE_IDENTITY, ResourceStatus::UnAvailable)).await;
    assert_eq!(queue.len(), 1);
}

#[tokio::test]
async fn test_on_added_with_existing_session_skips_add() {
    let mut sessions = MockSessionManager::new();
    sessions.expect_has_session().with(eq(REMOTE_IDENTITY)).return_const(true);
    sessions.expect_add_session().times(0);

    let reconciler = PeerReconciler::new(Arc::new(sessions), queue(), SELF_IDENTITY);
    reconciler.on_added(peer(REMOTE_IDENTITY, ResourceStatus::Available)).await;
}

/// Losing the establish race is benign: AlreadyExists must not bubble up.
#[tokio::test]
async fn test_on_added_tolerates_establish_race() {
    let mut sessions = MockSessionManager::new();
    sessions.expect_has_session().return_const(false);
    sessions
        .expect_add_session()
        .times(1)
        .returning(|_, identity, _| Err(crate::SessionError::AlreadyExists(identity.to_string()).into()));

    let reconciler = PeerReconciler::new(Arc::new(sessions), queue(), SELF_IDENTITY);
    reconciler.on_added(peer(REMOTE_IDENTITY, ResourceStatus::Available)).await;
}

#[tokio::test]
async fn test_on_updated_version_echo_is_noop() {
    let sessions = MockSessionManager::new();
    let queue = queue();
    let reconciler = PeerReconciler::new(Arc::new(sessions), queue.clone(), SELF_IDENTITY);

    let record = versioned(peer(REMOTE_IDENTITY, ResourceStatus::Available), 7);
    reconciler.on_updated(record.clone(), record).await;
    assert!(queue.is_empty());
}

#[tokio::test]
async fn test_on_updated_cross_namespace_is_noop() {
    let sessions = MockSessionManager::new();
    let queue = queue();
    let reconciler = PeerReconciler::new(Arc::new(sessions), queue.clone(), SELF_IDENTITY);

    let mut old = versioned(peer(REMOTE_IDENTITY, ResourceStatus::Available), 1);
    old.namespace = "other".to_string();
    let new = versioned(peer(REMOTE_IDENTITY, ResourceStatus::UnAvailable), 2);
    reconciler.on_updated(old, new).await;
    assert!(queue.is_empty());
}

/// # Case: Available -> UnAvailable -> Available
///
/// ## Validation criteria
/// 1. Exactly one remove_session, then exactly one add_session, in order
#[tokio::test]
async fn test_status_transitions_drive_session_lifecycle_in_order() {
    let mut sessions = MockSessionManager::new();
    let mut seq = Sequence::new();
    sessions
        .expect_remove_session()
        .with(eq(REMOTE_IDENTITY))
        .times(1)
        .in_sequence(&mut seq)
        .returning(|_| Ok(()));
    sessions
        .expect_add_session()
        .times(1)
        .in_sequence(&mut seq)
        .returning(|_, _, _| Ok(()));
    sessions.expect_has_session().return_const(false);

    let reconciler = PeerReconciler::new(Arc::new(sessions), queue(), SELF_IDENTITY);

    let v1 = versioned(peer(REMOTE_IDENTITY, ResourceStatus::Available), 1);
    let v2 = versioned(peer(REMOTE_IDENTITY, ResourceStatus::UnAvailable), 2);
    let v3 = versioned(peer(REMOTE_IDENTITY, ResourceStatus::Available), 3);

    reconciler.on_updated(v1, v2.clone()).await;
    reconciler.on_updated(v2, v3).await;
}

#[tokio::test]
async fn test_on_deleted_removes_session_unconditionally() {
    let mut sessions = MockSessionManager::new();
    sessions
        .expect_remove_session()
        .with(eq(REMOTE_IDENTITY))
        .times(1)
        .returning(|_| Ok(()));

    let reconciler = PeerReconciler::new(Arc::new(sessions), queue(), SELF_IDENTITY);
    reconciler.on_deleted(peer(REMOTE_IDENTITY, ResourceStatus::UnAvailable)).await;
}

//-----------------------------------------------------------
// PeerSyncHandler

#[tokio::test]
async fn test_sync_deleted_record_is_success() {
    let mut store = MockRegistryStore::<PeerRecord>::new();
    store.expect_get().returning(|namespace, name| {
        Err(RegistryError::NotFound {
            namespace: namespace.to_string(),
            name: name.to_string(),
        }
        .into())
    });
    let sessions = MockSessionManager::new();

    let handler = PeerSyncHandler::new(Arc::new(store), Arc::new(sessions), SELF_IDENTITY);
    handler
        .sync(&ResourceKey::new("default", "10.0.0.2-8123"))
        .await
        .expect("deletion is not a failure");
}

#[tokio::test]
async fn test_sync_repairs_missing_session() {
    let mut store = MockRegistryStore::<PeerRecord>::new();
    store
        .expect_get()
        .returning(|_, _| Ok(versioned(peer(REMOTE_IDENTITY, ResourceStatus::Available), 3)));

    let mut sessions = MockSessionManager::new();
    sessions.expect_has_session().with(eq(REMOTE_IDENTITY)).return_const(false);
    sessions.expect_add_session().times(1).returning(|_, _, _| Ok(()));

    let handler = PeerSyncHandler::new(Arc::new(store), Arc::new(sessions), SELF_IDENTITY);
    handler
        .sync(&ResourceKey::new("default", "10.0.0.2-8123"))
        .await
        .expect("should repair");
}

#[tokio::test]
async fn test_sync_drops_session_for_unavailable_peer() {
    let mut store = MockRegistryStore::<PeerRecord>::new();
    store
        .expect_get()
        .returning(|_, _| Ok(versioned(peer(REMOTE_IDENTITY, ResourceStatus::UnAvailable), 3)));

    let mut sessions = MockSessionManager::new();
    sessions.expect_has_session().with(eq(REMOTE_IDENTITY)).return_const(true);
    sessions.expect_remove_session().times(1).returning(|_| Ok(()));

    let handler = PeerSyncHandler::new(Arc::new(store), Arc::new(sessions), SELF_IDENTITY);
    handler
        .sync(&ResourceKey::new("default", "10.0.0.2-8123"))
        .await
        .expect("should drop");
}

#[tokio::test]
async fn test_sync_leaves_self_record_alone() {
    let mut store = MockRegistryStore::<PeerRecord>::new();
    store
        .expect_get()
        .returning(|_, _| Ok(versioned(peer(SELF_IDENTITY, ResourceStatus::Available), 3)));
    let sessions = MockSessionManager::new();

    let handler = PeerSyncHandler::new(Arc::new(store), Arc::new(sessions), SELF_IDENTITY);
    handler
        .sync(&ResourceKey::new("default", "10.0.0.1-8123"))
        .await
        .expect("self is the registrar's concern");
}
