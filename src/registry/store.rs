//! Registry store contract.
//!
//! The real registry is an external system; everything in this crate talks to
//! it through this trait. `NotFound`, `AlreadyExists` and `Conflict` are
//! control-flow results, so reconcilers branch on them instead of failing.

use async_trait::async_trait;
#[cfg(test)]
use mockall::automock;
use tokio::sync::broadcast;

use crate::FeedEvent;
use crate::Resource;
use crate::Result;

#[cfg_attr(test, automock)]
#[async_trait]
pub trait RegistryStore<R: Resource>: Send + Sync + 'static {
    /// Fetch one record with its current version token.
    async fn get(&self, namespace: &str, name: &str) -> Result<R>;

    /// Insert a new record. Returns the stored record carrying its fresh
    /// version token, or `AlreadyExists`.
    async fn create(&self, record: R) -> Result<R>;

    /// Optimistic write: the record's version token must match the stored
    /// one, otherwise `Conflict`.
    async fn update(&self, record: R) -> Result<R>;

    async fn delete(&self, namespace: &str, name: &str) -> Result<()>;

    /// Snapshot of every record in `namespace`, ordered by name.
    async fn list(&self, namespace: &str) -> Result<Vec<R>>;

    /// Live change notifications for every record in the store; the feed
    /// scopes them to its namespace.
    fn subscribe(&self) -> broadcast::Receiver<FeedEvent<R>>;
}
