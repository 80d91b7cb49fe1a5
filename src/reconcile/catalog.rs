//! Catalog desired-state path: merge-patch writes plus the queue-driven
//! sync branch.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::time::sleep;
use tracing::debug;
use tracing::info;

use crate::BackoffPolicy;
use crate::CatalogRecord;
use crate::CatalogSpec;
use crate::FeedHandler;
use crate::RegistryError;
use crate::RegistryStore;
use crate::Resource;
use crate::ResourceKey;
use crate::ResourceStatus;
use crate::Result;
use crate::SyncHandler;
use crate::WorkQueue;

/// Mutation API over catalog records.
///
/// Partial updates are merge-patch: a field supplied as empty keeps the
/// stored value, so callers cannot clear a field to empty through this path.
#[derive(Clone)]
pub struct CatalogManager {
    store: Arc<dyn RegistryStore<CatalogRecord>>,
    write_backoff: BackoffPolicy,
}

impl CatalogManager {
    pub fn new(store: Arc<dyn RegistryStore<CatalogRecord>>, write_backoff: BackoffPolicy) -> Self {
        Self { store, write_backoff }
    }

    fn resolve_field(prev: &str, requested: &str) -> String {
        if requested.is_empty() {
            prev.to_string()
        } else {
            requested.to_string()
        }
    }

    /// Merge a partial request over the stored record, field by field.
    fn merge(current: &CatalogRecord, status: Option<ResourceStatus>, requested: &CatalogSpec) -> CatalogRecord {
        CatalogRecord {
            namespace: current.namespace.clone(),
            name: current.name.clone(),
            spec: CatalogSpec {
                name: Self::resolve_field(&current.spec.name, &requested.name),
                url: Self::resolve_field(&current.spec.url, &requested.url),
                username: Self::resolve_field(&current.spec.username, &requested.username),
                password: Self::resolve_field(&current.spec.password, &requested.password),
                description: Self::resolve_field(&current.spec.description, &requested.description),
            },
            status: status.unwrap_or(current.status),
            version: current.version,
        }
    }

    /// Create-or-merge one catalog record. On create the supplied fields
    /// land as-is (unsupplied ones stay empty); on update every field
    /// resolves independently against the stored record. Version conflicts
    /// re-fetch and retry.
    pub async fn update_catalog(
        &self,
        namespace: &str,
        name: &str,
        status: Option<ResourceStatus>,
        spec: CatalogSpec,
    ) -> Result<CatalogRecord> {
        let max_retries = self.write_backoff.max_retries.max(1);
        for attempt in 0..max_retries {
            match self.store.get(namespace, name).await {
                Err(e) if e.is_not_found() => {
                    let record = CatalogRecord::new(
                        namespace,
                        name,
                        spec.clone(),
                        status.unwrap_or(ResourceStatus::UnAvailable),
                    );
                    match self.store.create(record).await {
                        Ok(created) => {
                            info!(catalog = %created.key(), status = %created.status, "created catalog record");
                            return Ok(created);
                        }
                        Err(e) if e.is_already_exists() => {
                            debug!(catalog = %ResourceKey::new(namespace, name), attempt, "lost create race, retrying as merge");
                        }
                        Err(e) => return Err(e),
                    }
                }
                Ok(current) => {
                    let next = Self::merge(&current, status, &spec);
                    match self.store.update(next).await {
                        Ok(updated) => {
                            info!(catalog = %updated.key(), status = %updated.status, "updated catalog record");
                            return Ok(updated);
                        }
                        Err(e) if e.is_conflict() => {
                            debug!(catalog = %current.key(), attempt, "version conflict, refetching");
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
            namespace: namespace.to_string(),
            name: name.to_string(),
            retries: max_retries,
        }
        .into())
    }

    /// Delete one catalog record; NotFound means already clean.
    pub async fn delete_catalog(&self, namespace: &str, name: &str) -> Result<()> {
        match self.store.get(namespace, name).await {
            Err(e) if e.is_not_found() => {
                info!(catalog = %ResourceKey::new(namespace, name), "already deleted");
                Ok(())
            }
            Ok(_) => match self.store.delete(namespace, name).await {
                Ok(()) => {
                    info!(catalog = %ResourceKey::new(namespace, name), "deleted catalog record");
                    Ok(())
                }
                Err(e) if e.is_not_found() => Ok(()),
                Err(e) => Err(e),
            },
            Err(e) => Err(e),
        }
    }
}

/// Change-feed side of the catalog path: logs status transitions and feeds
/// the level-triggered queue.
pub struct CatalogReconciler {
    queue: Arc<WorkQueue>,
}

impl CatalogReconciler {
    pub fn new(queue: Arc<WorkQueue>) -> Self {
        Self { queue }
    }
}

#[async_trait]
impl FeedHandler<CatalogRecord> for CatalogReconciler {
    async fn on_added(&self, record: CatalogRecord) {
        if record.status == ResourceStatus::Available {
            info!(catalog = %record.key(), url = %record.spec.url, "catalog added");
        }
        self.queue.add(record.key());
    }

    async fn on_updated(&self, old: CatalogRecord, new: CatalogRecord) {
        if old.version == new.version {
            // feed echo, nothing actually changed
            return;
        }
        if old.namespace != new.namespace {
            return;
        }
        match (old.status, new.status) {
            (ResourceStatus::UnAvailable, ResourceStatus::Available) => {
                info!(catalog = %new.key(), "status UnAvailable -> Available");
            }
            (ResourceStatus::Available, ResourceStatus::UnAvailable) => {
                info!(catalog = %new.key(), "status Available -> UnAvailable");
            }
            _ => {}
        }
        self.queue.add(new.key());
    }

    async fn on_deleted(&self, record: CatalogRecord) {
        info!(catalog = %record.key(), "catalog deleted");
        self.queue.add(record.key());
    }
}

/// Diff policy for the catalog queue: re-reads the record and reports the
/// desired state. The concrete apply against the backing repository plugs in
/// behind this handler.
pub struct CatalogSyncHandler {
    store: Arc<dyn RegistryStore<CatalogRecord>>,
}

impl CatalogSyncHandler {
    pub fn new(store: Arc<dyn RegistryStore<CatalogRecord>>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl SyncHandler for CatalogSyncHandler {
    async fn sync(&self, key: &ResourceKey) -> Result<()> {
        match self.store.get(&key.namespace, &key.name).await {
            Ok(record) => {
                info!(catalog = %key, status = %record.status, url = %record.spec.url, "desired catalog state");
                Ok(())
            }
            Err(e) if e.is_not_found() => {
                info!(catalog = %key, "catalog gone, deletion side effect complete");
                Ok(())
            }
            Err(e) => Err(e),
        }
    }
}
