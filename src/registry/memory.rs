//! In-memory registry used by tests and standalone single-process runs.
//!
//! Mirrors the external registry's contract: records keyed by
//! namespace+name, a monotonically advancing version counter shared by all
//! records, and a broadcast channel feeding change subscribers. Receivers
//! that fall behind see a lag error instead of blocking writers.

use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering;

use async_trait::async_trait;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use tokio::sync::broadcast;
use tracing::trace;

use crate::FeedEvent;
use crate::RegistryError;
use crate::RegistryStore;
use crate::Resource;
use crate::ResourceKey;
use crate::Result;

pub struct MemoryRegistry<R: Resource> {
    records: DashMap<ResourceKey, R>,
    version_counter: AtomicU64,
    events: broadcast::Sender<FeedEvent<R>>,
}

impl<R: Resource> MemoryRegistry<R> {
    pub fn new(event_buffer: usize) -> Self {
        let (events, _) = broadcast::channel(event_buffer.max(1));
        Self {
            records: DashMap::new(),
            version_counter: AtomicU64::new(0),
            events,
        }
    }

    fn next_version(&self) -> u64 {
        self.version_counter.fetch_add(1, Ordering::SeqCst) + 1
    }

    fn publish(&self, event: FeedEvent<R>) {
        // send only fails when no subscriber exists, which is fine
        let _ = self.events.send(event);
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

#[async_trait]
impl<R: Resource> RegistryStore<R> for MemoryRegistry<R> {
    async fn get(&self, namespace: &str, name: &str) -> Result<R> {
        let key = ResourceKey::new(namespace, name);
        self.records
            .get(&key)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| {
                RegistryError::NotFound {
                    namespace: namespace.to_string(),
                    name: name.to_string(),
                }
                .into()
            })
    }

    async fn create(&self, mut record: R) -> Result<R> {
        let key = record.key();
        match self.records.entry(key) {
            Entry::Occupied(_) => Err(RegistryError::AlreadyExists {
                namespace: record.namespace().to_string(),
                name: record.name().to_string(),
            }
            .into()),
            Entry::Vacant(slot) => {
                record.set_version(self.next_version());
                slot.insert(record.clone());
                trace!(kind = R::KIND, key = %record.key(), version = record.version(), "record created");
                self.publish(FeedEvent::Added(record.clone()));
                Ok(record)
            }
        }
    }

    async fn update(&self, mut record: R) -> Result<R> {
        let key = record.key();
        match self.records.entry(key) {
            Entry::Occupied(mut slot) => {
                let stored = slot.get();
                if stored.version() != record.version() {
                    return Err(RegistryError::Conflict {
                        namespace: record.namespace().to_string(),
                        name: record.name().to_string(),
                        expected: record.version(),
                        stored: stored.version(),
                    }
                    .into());
                }
                let old = stored.clone();
                record.set_version(self.next_version());
                slot.insert(record.clone());
                trace!(kind = R::KIND, key = %record.key(), version = record.version(), "record updated");
                self.publish(FeedEvent::Updated {
                    old,
                    new: record.clone(),
                });
                Ok(record)
            }
            Entry::Vacant(_) => Err(RegistryError::NotFound {
                namespace: record.namespace().to_string(),
                name: record.name().to_string(),
            }
            .into()),
        }
    }

    async fn delete(&self, namespace: &str, name: &str) -> Result<()> {
        let key = ResourceKey::new(namespace, name);
        match self.records.remove(&key) {
            Some((_, record)) => {
                trace!(kind = R::KIND, key = %key, "record deleted");
                self.publish(FeedEvent::Deleted(record));
                Ok(())
            }
            None => Err(RegistryError::NotFound {
                namespace: namespace.to_string(),
                name: name.to_string(),
            }
            .into()),
        }
    }

    async fn list(&self, namespace: &str) -> Result<Vec<R>> {
        let mut records: Vec<R> = self
            .records
            .iter()
            .filter(|entry| entry.key().namespace == namespace)
            .map(|entry| entry.value().clone())
            .collect();
        records.sort_by(|a, b| a.name().cmp(b.name()));
        Ok(records)
    }

    fn subscribe(&self) -> broadcast::Receiver<FeedEvent<R>> {
        self.events.subscribe()
    }
}
