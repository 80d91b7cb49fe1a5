//! Deduplicating, rate-limited work queue keyed by resource identity.
//!
//! A key is queued at most once: re-adding a queued key is a no-op, and a
//! key re-added while a worker holds it is queued again only after that
//! worker calls [`WorkQueue::done`] — so one key is never processed by two
//! workers simultaneously. Failed keys come back through
//! [`WorkQueue::add_rate_limited`], which delays re-insertion by a per-key
//! exponential backoff. FIFO ordering and rate limiting stay decoupled: the
//! retry counter lives beside the queue, delayed re-insertion goes through
//! a spawned timer.

use std::collections::HashMap;
use std::collections::HashSet;
use std::collections::VecDeque;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::Notify;
use tracing::trace;

use crate::BackoffPolicy;
use crate::ResourceKey;

pub struct WorkQueue {
    state: Mutex<QueueState>,
    notify: Notify,
    backoff: BackoffPolicy,
}

#[derive(Default)]
struct QueueState {
    queue: VecDeque<ResourceKey>,
    dirty: HashSet<ResourceKey>,
    processing: HashSet<ResourceKey>,
    retries: HashMap<ResourceKey, usize>,
    shutting_down: bool,
}

impl WorkQueue {
    pub fn new(backoff: BackoffPolicy) -> Arc<Self> {
        Arc::new(Self {
            state: Mutex::new(QueueState::default()),
            notify: Notify::new(),
            backoff,
        })
    }

    /// Enqueue a key. Duplicate adds collapse into one pending entry.
    pub fn add(&self, key: ResourceKey) {
        {
            let mut state = self.state.lock();
            if state.shutting_down || state.dirty.contains(&key) {
                return;
            }
            state.dirty.insert(key.clone());
            if state.processing.contains(&key) {
                // deferred: done() re-queues it
                return;
            }
            state.queue.push_back(key);
        }
        self.notify.notify_waiters();
    }

    /// Pop the next key, waiting for one if the queue is empty. Returns
    /// `None` once the queue has shut down.
    pub async fn get(&self) -> Option<ResourceKey> {
        loop {
            let notified = self.notify.notified();
            tokio::pin!(notified);
            // register before checking so a concurrent add cannot slip
            // between the empty check and the await
            notified.as_mut().enable();
            {
                let mut state = self.state.lock();
                if let Some(key) = state.queue.pop_front() {
                    state.dirty.remove(&key);
                    state.processing.insert(key.clone());
                    return Some(key);
                }
                if state.shutting_down {
                    return None;
                }
            }
            notified.await;
        }
    }

    /// Mark processing finished. A key re-added mid-flight goes back on the
    /// queue now.
    pub fn done(&self, key: &ResourceKey) {
        let requeued = {
            let mut state = self.state.lock();
            state.processing.remove(key);
            if state.dirty.contains(key) && !state.shutting_down {
                state.queue.push_back(key.clone());
                true
            } else {
                false
            }
        };
        if requeued {
            self.notify.notify_waiters();
        }
    }

    /// Re-enqueue after an exponentially growing per-key delay.
    pub fn add_rate_limited(self: &Arc<Self>, key: ResourceKey) {
        let delay = {
            let mut state = self.state.lock();
            if state.shutting_down {
                return;
            }
            let retries = state.retries.entry(key.clone()).or_insert(0);
            *retries += 1;
            self.backoff.delay_for(*retries)
        };
        trace!(%key, ?delay, "requeue scheduled");
        let queue = Arc::clone(self);
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            queue.add(key);
        });
    }

    /// Reset the retry counter once a key syncs cleanly.
    pub fn forget(&self, key: &ResourceKey) {
        self.state.lock().retries.remove(key);
    }

    pub fn num_requeues(&self, key: &ResourceKey) -> usize {
        self.state.lock().retries.get(key).copied().unwrap_or(0)
    }

    /// Stop handing out keys. In-flight work finishes; pending keys are
    /// dropped.
    pub fn shut_down(&self) {
        self.state.lock().shutting_down = true;
        self.notify.notify_waiters();
    }

    pub fn len(&self) -> usize {
        self.state.lock().queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.state.lock().queue.is_empty()
    }
}
