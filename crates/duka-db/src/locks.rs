//! Per-document async locks.
//!
//! Read-modify-write sequences on one document (stock decrement, balance
//! adjustment) hold the document's lock so concurrent writers on the same
//! node serialize instead of losing updates.

use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};

/// Above this many entries, idle locks are dropped on the next `lock`.
const PRUNE_THRESHOLD: usize = 1024;

#[derive(Debug, Clone, Default)]
pub struct KeyedLocks {
    inner: Arc<DashMap<String, Arc<Mutex<()>>>>,
}

impl KeyedLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Waits for the lock on `key`. Released when the guard drops.
    pub async fn lock(&self, key: &str) -> OwnedMutexGuard<()> {
        if self.inner.len() > PRUNE_THRESHOLD {
            self.prune();
        }

        let mutex = self.inner.entry(key.to_string()).or_default().clone();
        mutex.lock_owned().await
    }

    /// Removes locks nobody holds or waits on.
    pub fn prune(&self) {
        self.inner.retain(|_, mutex| Arc::strong_count(mutex) > 1);
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
}
