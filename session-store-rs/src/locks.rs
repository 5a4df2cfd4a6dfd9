// session-store-rs/src/locks.rs
// Per-key async mutual exclusion.

use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::{Mutex, OwnedMutexGuard};

/// A map of lazily created async mutexes, one per key.
///
/// Used to serialize work on the same session or user while letting
/// unrelated keys proceed concurrently. An entry is evicted when its last
/// guard is released with no other task waiting on it.
#[derive(Debug, Default)]
pub struct KeyedLocks {
    locks: DashMap<String, Arc<Mutex<()>>>,
}

/// Holds the lock for one key; releasing it may evict the entry.
#[must_use = "the key is unlocked as soon as the guard is dropped"]
pub struct KeyedGuard<'a> {
    owner: &'a KeyedLocks,
    key: String,
    guard: Option<OwnedMutexGuard<()>>,
}

impl Drop for KeyedGuard<'_> {
    fn drop(&mut self) {
        drop(self.guard.take());
        // only the map's own handle left: nobody holds or awaits this key
        self.owner
            .locks
            .remove_if(&self.key, |_, mutex| Arc::strong_count(mutex) == 1);
    }
}

impl KeyedLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for and hold the lock for `key`
    pub async fn lock(&self, key: &str) -> KeyedGuard<'_> {
        let mutex = self
            .locks
            .entry(key.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();
        // the dashmap shard guard is released before awaiting
        let guard = mutex.lock_owned().await;

        KeyedGuard {
            owner: self,
            key: key.to_string(),
            guard: Some(guard),
        }
    }

    pub fn len(&self) -> usize {
        self.locks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.locks.is_empty()
    }
}
