//! Per-key async mutexes.
//!
//! Two deliveries for the same pull request must not interleave their
//! read-modify-write against the store. Deliveries for different pull requests
//! must not wait on each other. [`KeyedLocks`] hands out one async mutex per
//! key and forgets keys nobody holds.

use std::collections::HashMap;
use std::hash::Hash;
use std::sync::{Arc, Mutex, Weak};

use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

/// A table of async mutexes addressed by key.
#[derive(Debug)]
pub struct KeyedLocks<K> {
    table: Mutex<HashMap<K, Weak<AsyncMutex<()>>>>,
}

impl<K> Default for KeyedLocks<K> {
    fn default() -> Self {
        KeyedLocks {
            table: Mutex::new(HashMap::new()),
        }
    }
}

/// Holds the lock for one key until dropped.
#[derive(Debug)]
pub struct KeyGuard {
    _guard: OwnedMutexGuard<()>,
}

impl<K> KeyedLocks<K>
where
    K: Eq + Hash + Clone,
{
    pub fn new() -> Self {
        Self::default()
    }

    /// Waits until no one else holds `key`, then holds it.
    pub async fn lock(&self, key: &K) -> KeyGuard {
        let mutex = self.mutex_for(key);
        KeyGuard {
            _guard: mutex.lock_owned().await,
        }
    }

    fn mutex_for(&self, key: &K) -> Arc<AsyncMutex<()>> {
        // A poisoned table only means another thread panicked while editing
        // the map; the map itself is still usable.
        let mut table = self.table.lock().unwrap_or_else(|e| e.into_inner());

        if let Some(existing) = table.get(key).and_then(Weak::upgrade) {
            return existing;
        }

        table.retain(|_, weak| weak.strong_count() > 0);
        let mutex = Arc::new(AsyncMutex::new(()));
        table.insert(key.clone(), Arc::downgrade(&mutex));
        mutex
    }

    /// Number of keys currently tracked (held or being waited on).
    pub fn tracked_keys(&self) -> usize {
        let table = self.table.lock().unwrap_or_else(|e| e.into_inner());
        table.values().filter(|weak| weak.strong_count() > 0).count()
    }
}
