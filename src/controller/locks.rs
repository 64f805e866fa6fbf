//! Per-key async mutual exclusion.

use crate::types::ViewKey;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

type LockMap = Mutex<HashMap<ViewKey, Arc<AsyncMutex<()>>>>;

/// One async mutex per view key, created on demand and forgotten once the
/// last guard for it is dropped.
///
/// Operations on the same key queue behind each other; different keys never
/// contend beyond the short map lookup.
#[derive(Default)]
pub(crate) struct KeyLocks {
    locks: Arc<LockMap>,
}

/// Holds one key's lock. Dropping it releases the lock and prunes the map
/// entry when no other task holds or awaits it.
pub(crate) struct KeyGuard {
    key: ViewKey,
    guard: Option<OwnedMutexGuard<()>>,
    locks: Arc<LockMap>,
}

impl Drop for KeyGuard {
    fn drop(&mut self) {
        drop(self.guard.take());
        let mut locks = self.locks.lock();
        if locks
            .get(&self.key)
            .is_some_and(|lock| Arc::strong_count(lock) == 1)
        {
            locks.remove(&self.key);
        }
    }
}

impl KeyLocks {
    pub(crate) async fn acquire(&self, key: &ViewKey) -> KeyGuard {
        let lock = {
            let mut locks = self.locks.lock();
            Arc::clone(locks.entry(key.clone()).or_default())
        };
        KeyGuard {
            key: key.clone(),
            guard: Some(lock.lock_owned().await),
            locks: Arc::clone(&self.locks),
        }
    }

    /// Lock several keys. Keys are taken in sorted order so two callers with
    /// overlapping sets cannot deadlock.
    pub(crate) async fn acquire_all(&self, keys: &[ViewKey]) -> Vec<KeyGuard> {
        let mut sorted = keys.to_vec();
        sorted.sort();
        sorted.dedup();
        let mut guards = Vec::with_capacity(sorted.len());
        for key in &sorted {
            guards.push(self.acquire(key).await);
        }
        guards
    }

    /// Number of keys with a live lock entry.
    pub(crate) fn len(&self) -> usize {
        self.locks.lock().len()
    }
}
