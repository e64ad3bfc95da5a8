//! Per-key async mutexes, created on demand and dropped once unused.

use std::{
  collections::HashMap,
  hash::Hash,
  sync::{Arc, Mutex, PoisonError, Weak},
};

use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

/// Serialises work per key while letting different keys run in parallel.
pub struct KeyedLocks<K> {
  slots: Mutex<HashMap<K, Weak<AsyncMutex<()>>>>,
}

impl<K: Eq + Hash + Clone> KeyedLocks<K> {
  pub fn new() -> Self { Self { slots: Mutex::new(HashMap::new()) } }

  /// Wait for exclusive access to `key`. Released when the guard drops.
  pub async fn lock(&self, key: K) -> OwnedMutexGuard<()> {
    let mutex = {
      let mut slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
      match slots.get(&key).and_then(Weak::upgrade) {
        Some(existing) => existing,
        None => {
          slots.retain(|_, slot| slot.strong_count() > 0);
          let fresh = Arc::new(AsyncMutex::new(()));
          slots.insert(key, Arc::downgrade(&fresh));
          fresh
        }
      }
    };
    mutex.lock_owned().await
  }

  /// Number of keys currently held or awaited.
  pub fn active(&self) -> usize {
    self
      .slots
      .lock()
      .unwrap_or_else(PoisonError::into_inner)
      .values()
      .filter(|slot| slot.strong_count() > 0)
      .count()
  }
}

impl<K: Eq + Hash + Clone> Default for KeyedLocks<K> {
  fn default() -> Self { Self::new() }
}
