//! Keyed async locks.
//!
//! One `tokio::sync::Mutex` per key, created on first use and dropped again once no
//! guard or waiter refers to it. [`KeyedLocks::lock_all`] sorts and deduplicates the
//! requested keys before acquiring, so every caller takes locks in the same global
//! order and two callers that need overlapping key sets cannot deadlock.

use std::collections::HashMap;
use std::hash::Hash;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use thiserror::Error;
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
#[error("timed out after {0:?} waiting for a lock")]
pub struct LockTimeout(pub Duration);

type Slots<K> = Arc<Mutex<HashMap<K, Arc<AsyncMutex<()>>>>>;

pub struct KeyedLocks<K> {
    slots: Slots<K>,
    timeout: Duration,
}

impl<K> KeyedLocks<K>
where
    K: Ord + Hash + Clone + Send + 'static,
{
    pub fn new(timeout: Duration) -> Self {
        Self {
            slots: Arc::new(Mutex::new(HashMap::new())),
            timeout,
        }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Acquire every key, in ascending order, within the configured timeout.
    ///
    /// Guards are released (and idle slots pruned) when the returned value is dropped.
    pub async fn lock_all(
        &self,
        keys: impl IntoIterator<Item = K>,
    ) -> Result<KeyedGuard<K>, LockTimeout> {
        let mut keys: Vec<K> = keys.into_iter().collect();
        keys.sort();
        keys.dedup();

        let mutexes: Vec<Arc<AsyncMutex<()>>> = {
            let mut slots = self.slots.lock().unwrap_or_else(|e| e.into_inner());
            keys.iter()
                .map(|k| slots.entry(k.clone()).or_default().clone())
                .collect()
        };

        let acquire = async move {
            let mut guards = Vec::with_capacity(mutexes.len());
            for m in mutexes {
                guards.push(m.lock_owned().await);
            }
            guards
        };

        match tokio::time::timeout(self.timeout, acquire).await {
            Ok(guards) => Ok(KeyedGuard {
                guards,
                keys,
                slots: self.slots.clone(),
            }),
            Err(_) => {
                prune(&self.slots, &keys);
                Err(LockTimeout(self.timeout))
            }
        }
    }

    pub async fn lock(&self, key: K) -> Result<KeyedGuard<K>, LockTimeout> {
        self.lock_all([key]).await
    }

    /// Number of live lock slots.
    pub fn len(&self) -> usize {
        self.slots.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Held locks for a set of keys.
pub struct KeyedGuard<K: Eq + Hash> {
    guards: Vec<OwnedMutexGuard<()>>,
    keys: Vec<K>,
    slots: Slots<K>,
}

impl<K: Eq + Hash> KeyedGuard<K> {
    pub fn keys(&self) -> &[K] {
        &self.keys
    }
}

impl<K: Eq + Hash> Drop for KeyedGuard<K> {
    fn drop(&mut self) {
        self.guards.clear();
        prune(&self.slots, &self.keys);
    }
}

// A slot referenced only by the map has no holder and no waiter.
fn prune<K: Eq + Hash>(slots: &Slots<K>, keys: &[K]) {
    let mut slots = slots.lock().unwrap_or_else(|e| e.into_inner());
    for k in keys {
        if slots.get(k).is_some_and(|m| Arc::strong_count(m) == 1) {
            slots.remove(k);
        }
    }
}
