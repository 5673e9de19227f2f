//! Keyed async locks for ledger mutations.

use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::{Mutex, OwnedMutexGuard};

/// Hands out one async mutex per id.
///
/// Ids are always locked in sorted order, so two operations touching
/// overlapping sets can never deadlock.
#[derive(Default)]
pub struct LockRegistry {
    locks: DashMap<String, Arc<Mutex<()>>>,
}

/// Guards held for the duration of one mutation.
pub struct LockSet {
    keys: Vec<String>,
    _guards: Vec<OwnedMutexGuard<()>>,
}

impl LockSet {
    pub fn keys(&self) -> &[String] {
        &self.keys
    }
}

impl LockRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn acquire<I, S>(&self, ids: I) -> LockSet
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut keys: Vec<String> = ids.into_iter().map(Into::into).collect();
        keys.sort();
        keys.dedup();

        let mut guards = Vec::with_capacity(keys.len());
        for key in &keys {
            let lock = Arc::clone(self.locks.entry(key.clone()).or_default().value());
            guards.push(lock.lock_owned().await);
        }
        LockSet {
            keys,
            _guards: guards,
        }
    }

    /// Drops the mutex for an id nobody is holding or waiting on.
    pub fn forget(&self, id: &str) {
        self.locks.remove_if(id, |_, lock| Arc::strong_count(lock) == 1);
    }

    pub fn len(&self) -> usize {
        self.locks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.locks.is_empty()
    }
}
