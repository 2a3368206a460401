use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::{Mutex, OwnedMutexGuard};

/// Per-identifier async mutexes. Work on one ticket never waits on another.
#[derive(Default)]
pub struct KeyedLocks {
    entries: DashMap<String, Arc<Mutex<()>>>,
}

impl KeyedLocks {
    pub fn new() -> Self {
        Self {
            entries: DashMap::new(),
        }
    }

    /// Wait for exclusive access to `key`. Released when the guard drops.
    pub async fn acquire(&self, key: &str) -> OwnedMutexGuard<()> {
        let lock = self.entries.entry(key.to_string()).or_default().clone();
        lock.lock_owned().await
    }

    /// Drop entries nobody holds or waits on.
    pub fn release_idle(&self) {
        self.entries.retain(|_, lock| Arc::strong_count(lock) > 1);
    }
}
