//! Per-monitor serialization inside one worker process

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

/// Keyed async mutex. Units for the same monitor wait for each other while
/// units for other monitors run freely. Idle keys are pruned on the next lock.
#[derive(Default)]
pub struct MonitorLocks {
    locks: Mutex<HashMap<String, Arc<AsyncMutex<()>>>>,
}

impl MonitorLocks {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn lock(&self, monitor_name: &str) -> OwnedMutexGuard<()> {
        let lock = {
            let mut locks = self.locks.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
            // only the map holds an idle lock
            locks.retain(|_, lock| Arc::strong_count(lock) > 1);
            locks.entry(monitor_name.to_string()).or_default().clone()
        };
        lock.lock_owned().await
    }

    pub fn len(&self) -> usize {
        self.locks.lock().unwrap_or_else(|poisoned| poisoned.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
