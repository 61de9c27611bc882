//! Per-key async serialization.

use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};

/// Hands out one async mutex per string key so callers can serialize work
/// scoped to that key (all reconciliations for one normalized website) while
/// unrelated keys proceed in parallel.
///
/// Entries are created lazily under a registry mutex and live for the
/// lifetime of the registry; the key space is the set of websites one
/// process run touches, which stays small.
#[derive(Default)]
pub struct KeyedLock {
    locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl KeyedLock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Acquire the lock for `key`, waiting if another holder has it. The
    /// guard is owned, so it can cross `.await` points and task boundaries.
    pub async fn acquire(&self, key: &str) -> OwnedMutexGuard<()> {
        let entry = {
            let mut locks = self.locks.lock().await;
            locks
                .entry(key.to_string())
                .or_insert_with(|| Arc::new(Mutex::new(())))
                .clone()
        };
        entry.lock_owned().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_same_key_serializes() {
        let locks = Arc::new(KeyedLock::new());
        let guard = locks.acquire("example.com").await;

        let locks2 = locks.clone();
        let contender = tokio::spawn(async move {
            let _guard = locks2.acquire("example.com").await;
        });

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!contender.is_finished());

        drop(guard);
        tokio::time::timeout(Duration::from_secs(1), contender)
            .await
            .expect("contender should finish once the guard drops")
            .unwrap();
    }

    #[tokio::test]
    async fn test_distinct_keys_proceed_independently() {
        let locks = KeyedLock::new();
        let _guard = locks.acquire("a.com").await;

        let other = tokio::time::timeout(Duration::from_millis(100), locks.acquire("b.com")).await;
        assert!(other.is_ok());
    }
}
