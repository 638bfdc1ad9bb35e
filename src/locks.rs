//! Keyed async mutexes.
//!
//! One lock per logical scope (a requester+asset pair, a pool) so a second
//! request for the same scope waits while unrelated scopes proceed. Locks
//! are created on first use and kept for the process lifetime.

use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};

#[derive(Default)]
pub struct KeyedLock {
    locks: DashMap<String, Arc<Mutex<()>>>,
}

impl KeyedLock {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn acquire(&self, key: &str) -> OwnedMutexGuard<()> {
        // Clone the Arc out before awaiting so the map shard is released
        let lock = self
            .locks
            .entry(key.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();
        lock.lock_owned().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[tokio::test]
    async fn test_same_key_serializes() {
        let locks = Arc::new(KeyedLock::new());
        let counter = Arc::new(AtomicU32::new(0));

        let mut handles = Vec::new();
        for _ in 0..8 {
            let locks = locks.clone();
            let counter = counter.clone();
            handles.push(tokio::spawn(async move {
                let _guard = locks.acquire("alice:TOK").await;
                counter.fetch_add(1, Ordering::SeqCst);
                tokio::task::yield_now().await;
                // No other task may be inside the critical section
                assert_eq!(counter.load(Ordering::SeqCst), 1);
                counter.fetch_sub(1, Ordering::SeqCst);
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }
    }

    #[tokio::test]
    async fn test_different_keys_do_not_block() {
        let locks = KeyedLock::new();
        let _a = locks.acquire("alice:TOK").await;
        // Must not deadlock
        let _b = locks.acquire("bob:TOK").await;
    }
}
