//! Per-owner async mutexes
//!
//! Every chain mutation holds its owner's lock from load to save, so two
//! uploads by one owner never both read the same latest record.
//!
//! Entries nobody holds or waits on are pruned whenever a lock is taken.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

#[derive(Default)]
pub(crate) struct OwnerLocks {
    inner: Mutex<HashMap<String, Arc<AsyncMutex<()>>>>,
}

impl OwnerLocks {
    fn handle(&self, owner_id: &str) -> Arc<AsyncMutex<()>> {
        let mut map = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        // a count of 1 means only the map refers to it: no guard, no waiter
        map.retain(|id, lock| id == owner_id || Arc::strong_count(lock) > 1);
        map.entry(owner_id.to_string()).or_default().clone()
    }

    #[cfg(test)]
    fn tracked(&self) -> usize {
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub(crate) async fn lock(&self, owner_id: &str) -> OwnedMutexGuard<()> {
        self.handle(owner_id).lock_owned().await
    }

    /// Lock two distinct owners in lexical order.
    pub(crate) async fn lock_pair(
        &self,
        a: &str,
        b: &str,
    ) -> (OwnedMutexGuard<()>, OwnedMutexGuard<()>) {
        let (first, second) = if a <= b { (a, b) } else { (b, a) };
        let g1 = self.lock(first).await;
        let g2 = self.lock(second).await;
        (g1, g2)
    }
}
