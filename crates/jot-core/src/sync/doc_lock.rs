//! Per-document write serialization.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

use crate::models::{Collection, RecordId};

type DocKey = (Collection, RecordId);

/// Async locks keyed by document; entries live only while someone holds or waits on them
#[derive(Default)]
pub(super) struct DocLocks {
    locks: Mutex<HashMap<DocKey, Arc<AsyncMutex<()>>>>,
}

/// Held for the duration of one write to a document
pub(super) struct DocLockGuard<'a> {
    owner: &'a DocLocks,
    key: DocKey,
    guard: Option<OwnedMutexGuard<()>>,
}

impl DocLocks {
    fn locks(&self) -> MutexGuard<'_, HashMap<DocKey, Arc<AsyncMutex<()>>>> {
        self.locks.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub(super) async fn lock(&self, collection: Collection, id: RecordId) -> DocLockGuard<'_> {
        let key = (collection, id);
        let lock = Arc::clone(self.locks().entry(key).or_default());
        let guard = lock.lock_owned().await;
        DocLockGuard {
            owner: self,
            key,
            guard: Some(guard),
        }
    }

    #[cfg(test)]
    pub(super) fn len(&self) -> usize {
        self.locks().len()
    }
}

impl Drop for DocLockGuard<'_> {
    fn drop(&mut self) {
        drop(self.guard.take());
        let mut locks = self.owner.locks();
        // Only the map's own handle left: nobody holds or waits on it.
        if locks
            .get(&self.key)
            .is_some_and(|lock| Arc::strong_count(lock) == 1)
        {
            locks.remove(&self.key);
        }
    }
}
