//! Shared local store used by the sync engine and the note service.

use std::path::PathBuf;
use std::sync::Arc;

use tokio::sync::Mutex;

use crate::db::{
    Database, OperationQueue, RecordRepository, SqliteOperationQueue, SqliteRecordRepository,
};
use crate::models::{Collection, NewOperation, PendingOperation, Record, RecordId, SyncConflict};
use crate::Result;

/// Thread-safe handle to the cached records and the operation queue.
///
/// Cloning is cheap; every clone shares one connection, so writes from the
/// sync engine and from UI-facing services are serialized.
#[derive(Clone)]
pub struct LocalStore {
    db: Arc<Mutex<Database>>,
}

impl LocalStore {
    /// Open a local store at the given filesystem path.
    pub fn open_path(db_path: impl Into<PathBuf>) -> Result<Self> {
        let db_path = db_path.into();
        tracing::debug!("Opening local store at {}", db_path.display());
        let db = Database::open(&db_path)?;
        Ok(Self::from_database(db))
    }

    /// Open an in-memory store (primarily for tests).
    pub fn open_in_memory() -> Result<Self> {
        Ok(Self::from_database(Database::open_in_memory()?))
    }

    fn from_database(db: Database) -> Self {
        Self {
            db: Arc::new(Mutex::new(db)),
        }
    }

    /// Insert or overwrite a record.
    pub async fn put<R: Record>(&self, record: &R) -> Result<()> {
        let db = self.db.lock().await;
        SqliteRecordRepository::new(db.connection()).put(record)
    }

    /// Fetch a record by id.
    pub async fn get<R: Record>(&self, id: &RecordId) -> Result<Option<R>> {
        let db = self.db.lock().await;
        SqliteRecordRepository::new(db.connection()).get(id)
    }

    /// A user's records, newest first. Never touches the network.
    pub async fn get_by_owner<R: Record>(&self, user_id: &str) -> Result<Vec<R>> {
        let db = self.db.lock().await;
        SqliteRecordRepository::new(db.connection()).list_by_owner(user_id)
    }

    /// Remove a record; absent records are ignored.
    pub async fn delete(&self, collection: Collection, id: &RecordId) -> Result<()> {
        let db = self.db.lock().await;
        SqliteRecordRepository::new(db.connection()).delete(collection, id)?;
        Ok(())
    }

    /// Flag a record as confirmed by the remote store.
    pub async fn mark_synced(&self, collection: Collection, id: &RecordId) -> Result<()> {
        let db = self.db.lock().await;
        SqliteRecordRepository::new(db.connection()).mark_synced(collection, id)
    }

    /// Store a remote copy unless the cached one is newer or has queued operations.
    ///
    /// Returns whether the incoming copy was written. Rejected older copies are
    /// logged as last-writer-wins conflicts.
    pub async fn reconcile<R: Record>(&self, incoming: &R) -> Result<bool> {
        let db = self.db.lock().await;
        let conn = db.connection();
        let records = SqliteRecordRepository::new(conn);
        let queue = SqliteOperationQueue::new(conn);
        let id = incoming.id();

        if !queue.pending_for_doc(R::COLLECTION, &id)?.is_empty() {
            tracing::debug!("Skipping remote copy of {}/{id}: local changes queued", R::COLLECTION);
            return Ok(false);
        }

        let incoming_updated_at = incoming.meta().updated_at;
        if let Some(local_updated_at) = records.updated_at(R::COLLECTION, &id)? {
            if incoming_updated_at < local_updated_at {
                records.record_conflict(R::COLLECTION, &id, local_updated_at, incoming_updated_at)?;
                tracing::info!(
                    "Kept local {}/{id}: local={local_updated_at} incoming={incoming_updated_at}",
                    R::COLLECTION
                );
                return Ok(false);
            }
        }

        let mut confirmed = incoming.clone();
        confirmed.meta_mut().synced = true;
        records.put(&confirmed)?;
        Ok(true)
    }

    /// Append an operation to the durable queue.
    pub async fn enqueue(&self, operation: &NewOperation) -> Result<PendingOperation> {
        let db = self.db.lock().await;
        SqliteOperationQueue::new(db.connection()).enqueue(operation)
    }

    /// Write a record and queue its operation in one transaction.
    pub async fn put_and_enqueue<R: Record>(
        &self,
        record: &R,
        operation: &NewOperation,
    ) -> Result<PendingOperation> {
        let db = self.db.lock().await;
        let tx = db.connection().unchecked_transaction()?;
        SqliteRecordRepository::new(&tx).put(record)?;
        let pending = SqliteOperationQueue::new(&tx).enqueue(operation)?;
        tx.commit()?;
        Ok(pending)
    }

    /// Delete a record and queue the deletion in one transaction.
    pub async fn delete_and_enqueue(
        &self,
        operation: &NewOperation,
    ) -> Result<PendingOperation> {
        let db = self.db.lock().await;
        let tx = db.connection().unchecked_transaction()?;
        SqliteRecordRepository::new(&tx).delete(operation.collection, &operation.doc_id)?;
        let pending = SqliteOperationQueue::new(&tx).enqueue(operation)?;
        tx.commit()?;
        Ok(pending)
    }

    /// Queued operations in insertion order.
    pub async fn list_pending(&self) -> Result<Vec<PendingOperation>> {
        let db = self.db.lock().await;
        SqliteOperationQueue::new(db.connection()).list_pending()
    }

    /// Queued operations for one document.
    pub async fn pending_for_doc(
        &self,
        collection: Collection,
        doc_id: &RecordId,
    ) -> Result<Vec<PendingOperation>> {
        let db = self.db.lock().await;
        SqliteOperationQueue::new(db.connection()).pending_for_doc(collection, doc_id)
    }

    /// Remove a queued operation; idempotent.
    pub async fn dequeue(&self, id: i64) -> Result<()> {
        let db = self.db.lock().await;
        SqliteOperationQueue::new(db.connection()).dequeue(id)
    }

    /// Number of queued operations.
    pub async fn count_pending(&self) -> Result<usize> {
        let db = self.db.lock().await;
        SqliteOperationQueue::new(db.connection()).count_pending()
    }

    /// Note a failed remote attempt on a queued operation.
    pub async fn record_failure(&self, id: i64, message: &str) -> Result<()> {
        let db = self.db.lock().await;
        SqliteOperationQueue::new(db.connection()).record_failure(id, message)
    }

    /// List recently resolved sync conflicts.
    pub async fn list_conflicts(&self, limit: usize) -> Result<Vec<SyncConflict>> {
        let db = self.db.lock().await;
        SqliteRecordRepository::new(db.connection()).list_conflicts(limit)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{NewNote, Note, OperationKind};
    use tempfile::tempdir;

    #[tokio::test(flavor = "multi_thread")]
    async fn in_memory_put_and_list_roundtrip() {
        let store = LocalStore::open_in_memory().unwrap();

        let note = Note::new("user-1", NewNote::text("hello", "core"));
        store.put(&note).await.unwrap();

        let notes: Vec<Note> = store.get_by_owner("user-1").await.unwrap();
        assert_eq!(notes.len(), 1);
        assert_eq!(notes[0].title, "hello");
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn queue_survives_reopen() {
        let tmp = tempdir().unwrap();
        let db_path = tmp.path().join("jot.db");
        let note = Note::new("user-1", NewNote::text("durable", ""));

        {
            let store = LocalStore::open_path(&db_path).unwrap();
            let op = NewOperation::upsert(OperationKind::Create, &note).unwrap();
            store.put_and_enqueue(&note, &op).await.unwrap();
        }

        let reopened = LocalStore::open_path(&db_path).unwrap();
        let pending = reopened.list_pending().await.unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].doc_id, note.meta.id);
        assert!(reopened.get::<Note>(&note.meta.id).await.unwrap().is_some());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn delete_and_enqueue_removes_record() {
        let store = LocalStore::open_in_memory().unwrap();
        let note = Note::new("user-1", NewNote::text("bye", ""));
        store.put(&note).await.unwrap();

        let op = NewOperation::delete(Collection::Notes, note.meta.id, "user-1");
        store.delete_and_enqueue(&op).await.unwrap();

        assert!(store.get::<Note>(&note.meta.id).await.unwrap().is_none());
        assert_eq!(store.count_pending().await.unwrap(), 1);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn reconcile_prefers_newer_copy() {
        let store = LocalStore::open_in_memory().unwrap();
        let mut local = Note::new("user-1", NewNote::text("local", ""));
        local.meta.updated_at = 200;
        store.put(&local).await.unwrap();

        let mut older = local.clone();
        older.title = "older remote".to_string();
        older.meta.updated_at = 100;
        assert!(!store.reconcile(&older).await.unwrap());
        assert_eq!(store.list_conflicts(10).await.unwrap().len(), 1);

        let mut newer = local.clone();
        newer.title = "newer remote".to_string();
        newer.meta.updated_at = 300;
        assert!(store.reconcile(&newer).await.unwrap());

        let stored: Note = store.get(&local.meta.id).await.unwrap().unwrap();
        assert_eq!(stored.title, "newer remote");
        assert!(stored.meta.synced);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn reconcile_never_overwrites_queued_documents() {
        let store = LocalStore::open_in_memory().unwrap();
        let local = Note::new("user-1", NewNote::text("offline edit", ""));
        let op = NewOperation::upsert(OperationKind::Create, &local).unwrap();
        store.put_and_enqueue(&local, &op).await.unwrap();

        let mut remote = local.clone();
        remote.title = "remote".to_string();
        remote.meta.updated_at = local.meta.updated_at + 1_000;
        assert!(!store.reconcile(&remote).await.unwrap());

        let stored: Note = store.get(&local.meta.id).await.unwrap().unwrap();
        assert_eq!(stored.title, "offline edit");
    }
}
