//! Durable FIFO operation queue
//!
//! Operations are stored in `pending_operations` and always read back in
//! insertion order. The queue never reorders or coalesces entries: a later
//! update for a document does not replace an earlier create for it.

use crate::error::{Result, StorageFailure};
use crate::models::{Collection, NewOperation, PendingOperation, RecordId};
use rusqlite::{params, Connection};

/// Trait for operation queue storage
pub trait OperationQueue {
    /// Append an operation and return it with its assigned local id
    fn enqueue(&self, operation: &NewOperation) -> Result<PendingOperation>;

    /// All queued operations in insertion order
    fn list_pending(&self) -> Result<Vec<PendingOperation>>;

    /// Queued operations for one document, in insertion order
    fn pending_for_doc(&self, collection: Collection, doc_id: &RecordId)
        -> Result<Vec<PendingOperation>>;

    /// Remove an operation; removing an absent id is not an error
    fn dequeue(&self, id: i64) -> Result<()>;

    /// Number of queued operations
    fn count_pending(&self) -> Result<usize>;

    /// Note a failed remote attempt for diagnostics
    fn record_failure(&self, id: i64, message: &str) -> Result<()>;
}

/// `SQLite` implementation of `OperationQueue`
pub struct SqliteOperationQueue<'a> {
    conn: &'a Connection,
}

const SELECT_COLUMNS: &str =
    "SELECT id, op_type, collection, doc_id, payload, timestamp, attempts, last_error
     FROM pending_operations";

type OperationRow = (i64, String, String, String, String, i64, u32, Option<String>);

impl<'a> SqliteOperationQueue<'a> {
    /// Create a new queue view over the given connection
    pub const fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    fn read_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<OperationRow> {
        Ok((
            row.get(0)?,
            row.get(1)?,
            row.get(2)?,
            row.get(3)?,
            row.get(4)?,
            row.get(5)?,
            row.get(6)?,
            row.get(7)?,
        ))
    }

    fn parse_operation(row: OperationRow) -> Result<PendingOperation> {
        let (id, op_type, collection, doc_id, payload, timestamp, attempts, last_error) = row;
        let corrupt = |detail: String| StorageFailure::Corrupt(format!("pending operation {id}: {detail}"));

        Ok(PendingOperation {
            id,
            kind: op_type.parse().map_err(|_| corrupt(format!("type {op_type}")))?,
            collection: collection
                .parse()
                .map_err(|_| corrupt(format!("collection {collection}")))?,
            doc_id: doc_id
                .parse()
                .map_err(|_| corrupt(format!("doc id {doc_id}")))?,
            data: serde_json::from_str(&payload).map_err(|error| corrupt(error.to_string()))?,
            timestamp,
            attempts,
            last_error,
        })
    }

    fn query(&self, sql: &str, params: impl rusqlite::Params) -> Result<Vec<PendingOperation>> {
        let mut stmt = self.conn.prepare(sql)?;
        let rows = stmt
            .query_map(params, Self::read_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        rows.into_iter().map(Self::parse_operation).collect()
    }
}

impl OperationQueue for SqliteOperationQueue<'_> {
    fn enqueue(&self, operation: &NewOperation) -> Result<PendingOperation> {
        let payload = serde_json::to_string(&operation.data)?;
        self.conn.execute(
            "INSERT INTO pending_operations (op_type, collection, doc_id, payload, timestamp)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                operation.kind.as_str(),
                operation.collection.as_str(),
                operation.doc_id.as_str(),
                payload,
                operation.timestamp
            ],
        )?;

        Ok(PendingOperation {
            id: self.conn.last_insert_rowid(),
            kind: operation.kind,
            collection: operation.collection,
            doc_id: operation.doc_id,
            data: operation.data.clone(),
            timestamp: operation.timestamp,
            attempts: 0,
            last_error: None,
        })
    }

    fn list_pending(&self) -> Result<Vec<PendingOperation>> {
        self.query(&format!("{SELECT_COLUMNS} ORDER BY id ASC"), [])
    }

    fn pending_for_doc(
        &self,
        collection: Collection,
        doc_id: &RecordId,
    ) -> Result<Vec<PendingOperation>> {
        self.query(
            &format!("{SELECT_COLUMNS} WHERE collection = ?1 AND doc_id = ?2 ORDER BY id ASC"),
            params![collection.as_str(), doc_id.as_str()],
        )
    }

    fn dequeue(&self, id: i64) -> Result<()> {
        self.conn
            .execute("DELETE FROM pending_operations WHERE id = ?1", params![id])?;
        Ok(())
    }

    fn count_pending(&self) -> Result<usize> {
        let count: i64 =
            self.conn
                .query_row("SELECT COUNT(*) FROM pending_operations", [], |row| row.get(0))?;
        Ok(usize::try_from(count).unwrap_or_default())
    }

    fn record_failure(&self, id: i64, message: &str) -> Result<()> {
        self.conn.execute(
            "UPDATE pending_operations SET attempts = attempts + 1, last_error = ?1 WHERE id = ?2",
            params![crate::util::compact_text(message), id],
        )?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Database;
    use crate::models::{NewNote, Note, OperationKind};
    use pretty_assertions::assert_eq;

    fn setup() -> Database {
        Database::open_in_memory().unwrap()
    }

    fn create_op(title: &str) -> NewOperation {
        let note = Note::new("user-1", NewNote::text(title, ""));
        NewOperation::upsert(OperationKind::Create, &note).unwrap()
    }

    #[test]
    fn test_enqueue_assigns_increasing_ids() {
        let db = setup();
        let queue = SqliteOperationQueue::new(db.connection());

        let first = queue.enqueue(&create_op("a")).unwrap();
        let second = queue.enqueue(&create_op("b")).unwrap();
        assert!(second.id > first.id);
        assert_eq!(queue.count_pending().unwrap(), 2);
    }

    #[test]
    fn test_ids_are_not_reused_after_dequeue() {
        let db = setup();
        let queue = SqliteOperationQueue::new(db.connection());

        let first = queue.enqueue(&create_op("a")).unwrap();
        queue.dequeue(first.id).unwrap();
        let second = queue.enqueue(&create_op("b")).unwrap();
        assert!(second.id > first.id);
    }

    #[test]
    fn test_list_pending_keeps_insertion_order() {
        let db = setup();
        let queue = SqliteOperationQueue::new(db.connection());

        let note = Note::new("user-1", NewNote::text("a", ""));
        queue
            .enqueue(&NewOperation::upsert(OperationKind::Create, &note).unwrap())
            .unwrap();
        queue.enqueue(&create_op("other")).unwrap();
        queue
            .enqueue(&NewOperation::upsert(OperationKind::Update, &note).unwrap())
            .unwrap();
        queue
            .enqueue(&NewOperation::delete(Collection::Notes, note.meta.id, "user-1"))
            .unwrap();

        let pending = queue.list_pending().unwrap();
        assert_eq!(pending.len(), 4);
        assert!(pending.windows(2).all(|pair| pair[0].id < pair[1].id));

        let kinds = queue
            .pending_for_doc(Collection::Notes, &note.meta.id)
            .unwrap()
            .into_iter()
            .map(|op| op.kind)
            .collect::<Vec<_>>();
        assert_eq!(
            kinds,
            vec![OperationKind::Create, OperationKind::Update, OperationKind::Delete]
        );
    }

    #[test]
    fn test_dequeue_twice_is_harmless() {
        let db = setup();
        let queue = SqliteOperationQueue::new(db.connection());

        let kept = queue.enqueue(&create_op("keep")).unwrap();
        let removed = queue.enqueue(&create_op("drop")).unwrap();

        queue.dequeue(removed.id).unwrap();
        queue.dequeue(removed.id).unwrap();

        let pending = queue.list_pending().unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].id, kept.id);
    }

    #[test]
    fn test_record_failure_tracks_attempts() {
        let db = setup();
        let queue = SqliteOperationQueue::new(db.connection());

        let op = queue.enqueue(&create_op("a")).unwrap();
        queue.record_failure(op.id, "network: offline").unwrap();
        queue.record_failure(op.id, "timeout: 15s").unwrap();

        let pending = queue.list_pending().unwrap();
        assert_eq!(pending[0].attempts, 2);
        assert_eq!(pending[0].last_error.as_deref(), Some("timeout: 15s"));
    }

    #[test]
    fn test_round_trip_preserves_payload() {
        let db = setup();
        let queue = SqliteOperationQueue::new(db.connection());

        let op = create_op("payload");
        let stored = queue.enqueue(&op).unwrap();
        let listed = queue.list_pending().unwrap().remove(0);
        assert_eq!(listed, stored);
        assert_eq!(listed.data["title"], "payload");
    }
}
