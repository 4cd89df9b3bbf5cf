//! Cached record repository implementation

use crate::error::{Result, StorageFailure};
use crate::models::{Collection, Record, RecordId, SyncConflict};
use rusqlite::{params, Connection, OptionalExtension};

/// Trait for cached record storage operations
pub trait RecordRepository {
    /// Insert or overwrite a record by id
    fn put<R: Record>(&self, record: &R) -> Result<()>;

    /// Get a record by id
    fn get<R: Record>(&self, id: &RecordId) -> Result<Option<R>>;

    /// List a user's records, newest first
    fn list_by_owner<R: Record>(&self, user_id: &str) -> Result<Vec<R>>;

    /// Remove a record; returns whether a row was removed
    fn delete(&self, collection: Collection, id: &RecordId) -> Result<bool>;

    /// Flag a record as confirmed by the remote store
    fn mark_synced(&self, collection: Collection, id: &RecordId) -> Result<()>;

    /// `updated_at` of a cached record, if present
    fn updated_at(&self, collection: Collection, id: &RecordId) -> Result<Option<i64>>;

    /// Log a last-writer-wins decision
    fn record_conflict(
        &self,
        collection: Collection,
        id: &RecordId,
        local_updated_at: i64,
        incoming_updated_at: i64,
    ) -> Result<()>;

    /// List recently resolved conflicts, newest first
    fn list_conflicts(&self, limit: usize) -> Result<Vec<SyncConflict>>;
}

/// `SQLite` implementation of `RecordRepository`
pub struct SqliteRecordRepository<'a> {
    conn: &'a Connection,
}

impl<'a> SqliteRecordRepository<'a> {
    /// Create a new repository with the given connection
    pub const fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    /// Decode a stored payload; the `synced` column wins over the JSON copy
    fn decode<R: Record>(payload: &str, synced: bool) -> Result<R> {
        let mut value: serde_json::Value = serde_json::from_str(payload)
            .map_err(|error| StorageFailure::Corrupt(error.to_string()))?;
        if let Some(object) = value.as_object_mut() {
            object.insert("synced".to_string(), serde_json::Value::Bool(synced));
        }
        let record = serde_json::from_value(value)
            .map_err(|error| StorageFailure::Corrupt(error.to_string()))?;
        Ok(record)
    }

    fn parse_conflict(row: &rusqlite::Row<'_>) -> rusqlite::Result<SyncConflict> {
        Ok(SyncConflict {
            id: row.get(0)?,
            collection: row.get(1)?,
            doc_id: row.get(2)?,
            local_updated_at: row.get(3)?,
            incoming_updated_at: row.get(4)?,
            resolved_at: row.get(5)?,
            strategy: row.get(6)?,
        })
    }
}

impl RecordRepository for SqliteRecordRepository<'_> {
    fn put<R: Record>(&self, record: &R) -> Result<()> {
        let meta = record.meta();
        let payload = serde_json::to_string(record)?;
        let table = R::COLLECTION.as_str();

        self.conn.execute(
            &format!(
                "INSERT INTO {table} (id, user_id, created_at, updated_at, synced, payload)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                 ON CONFLICT(id) DO UPDATE SET
                    user_id = excluded.user_id,
                    created_at = excluded.created_at,
                    updated_at = excluded.updated_at,
                    synced = excluded.synced,
                    payload = excluded.payload"
            ),
            params![
                meta.id.as_str(),
                meta.user_id,
                meta.created_at,
                meta.updated_at,
                i32::from(meta.synced),
                payload
            ],
        )?;

        Ok(())
    }

    fn get<R: Record>(&self, id: &RecordId) -> Result<Option<R>> {
        let table = R::COLLECTION.as_str();
        let row = self
            .conn
            .query_row(
                &format!("SELECT payload, synced FROM {table} WHERE id = ?1"),
                params![id.as_str()],
                |row| Ok((row.get::<_, String>(0)?, row.get::<_, i32>(1)? != 0)),
            )
            .optional()?;

        row.map(|(payload, synced)| Self::decode(&payload, synced))
            .transpose()
    }

    fn list_by_owner<R: Record>(&self, user_id: &str) -> Result<Vec<R>> {
        let table = R::COLLECTION.as_str();
        let mut stmt = self.conn.prepare(&format!(
            "SELECT payload, synced FROM {table}
             WHERE user_id = ?1
             ORDER BY created_at DESC, id DESC"
        ))?;

        let rows = stmt
            .query_map(params![user_id], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, i32>(1)? != 0))
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        rows.iter()
            .map(|(payload, synced)| Self::decode(payload, *synced))
            .collect()
    }

    fn delete(&self, collection: Collection, id: &RecordId) -> Result<bool> {
        let table = collection.as_str();
        let rows = self.conn.execute(
            &format!("DELETE FROM {table} WHERE id = ?1"),
            params![id.as_str()],
        )?;
        Ok(rows > 0)
    }

    fn mark_synced(&self, collection: Collection, id: &RecordId) -> Result<()> {
        let table = collection.as_str();
        self.conn.execute(
            &format!("UPDATE {table} SET synced = 1 WHERE id = ?1"),
            params![id.as_str()],
        )?;
        Ok(())
    }

    fn updated_at(&self, collection: Collection, id: &RecordId) -> Result<Option<i64>> {
        let table = collection.as_str();
        let updated_at = self
            .conn
            .query_row(
                &format!("SELECT updated_at FROM {table} WHERE id = ?1"),
                params![id.as_str()],
                |row| row.get(0),
            )
            .optional()?;
        Ok(updated_at)
    }

    fn record_conflict(
        &self,
        collection: Collection,
        id: &RecordId,
        local_updated_at: i64,
        incoming_updated_at: i64,
    ) -> Result<()> {
        self.conn.execute(
            "INSERT INTO sync_conflicts (
                collection, doc_id, local_updated_at, incoming_updated_at, resolved_at, strategy
             ) VALUES (?1, ?2, ?3, ?4, ?5, 'lww')",
            params![
                collection.as_str(),
                id.as_str(),
                local_updated_at,
                incoming_updated_at,
                crate::util::now_millis()
            ],
        )?;
        Ok(())
    }

    #[allow(clippy::cast_possible_wrap)] // SQLite uses i64 for LIMIT
    fn list_conflicts(&self, limit: usize) -> Result<Vec<SyncConflict>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, collection, doc_id, local_updated_at, incoming_updated_at, resolved_at, strategy
             FROM sync_conflicts
             ORDER BY resolved_at DESC, id DESC
             LIMIT ?1",
        )?;

        let conflicts = stmt
            .query_map(params![limit as i64], Self::parse_conflict)?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        Ok(conflicts)
    }
}
