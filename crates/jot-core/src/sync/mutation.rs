//! Optimistic local mutations.
//!
//! Every mutation of one document holds that document's lock from the
//! queue check until the write is delivered or queued, so two writes to the
//! same document can never overtake each other.

use super::{Delivery, MutationOutcome, SyncEngine};
use crate::error::{Error, Result};
use crate::models::{Collection, NewOperation, OperationKind, PendingOperation, Record, RecordId};

impl SyncEngine {
    /// Write a record locally and, when offline, queue it for the remote store.
    ///
    /// Returns the queued operation, or `None` when online (the caller then
    /// owns the remote write).
    pub async fn save_locally<R: Record>(
        &self,
        record: &R,
        kind: OperationKind,
    ) -> Result<Option<PendingOperation>> {
        let _lock = self.inner.doc_locks.lock(R::COLLECTION, record.id()).await;
        if self.is_online() {
            self.store().put(record).await?;
            return Ok(None);
        }
        let operation = NewOperation::upsert(kind, record)?;
        let pending = self.store().put_and_enqueue(record, &operation).await?;
        self.queued(&pending);
        Ok(Some(pending))
    }

    /// Delete a record locally and, when offline, queue the deletion.
    pub async fn delete_locally(
        &self,
        collection: Collection,
        id: &RecordId,
        user_id: &str,
    ) -> Result<Option<PendingOperation>> {
        let _lock = self.inner.doc_locks.lock(collection, *id).await;
        if self.is_online() {
            self.store().delete(collection, id).await?;
            return Ok(None);
        }
        let operation = NewOperation::delete(collection, *id, user_id);
        let pending = self.store().delete_and_enqueue(&operation).await?;
        self.queued(&pending);
        Ok(Some(pending))
    }

    /// Save a record locally, then deliver it directly or through the queue.
    ///
    /// Online writes for documents with nothing queued go straight to the
    /// remote store; a failed direct write falls back into the queue. Offline
    /// writes, and writes for documents that already have queued operations,
    /// are queued so per-document order holds.
    pub async fn save<R: Record>(&self, record: R, kind: OperationKind) -> Result<MutationOutcome<R>> {
        let _lock = self.inner.doc_locks.lock(R::COLLECTION, record.id()).await;
        self.deliver(record, kind).await
    }

    /// Read a cached record, change it and save it as one step.
    ///
    /// The read happens under the document lock, so a concurrent save of the
    /// same document is never overwritten with stale fields.
    pub async fn update<R, F>(&self, id: &RecordId, change: F) -> Result<MutationOutcome<R>>
    where
        R: Record,
        F: FnOnce(&mut R) + Send,
    {
        let _lock = self.inner.doc_locks.lock(R::COLLECTION, *id).await;
        let mut record: R = self
            .store()
            .get(id)
            .await?
            .ok_or_else(|| Error::NotFound(id.to_string()))?;
        change(&mut record);
        self.deliver(record, OperationKind::Update).await
    }

    /// Delete a record locally, then deliver the deletion directly or through the queue.
    pub async fn delete(
        &self,
        collection: Collection,
        id: &RecordId,
        user_id: &str,
    ) -> Result<Delivery> {
        let _lock = self.inner.doc_locks.lock(collection, *id).await;
        let operation = NewOperation::delete(collection, *id, user_id);

        if !self.can_write_directly(collection, id).await? {
            let pending = self.store().delete_and_enqueue(&operation).await?;
            self.queued(&pending);
            return Ok(Delivery::Queued {
                operation_id: pending.id,
                reason: None,
            });
        }

        self.store().delete(collection, id).await?;
        match self
            .send(OperationKind::Delete, collection, id, &operation.data)
            .await
        {
            Ok(()) => Ok(Delivery::Synced),
            Err(failure) => {
                tracing::warn!("Direct delete of {collection}/{id} failed, queued for retry: {failure}");
                let pending = self.store().enqueue(&operation).await?;
                self.queued(&pending);
                Ok(Delivery::Queued {
                    operation_id: pending.id,
                    reason: Some(failure),
                })
            }
        }
    }

    /// Caller holds the document lock
    async fn deliver<R: Record>(&self, mut record: R, kind: OperationKind) -> Result<MutationOutcome<R>> {
        let operation = NewOperation::upsert(kind, &record)?;

        if !self.can_write_directly(R::COLLECTION, &record.id()).await? {
            let pending = self.store().put_and_enqueue(&record, &operation).await?;
            self.queued(&pending);
            return Ok(MutationOutcome {
                record,
                delivery: Delivery::Queued {
                    operation_id: pending.id,
                    reason: None,
                },
            });
        }

        self.store().put(&record).await?;
        let delivery = match self
            .send(kind, operation.collection, &operation.doc_id, &operation.data)
            .await
        {
            Ok(()) => {
                self.store()
                    .mark_synced(R::COLLECTION, &operation.doc_id)
                    .await?;
                record.meta_mut().synced = true;
                Delivery::Synced
            }
            Err(failure) => {
                tracing::warn!(
                    "Direct {kind} of {}/{} failed, queued for retry: {failure}",
                    operation.collection,
                    operation.doc_id
                );
                let pending = self.store().enqueue(&operation).await?;
                self.queued(&pending);
                Delivery::Queued {
                    operation_id: pending.id,
                    reason: Some(failure),
                }
            }
        };
        Ok(MutationOutcome { record, delivery })
    }

    async fn can_write_directly(&self, collection: Collection, id: &RecordId) -> Result<bool> {
        if !self.is_online() {
            return Ok(false);
        }
        Ok(self.store().pending_for_doc(collection, id).await?.is_empty())
    }

    fn queued(&self, pending: &PendingOperation) {
        tracing::debug!(
            "Queued {} {}/{} as operation {}",
            pending.kind,
            pending.collection,
            pending.doc_id,
            pending.id
        );
        self.update_status(|status| status.pending_count += 1);
    }
}
