//! In-process remote store.
//!
//! Behaves like the cloud document store (native timestamps, idempotent
//! creates by id, cursor pagination) and adds knobs for exercising failure
//! paths: per-document failure injection, a global unreachable switch,
//! artificial latency and an ordered log of every call.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;

use super::timestamp::{from_remote_document, merge_fields, to_remote_document};
use super::{ListFilter, Page, PageRequest, RemoteResult, RemoteStore};
use crate::error::{RemoteFailure, RemoteFailureKind};
use crate::models::{Collection, RecordId};

/// Remote operation recorded in the call log
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemoteOp {
    Create,
    Get,
    Update,
    Delete,
    List,
}

/// One call received by the store, in arrival order
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteCall {
    pub op: RemoteOp,
    pub collection: Collection,
    pub doc_id: Option<String>,
}

#[derive(Default)]
struct MemoryState {
    /// Documents in remote form, keyed by id
    documents: HashMap<Collection, BTreeMap<String, Value>>,
    calls: Vec<RemoteCall>,
    failing: HashSet<String>,
    unreachable: bool,
    latency: Option<Duration>,
}

/// Shared in-memory document store; clones share state
#[derive(Clone, Default)]
pub struct MemoryRemoteStore {
    state: Arc<Mutex<MemoryState>>,
}

impl MemoryRemoteStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Make every call touching `doc_id` fail with a network error
    pub fn fail_doc(&self, doc_id: &RecordId) {
        self.state().failing.insert(doc_id.as_str());
    }

    /// Undo [`Self::fail_doc`]
    pub fn recover_doc(&self, doc_id: &RecordId) {
        self.state().failing.remove(&doc_id.as_str());
    }

    /// Make every call fail as if the network were down
    pub fn set_unreachable(&self, unreachable: bool) {
        self.state().unreachable = unreachable;
    }

    /// Delay every call by `latency`
    pub fn set_latency(&self, latency: Option<Duration>) {
        self.state().latency = latency;
    }

    /// Every call received so far
    pub fn calls(&self) -> Vec<RemoteCall> {
        self.state().calls.clone()
    }

    /// Calls that mutate documents
    pub fn write_calls(&self) -> Vec<RemoteCall> {
        self.calls()
            .into_iter()
            .filter(|call| matches!(call.op, RemoteOp::Create | RemoteOp::Update | RemoteOp::Delete))
            .collect()
    }

    /// Stored document in domain form
    pub fn document(&self, collection: Collection, id: &RecordId) -> Option<Value> {
        let stored = self
            .state()
            .documents
            .get(&collection)?
            .get(&id.as_str())
            .cloned()?;
        from_remote_document(stored).ok()
    }

    /// Number of stored documents in a collection
    pub fn len(&self, collection: Collection) -> usize {
        self.state()
            .documents
            .get(&collection)
            .map_or(0, BTreeMap::len)
    }

    pub fn is_empty(&self, collection: Collection) -> bool {
        self.len(collection) == 0
    }

    /// Place a domain-form document directly, bypassing the call log
    pub fn seed(&self, collection: Collection, document: Value) {
        if let Some(id) = document.get("id").and_then(Value::as_str).map(str::to_string) {
            self.state()
                .documents
                .entry(collection)
                .or_default()
                .insert(id, to_remote_document(document));
        }
    }

    /// Log the call and decide whether it should fail
    async fn enter(&self, op: RemoteOp, collection: Collection, doc_id: Option<String>) -> RemoteResult<()> {
        let latency = {
            let mut state = self.state();
            state.calls.push(RemoteCall {
                op,
                collection,
                doc_id: doc_id.clone(),
            });
            state.latency
        };

        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }

        let state = self.state();
        if state.unreachable {
            return Err(RemoteFailure::network("remote store unreachable"));
        }
        if let Some(doc_id) = doc_id {
            if state.failing.contains(&doc_id) {
                return Err(RemoteFailure::network(format!("injected failure for {doc_id}")));
            }
        }
        Ok(())
    }
}

fn document_id(payload: &Value) -> RemoteResult<String> {
    payload
        .get("id")
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| RemoteFailure::new(RemoteFailureKind::Invalid, "document has no id"))
}

fn created_at(document: &Value) -> i64 {
    document
        .get("created_at")
        .and_then(Value::as_i64)
        .unwrap_or_default()
}

#[async_trait]
impl RemoteStore for MemoryRemoteStore {
    async fn create(&self, collection: Collection, payload: Value) -> RemoteResult<Value> {
        let id = document_id(&payload)?;
        self.enter(RemoteOp::Create, collection, Some(id.clone())).await?;

        let stored = to_remote_document(payload);
        self.state()
            .documents
            .entry(collection)
            .or_default()
            .insert(id, stored.clone());
        from_remote_document(stored)
    }

    async fn get(&self, collection: Collection, id: &RecordId) -> RemoteResult<Option<Value>> {
        self.enter(RemoteOp::Get, collection, Some(id.as_str())).await?;

        let stored = self
            .state()
            .documents
            .get(&collection)
            .and_then(|documents| documents.get(&id.as_str()).cloned());
        stored.map(from_remote_document).transpose()
    }

    async fn update(
        &self,
        collection: Collection,
        id: &RecordId,
        patch: Value,
    ) -> RemoteResult<Value> {
        self.enter(RemoteOp::Update, collection, Some(id.as_str())).await?;

        let Value::Object(patch) = to_remote_document(patch) else {
            return Err(RemoteFailure::new(RemoteFailureKind::Invalid, "patch is not an object"));
        };

        let mut state = self.state();
        let document = state
            .documents
            .get_mut(&collection)
            .and_then(|documents| documents.get_mut(&id.as_str()))
            .ok_or_else(|| RemoteFailure::not_found(format!("{collection}/{id}")))?;
        if let Value::Object(fields) = document {
            merge_fields(fields, patch);
        }
        from_remote_document(document.clone())
    }

    async fn delete(
        &self,
        collection: Collection,
        id: &RecordId,
        context: &Value,
    ) -> RemoteResult<()> {
        self.enter(RemoteOp::Delete, collection, Some(id.as_str())).await?;

        let mut state = self.state();
        let Some(documents) = state.documents.get_mut(&collection) else {
            return Ok(());
        };
        if let (Some(owner), Some(requester)) = (
            documents
                .get(&id.as_str())
                .and_then(|document| document.get("user_id"))
                .and_then(Value::as_str),
            context.get("user_id").and_then(Value::as_str),
        ) {
            if owner != requester {
                return Err(RemoteFailure::new(
                    RemoteFailureKind::PermissionDenied,
                    format!("{collection}/{id} is owned by another user"),
                ));
            }
        }
        documents.remove(&id.as_str());
        Ok(())
    }

    async fn list(
        &self,
        collection: Collection,
        filter: &ListFilter,
        page: &PageRequest,
    ) -> RemoteResult<Page> {
        self.enter(RemoteOp::List, collection, None).await?;

        let stored = self
            .state()
            .documents
            .get(&collection)
            .map(|documents| documents.values().cloned().collect::<Vec<_>>())
            .unwrap_or_default();

        let mut matching = stored
            .into_iter()
            .map(from_remote_document)
            .collect::<RemoteResult<Vec<_>>>()?
            .into_iter()
            .filter(|document| filter.matches(document))
            .collect::<Vec<_>>();
        matching.sort_by(|a, b| {
            created_at(b)
                .cmp(&created_at(a))
                .then_with(|| b["id"].as_str().cmp(&a["id"].as_str()))
        });

        let start = match &page.cursor {
            Some(cursor) => matching
                .iter()
                .position(|document| document["id"].as_str() == Some(cursor.as_str()))
                .map_or(matching.len(), |index| index + 1),
            None => 0,
        };
        let limit = page.limit.max(1);
        let records = matching
            .iter()
            .skip(start)
            .take(limit)
            .cloned()
            .collect::<Vec<_>>();
        let has_more = start + records.len() < matching.len();
        let cursor = if has_more {
            records
                .last()
                .and_then(|document| document["id"].as_str())
                .map(str::to_string)
        } else {
            None
        };

        Ok(Page {
            records,
            has_more,
            cursor,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{NewNote, Note};
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn note_document(user_id: &str, created_at: i64) -> (RecordId, Value) {
        let mut note = Note::new(user_id, NewNote::text("t", "c"));
        note.meta.created_at = created_at;
        (note.meta.id, serde_json::to_value(&note).unwrap())
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn create_is_idempotent_by_id() {
        let remote = MemoryRemoteStore::new();
        let (id, document) = note_document("user-1", 10);

        remote.create(Collection::Notes, document.clone()).await.unwrap();
        remote.create(Collection::Notes, document).await.unwrap();

        assert_eq!(remote.len(Collection::Notes), 1);
        assert!(remote.document(Collection::Notes, &id).is_some());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn stores_native_timestamps() {
        let remote = MemoryRemoteStore::new();
        let (id, document) = note_document("user-1", 1_234);
        remote.create(Collection::Notes, document).await.unwrap();

        let raw = remote.state().documents[&Collection::Notes][&id.as_str()].clone();
        assert_eq!(raw["created_at"], json!({ "seconds": 1, "nanos": 234_000_000 }));

        let fetched = remote.get(Collection::Notes, &id).await.unwrap().unwrap();
        assert_eq!(fetched["created_at"], 1_234);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn update_missing_document_is_not_found() {
        let remote = MemoryRemoteStore::new();
        let error = remote
            .update(Collection::Notes, &RecordId::new(), json!({ "title": "x" }))
            .await
            .unwrap_err();
        assert_eq!(error.kind, RemoteFailureKind::NotFound);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn delete_checks_owner_and_tolerates_absence() {
        let remote = MemoryRemoteStore::new();
        let (id, document) = note_document("user-1", 10);
        remote.create(Collection::Notes, document).await.unwrap();

        let denied = remote
            .delete(Collection::Notes, &id, &json!({ "user_id": "intruder" }))
            .await
            .unwrap_err();
        assert_eq!(denied.kind, RemoteFailureKind::PermissionDenied);

        let owner = json!({ "user_id": "user-1" });
        remote.delete(Collection::Notes, &id, &owner).await.unwrap();
        remote.delete(Collection::Notes, &id, &owner).await.unwrap();
        assert!(remote.is_empty(Collection::Notes));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn injected_failures_are_per_document() {
        let remote = MemoryRemoteStore::new();
        let (bad_id, bad) = note_document("user-1", 10);
        let (_, good) = note_document("user-1", 20);
        remote.fail_doc(&bad_id);

        assert!(remote.create(Collection::Notes, bad).await.is_err());
        assert!(remote.create(Collection::Notes, good).await.is_ok());
        assert_eq!(remote.write_calls().len(), 2);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn list_paginates_newest_first() {
        let remote = MemoryRemoteStore::new();
        for created_at in [10, 30, 20] {
            let (_, document) = note_document("user-1", created_at);
            remote.create(Collection::Notes, document).await.unwrap();
        }
        let (_, other) = note_document("user-2", 40);
        remote.create(Collection::Notes, other).await.unwrap();

        let filter = ListFilter::new().owner("user-1");
        let first = remote
            .list(
                Collection::Notes,
                &filter,
                &PageRequest {
                    limit: 2,
                    cursor: None,
                },
            )
            .await
            .unwrap();
        assert_eq!(first.records.len(), 2);
        assert!(first.has_more);
        assert_eq!(first.records[0]["created_at"], 30);
        assert_eq!(first.records[1]["created_at"], 20);

        let second = remote
            .list(
                Collection::Notes,
                &filter,
                &PageRequest {
                    limit: 2,
                    cursor: first.cursor,
                },
            )
            .await
            .unwrap();
        assert_eq!(second.records.len(), 1);
        assert!(!second.has_more);
        assert_eq!(second.cursor, None);
        assert_eq!(second.records[0]["created_at"], 10);
    }
}
