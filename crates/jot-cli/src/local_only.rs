//! Stand-in remote store for runs without a configured remote.

use async_trait::async_trait;
use jot_core::models::{Collection, RecordId};
use jot_core::remote::{ListFilter, Page, PageRequest, RemoteResult, RemoteStore};
use jot_core::{RemoteFailure, RemoteFailureKind};
use serde_json::Value;

/// Rejects every call; the engine runs offline so mutations queue instead.
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalOnlyRemote;

fn unavailable<T>() -> RemoteResult<T> {
    Err(RemoteFailure::new(
        RemoteFailureKind::Unavailable,
        "no remote store configured",
    ))
}

#[async_trait]
impl RemoteStore for LocalOnlyRemote {
    async fn create(&self, _collection: Collection, _payload: Value) -> RemoteResult<Value> {
        unavailable()
    }

    async fn get(&self, _collection: Collection, _id: &RecordId) -> RemoteResult<Option<Value>> {
        unavailable()
    }

    async fn update(
        &self,
        _collection: Collection,
        _id: &RecordId,
        _patch: Value,
    ) -> RemoteResult<Value> {
        unavailable()
    }

    async fn delete(
        &self,
        _collection: Collection,
        _id: &RecordId,
        _context: &Value,
    ) -> RemoteResult<()> {
        unavailable()
    }

    async fn list(
        &self,
        _collection: Collection,
        _filter: &ListFilter,
        _page: &PageRequest,
    ) -> RemoteResult<Page> {
        unavailable()
    }
}
