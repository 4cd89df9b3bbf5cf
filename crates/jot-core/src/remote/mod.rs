//! Remote document store adapters.
//!
//! Adapters exchange records as JSON documents in domain form (epoch
//! millisecond timestamps) and translate to the store's native timestamp
//! representation internally.

mod http;
mod memory;
mod timestamp;

use async_trait::async_trait;
use serde_json::Value;

use crate::error::{Error, RemoteFailure, RemoteFailureKind, Result};
use crate::models::{Collection, Record, RecordId};

pub use http::HttpRemoteStore;
pub use memory::{MemoryRemoteStore, RemoteCall, RemoteOp};
pub use timestamp::{from_remote_document, to_remote_document, RemoteTimestamp};

pub type RemoteResult<T> = std::result::Result<T, RemoteFailure>;

/// Default page size for `list`
pub const DEFAULT_PAGE_SIZE: usize = 50;

/// Equality filters applied by `list`
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ListFilter {
    pub equals: Vec<(String, Value)>,
}

impl ListFilter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records owned by `user_id`
    #[must_use]
    pub fn owner(self, user_id: impl Into<String>) -> Self {
        self.eq("user_id", Value::String(user_id.into()))
    }

    #[must_use]
    pub fn eq(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.equals.push((field.into(), value.into()));
        self
    }

    /// Whether a domain-form document satisfies every filter
    pub fn matches(&self, document: &Value) -> bool {
        self.equals
            .iter()
            .all(|(field, expected)| document.get(field) == Some(expected))
    }
}

/// Cursor-based page request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageRequest {
    pub limit: usize,
    /// Cursor returned by the previous page
    pub cursor: Option<String>,
}

impl Default for PageRequest {
    fn default() -> Self {
        Self {
            limit: DEFAULT_PAGE_SIZE,
            cursor: None,
        }
    }
}

/// One page of `list` results, newest first
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Page {
    pub records: Vec<Value>,
    pub has_more: bool,
    pub cursor: Option<String>,
}

/// Cloud document database
#[async_trait]
pub trait RemoteStore: Send + Sync {
    /// Create a document; the id inside `payload` is kept, so repeating a
    /// create for the same id overwrites rather than duplicates.
    async fn create(&self, collection: Collection, payload: Value) -> RemoteResult<Value>;

    async fn get(&self, collection: Collection, id: &RecordId) -> RemoteResult<Option<Value>>;

    /// Merge `patch` into an existing document
    async fn update(&self, collection: Collection, id: &RecordId, patch: Value)
        -> RemoteResult<Value>;

    /// Delete a document; `context` carries the owning user for authorization.
    /// Deleting an absent document succeeds.
    async fn delete(&self, collection: Collection, id: &RecordId, context: &Value)
        -> RemoteResult<()>;

    async fn list(
        &self,
        collection: Collection,
        filter: &ListFilter,
        page: &PageRequest,
    ) -> RemoteResult<Page>;
}

/// Decode a domain-form remote document into a typed record.
///
/// A document that does not match the record shape is the remote store's
/// fault, so it surfaces as an invalid remote response.
pub fn decode_record<R: Record>(document: Value) -> Result<R> {
    serde_json::from_value(document).map_err(|error| {
        Error::Remote(RemoteFailure::new(
            RemoteFailureKind::Invalid,
            format!("undecodable {} document: {error}", R::COLLECTION),
        ))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn filter_matches_every_field() {
        let filter = ListFilter::new().owner("user-1").eq("type", "audio");
        assert!(filter.matches(&json!({ "user_id": "user-1", "type": "audio" })));
        assert!(!filter.matches(&json!({ "user_id": "user-1", "type": "text" })));
        assert!(!filter.matches(&json!({ "type": "audio" })));
    }

    #[test]
    fn empty_filter_matches_anything() {
        assert!(ListFilter::new().matches(&json!({})));
    }

    #[test]
    fn undecodable_documents_are_invalid_remote_responses() {
        let error = decode_record::<crate::models::Note>(json!({ "id": 42 })).unwrap_err();
        assert!(matches!(
            error,
            Error::Remote(RemoteFailure {
                kind: RemoteFailureKind::Invalid,
                ..
            })
        ));
    }
}
