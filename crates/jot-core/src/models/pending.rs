//! Pending operation model

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::record::{Collection, Record, RecordId};
use crate::error::{Error, Result};

/// Kind of mutation carried by a pending operation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OperationKind {
    Create,
    Update,
    Delete,
}

impl OperationKind {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Create => "create",
            Self::Update => "update",
            Self::Delete => "delete",
        }
    }
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OperationKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "create" => Ok(Self::Create),
            "update" => Ok(Self::Update),
            "delete" => Ok(Self::Delete),
            other => Err(Error::InvalidInput(format!("unknown operation type: {other}"))),
        }
    }
}

/// A mutation about to be queued; the local store assigns its id
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewOperation {
    #[serde(rename = "type")]
    pub kind: OperationKind,
    pub collection: Collection,
    pub doc_id: RecordId,
    /// Full record for create/update, deletion context for delete
    pub data: serde_json::Value,
    /// Client-side creation time (Unix ms), diagnostic only
    pub timestamp: i64,
}

impl NewOperation {
    /// Snapshot a record for a create or update
    pub fn upsert<R: Record>(kind: OperationKind, record: &R) -> Result<Self> {
        if kind == OperationKind::Delete {
            return Err(Error::InvalidInput(
                "delete operations carry deletion context, not a record".to_string(),
            ));
        }
        Ok(Self {
            kind,
            collection: R::COLLECTION,
            doc_id: record.id(),
            data: serde_json::to_value(record)?,
            timestamp: crate::util::now_millis(),
        })
    }

    /// Deletion carrying only the owning user for authorization
    pub fn delete(collection: Collection, doc_id: RecordId, user_id: &str) -> Self {
        Self {
            kind: OperationKind::Delete,
            collection,
            doc_id,
            data: serde_json::json!({ "user_id": user_id }),
            timestamp: crate::util::now_millis(),
        }
    }
}

/// A queued, not-yet-confirmed mutation against the remote store
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PendingOperation {
    /// Local sequence number, monotonic per device
    pub id: i64,
    #[serde(rename = "type")]
    pub kind: OperationKind,
    pub collection: Collection,
    pub doc_id: RecordId,
    pub data: serde_json::Value,
    pub timestamp: i64,
    /// Failed remote attempts so far
    #[serde(default)]
    pub attempts: u32,
    #[serde(default)]
    pub last_error: Option<String>,
}
