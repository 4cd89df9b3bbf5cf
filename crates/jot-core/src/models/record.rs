//! Shared record identity and metadata

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::error::Error;

/// A unique identifier for a record, using UUID v7 (time-sortable).
///
/// Assigned locally at creation time so the same id is valid before and
/// after the remote store confirms the write.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RecordId(Uuid);

impl RecordId {
    /// Create a new unique record ID using UUID v7
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }

    /// Get the string representation of this ID
    #[must_use]
    pub fn as_str(&self) -> String {
        self.0.to_string()
    }
}

impl Default for RecordId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for RecordId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

/// Record families mirrored between the local store and the remote store
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Collection {
    Notes,
    Tasks,
    Events,
    Conversations,
}

impl Collection {
    pub const ALL: [Self; 4] = [Self::Notes, Self::Tasks, Self::Events, Self::Conversations];

    /// Collection name, also used as the local table name
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Notes => "notes",
            Self::Tasks => "tasks",
            Self::Events => "events",
            Self::Conversations => "conversations",
        }
    }
}

impl fmt::Display for Collection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Collection {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|collection| collection.as_str() == s)
            .ok_or_else(|| Error::InvalidInput(format!("unknown collection: {s}")))
    }
}

/// Fields every cached record carries
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordMeta {
    /// Unique identifier
    pub id: RecordId,
    /// Owning user
    pub user_id: String,
    /// Creation timestamp (Unix ms)
    pub created_at: i64,
    /// Last update timestamp (Unix ms)
    pub updated_at: i64,
    /// Whether the remote store has confirmed the latest local state
    #[serde(default)]
    pub synced: bool,
}

impl RecordMeta {
    /// Fresh, unsynced metadata owned by `user_id`
    #[must_use]
    pub fn new(user_id: impl Into<String>) -> Self {
        let now = crate::util::now_millis();
        Self {
            id: RecordId::new(),
            user_id: user_id.into(),
            created_at: now,
            updated_at: now,
            synced: false,
        }
    }

    /// Bump `updated_at` and mark the record as not yet confirmed remotely.
    ///
    /// `updated_at` never moves backwards, even if the wall clock does.
    pub fn touch(&mut self) {
        self.updated_at = crate::util::now_millis().max(self.updated_at);
        self.synced = false;
    }
}

/// A domain entity cached locally and mirrored remotely
pub trait Record: Serialize + DeserializeOwned + Clone + Send + Sync + 'static {
    /// Record family this type belongs to
    const COLLECTION: Collection;

    fn meta(&self) -> &RecordMeta;

    fn meta_mut(&mut self) -> &mut RecordMeta;

    fn id(&self) -> RecordId {
        self.meta().id
    }
}
