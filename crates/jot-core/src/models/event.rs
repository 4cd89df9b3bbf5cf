//! Calendar event model

use serde::{Deserialize, Serialize};

use super::record::{Collection, Record, RecordMeta};

/// A scheduled event
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    #[serde(flatten)]
    pub meta: RecordMeta,
    pub title: String,
    /// Start timestamp (Unix ms)
    pub starts_at: i64,
    /// End timestamp (Unix ms)
    #[serde(default)]
    pub ends_at: Option<i64>,
    #[serde(default)]
    pub location: Option<String>,
}

impl Event {
    #[must_use]
    pub fn new(user_id: impl Into<String>, title: impl Into<String>, starts_at: i64) -> Self {
        Self {
            meta: RecordMeta::new(user_id),
            title: title.into(),
            starts_at,
            ends_at: None,
            location: None,
        }
    }
}

impl Record for Event {
    const COLLECTION: Collection = Collection::Events;

    fn meta(&self) -> &RecordMeta {
        &self.meta
    }

    fn meta_mut(&mut self) -> &mut RecordMeta {
        &mut self.meta
    }
}
