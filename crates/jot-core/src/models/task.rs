//! Task model

use serde::{Deserialize, Serialize};

use super::record::{Collection, Record, RecordMeta};

/// A to-do item
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    #[serde(flatten)]
    pub meta: RecordMeta,
    pub title: String,
    #[serde(default)]
    pub done: bool,
    /// Due timestamp (Unix ms)
    #[serde(default)]
    pub due_at: Option<i64>,
}

impl Task {
    #[must_use]
    pub fn new(user_id: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            meta: RecordMeta::new(user_id),
            title: title.into(),
            done: false,
            due_at: None,
        }
    }
}

impl Record for Task {
    const COLLECTION: Collection = Collection::Tasks;

    fn meta(&self) -> &RecordMeta {
        &self.meta
    }

    fn meta_mut(&mut self) -> &mut RecordMeta {
        &mut self.meta
    }
}
