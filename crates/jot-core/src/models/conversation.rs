//! Assistant conversation model

use serde::{Deserialize, Serialize};

use super::record::{Collection, Record, RecordMeta};

/// One turn in a conversation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationMessage {
    /// `user` or `assistant`
    pub role: String,
    pub content: String,
    /// Send timestamp (Unix ms)
    pub sent_at: i64,
}

/// A chat thread with the assistant
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Conversation {
    #[serde(flatten)]
    pub meta: RecordMeta,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub messages: Vec<ConversationMessage>,
}

impl Conversation {
    #[must_use]
    pub fn new(user_id: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            meta: RecordMeta::new(user_id),
            title: title.into(),
            messages: Vec::new(),
        }
    }

    /// Append a message and bump `updated_at`
    pub fn push_message(&mut self, role: impl Into<String>, content: impl Into<String>) {
        self.meta.touch();
        self.messages.push(ConversationMessage {
            role: role.into(),
            content: content.into(),
            sent_at: self.meta.updated_at,
        });
    }
}

impl Record for Conversation {
    const COLLECTION: Collection = Collection::Conversations;

    fn meta(&self) -> &RecordMeta {
        &self.meta
    }

    fn meta_mut(&mut self) -> &mut RecordMeta {
        &mut self.meta
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn push_message_records_turn() {
        let mut conversation = Conversation::new("user-1", "Planning");
        conversation.push_message("user", "what is due today?");
        assert_eq!(conversation.messages.len(), 1);
        assert_eq!(conversation.messages[0].sent_at, conversation.meta.updated_at);
    }
}
