//! Data models for Jot

mod conversation;
mod event;
mod note;
mod pending;
mod record;
mod status;
mod sync_conflict;
mod task;

pub use conversation::{Conversation, ConversationMessage};
pub use event::Event;
pub use note::{extract_tags, NewNote, Note, NoteKind, NotePatch};
pub use pending::{NewOperation, OperationKind, PendingOperation};
pub use record::{Collection, Record, RecordId, RecordMeta};
pub use status::{SyncState, SyncStatus};
pub use sync_conflict::SyncConflict;
pub use task::Task;
