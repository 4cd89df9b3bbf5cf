//! Shared services used across clients.

mod local_store;
mod notes;

pub use local_store::LocalStore;
pub use notes::{NoteService, DEFAULT_ANALYSIS_TIMEOUT};
