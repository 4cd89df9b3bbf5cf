//! jot-core - Core library for Jot
//!
//! This crate contains the record models, the local store with its durable
//! operation queue, the connectivity monitor, remote store adapters and the
//! sync engine shared by every Jot interface.

pub mod analysis;
pub mod config;
pub mod connectivity;
pub mod db;
pub mod error;
pub mod media;
pub mod models;
pub mod remote;
pub mod services;
pub mod sync;
pub mod util;

pub use error::{Error, RemoteFailure, RemoteFailureKind, Result, StorageFailure};
pub use models::{
    Collection, Conversation, Event, Note, NoteKind, OperationKind, PendingOperation, Record,
    RecordId, RecordMeta, SyncConflict, SyncStatus, Task,
};
