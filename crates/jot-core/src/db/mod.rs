//! Database layer for Jot

mod connection;
mod migrations;
mod queue;
mod record_repository;

pub use connection::Database;
pub use queue::{OperationQueue, SqliteOperationQueue};
pub use record_repository::{RecordRepository, SqliteRecordRepository};
