//! Error types for jot-core

use std::fmt;

use thiserror::Error;

/// Result type alias using jot-core's Error
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in jot-core operations
#[derive(Error, Debug)]
pub enum Error {
    /// Local persistence failed
    #[error("Storage failure: {0}")]
    Storage(#[from] StorageFailure),

    /// Remote store call failed
    #[error("Remote failure: {0}")]
    Remote(#[from] RemoteFailure),

    /// Record not found
    #[error("Record not found: {0}")]
    NotFound(String),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl From<rusqlite::Error> for Error {
    fn from(error: rusqlite::Error) -> Self {
        Self::Storage(StorageFailure::Sqlite(error))
    }
}

impl From<std::io::Error> for Error {
    fn from(error: std::io::Error) -> Self {
        Self::Storage(StorageFailure::Io(error))
    }
}

impl Error {
    /// Returns the remote failure when this error came from the remote store.
    pub const fn as_remote(&self) -> Option<&RemoteFailure> {
        match self {
            Self::Remote(failure) => Some(failure),
            _ => None,
        }
    }
}

/// Local persistence unavailable, corrupt, or over quota.
///
/// Surfaced to the caller and never retried automatically.
#[derive(Error, Debug)]
pub enum StorageFailure {
    /// SQLite error
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// A stored payload could not be decoded
    #[error("Corrupt stored payload: {0}")]
    Corrupt(String),
}

/// Category of a remote store failure.
///
/// The sync engine does not differentiate between kinds when draining the
/// queue; the kind exists for logging and for callers of the direct path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemoteFailureKind {
    Network,
    Timeout,
    PermissionDenied,
    NotFound,
    Invalid,
    Unavailable,
}

impl fmt::Display for RemoteFailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Network => "network",
            Self::Timeout => "timeout",
            Self::PermissionDenied => "permission denied",
            Self::NotFound => "not found",
            Self::Invalid => "invalid request",
            Self::Unavailable => "unavailable",
        };
        f.write_str(label)
    }
}

/// Any failure calling the remote store.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{kind}: {message}")]
pub struct RemoteFailure {
    pub kind: RemoteFailureKind,
    pub message: String,
}

impl RemoteFailure {
    pub fn new(kind: RemoteFailureKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn network(message: impl Into<String>) -> Self {
        Self::new(RemoteFailureKind::Network, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(RemoteFailureKind::NotFound, message)
    }

    pub fn timeout(message: impl Into<String>) -> Self {
        Self::new(RemoteFailureKind::Timeout, message)
    }
}
