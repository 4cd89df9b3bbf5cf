use std::io;

use jot_core::config::ConfigError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Core(#[from] jot_core::Error),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error(transparent)]
    Serialization(#[from] serde_json::Error),
    #[error("No note content provided")]
    EmptyContent,
    #[error("Note ID cannot be empty")]
    EmptyNoteId,
    #[error("Remote store is not configured. Set JOT_REMOTE_URL (and JOT_REMOTE_TOKEN) or add remote_url to the config file.")]
    RemoteNotConfigured,
    #[error("Sync failed: {0}")]
    SyncFailed(String),
    #[error("Remote store is unreachable; queued changes stay local until the next sync")]
    Offline,
}
