//! Sync status reported to UI surfaces

use serde::Serialize;

/// Coarse sync state used for labels and indicators
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncState {
    Offline,
    Syncing,
    Synced,
    Pending,
    Error,
}

/// Ephemeral sync status owned by the sync engine; readers only observe it.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct SyncStatus {
    pub is_online: bool,
    pub is_syncing: bool,
    pub pending_count: usize,
    /// Completion time of the last successful pass (Unix ms)
    pub last_sync_time: Option<i64>,
    pub sync_error: Option<String>,
}

impl SyncStatus {
    pub const fn state(&self) -> SyncState {
        if self.is_syncing {
            SyncState::Syncing
        } else if !self.is_online {
            SyncState::Offline
        } else if self.sync_error.is_some() {
            SyncState::Error
        } else if self.pending_count > 0 {
            SyncState::Pending
        } else {
            SyncState::Synced
        }
    }

    /// Human-readable summary
    pub fn label(&self) -> String {
        match self.state() {
            SyncState::Offline => format!("Offline, {} pending", self.pending_count),
            SyncState::Syncing => "Syncing...".to_string(),
            SyncState::Synced => "Up to date".to_string(),
            SyncState::Pending => format!("{} changes waiting to sync", self.pending_count),
            SyncState::Error => format!(
                "Sync error: {}",
                self.sync_error.as_deref().unwrap_or("unknown")
            ),
        }
    }
}
