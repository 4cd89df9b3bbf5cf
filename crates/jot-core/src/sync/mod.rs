//! Offline synchronization.
//!
//! The [`SyncEngine`] keeps the local store and the remote store eventually
//! consistent. Mutations are applied locally first; mutations that cannot be
//! delivered immediately wait in the durable operation queue until a sync
//! pass drains it on reconnect, on the periodic timer, or on demand.

mod doc_lock;
mod engine;
mod mutation;
mod pull;

use serde::Serialize;

use crate::error::RemoteFailure;

pub use engine::SyncEngine;
pub use pull::PullReport;

/// Lifecycle of a sync engine instance
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EngineState {
    Uninitialized,
    Idle,
    Syncing,
}

/// Outcome of one sync pass
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct PassReport {
    /// Operations sent to the remote store
    pub attempted: usize,
    /// Operations confirmed and removed from the queue
    pub applied: usize,
    /// Operations that failed and stay queued
    pub failed: usize,
    /// Operations not attempted because an earlier one for the same document failed
    pub skipped: usize,
    /// Pass-level failure (the queue could not be read or updated)
    pub error: Option<String>,
}

impl PassReport {
    /// Operations still queued after this pass, from this pass's snapshot
    pub const fn remaining(&self) -> usize {
        self.failed + self.skipped
    }
}

/// How a mutation reached (or will reach) the remote store
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Delivery {
    /// Remote store confirmed the write directly
    Synced,
    /// Queued for a later sync pass
    Queued {
        operation_id: i64,
        /// Direct-write failure that sent the mutation to the queue, if any
        reason: Option<RemoteFailure>,
    },
}

impl Delivery {
    pub const fn is_synced(&self) -> bool {
        matches!(self, Self::Synced)
    }
}

/// Result of an optimistic mutation
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MutationOutcome<R> {
    /// Record as stored locally
    pub record: R,
    pub delivery: Delivery,
}
