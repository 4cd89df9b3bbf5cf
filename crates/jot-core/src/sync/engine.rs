//! Sync engine state machine and queue drain.

use std::collections::HashSet;
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;

use serde_json::Value;
use tokio::runtime::Handle;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use super::doc_lock::DocLocks;
use super::{EngineState, PassReport};
use crate::config::SyncSettings;
use crate::connectivity::{ConnectivityMonitor, Direction, ListenerId};
use crate::error::{RemoteFailure, RemoteFailureKind, Result};
use crate::models::{Collection, OperationKind, PendingOperation, RecordId, SyncStatus};
use crate::remote::{RemoteResult, RemoteStore};
use crate::services::LocalStore;
use crate::util::now_millis;

#[derive(Default)]
struct Lifecycle {
    initialized: bool,
    listeners: Vec<ListenerId>,
    timer: Option<JoinHandle<()>>,
}

pub(super) struct EngineInner {
    pub(super) store: LocalStore,
    pub(super) remote: Arc<dyn RemoteStore>,
    pub(super) connectivity: ConnectivityMonitor,
    sync_interval: Duration,
    pub(super) operation_timeout: Duration,
    in_progress: AtomicBool,
    pub(super) doc_locks: DocLocks,
    status: watch::Sender<SyncStatus>,
    lifecycle: Mutex<Lifecycle>,
}

/// Orchestrates optimistic writes and queue draining.
///
/// One instance per application lifetime; clones share state. At most one
/// sync pass runs at a time per instance.
#[derive(Clone)]
pub struct SyncEngine {
    pub(super) inner: Arc<EngineInner>,
}

/// Clears the in-progress flag when a pass ends, even by panic
struct PassGuard<'a>(&'a AtomicBool);

impl Drop for PassGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

impl SyncEngine {
    pub fn new(
        store: LocalStore,
        remote: Arc<dyn RemoteStore>,
        connectivity: ConnectivityMonitor,
        settings: &SyncSettings,
    ) -> Self {
        let (status, _) = watch::channel(SyncStatus {
            is_online: connectivity.is_online(),
            ..SyncStatus::default()
        });
        Self {
            inner: Arc::new(EngineInner {
                store,
                remote,
                connectivity,
                sync_interval: settings.sync_interval,
                operation_timeout: settings.operation_timeout,
                in_progress: AtomicBool::new(false),
                doc_locks: DocLocks::default(),
                status,
                lifecycle: Mutex::new(Lifecycle::default()),
            }),
        }
    }

    fn lifecycle(&self) -> MutexGuard<'_, Lifecycle> {
        self.inner
            .lifecycle
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    pub fn store(&self) -> &LocalStore {
        &self.inner.store
    }

    pub fn connectivity(&self) -> &ConnectivityMonitor {
        &self.inner.connectivity
    }

    pub fn is_online(&self) -> bool {
        self.inner.connectivity.is_online()
    }

    /// Current lifecycle state
    pub fn state(&self) -> EngineState {
        if self.inner.in_progress.load(Ordering::Acquire) {
            EngineState::Syncing
        } else if self.lifecycle().initialized {
            EngineState::Idle
        } else {
            EngineState::Uninitialized
        }
    }

    /// Snapshot of the sync status
    pub fn status(&self) -> SyncStatus {
        self.inner.status.borrow().clone()
    }

    /// Receiver notified on every status change
    pub fn subscribe_status(&self) -> watch::Receiver<SyncStatus> {
        self.inner.status.subscribe()
    }

    pub(super) fn update_status(&self, update: impl FnOnce(&mut SyncStatus)) {
        self.inner.status.send_modify(update);
    }

    /// Re-read the queue length into the status
    pub async fn refresh_pending_count(&self) -> Result<usize> {
        let count = self.inner.store.count_pending().await?;
        self.update_status(|status| status.pending_count = count);
        Ok(count)
    }

    /// Move from `Uninitialized` to `Idle`.
    ///
    /// Registers connectivity handlers, arms the periodic timer and, when
    /// online, starts a first sync pass in the background. Calling it again
    /// while initialized does nothing.
    pub async fn initialize(&self) -> Result<()> {
        if self.lifecycle().initialized {
            return Ok(());
        }

        self.refresh_pending_count().await?;
        let online = self.is_online();
        self.update_status(|status| status.is_online = online);

        let handle = Handle::current();
        let weak = Arc::downgrade(&self.inner);

        let on_online = {
            let weak = weak.clone();
            let handle = handle.clone();
            self.inner
                .connectivity
                .on_transition(Direction::Online, move || {
                    if let Some(engine) = Self::upgrade(&weak) {
                        engine.update_status(|status| status.is_online = true);
                        tracing::info!("Back online; starting sync pass");
                        engine.spawn_pass(&handle);
                    }
                })
        };
        let on_offline = {
            let weak = weak.clone();
            self.inner
                .connectivity
                .on_transition(Direction::Offline, move || {
                    if let Some(engine) = Self::upgrade(&weak) {
                        engine.update_status(|status| status.is_online = false);
                        tracing::info!("Offline; mutations will be queued");
                    }
                })
        };

        let timer = handle.spawn(Self::run_timer(weak, self.inner.sync_interval));

        {
            let mut lifecycle = self.lifecycle();
            lifecycle.initialized = true;
            lifecycle.listeners = vec![on_online, on_offline];
            lifecycle.timer = Some(timer);
        }
        tracing::debug!(
            "Sync engine initialized (interval {:?}, online {online})",
            self.inner.sync_interval
        );

        if online {
            self.spawn_pass(&handle);
        }
        Ok(())
    }

    /// Unregister connectivity handlers and stop the periodic timer.
    ///
    /// A pass already in flight keeps running to completion.
    pub fn cleanup(&self) {
        let (listeners, timer) = {
            let mut lifecycle = self.lifecycle();
            lifecycle.initialized = false;
            (
                std::mem::take(&mut lifecycle.listeners),
                lifecycle.timer.take(),
            )
        };
        for listener in listeners {
            self.inner.connectivity.remove_listener(listener);
        }
        if let Some(timer) = timer {
            timer.abort();
        }
        tracing::debug!("Sync engine cleaned up");
    }

    fn upgrade(weak: &Weak<EngineInner>) -> Option<Self> {
        weak.upgrade().map(|inner| Self { inner })
    }

    async fn run_timer(weak: Weak<EngineInner>, every: Duration) {
        let mut ticker = tokio::time::interval_at(tokio::time::Instant::now() + every, every);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            let Some(engine) = Self::upgrade(&weak) else {
                break;
            };
            if engine.is_online() {
                tracing::debug!("Periodic sync tick");
                // Passes run as their own task so stopping the timer never
                // interrupts one.
                tokio::spawn(async move {
                    engine.sync_now().await;
                });
            }
        }
    }

    fn spawn_pass(&self, handle: &Handle) {
        let engine = self.clone();
        handle.spawn(async move {
            engine.sync_now().await;
        });
    }

    /// Run one sync pass over the current queue snapshot.
    ///
    /// Returns `None` without touching the queue when another pass is
    /// already running.
    pub async fn sync_now(&self) -> Option<PassReport> {
        if self
            .inner
            .in_progress
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            tracing::debug!("Sync pass already running; trigger ignored");
            return None;
        }
        let _guard = PassGuard(&self.inner.in_progress);

        self.update_status(|status| status.is_syncing = true);
        let report = self.run_pass().await;
        let pending = self.inner.store.count_pending().await.ok();

        self.update_status(|status| {
            status.is_syncing = false;
            if let Some(pending) = pending {
                status.pending_count = pending;
            }
            match &report.error {
                Some(error) => status.sync_error = Some(error.clone()),
                None => {
                    status.last_sync_time = Some(now_millis());
                    status.sync_error = None;
                }
            }
        });

        tracing::info!(
            "Sync pass finished: attempted={} applied={} failed={} skipped={}",
            report.attempted,
            report.applied,
            report.failed,
            report.skipped
        );
        Some(report)
    }

    async fn run_pass(&self) -> PassReport {
        let mut report = PassReport::default();

        let pending = match self.inner.store.list_pending().await {
            Ok(pending) => pending,
            Err(error) => {
                tracing::error!("Sync pass could not read the operation queue: {error}");
                report.error = Some(error.to_string());
                return report;
            }
        };
        if pending.is_empty() {
            return report;
        }

        // Once an operation for a document fails, later ones for the same
        // document wait for the next pass so per-document order holds.
        let mut blocked: HashSet<(Collection, RecordId)> = HashSet::new();

        for operation in pending {
            let key = (operation.collection, operation.doc_id);
            if blocked.contains(&key) {
                tracing::debug!(
                    "Skipping operation {} for {}/{}: earlier operation failed",
                    operation.id,
                    operation.collection,
                    operation.doc_id
                );
                report.skipped += 1;
                continue;
            }

            report.attempted += 1;
            match self.apply_remote(&operation).await {
                Ok(()) => {
                    if let Err(error) = self.inner.store.dequeue(operation.id).await {
                        tracing::error!(
                            "Applied operation {} but could not remove it from the queue: {error}",
                            operation.id
                        );
                        report.error = Some(error.to_string());
                        break;
                    }
                    report.applied += 1;
                    self.update_status(|status| {
                        status.pending_count = status.pending_count.saturating_sub(1);
                    });
                    self.mark_confirmed(&operation).await;
                }
                Err(failure) => {
                    tracing::warn!(
                        "Sync of {} {}/{} (operation {}) failed: {failure}",
                        operation.kind,
                        operation.collection,
                        operation.doc_id,
                        operation.id
                    );
                    report.failed += 1;
                    blocked.insert(key);
                    if let Err(error) = self
                        .inner
                        .store
                        .record_failure(operation.id, &failure.to_string())
                        .await
                    {
                        tracing::warn!("Could not record failure for operation {}: {error}", operation.id);
                    }
                }
            }
        }

        report
    }

    /// Flag the cached record as synced once nothing else is queued for it
    async fn mark_confirmed(&self, operation: &PendingOperation) {
        if operation.kind == OperationKind::Delete {
            return;
        }
        let store = &self.inner.store;
        let result = async {
            if store
                .pending_for_doc(operation.collection, &operation.doc_id)
                .await?
                .is_empty()
            {
                store
                    .mark_synced(operation.collection, &operation.doc_id)
                    .await?;
            }
            Ok::<(), crate::error::Error>(())
        }
        .await;
        if let Err(error) = result {
            tracing::warn!(
                "Could not mark {}/{} as synced: {error}",
                operation.collection,
                operation.doc_id
            );
        }
    }

    /// Dispatch one queued operation to the remote store
    async fn apply_remote(&self, operation: &PendingOperation) -> RemoteResult<()> {
        self.send(
            operation.kind,
            operation.collection,
            &operation.doc_id,
            &operation.data,
        )
        .await
    }

    /// Apply one mutation remotely, bounded by the operation timeout.
    ///
    /// Updates carry the full record, so an update for a document the
    /// remote store never saw is replayed as a create.
    pub(super) async fn send(
        &self,
        kind: OperationKind,
        collection: Collection,
        doc_id: &RecordId,
        data: &Value,
    ) -> RemoteResult<()> {
        let remote = &self.inner.remote;
        let description = format!("{kind} {collection}/{doc_id}");
        self.with_timeout(&description, async {
            match kind {
                OperationKind::Create => remote.create(collection, data.clone()).await.map(drop),
                OperationKind::Update => match remote.update(collection, doc_id, data.clone()).await {
                    Err(failure) if failure.kind == RemoteFailureKind::NotFound => {
                        tracing::debug!("{description}: missing remotely, creating instead");
                        remote.create(collection, data.clone()).await.map(drop)
                    }
                    other => other.map(drop),
                },
                OperationKind::Delete => remote.delete(collection, doc_id, data).await,
            }
        })
        .await
    }

    /// Bound a remote call by the configured operation timeout
    pub(super) async fn with_timeout<T>(
        &self,
        description: &str,
        call: impl Future<Output = RemoteResult<T>>,
    ) -> RemoteResult<T> {
        tokio::time::timeout(self.inner.operation_timeout, call)
            .await
            .unwrap_or_else(|_| {
                Err(RemoteFailure::timeout(format!(
                    "{description} exceeded {:?}",
                    self.inner.operation_timeout
                )))
            })
    }
}

impl Drop for EngineInner {
    fn drop(&mut self) {
        let lifecycle = self
            .lifecycle
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner);
        if let Some(timer) = lifecycle.timer.take() {
            timer.abort();
        }
        for listener in std::mem::take(&mut lifecycle.listeners) {
            self.connectivity.remove_listener(listener);
        }
    }
}
