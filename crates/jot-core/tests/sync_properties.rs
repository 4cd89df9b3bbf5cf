//! End-to-end behaviour of the sync engine against the in-memory remote store.

use std::sync::Arc;
use std::time::Duration;

use pretty_assertions::assert_eq;

use jot_core::config::SyncSettings;
use jot_core::connectivity::ConnectivityMonitor;
use jot_core::models::{Collection, NewNote, NewOperation, Note, NotePatch, OperationKind, Task};
use jot_core::remote::{MemoryRemoteStore, RemoteOp};
use jot_core::services::{LocalStore, NoteService};
use jot_core::sync::{Delivery, SyncEngine};

fn engine(remote: &MemoryRemoteStore, online: bool) -> SyncEngine {
    SyncEngine::new(
        LocalStore::open_in_memory().unwrap(),
        Arc::new(remote.clone()),
        ConnectivityMonitor::new(online),
        &SyncSettings::default(),
    )
}

#[tokio::test(flavor = "multi_thread")]
async fn same_document_operations_apply_in_enqueue_order() {
    let remote = MemoryRemoteStore::new();
    let engine = engine(&remote, false);

    let mut note = Note::new("user-1", NewNote::text("v0", ""));
    engine.save(note.clone(), OperationKind::Create).await.unwrap();
    for version in 1..=4 {
        note.apply(NotePatch {
            title: Some(format!("v{version}")),
            ..NotePatch::default()
        });
        engine.save(note.clone(), OperationKind::Update).await.unwrap();
    }
    engine.delete(Collection::Notes, &note.meta.id, "user-1").await.unwrap();

    let report = engine.sync_now().await.unwrap();
    assert_eq!(report.applied, 6);

    let ops: Vec<RemoteOp> = remote.write_calls().iter().map(|call| call.op).collect();
    assert_eq!(
        ops,
        vec![
            RemoteOp::Create,
            RemoteOp::Update,
            RemoteOp::Update,
            RemoteOp::Update,
            RemoteOp::Update,
            RemoteOp::Delete,
        ]
    );
    assert!(remote.is_empty(Collection::Notes));
}

#[tokio::test(flavor = "multi_thread")]
async fn final_remote_state_matches_last_queued_update() {
    let remote = MemoryRemoteStore::new();
    let engine = engine(&remote, false);

    let mut note = Note::new("user-1", NewNote::text("draft", ""));
    engine.save(note.clone(), OperationKind::Create).await.unwrap();
    note.apply(NotePatch {
        content: Some("final".to_string()),
        ..NotePatch::default()
    });
    engine.save(note.clone(), OperationKind::Update).await.unwrap();

    engine.sync_now().await.unwrap();
    let document = remote.document(Collection::Notes, &note.meta.id).unwrap();
    assert_eq!(document["content"], "final");
    assert_eq!(document["updated_at"], note.meta.updated_at);
}

#[tokio::test(flavor = "multi_thread")]
async fn concurrent_triggers_run_a_single_pass() {
    let remote = MemoryRemoteStore::new();
    remote.set_latency(Some(Duration::from_millis(50)));
    let engine = engine(&remote, false);
    for index in 0..3 {
        let note = Note::new("user-1", NewNote::text(format!("n{index}"), ""));
        engine.save(note, OperationKind::Create).await.unwrap();
    }

    let triggers: Vec<_> = (0..8)
        .map(|_| {
            let engine = engine.clone();
            tokio::spawn(async move { engine.sync_now().await })
        })
        .collect();
    let mut reports = Vec::new();
    for trigger in triggers {
        if let Some(report) = trigger.await.unwrap() {
            reports.push(report);
        }
    }

    let applied: usize = reports.iter().map(|report| report.applied).sum();
    assert_eq!(applied, 3);
    assert_eq!(remote.write_calls().len(), 3);
    assert_eq!(engine.store().count_pending().await.unwrap(), 0);
}

#[tokio::test(flavor = "multi_thread")]
async fn failing_operation_does_not_block_other_documents() {
    let remote = MemoryRemoteStore::new();
    let engine = engine(&remote, false);
    let first = Note::new("user-1", NewNote::text("O1", ""));
    let second = Note::new("user-1", NewNote::text("O2", ""));
    engine.save(first.clone(), OperationKind::Create).await.unwrap();
    engine.save(second.clone(), OperationKind::Create).await.unwrap();
    remote.fail_doc(&first.meta.id);

    engine.sync_now().await.unwrap();

    let pending = engine.store().list_pending().await.unwrap();
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].doc_id, first.meta.id);
    assert_eq!(engine.status().pending_count, 1);
    assert!(remote.document(Collection::Notes, &second.meta.id).is_some());
}

#[tokio::test(flavor = "multi_thread")]
async fn dequeue_twice_is_harmless() {
    let remote = MemoryRemoteStore::new();
    let engine = engine(&remote, false);
    let removed = Note::new("user-1", NewNote::text("A", ""));
    let kept = Note::new("user-1", NewNote::text("B", ""));
    let first = engine
        .store()
        .put_and_enqueue(&removed, &NewOperation::upsert(OperationKind::Create, &removed).unwrap())
        .await
        .unwrap();
    engine
        .store()
        .put_and_enqueue(&kept, &NewOperation::upsert(OperationKind::Create, &kept).unwrap())
        .await
        .unwrap();

    engine.store().dequeue(first.id).await.unwrap();
    engine.store().dequeue(first.id).await.unwrap();
    assert_eq!(engine.store().count_pending().await.unwrap(), 1);
}

#[tokio::test(flavor = "multi_thread")]
async fn offline_create_round_trips_after_reconnect() {
    let remote = MemoryRemoteStore::new();
    let engine = engine(&remote, false);
    engine.initialize().await.unwrap();
    let notes = NoteService::new(engine.clone());

    let outcome = notes
        .create_note("user-1", NewNote::text("A", "hi"))
        .await
        .unwrap();
    notes.wait_for_enrichment().await;

    let local = notes.list_notes("user-1").await.unwrap();
    assert_eq!(local.len(), 1);
    assert!(!local[0].meta.synced);
    let pending = engine.store().list_pending().await.unwrap();
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].kind, OperationKind::Create);
    assert_eq!(engine.status().pending_count, 1);

    let mut status = engine.subscribe_status();
    engine.connectivity().set_online(true);
    tokio::time::timeout(
        Duration::from_secs(5),
        status.wait_for(|status| status.pending_count == 0 && status.last_sync_time.is_some()),
    )
    .await
    .unwrap()
    .unwrap();

    let remote_copy = remote
        .document(Collection::Notes, &outcome.record.meta.id)
        .unwrap();
    assert_eq!(remote_copy["id"], outcome.record.meta.id.as_str());
    assert_eq!(remote_copy["title"], "A");
    let local: Note = engine
        .store()
        .get(&outcome.record.meta.id)
        .await
        .unwrap()
        .unwrap();
    assert!(local.meta.synced);
    engine.cleanup();
}

#[tokio::test(flavor = "multi_thread")]
async fn always_failing_record_stays_queued_while_the_other_applies() {
    let remote = MemoryRemoteStore::new();
    let engine = engine(&remote, false);
    let notes = NoteService::new(engine.clone());

    let doomed = notes
        .create_note("user-1", NewNote::text("doomed", ""))
        .await
        .unwrap()
        .record;
    let fine = notes
        .create_note("user-1", NewNote::text("fine", ""))
        .await
        .unwrap()
        .record;
    notes.wait_for_enrichment().await;
    remote.fail_doc(&doomed.meta.id);
    engine.connectivity().set_online(true);

    for _ in 0..3 {
        engine.sync_now().await.unwrap();
    }

    assert_eq!(engine.status().pending_count, 1);
    let pending = engine.store().list_pending().await.unwrap();
    assert_eq!(pending[0].doc_id, doomed.meta.id);
    assert_eq!(pending[0].attempts, 3);
    assert!(pending[0].last_error.is_some());
    assert!(remote.document(Collection::Notes, &fine.meta.id).is_some());
}

#[tokio::test(flavor = "multi_thread")]
async fn overlapping_sync_calls_apply_each_operation_once() {
    let remote = MemoryRemoteStore::new();
    remote.set_latency(Some(Duration::from_millis(100)));
    let engine = engine(&remote, false);
    let note = Note::new("user-1", NewNote::text("A", ""));
    engine.save(note.clone(), OperationKind::Create).await.unwrap();

    let (first, second) = tokio::join!(engine.sync_now(), engine.sync_now());
    assert!(first.is_some() != second.is_some());

    assert_eq!(remote.write_calls().len(), 1);
    assert_eq!(engine.store().count_pending().await.unwrap(), 0);
}

#[tokio::test(flavor = "multi_thread")]
async fn queue_survives_an_engine_restart() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("jot.db");
    let remote = MemoryRemoteStore::new();
    let task = Task::new("user-1", "file taxes");

    {
        let engine = SyncEngine::new(
            LocalStore::open_path(&path).unwrap(),
            Arc::new(remote.clone()),
            ConnectivityMonitor::new(false),
            &SyncSettings::default(),
        );
        let outcome = engine.save(task.clone(), OperationKind::Create).await.unwrap();
        assert!(matches!(outcome.delivery, Delivery::Queued { reason: None, .. }));
    }

    let engine = SyncEngine::new(
        LocalStore::open_path(&path).unwrap(),
        Arc::new(remote.clone()),
        ConnectivityMonitor::new(true),
        &SyncSettings::default(),
    );
    assert_eq!(engine.refresh_pending_count().await.unwrap(), 1);
    engine.sync_now().await.unwrap();
    assert!(remote.document(Collection::Tasks, &task.meta.id).is_some());
}
