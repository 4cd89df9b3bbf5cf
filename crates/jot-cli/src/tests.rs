use clap::Parser;
use jot_core::models::{NewNote, NewOperation, OperationKind};
use jot_core::sync::{Delivery, PullReport};
use jot_core::{Note, PendingOperation, SyncConflict};

use crate::cli::{Cli, Commands, NoteKindArg};
use crate::commands::common::{
    format_conflict_lines, format_note_lines, format_queue_lines, format_relative_time,
    format_timestamp, normalize_content, normalize_note_identifier, note_preview, open_context,
    resolve_user_id, GlobalOptions, DEFAULT_USER_ID,
};
use crate::commands::sync::format_pull_line;
use crate::error::CliError;

fn test_options(dir: &tempfile::TempDir) -> GlobalOptions {
    GlobalOptions {
        db_path: Some(dir.path().join("jot.db")),
        config_path: Some(dir.path().join("missing-config.json")),
        user: Some("tester".to_string()),
        offline: true,
    }
}

#[test]
fn normalize_content_trims_and_rejects_empty() {
    assert_eq!(normalize_content("  hello  "), Some("hello".to_string()));
    assert_eq!(normalize_content(" \n\t "), None);
}

#[test]
fn normalize_note_identifier_rejects_blank() {
    assert!(matches!(
        normalize_note_identifier("   "),
        Err(CliError::EmptyNoteId)
    ));
    assert_eq!(normalize_note_identifier(" 0192 ").unwrap(), "0192");
}

#[test]
fn user_id_prefers_flag_then_env_then_default() {
    let env = |key: &str| (key == "JOT_USER_ID").then(|| "from-env".to_string());
    assert_eq!(resolve_user_id(Some("flag".to_string()), env), "flag");
    assert_eq!(resolve_user_id(None, env), "from-env");
    assert_eq!(resolve_user_id(Some("  ".to_string()), |_| None), DEFAULT_USER_ID);
}

#[test]
fn format_relative_time_units() {
    let now = 10_000_000_000;
    assert_eq!(format_relative_time(now - 30_000, now), "just now");
    assert_eq!(format_relative_time(now - 120_000, now), "2m ago");
    assert_eq!(format_relative_time(now - 2 * 60 * 60_000, now), "2h ago");
    assert_eq!(format_relative_time(now - 3 * 24 * 60 * 60_000, now), "3d ago");
}

#[test]
fn format_timestamp_returns_utc_label() {
    assert_eq!(format_timestamp(0), "1970-01-01 00:00:00 UTC");
}

#[test]
fn note_preview_prefers_title_and_truncates() {
    let note = Note::new(
        "u",
        NewNote::text("", "This is a very long sentence that should be shortened"),
    );
    assert_eq!(note_preview(&note, 20), "This is a very lo...");

    let titled = Note::new("u", NewNote::text("Title", "body"));
    assert_eq!(note_preview(&titled, 20), "Title");
}

#[test]
fn unsynced_notes_are_marked_in_listings() {
    let mut note = Note::new("u", NewNote::text("pending", ""));
    note.tags = vec!["work".to_string()];
    let lines = format_note_lines(&[note]);
    assert!(lines[0].contains('*'));
    assert!(lines[0].ends_with("#work"));
}

#[test]
fn queue_lines_show_failures() {
    let note = Note::new("u", NewNote::text("a", ""));
    let operation = NewOperation::upsert(OperationKind::Create, &note).unwrap();
    let pending = PendingOperation {
        id: 7,
        kind: operation.kind,
        collection: operation.collection,
        doc_id: operation.doc_id,
        data: operation.data,
        timestamp: 0,
        attempts: 2,
        last_error: Some("network: down".to_string()),
    };

    let lines = format_queue_lines(&[pending]);
    assert!(lines[0].contains("create"));
    assert!(lines[0].contains("notes/"));
    assert!(lines[0].contains("attempts=2 last_error=network: down"));
}

#[test]
fn conflict_lines_include_key_fields() {
    let conflicts = vec![SyncConflict {
        id: 1,
        collection: "notes".to_string(),
        doc_id: "11111111-1111-7111-8111-111111111111".to_string(),
        local_updated_at: 200,
        incoming_updated_at: 100,
        resolved_at: 300,
        strategy: "lww".to_string(),
    }];

    let rendered = format_conflict_lines(&conflicts);
    assert_eq!(rendered.len(), 1);
    assert!(rendered[0].contains("lww"));
    assert!(rendered[0].contains("notes/11111111-1111-7111-8111-111111111111"));
    assert!(rendered[0].contains("local=200"));
    assert!(rendered[0].contains("incoming=100"));
}

#[test]
fn pull_line_lists_counts() {
    let report = PullReport {
        fetched: 3,
        applied: 2,
        kept_local: 1,
    };
    assert_eq!(
        format_pull_line("notes", &report),
        "notes          fetched=3 applied=2 kept_local=1"
    );
}

#[test]
fn quick_capture_and_subcommands_parse() {
    let cli = Cli::try_parse_from(["jot", "buy", "milk"]).unwrap();
    assert!(cli.command.is_none());
    assert_eq!(cli.note, vec!["buy".to_string(), "milk".to_string()]);

    let cli = Cli::try_parse_from(["jot", "--offline", "add", "--kind", "audio", "memo"]).unwrap();
    assert!(cli.offline);
    match cli.command {
        Some(Commands::Add { kind, content, .. }) => {
            assert_eq!(kind, NoteKindArg::Audio);
            assert_eq!(content, vec!["memo".to_string()]);
        }
        _ => panic!("expected add"),
    }

    let cli = Cli::try_parse_from(["jot", "queue", "--json", "--user", "alice"]).unwrap();
    assert_eq!(cli.user.as_deref(), Some("alice"));
    assert!(matches!(cli.command, Some(Commands::Queue { json: true })));
}

#[tokio::test(flavor = "multi_thread")]
async fn local_only_context_queues_mutations() {
    let dir = tempfile::tempdir().unwrap();
    let options = test_options(&dir);

    let context = open_context(&options).await.unwrap();
    assert_eq!(context.user_id, "tester");
    assert!(!context.engine().is_online());

    let outcome = context
        .notes
        .create_note(&context.user_id, NewNote::text("offline", "#later"))
        .await
        .unwrap();
    context.notes.wait_for_enrichment().await;
    assert!(matches!(outcome.delivery, Delivery::Queued { .. }));
    assert!(matches!(
        context.require_remote(),
        Err(CliError::RemoteNotConfigured)
    ));

    drop(context);
    let reopened = open_context(&options).await.unwrap();
    let notes = reopened.notes.list_notes("tester").await.unwrap();
    assert_eq!(notes.len(), 1);
    assert_eq!(notes[0].tags, vec!["later".to_string()]);
    // create plus the tag update from analysis
    assert_eq!(reopened.engine().status().pending_count, 2);
}
