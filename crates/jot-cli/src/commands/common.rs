use std::env;
use std::io::{self, IsTerminal, Read};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use jot_core::config::SyncSettings;
use jot_core::connectivity::{is_reachable, ConnectivityMonitor};
use jot_core::remote::{HttpRemoteStore, RemoteStore};
use jot_core::services::{LocalStore, NoteService};
use jot_core::sync::SyncEngine;
use jot_core::{Note, PendingOperation, SyncConflict};
use serde::Serialize;

use crate::error::CliError;
use crate::local_only::LocalOnlyRemote;

/// Default owner when neither `--user` nor `JOT_USER_ID` is set
pub const DEFAULT_USER_ID: &str = "local";

const PROBE_TIMEOUT: Duration = Duration::from_secs(3);

/// Flags shared by every command
#[derive(Debug, Clone, Default)]
pub struct GlobalOptions {
    pub db_path: Option<PathBuf>,
    pub config_path: Option<PathBuf>,
    pub user: Option<String>,
    pub offline: bool,
}

/// Everything a command needs: the owning user and the note service
pub struct AppContext {
    pub user_id: String,
    pub notes: NoteService,
    pub remote_configured: bool,
}

impl AppContext {
    pub const fn engine(&self) -> &SyncEngine {
        self.notes.engine()
    }

    /// Fail unless a remote store is configured and reachable
    pub fn require_remote(&self) -> Result<(), CliError> {
        if !self.remote_configured {
            return Err(CliError::RemoteNotConfigured);
        }
        if !self.engine().is_online() {
            return Err(CliError::Offline);
        }
        Ok(())
    }
}

#[derive(Debug, Serialize)]
pub struct NoteListItem {
    pub id: String,
    pub kind: String,
    pub preview: String,
    pub content: String,
    pub created_at: i64,
    pub updated_at: i64,
    pub relative_time: String,
    pub synced: bool,
    pub tags: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct QueueItem {
    pub id: i64,
    #[serde(rename = "type")]
    pub kind: String,
    pub collection: String,
    pub doc_id: String,
    pub timestamp: i64,
    pub attempts: u32,
    pub last_error: Option<String>,
}

pub async fn open_context(options: &GlobalOptions) -> Result<AppContext, CliError> {
    let settings = SyncSettings::load(options.config_path.as_deref())?;
    let db_path = resolve_db_path(options.db_path.clone());
    let store = LocalStore::open_path(&db_path)?;
    let user_id = resolve_user_id(options.user.clone(), |key| env::var(key).ok());

    let (remote, online, remote_configured): (Arc<dyn RemoteStore>, bool, bool) =
        match settings.remote_url.as_deref() {
            Some(url) => {
                let remote = HttpRemoteStore::new(url, settings.remote_token.clone())
                    .map_err(jot_core::Error::from)?;
                let online = !options.offline
                    && settings.start_online
                    && is_reachable(url, PROBE_TIMEOUT).await;
                (Arc::new(remote), online, true)
            }
            None => {
                tracing::debug!("No remote store configured; running local-only");
                (Arc::new(LocalOnlyRemote), false, false)
            }
        };

    let engine = SyncEngine::new(
        store,
        remote,
        ConnectivityMonitor::new(online),
        &settings,
    );
    engine.refresh_pending_count().await?;

    Ok(AppContext {
        user_id,
        notes: NoteService::new(engine),
        remote_configured,
    })
}

pub fn resolve_db_path(cli_db_path: Option<PathBuf>) -> PathBuf {
    cli_db_path
        .or_else(|| env::var_os("JOT_DB_PATH").map(PathBuf::from))
        .unwrap_or_else(default_db_path)
}

pub fn default_db_path() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("jot")
        .join("jot.db")
}

pub fn resolve_user_id(flag: Option<String>, lookup: impl Fn(&str) -> Option<String>) -> String {
    flag.and_then(|user| normalize_content(&user))
        .or_else(|| lookup("JOT_USER_ID").and_then(|user| normalize_content(&user)))
        .unwrap_or_else(|| DEFAULT_USER_ID.to_string())
}

pub fn resolve_note_content(content_parts: &[String]) -> Result<String, CliError> {
    if let Some(content) = normalize_content(&content_parts.join(" ")) {
        return Ok(content);
    }

    if let Some(content) = read_piped_stdin()? {
        return Ok(content);
    }

    Err(CliError::EmptyContent)
}

pub fn normalize_content(content: &str) -> Option<String> {
    let trimmed = content.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

pub fn normalize_note_identifier(id: &str) -> Result<String, CliError> {
    normalize_content(id).ok_or(CliError::EmptyNoteId)
}

pub fn read_piped_stdin() -> Result<Option<String>, CliError> {
    let stdin = io::stdin();
    if stdin.is_terminal() {
        return Ok(None);
    }

    let mut buffer = String::new();
    stdin.lock().read_to_string(&mut buffer)?;
    Ok(normalize_content(&buffer))
}

pub fn format_note_lines(notes: &[Note]) -> Vec<String> {
    let now_ms = Utc::now().timestamp_millis();
    notes
        .iter()
        .map(|note| {
            let short_id = short_id(&note.meta.id.to_string());
            let preview = note_preview(note, 40);
            let relative_time = format_relative_time(note.meta.updated_at, now_ms);
            let marker = if note.meta.synced { ' ' } else { '*' };
            let tags = render_tags(note);

            if tags.is_empty() {
                format!("{short_id:<13}{marker} {preview:<40}  {relative_time}")
            } else {
                format!("{short_id:<13}{marker} {preview:<40}  {relative_time:<10}  {tags}")
            }
        })
        .collect()
}

pub fn note_to_list_item(note: &Note) -> NoteListItem {
    let now_ms = Utc::now().timestamp_millis();
    NoteListItem {
        id: note.meta.id.to_string(),
        kind: note.kind.as_str().to_string(),
        preview: note_preview(note, 80),
        content: note.content.clone(),
        created_at: note.meta.created_at,
        updated_at: note.meta.updated_at,
        relative_time: format_relative_time(note.meta.updated_at, now_ms),
        synced: note.meta.synced,
        tags: note.tags.clone(),
    }
}

pub fn operation_to_queue_item(operation: &PendingOperation) -> QueueItem {
    QueueItem {
        id: operation.id,
        kind: operation.kind.to_string(),
        collection: operation.collection.to_string(),
        doc_id: operation.doc_id.to_string(),
        timestamp: operation.timestamp,
        attempts: operation.attempts,
        last_error: operation.last_error.clone(),
    }
}

pub fn short_id(id: &str) -> String {
    id.chars().take(13).collect()
}

pub fn note_preview(note: &Note, max_chars: usize) -> String {
    let source = if note.title.trim().is_empty() {
        note.content.lines().next().unwrap_or("")
    } else {
        note.title.as_str()
    };
    let collapsed = source.split_whitespace().collect::<Vec<_>>().join(" ");

    if collapsed.chars().count() <= max_chars {
        collapsed
    } else {
        let take_len = max_chars.saturating_sub(3);
        let mut truncated = collapsed.chars().take(take_len).collect::<String>();
        truncated.push_str("...");
        truncated
    }
}

pub fn render_tags(note: &Note) -> String {
    note.tags
        .iter()
        .map(|tag| format!("#{tag}"))
        .collect::<Vec<String>>()
        .join(" ")
}

pub fn format_queue_lines(operations: &[PendingOperation]) -> Vec<String> {
    operations
        .iter()
        .map(|operation| {
            let base = format!(
                "{:>5}  {:<6}  {}/{}  {}",
                operation.id,
                operation.kind,
                operation.collection,
                short_id(&operation.doc_id.to_string()),
                format_timestamp(operation.timestamp)
            );
            match &operation.last_error {
                Some(error) => format!("{base}  attempts={} last_error={error}", operation.attempts),
                None => base,
            }
        })
        .collect()
}

pub fn format_conflict_lines(conflicts: &[SyncConflict]) -> Vec<String> {
    conflicts
        .iter()
        .map(|conflict| {
            format!(
                "{}  {:<4}  {}/{}  local={} incoming={}",
                format_timestamp(conflict.resolved_at),
                conflict.strategy,
                conflict.collection,
                conflict.doc_id,
                conflict.local_updated_at,
                conflict.incoming_updated_at
            )
        })
        .collect()
}

pub fn format_timestamp(timestamp_ms: i64) -> String {
    chrono::DateTime::from_timestamp_millis(timestamp_ms).map_or_else(
        || timestamp_ms.to_string(),
        |date_time| date_time.format("%Y-%m-%d %H:%M:%S UTC").to_string(),
    )
}

pub fn format_relative_time(timestamp_ms: i64, now_ms: i64) -> String {
    let diff = now_ms.saturating_sub(timestamp_ms);
    let minute = 60_000;
    let hour = 60 * minute;
    let day = 24 * hour;
    let week = 7 * day;

    if diff < minute {
        "just now".to_string()
    } else if diff < hour {
        format!("{}m ago", diff / minute)
    } else if diff < day {
        format!("{}h ago", diff / hour)
    } else if diff < week {
        format!("{}d ago", diff / day)
    } else {
        format!("{}w ago", diff / week)
    }
}
