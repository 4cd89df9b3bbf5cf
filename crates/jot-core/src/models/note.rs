//! Note model

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::sync::OnceLock;

use super::record::{Collection, Record, RecordMeta};

/// Capture format of a note
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum NoteKind {
    #[default]
    Text,
    Audio,
    Image,
    Video,
}

impl NoteKind {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::Audio => "audio",
            Self::Image => "image",
            Self::Video => "video",
        }
    }

    /// Whether notes of this kind carry media that can be transcribed
    pub const fn has_media(self) -> bool {
        !matches!(self, Self::Text)
    }
}

/// A note in the system
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Note {
    #[serde(flatten)]
    pub meta: RecordMeta,
    /// Capture format, stored as `type` so remote filters can match on it
    #[serde(rename = "type", default)]
    pub kind: NoteKind,
    #[serde(default)]
    pub title: String,
    /// Plain text or rich text body
    #[serde(default)]
    pub content: String,
    /// Object storage URL for audio/image/video notes
    #[serde(default)]
    pub media_url: Option<String>,
    /// Extracted text from audio/video (speech) or image (OCR)
    #[serde(default)]
    pub transcription: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub topics: Vec<String>,
    #[serde(default)]
    pub summary: Option<String>,
    /// Life area the note is filed under
    #[serde(default)]
    pub pillar: Option<String>,
}

impl Record for Note {
    const COLLECTION: Collection = Collection::Notes;

    fn meta(&self) -> &RecordMeta {
        &self.meta
    }

    fn meta_mut(&mut self) -> &mut RecordMeta {
        &mut self.meta
    }
}

/// Input for creating a note
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewNote {
    #[serde(default)]
    pub kind: NoteKind,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub media_url: Option<String>,
    #[serde(default)]
    pub pillar: Option<String>,
}

impl NewNote {
    pub fn text(title: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            content: content.into(),
            ..Self::default()
        }
    }
}

/// Partial update of a note; `None` leaves a field untouched
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotePatch {
    pub title: Option<String>,
    pub content: Option<String>,
    pub transcription: Option<String>,
    pub tags: Option<Vec<String>>,
    pub topics: Option<Vec<String>>,
    pub summary: Option<String>,
    pub pillar: Option<String>,
}

impl NotePatch {
    pub const fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.content.is_none()
            && self.transcription.is_none()
            && self.tags.is_none()
            && self.topics.is_none()
            && self.summary.is_none()
            && self.pillar.is_none()
    }
}

impl Note {
    /// Create a new note owned by `user_id`
    #[must_use]
    pub fn new(user_id: impl Into<String>, input: NewNote) -> Self {
        Self {
            meta: RecordMeta::new(user_id),
            kind: input.kind,
            title: input.title,
            content: input.content,
            media_url: input.media_url,
            transcription: None,
            tags: Vec::new(),
            topics: Vec::new(),
            summary: None,
            pillar: input.pillar,
        }
    }

    /// Apply a patch and bump `updated_at`
    pub fn apply(&mut self, patch: NotePatch) {
        if let Some(title) = patch.title {
            self.title = title;
        }
        if let Some(content) = patch.content {
            self.content = content;
        }
        if let Some(transcription) = patch.transcription {
            self.transcription = Some(transcription);
        }
        if let Some(tags) = patch.tags {
            self.tags = tags;
        }
        if let Some(topics) = patch.topics {
            self.topics = topics;
        }
        if let Some(summary) = patch.summary {
            self.summary = Some(summary);
        }
        if let Some(pillar) = patch.pillar {
            self.pillar = Some(pillar);
        }
        self.meta.touch();
    }

    /// Title, or the first content line when the title is blank, truncated to `max_len` characters
    #[must_use]
    pub fn title_preview(&self, max_len: usize) -> String {
        let source = if self.title.trim().is_empty() {
            self.content.lines().next().unwrap_or("")
        } else {
            self.title.as_str()
        };
        source.trim().chars().take(max_len).collect()
    }

    /// Text worth sending to analysis: title, body and any transcription
    #[must_use]
    pub fn analysis_text(&self) -> String {
        [
            Some(self.title.as_str()),
            Some(self.content.as_str()),
            self.transcription.as_deref(),
        ]
        .into_iter()
        .flatten()
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
    }

    /// Check if note has nothing in it (whitespace-only counts as empty)
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.title.trim().is_empty() && self.content.trim().is_empty() && self.media_url.is_none()
    }
}

fn tag_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"#([a-zA-Z][a-zA-Z0-9_-]*)").expect("Invalid regex"))
}

/// Extract #tags from text
///
/// Valid tags match the pattern: `#[a-zA-Z][a-zA-Z0-9_-]*`
/// Tags are returned in lowercase, deduplicated and sorted.
///
/// # Examples
///
/// ```
/// use jot_core::models::extract_tags;
///
/// let tags = extract_tags("Hello #world this is #Rust-lang");
/// assert_eq!(tags, vec!["rust-lang".to_string(), "world".to_string()]);
/// ```
#[must_use]
pub fn extract_tags(text: &str) -> Vec<String> {
    tag_pattern()
        .captures_iter(text)
        .map(|cap| cap[1].to_lowercase())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_note_new() {
        let note = Note::new("user-1", NewNote::text("A", "hi"));
        assert_eq!(note.title, "A");
        assert_eq!(note.meta.user_id, "user-1");
        assert!(!note.meta.synced);
        assert_eq!(note.meta.created_at, note.meta.updated_at);
    }

    #[test]
    fn test_note_serializes_kind_as_type() {
        let note = Note::new("user-1", NewNote::text("A", "hi"));
        let value = serde_json::to_value(&note).unwrap();
        assert_eq!(value["type"], "text");
        assert_eq!(value["user_id"], "user-1");
        assert_eq!(value["id"], note.meta.id.as_str());

        let parsed: Note = serde_json::from_value(value).unwrap();
        assert_eq!(parsed, note);
    }

    #[test]
    fn test_apply_patch() {
        let mut note = Note::new("user-1", NewNote::text("A", "hi"));
        note.meta.synced = true;
        note.apply(NotePatch {
            content: Some("updated".to_string()),
            tags: Some(vec!["rust".to_string()]),
            ..NotePatch::default()
        });
        assert_eq!(note.title, "A");
        assert_eq!(note.content, "updated");
        assert_eq!(note.tags, vec!["rust"]);
        assert!(!note.meta.synced);
    }

    #[test]
    fn test_extract_tags_multiple() {
        let tags = extract_tags("#hello #world #rust");
        assert_eq!(tags, vec!["hello", "rust", "world"]);
    }

    #[test]
    fn test_extract_tags_deduplication() {
        let tags = extract_tags("#hello #Hello #HELLO");
        assert_eq!(tags, vec!["hello"]);
    }

    #[test]
    fn test_extract_tags_invalid() {
        // Tags starting with numbers are invalid
        assert!(extract_tags("#123 #456test").is_empty());
    }

    #[test]
    fn test_title_preview_falls_back_to_content() {
        let note = Note::new("u", NewNote::text("", "First line\nSecond line"));
        assert_eq!(note.title_preview(50), "First line");
        assert_eq!(note.title_preview(5), "First");
    }

    #[test]
    fn test_analysis_text_skips_blank_parts() {
        let mut note = Note::new("u", NewNote::text("", "body"));
        note.transcription = Some("spoken".to_string());
        assert_eq!(note.analysis_text(), "body\nspoken");
    }
}
