//! Object storage paths for note media.

use std::fmt;

use crate::models::NoteKind;
use crate::{Error, Result};

/// Media families stored in object storage
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MediaType {
    Audio,
    Image,
    Video,
}

impl MediaType {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Audio => "audio",
            Self::Image => "image",
            Self::Video => "video",
        }
    }

    /// Media type for a note kind; text notes carry no media
    pub const fn for_note(kind: NoteKind) -> Option<Self> {
        match kind {
            NoteKind::Text => None,
            NoteKind::Audio => Some(Self::Audio),
            NoteKind::Image => Some(Self::Image),
            NoteKind::Video => Some(Self::Video),
        }
    }
}

impl fmt::Display for MediaType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Object key for a media blob: `users/{user_id}/{media_type}/{file_name}`.
///
/// The file name is reduced to lowercase ASCII alphanumerics and dashes,
/// keeping its extension, so it cannot escape the user's prefix.
pub fn media_object_path(user_id: &str, media_type: MediaType, file_name: &str) -> Result<String> {
    let user = user_id.trim();
    if user.is_empty() || user.contains('/') {
        return Err(Error::InvalidInput(format!(
            "media owner must be a non-empty id without '/': {user_id:?}"
        )));
    }
    Ok(format!(
        "users/{user}/{media_type}/{}",
        sanitize_file_name(file_name)
    ))
}

fn sanitize_file_name(file_name: &str) -> String {
    let trimmed = file_name.trim().trim_matches('/');
    let base = trimmed.rsplit('/').next().unwrap_or(trimmed);
    let (stem, ext) = base.rsplit_once('.').unwrap_or((base, ""));

    let stem = match slug(stem) {
        stem if stem.is_empty() => "file".to_string(),
        stem => stem,
    };
    match slug(ext) {
        ext if ext.is_empty() => stem,
        ext => format!("{stem}.{ext}"),
    }
}

fn slug(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for ch in input.chars().flat_map(char::to_lowercase) {
        if ch.is_ascii_alphanumeric() {
            out.push(ch);
        } else if !out.ends_with('-') {
            out.push('-');
        }
    }
    out.trim_matches('-').to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builds_user_scoped_paths() {
        assert_eq!(
            media_object_path("user-1", MediaType::Audio, "memo.webm").unwrap(),
            "users/user-1/audio/memo.webm"
        );
    }

    #[test]
    fn file_names_cannot_escape_the_prefix() {
        assert_eq!(
            media_object_path("u", MediaType::Image, "../../Holiday Photo.JPG").unwrap(),
            "users/u/image/holiday-photo.jpg"
        );
        assert_eq!(
            media_object_path("u", MediaType::Video, "  ").unwrap(),
            "users/u/video/file"
        );
    }

    #[test]
    fn rejects_blank_or_nested_owner() {
        assert!(media_object_path(" ", MediaType::Audio, "a.mp3").is_err());
        assert!(media_object_path("a/b", MediaType::Audio, "a.mp3").is_err());
    }

    #[test]
    fn text_notes_have_no_media_type() {
        assert_eq!(MediaType::for_note(NoteKind::Text), None);
        assert_eq!(MediaType::for_note(NoteKind::Video), Some(MediaType::Video));
    }
}
