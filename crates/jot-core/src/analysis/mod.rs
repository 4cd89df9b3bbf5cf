//! Analysis and transcription seams.
//!
//! Both are fire-and-forget collaborators of the note service: a failure
//! never blocks or fails note creation, it only means no suggestions.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::models::{extract_tags, NoteKind};

/// Failures from analysis or transcription backends
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AnalysisFailure {
    #[error("analysis service unavailable: {0}")]
    Unavailable(String),

    #[error("analysis rejected input: {0}")]
    Rejected(String),

    #[error("analysis timed out")]
    Timeout,
}

/// Suggestions for a note
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Analysis {
    pub tags: Vec<String>,
    pub topics: Vec<String>,
    pub summary: Option<String>,
}

impl Analysis {
    pub fn is_empty(&self) -> bool {
        self.tags.is_empty() && self.topics.is_empty() && self.summary.is_none()
    }
}

/// Suggests tags, topics and a summary for note text
#[async_trait]
pub trait Analyzer: Send + Sync {
    async fn analyze(&self, text: &str) -> Result<Analysis, AnalysisFailure>;
}

/// Extracts text from a note's media (speech for audio/video, OCR for images)
#[async_trait]
pub trait Transcriber: Send + Sync {
    async fn transcribe(&self, kind: NoteKind, media_url: &str) -> Result<String, AnalysisFailure>;
}

/// Local analyzer that turns `#hashtags` into tags
#[derive(Debug, Clone, Copy, Default)]
pub struct HashtagAnalyzer;

#[async_trait]
impl Analyzer for HashtagAnalyzer {
    async fn analyze(&self, text: &str) -> Result<Analysis, AnalysisFailure> {
        Ok(Analysis {
            tags: extract_tags(text),
            ..Analysis::default()
        })
    }
}

/// Transcriber used when no speech or OCR service is configured
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopTranscriber;

#[async_trait]
impl Transcriber for NoopTranscriber {
    async fn transcribe(&self, kind: NoteKind, _media_url: &str) -> Result<String, AnalysisFailure> {
        Err(AnalysisFailure::Unavailable(format!(
            "no transcriber configured for {} notes",
            kind.as_str()
        )))
    }
}
