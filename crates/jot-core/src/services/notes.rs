//! Note service: the application-facing mutate/read surface for notes.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::task::JoinSet;

use crate::analysis::{Analysis, AnalysisFailure, Analyzer, HashtagAnalyzer, NoopTranscriber, Transcriber};
use crate::models::{Collection, NewNote, Note, NotePatch, OperationKind, RecordId};
use crate::sync::{Delivery, MutationOutcome, SyncEngine};
use crate::{Error, Result};

/// Upper bound on one analysis or transcription call
pub const DEFAULT_ANALYSIS_TIMEOUT: Duration = Duration::from_secs(30);

/// Creates, edits and removes notes through the sync engine.
///
/// After a note is created, analysis (and transcription for media notes)
/// runs as a detached task; its results land through [`Self::update_note`].
#[derive(Clone)]
pub struct NoteService {
    engine: SyncEngine,
    analyzer: Arc<dyn Analyzer>,
    transcriber: Arc<dyn Transcriber>,
    analysis_timeout: Duration,
    enrichment: Arc<Mutex<JoinSet<()>>>,
}

impl NoteService {
    pub fn new(engine: SyncEngine) -> Self {
        Self {
            engine,
            analyzer: Arc::new(HashtagAnalyzer),
            transcriber: Arc::new(NoopTranscriber),
            analysis_timeout: DEFAULT_ANALYSIS_TIMEOUT,
            enrichment: Arc::new(Mutex::new(JoinSet::new())),
        }
    }

    #[must_use]
    pub fn with_analyzer(mut self, analyzer: Arc<dyn Analyzer>) -> Self {
        self.analyzer = analyzer;
        self
    }

    #[must_use]
    pub fn with_transcriber(mut self, transcriber: Arc<dyn Transcriber>) -> Self {
        self.transcriber = transcriber;
        self
    }

    #[must_use]
    pub const fn with_analysis_timeout(mut self, timeout: Duration) -> Self {
        self.analysis_timeout = timeout;
        self
    }

    pub const fn engine(&self) -> &SyncEngine {
        &self.engine
    }

    /// Create a note; returns as soon as it is stored locally and delivered or queued.
    pub async fn create_note(&self, user_id: &str, input: NewNote) -> Result<MutationOutcome<Note>> {
        if user_id.trim().is_empty() {
            return Err(Error::InvalidInput("user id cannot be empty".to_string()));
        }
        let note = Note::new(user_id, input);
        if note.is_empty() {
            return Err(Error::InvalidInput("note has no content".to_string()));
        }

        let outcome = self.engine.save(note, OperationKind::Create).await?;
        tracing::info!("Created note {}", outcome.record.meta.id);
        self.spawn_enrichment(outcome.record.clone()).await;
        Ok(outcome)
    }

    /// Apply a partial update to an existing note.
    pub async fn update_note(&self, id: &RecordId, patch: NotePatch) -> Result<MutationOutcome<Note>> {
        if patch.is_empty() {
            return Err(Error::InvalidInput("nothing to update".to_string()));
        }
        self.engine
            .update::<Note, _>(id, |note| note.apply(patch))
            .await
    }

    /// Delete a note locally and remotely.
    pub async fn delete_note(&self, id: &RecordId) -> Result<Delivery> {
        let note = self.require(id).await?;
        let delivery = self
            .engine
            .delete(Collection::Notes, id, &note.meta.user_id)
            .await?;
        tracing::info!("Deleted note {id}");
        Ok(delivery)
    }

    /// A user's notes, newest first, from the local store only.
    pub async fn list_notes(&self, user_id: &str) -> Result<Vec<Note>> {
        self.engine.store().get_by_owner(user_id).await
    }

    pub async fn get_note(&self, id: &RecordId) -> Result<Option<Note>> {
        self.engine.store().get(id).await
    }

    /// Resolve a full id or unique id prefix among a user's notes.
    pub async fn resolve_id(&self, user_id: &str, id_or_prefix: &str) -> Result<RecordId> {
        let needle = id_or_prefix.trim().to_ascii_lowercase();
        if needle.is_empty() {
            return Err(Error::InvalidInput("note id cannot be empty".to_string()));
        }
        if let Ok(id) = needle.parse::<RecordId>() {
            return Ok(id);
        }

        let matches: Vec<RecordId> = self
            .list_notes(user_id)
            .await?
            .into_iter()
            .map(|note| note.meta.id)
            .filter(|id| id.as_str().starts_with(&needle))
            .collect();
        match matches.as_slice() {
            [id] => Ok(*id),
            [] => Err(Error::NotFound(id_or_prefix.to_string())),
            _ => Err(Error::InvalidInput(format!(
                "id prefix {id_or_prefix} matches {} notes",
                matches.len()
            ))),
        }
    }

    /// Analysis tasks still running; finished ones are dropped first.
    pub async fn enrichment_in_flight(&self) -> usize {
        let mut tasks = self.enrichment.lock().await;
        reap_finished(&mut tasks);
        tasks.len()
    }

    /// Wait for every analysis task started so far.
    pub async fn wait_for_enrichment(&self) {
        let mut tasks = std::mem::take(&mut *self.enrichment.lock().await);
        while let Some(result) = tasks.join_next().await {
            if let Err(error) = result {
                tracing::warn!("Note analysis task ended abnormally: {error}");
            }
        }
    }

    async fn require(&self, id: &RecordId) -> Result<Note> {
        self.get_note(id)
            .await?
            .ok_or_else(|| Error::NotFound(id.to_string()))
    }

    async fn spawn_enrichment(&self, note: Note) {
        let service = self.clone();
        let mut tasks = self.enrichment.lock().await;
        reap_finished(&mut tasks);
        tasks.spawn(async move {
            service.enrich(note).await;
        });
    }

    async fn enrich(&self, note: Note) {
        let id = note.meta.id;
        let mut patch = NotePatch::default();

        if let (true, Some(media_url)) = (note.kind.has_media(), note.media_url.as_deref()) {
            match self
                .bounded(self.transcriber.transcribe(note.kind, media_url))
                .await
            {
                Ok(text) if !text.trim().is_empty() => patch.transcription = Some(text),
                Ok(_) => {}
                Err(error) => tracing::warn!("Transcription of note {id} failed: {error}"),
            }
        }

        let mut text = note.analysis_text();
        if let Some(transcription) = &patch.transcription {
            text.push('\n');
            text.push_str(transcription);
        }
        let analysis = match self.bounded(self.analyzer.analyze(&text)).await {
            Ok(analysis) => analysis,
            Err(error) => {
                tracing::warn!("Analysis of note {id} failed: {error}");
                Analysis::default()
            }
        };
        if !analysis.tags.is_empty() {
            patch.tags = Some(analysis.tags);
        }
        if !analysis.topics.is_empty() {
            patch.topics = Some(analysis.topics);
        }
        patch.summary = analysis.summary;

        if patch.is_empty() {
            return;
        }
        match self.update_note(&id, patch).await {
            Ok(_) => tracing::debug!("Applied analysis to note {id}"),
            // Deleted before analysis finished.
            Err(Error::NotFound(_)) => {}
            Err(error) => tracing::warn!("Could not apply analysis to note {id}: {error}"),
        }
    }

    async fn bounded<T>(
        &self,
        call: impl std::future::Future<Output = std::result::Result<T, AnalysisFailure>>,
    ) -> std::result::Result<T, AnalysisFailure> {
        tokio::time::timeout(self.analysis_timeout, call)
            .await
            .unwrap_or(Err(AnalysisFailure::Timeout))
    }
}

fn reap_finished(tasks: &mut JoinSet<()>) {
    while let Some(result) = tasks.try_join_next() {
        if let Err(error) = result {
            tracing::warn!("Note analysis task ended abnormally: {error}");
        }
    }
}
