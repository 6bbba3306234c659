//! Study session orchestration.
//!
//! [`StudyService`] ties the pipeline together:
//!
//! ```text
//! load:  SourceRequest ─▶ Normalizer ─▶ chunk_text ─▶ SessionCache::put
//! chat:  SessionCache::get ─▶ select ─▶ prompt ─▶ TextGenerator ─▶ cleanup
//! reset: SessionCache::remove
//! ```
//!
//! A failed load never touches the caller's existing session: the new
//! entry is only built, and stored, after normalization and chunking
//! succeed.

use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;
use study_harness_core::chunk::chunk_text;
use study_harness_core::models::{ChatMode, SessionEntry};
use study_harness_core::prompt::{build_qa_prompt, build_quiz_prompt};
use study_harness_core::quiz::{parse_quiz, quiz_to_json};
use study_harness_core::select::{select_context, select_quiz_context, SelectionParams};
use study_harness_core::store::memory::InMemorySessionStore;
use study_harness_core::store::SessionCache;
use study_harness_core::text::clean_answer_markdown;
use study_harness_core::StudyError;

use crate::config::{Config, GenerationConfig};
use crate::generate::{GenerationRequest, TextGenerator};
use crate::history::{CreationKind, CreationLog, QUIZ_PROMPT};
use crate::normalize::{Normalizer, SourceRequest};

/// Result of a successful load.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoadSummary {
    pub source: String,
    pub content_length: usize,
    pub chunk_count: usize,
    pub message: String,
}

/// User-facing load confirmation.
pub fn load_message(chunk_count: usize) -> String {
    if chunk_count > 1 {
        format!(
            "Content loaded successfully in {} parts for better processing!",
            chunk_count
        )
    } else {
        "Content loaded successfully!".to_string()
    }
}

#[derive(Clone)]
pub struct StudyService {
    normalizer: Normalizer,
    sessions: SessionCache,
    generator: Arc<dyn TextGenerator>,
    history: Option<CreationLog>,
    max_chunk_size: usize,
    selection: SelectionParams,
    generation: GenerationConfig,
}

impl StudyService {
    pub fn new(
        config: &Config,
        normalizer: Normalizer,
        sessions: SessionCache,
        generator: Arc<dyn TextGenerator>,
        history: Option<CreationLog>,
    ) -> Self {
        Self {
            normalizer,
            sessions,
            generator,
            history,
            max_chunk_size: config.study.max_chunk_size,
            selection: config.selection_params(),
            generation: config.generation.clone(),
        }
    }

    /// In-memory session cache with the configured TTL.
    pub fn memory_sessions(config: &Config) -> SessionCache {
        let ttl = config.study.session_ttl();
        SessionCache::new(Arc::new(InMemorySessionStore::new()), ttl)
    }

    pub fn sessions(&self) -> &SessionCache {
        &self.sessions
    }

    /// Ingest `request` and make it the caller's current study material.
    pub async fn load(
        &self,
        user_id: &str,
        request: SourceRequest,
    ) -> Result<LoadSummary, StudyError> {
        let kind = request.kind();
        let document = self.normalizer.normalize(request).await.inspect_err(|e| {
            tracing::warn!(user_id, kind = kind.as_str(), error = %e, "study material load failed");
        })?;

        let chunks = chunk_text(&document.text, self.max_chunk_size);
        let summary = LoadSummary {
            source: document.source_label.clone(),
            content_length: document.length,
            chunk_count: chunks.len(),
            message: load_message(chunks.len()),
        };

        self.sessions
            .put(SessionEntry::new(user_id, document, chunks, Utc::now()))
            .await?;

        tracing::info!(
            user_id,
            source = %summary.source,
            length = summary.content_length,
            chunks = summary.chunk_count,
            "study material loaded"
        );
        Ok(summary)
    }

    /// Answer a question, or generate a quiz, from the caller's session.
    ///
    /// Q&A responses are cleaned of markdown; quiz responses are the
    /// validated quiz as compact JSON.
    pub async fn chat(
        &self,
        user_id: &str,
        query: Option<&str>,
        mode: ChatMode,
    ) -> Result<String, StudyError> {
        let entry = self
            .sessions
            .get(user_id)
            .await?
            .ok_or(StudyError::NoSessionLoaded)?;

        match mode {
            ChatMode::Quiz => self.quiz(user_id, &entry).await,
            ChatMode::Default => {
                let question = query.map(str::trim).unwrap_or_default();
                if question.is_empty() {
                    return Err(StudyError::EmptyQuestion);
                }
                self.answer(user_id, &entry, question).await
            }
        }
    }

    async fn answer(
        &self,
        user_id: &str,
        entry: &SessionEntry,
        question: &str,
    ) -> Result<String, StudyError> {
        let selection = select_context(question, &entry.chunks, &self.selection);
        tracing::info!(
            user_id,
            strategy = selection.strategy.as_str(),
            chunks = ?selection.chunk_indices,
            top_scores = ?selection.top_scores,
            "selected context"
        );

        let prompt = build_qa_prompt(
            &selection.context,
            question,
            selection.strategy,
            self.selection.max_context_chars,
        );
        let raw = self
            .generate(GenerationRequest::qa(prompt, &self.generation))
            .await?;
        let answer = clean_answer_markdown(&raw);

        self.record(user_id, question, &answer, CreationKind::StudyQa)
            .await;
        Ok(answer)
    }

    async fn quiz(&self, user_id: &str, entry: &SessionEntry) -> Result<String, StudyError> {
        let selection = select_quiz_context(&entry.chunks, &self.selection);
        let prompt = build_quiz_prompt(
            &selection.context,
            entry.chunk_count() > 1,
            self.selection.max_context_chars,
        );
        let raw = self
            .generate(GenerationRequest::quiz(prompt, &self.generation))
            .await?;

        let quiz = parse_quiz(&raw).inspect_err(|e| {
            tracing::warn!(user_id, error = %e, "generated quiz rejected");
        })?;
        let json = quiz_to_json(&quiz)?;

        self.record(user_id, QUIZ_PROMPT, &json, CreationKind::StudyQuiz)
            .await;
        Ok(json)
    }

    async fn generate(&self, request: GenerationRequest) -> Result<String, StudyError> {
        self.generator.generate(&request).await.map_err(|e| {
            tracing::warn!(model = self.generator.model_name(), error = %e, "generation failed");
            StudyError::GenerationFailed(e.to_string())
        })
    }

    async fn record(&self, user_id: &str, prompt: &str, content: &str, kind: CreationKind) {
        let Some(history) = &self.history else {
            return;
        };
        if let Err(e) = history.record(user_id, prompt, content, kind).await {
            tracing::warn!(user_id, kind = kind.as_str(), error = %e, "failed to record creation");
        }
    }

    /// Drop the caller's session. Returns whether one existed.
    pub async fn reset(&self, user_id: &str) -> Result<bool, StudyError> {
        let cleared = self.sessions.remove(user_id).await?;
        if cleared {
            tracing::info!(user_id, "study session reset");
        }
        Ok(cleared)
    }
}
