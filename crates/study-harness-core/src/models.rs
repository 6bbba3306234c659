//! Core data models used throughout Study Harness.
//!
//! These types represent the normalized source text, its chunks, and the
//! per-user session entry that flow through the ingestion and retrieval
//! pipeline.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::StudyError;
use crate::text::normalize_text;

/// Where a [`SourceDocument`] came from.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    /// Uploaded PDF/DOC/DOCX/TXT file.
    Upload,
    /// Fetched web page.
    WebPage,
    /// Video caption transcript.
    Video,
}

impl SourceKind {
    pub fn as_str(self) -> &'static str {
        match self {
            SourceKind::Upload => "upload",
            SourceKind::WebPage => "web_page",
            SourceKind::Video => "video",
        }
    }
}

/// Normalized result of ingesting one source.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceDocument {
    /// Full whitespace-normalized plain text. Never empty.
    pub text: String,
    /// Human-readable origin (filename, URL, or video title).
    pub source_label: String,
    pub kind: SourceKind,
    /// Character count of `text`.
    pub length: usize,
}

impl SourceDocument {
    /// Normalize raw extracted text and wrap it into a document.
    ///
    /// Collapses whitespace runs, drops control characters, and trims.
    /// Fails with [`StudyError::EmptyContent`] when the normalized text is
    /// shorter than `min_chars` characters.
    pub fn from_raw(
        raw: &str,
        source_label: impl Into<String>,
        kind: SourceKind,
        min_chars: usize,
    ) -> Result<Self, StudyError> {
        let text = normalize_text(raw);
        let length = text.chars().count();
        if text.is_empty() || length < min_chars {
            return Err(StudyError::EmptyContent);
        }
        Ok(Self {
            text,
            source_label: source_label.into(),
            kind,
            length,
        })
    }
}

/// An ordered, bounded-size slice of a document's text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chunk {
    /// 0-based position in the chunk sequence.
    pub index: usize,
    pub text: String,
}

/// One user's currently loaded study material.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionEntry {
    pub user_id: String,
    pub document: SourceDocument,
    pub chunks: Vec<Chunk>,
    pub loaded_at: DateTime<Utc>,
}

impl SessionEntry {
    pub fn new(
        user_id: impl Into<String>,
        document: SourceDocument,
        chunks: Vec<Chunk>,
        loaded_at: DateTime<Utc>,
    ) -> Self {
        Self {
            user_id: user_id.into(),
            document,
            chunks,
            loaded_at,
        }
    }

    pub fn chunk_count(&self) -> usize {
        self.chunks.len()
    }
}

/// Study-assistant chat mode.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ChatMode {
    /// Free-text question answering.
    #[default]
    #[serde(alias = "qa")]
    Default,
    /// Multiple-choice quiz generation.
    Quiz,
}

/// One multiple-choice quiz item.
///
/// `answer` must equal one of `options` character for character.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuizQuestion {
    pub question: String,
    pub options: Vec<String>,
    pub answer: String,
}
