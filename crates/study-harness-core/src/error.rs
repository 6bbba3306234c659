//! Error type shared by the ingestion and retrieval pipeline.
//!
//! Every variant is request-scoped: a failure affects only the load or
//! chat request that produced it and never the process or other users'
//! sessions.

/// Errors surfaced by loading study material or answering from it.
#[derive(Debug, thiserror::Error)]
pub enum StudyError {
    /// The upload's extension is not one of the accepted document types.
    #[error("Unsupported file type '{0}'. Please upload PDF, TXT, DOC, or DOCX.")]
    UnsupportedFormat(String),

    /// Upload or fetched payload exceeded its hard size ceiling.
    #[error("Content exceeds the {limit} byte limit")]
    ContentTooLarge { limit: u64 },

    /// The video exists but has no caption track to read.
    #[error("No transcript available for video {0}. Please try a video with captions enabled.")]
    NoTranscriptAvailable(String),

    /// Extraction produced nothing usable (empty or under the minimum length).
    #[error("No content could be extracted from the source")]
    EmptyContent,

    /// Network or timeout failure while fetching a web page or transcript.
    #[error("Failed to fetch source content: {0}")]
    FetchFailed(String),

    /// The request did not describe a loadable source (bad URL, missing field).
    #[error("Invalid source: {0}")]
    InvalidSource(String),

    /// The document extractor rejected the file (corrupt PDF, not an OOXML archive).
    #[error("Failed to process file: {0}")]
    ExtractionFailed(String),

    /// A question or quiz was requested before any content was loaded.
    #[error("Please load study content first")]
    NoSessionLoaded,

    /// Q&A mode was requested with a blank question.
    #[error("Please enter a question")]
    EmptyQuestion,

    /// The text-generation collaborator failed.
    #[error("Text generation failed: {0}")]
    GenerationFailed(String),

    /// Generated quiz output could not be parsed or broke the quiz contract.
    #[error("Generated quiz was malformed: {0}")]
    MalformedGenerationOutput(String),

    /// The session store backend failed.
    #[error("Session store error: {0}")]
    Store(String),
}

impl StudyError {
    /// Stable machine-readable code for API error bodies.
    pub fn code(&self) -> &'static str {
        match self {
            StudyError::UnsupportedFormat(_) => "unsupported_format",
            StudyError::ContentTooLarge { .. } => "content_too_large",
            StudyError::NoTranscriptAvailable(_) => "no_transcript",
            StudyError::EmptyContent => "empty_content",
            StudyError::FetchFailed(_) => "fetch_failed",
            StudyError::InvalidSource(_) => "invalid_source",
            StudyError::ExtractionFailed(_) => "extraction_failed",
            StudyError::NoSessionLoaded => "no_session_loaded",
            StudyError::EmptyQuestion => "empty_question",
            StudyError::GenerationFailed(_) => "generation_failed",
            StudyError::MalformedGenerationOutput(_) => "malformed_generation_output",
            StudyError::Store(_) => "store_error",
        }
    }

    /// True for failures raised while ingesting a source.
    ///
    /// Ingestion failures never touch the caller's existing session entry.
    pub fn is_ingestion_error(&self) -> bool {
        matches!(
            self,
            StudyError::UnsupportedFormat(_)
                | StudyError::ContentTooLarge { .. }
                | StudyError::NoTranscriptAvailable(_)
                | StudyError::EmptyContent
                | StudyError::FetchFailed(_)
                | StudyError::InvalidSource(_)
                | StudyError::ExtractionFailed(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_are_stable() {
        assert_eq!(StudyError::EmptyContent.code(), "empty_content");
        assert_eq!(StudyError::NoSessionLoaded.code(), "no_session_loaded");
        assert_eq!(
            StudyError::ContentTooLarge { limit: 10 }.code(),
            "content_too_large"
        );
    }

    #[test]
    fn ingestion_errors_are_classified() {
        assert!(StudyError::FetchFailed("timeout".into()).is_ingestion_error());
        assert!(StudyError::UnsupportedFormat(".exe".into()).is_ingestion_error());
        assert!(!StudyError::NoSessionLoaded.is_ingestion_error());
        assert!(!StudyError::GenerationFailed("503".into()).is_ingestion_error());
    }

    #[test]
    fn messages_are_user_readable() {
        let msg = StudyError::UnsupportedFormat(".exe".into()).to_string();
        assert!(msg.contains(".exe"));
        assert!(msg.contains("PDF, TXT, DOC, or DOCX"));
    }
}
