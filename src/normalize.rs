//! Source normalization: turn an upload, a web page, or a video into a
//! [`SourceDocument`].
//!
//! Uploads are streamed into a named temp file under the configured upload
//! directory while the size ceiling is enforced. The temp file is owned by a
//! [`TempPath`], so it is removed when the upload value is dropped, whether
//! extraction succeeded, failed, or the request was abandoned mid-stream.

use std::path::{Path, PathBuf};

use study_harness_core::models::{SourceDocument, SourceKind};
use study_harness_core::StudyError;
use tempfile::TempPath;
use tokio::io::AsyncWriteExt;

use crate::config::Config;
use crate::extract::{self, UploadFormat};
use crate::transcript::{self, TranscriptClient};
use crate::web::WebFetcher;

/// A source to ingest.
pub enum SourceRequest {
    Upload(SpooledUpload),
    WebPage { url: String },
    Video { url: String },
}

impl SourceRequest {
    pub fn kind(&self) -> SourceKind {
        match self {
            SourceRequest::Upload(_) => SourceKind::Upload,
            SourceRequest::WebPage { .. } => SourceKind::WebPage,
            SourceRequest::Video { .. } => SourceKind::Video,
        }
    }
}

/// Where uploads are spooled and how large they may get.
#[derive(Debug, Clone)]
pub struct UploadSpool {
    dir: PathBuf,
    max_bytes: u64,
}

impl UploadSpool {
    pub fn new(dir: impl Into<PathBuf>, max_bytes: u64) -> Self {
        Self {
            dir: dir.into(),
            max_bytes,
        }
    }

    pub fn max_bytes(&self) -> u64 {
        self.max_bytes
    }

    /// Start spooling an upload named `filename`.
    ///
    /// The extension is checked before any bytes are written.
    pub async fn begin(&self, filename: &str) -> Result<SpoolWriter, StudyError> {
        let format = UploadFormat::from_filename(filename)
            .ok_or_else(|| StudyError::UnsupportedFormat(display_extension(filename)))?;

        tokio::fs::create_dir_all(&self.dir)
            .await
            .map_err(|e| StudyError::ExtractionFailed(format!("upload dir unavailable: {}", e)))?;
        let named = tempfile::Builder::new()
            .prefix("study-upload-")
            .tempfile_in(&self.dir)
            .map_err(|e| StudyError::ExtractionFailed(format!("cannot spool upload: {}", e)))?;
        let (file, path) = named.into_parts();

        Ok(SpoolWriter {
            file: tokio::fs::File::from_std(file),
            upload: SpooledUpload {
                filename: filename.to_string(),
                format,
                path,
            },
            written: 0,
            max_bytes: self.max_bytes,
        })
    }
}

fn display_extension(filename: &str) -> String {
    Path::new(filename)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| format!(".{}", e.to_ascii_lowercase()))
        .unwrap_or_else(|| filename.to_string())
}

/// In-progress upload. Dropping it removes the partial file.
pub struct SpoolWriter {
    file: tokio::fs::File,
    upload: SpooledUpload,
    written: u64,
    max_bytes: u64,
}

impl SpoolWriter {
    pub async fn write_chunk(&mut self, bytes: &[u8]) -> Result<(), StudyError> {
        self.written += bytes.len() as u64;
        if self.written > self.max_bytes {
            return Err(StudyError::ContentTooLarge {
                limit: self.max_bytes,
            });
        }
        self.file
            .write_all(bytes)
            .await
            .map_err(|e| StudyError::ExtractionFailed(format!("cannot spool upload: {}", e)))
    }

    pub async fn finish(mut self) -> Result<SpooledUpload, StudyError> {
        self.file
            .flush()
            .await
            .map_err(|e| StudyError::ExtractionFailed(format!("cannot spool upload: {}", e)))?;
        if self.written == 0 {
            return Err(StudyError::EmptyContent);
        }
        Ok(self.upload)
    }
}

/// A fully spooled upload awaiting extraction.
pub struct SpooledUpload {
    filename: String,
    format: UploadFormat,
    path: TempPath,
}

impl SpooledUpload {
    pub fn filename(&self) -> &str {
        &self.filename
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Produces [`SourceDocument`]s from [`SourceRequest`]s.
#[derive(Clone)]
pub struct Normalizer {
    web: WebFetcher,
    transcripts: TranscriptClient,
    min_content_chars: usize,
}

impl Normalizer {
    pub fn new(web: WebFetcher, transcripts: TranscriptClient, min_content_chars: usize) -> Self {
        Self {
            web,
            transcripts,
            min_content_chars,
        }
    }

    pub fn from_config(config: &Config) -> anyhow::Result<Self> {
        let study = &config.study;
        Ok(Self::new(
            WebFetcher::new(study.fetch_timeout_secs, study.max_web_bytes)?,
            TranscriptClient::new(config.transcript.clone(), study.fetch_timeout_secs)?,
            study.min_content_chars,
        ))
    }

    pub async fn normalize(&self, request: SourceRequest) -> Result<SourceDocument, StudyError> {
        match request {
            SourceRequest::Upload(upload) => self.normalize_upload(upload).await,
            SourceRequest::WebPage { url } => {
                let text = self.web.fetch_text(&url).await?;
                SourceDocument::from_raw(&text, url.trim(), SourceKind::WebPage, self.min_content_chars)
            }
            SourceRequest::Video { url } => {
                let video_id = transcript::parse_video_id(&url)?;
                let transcript = self.transcripts.fetch(&video_id).await?;
                SourceDocument::from_raw(
                    &transcript.text(),
                    transcript.label(),
                    SourceKind::Video,
                    self.min_content_chars,
                )
            }
        }
    }

    /// Extract a spooled upload. The temp file is removed before this returns.
    async fn normalize_upload(&self, upload: SpooledUpload) -> Result<SourceDocument, StudyError> {
        let label = upload.filename.clone();
        let text = tokio::task::spawn_blocking(move || {
            let result = extract::extract_file(&upload.path, upload.format);
            drop(upload);
            result
        })
        .await
        .map_err(|e| StudyError::ExtractionFailed(format!("extractor crashed: {}", e)))??;
        SourceDocument::from_raw(&text, label, SourceKind::Upload, self.min_content_chars)
    }

    /// Normalize a file already on local disk (no spooling).
    pub async fn normalize_local_file(&self, path: &Path) -> Result<SourceDocument, StudyError> {
        let label = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or_default()
            .to_string();
        let format = UploadFormat::from_filename(&label)
            .ok_or_else(|| StudyError::UnsupportedFormat(display_extension(&label)))?;
        let owned = path.to_path_buf();
        let text = tokio::task::spawn_blocking(move || extract::extract_file(&owned, format))
            .await
            .map_err(|e| StudyError::ExtractionFailed(format!("extractor crashed: {}", e)))??;
        SourceDocument::from_raw(&text, label, SourceKind::Upload, self.min_content_chars)
    }
}
