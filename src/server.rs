//! Study assistant HTTP server.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `POST` | `/api/ai/load-study-material` | Load an upload, web page, or video (multipart) |
//! | `POST` | `/api/ai/study-assistant-chat` | Ask a question or generate a quiz |
//! | `POST` | `/api/ai/study-session/reset` | Drop the caller's loaded material |
//! | `GET`  | `/health` | Health check (returns version) |
//!
//! # Caller identity
//!
//! Study routes read the caller from the `x-user-id` header, which an
//! upstream auth layer is expected to set. With `server.require_premium`
//! enabled, `x-user-plan: premium` is also required.
//!
//! # Error Contract
//!
//! ```json
//! { "success": false, "code": "no_session_loaded", "message": "Please load study content first" }
//! ```
//!
//! | Status | Codes |
//! |--------|-------|
//! | 400 | `unsupported_format`, `empty_content`, `invalid_source`, `empty_question`, `no_transcript`, `invalid_request` |
//! | 401 | `unauthorized` |
//! | 403 | `premium_required` |
//! | 409 | `no_session_loaded` |
//! | 413 | `content_too_large` |
//! | 422 | `extraction_failed` |
//! | 500 | `store_error` |
//! | 502 | `fetch_failed`, `generation_failed`, `malformed_generation_output` |

use std::sync::Arc;

use axum::{
    extract::{
        multipart::{Field, MultipartError},
        rejection::JsonRejection,
        DefaultBodyLimit, FromRequestParts, Multipart, State,
    },
    http::{request::Parts, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use study_harness_core::models::ChatMode;
use study_harness_core::StudyError;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::config::Config;
use crate::generate::{create_generator, TextGenerator};
use crate::history::CreationLog;
use crate::normalize::{Normalizer, SourceRequest, SpooledUpload, UploadSpool};
use crate::study::{LoadSummary, StudyService};
use crate::{db, migrate};

/// Multipart framing allowance on top of the upload ceiling.
const MULTIPART_OVERHEAD_BYTES: u64 = 1024 * 1024;

/// Shared state for all route handlers.
#[derive(Clone)]
pub struct AppState {
    study: StudyService,
    spool: UploadSpool,
    require_premium: bool,
}

impl AppState {
    pub fn new(study: StudyService, spool: UploadSpool, require_premium: bool) -> Self {
        Self {
            study,
            spool,
            require_premium,
        }
    }

    /// Build the production state: configured generator, in-memory
    /// sessions, and (when enabled) SQLite creation history.
    pub async fn from_config(config: &Config) -> anyhow::Result<Self> {
        let history = if config.db.record_history {
            let pool = db::connect(&config.db).await?;
            migrate::run_migrations(&pool).await?;
            Some(CreationLog::new(pool))
        } else {
            None
        };
        let generator: Arc<dyn TextGenerator> = Arc::from(create_generator(&config.generation)?);
        let study = StudyService::new(
            config,
            Normalizer::from_config(config)?,
            StudyService::memory_sessions(config),
            generator,
            history,
        );
        let spool = UploadSpool::new(config.server.upload_dir(), config.study.max_upload_bytes);
        Ok(Self::new(study, spool, config.server.require_premium))
    }
}

/// Build the router with all routes and layers.
pub fn router(state: AppState) -> Router {
    let body_limit = (state.spool.max_bytes() + MULTIPART_OVERHEAD_BYTES) as usize;

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/api/ai/load-study-material", post(handle_load))
        .route("/api/ai/study-assistant-chat", post(handle_chat))
        .route("/api/ai/study-session/reset", post(handle_reset))
        .route("/health", get(handle_health))
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Starts the HTTP server on `[server].bind`. Runs until the process exits.
pub async fn run_server(config: &Config) -> anyhow::Result<()> {
    let state = AppState::from_config(config).await?;
    let app = router(state);

    let listener = tokio::net::TcpListener::bind(&config.server.bind).await?;
    tracing::info!(
        bind = %config.server.bind,
        provider = %config.generation.provider,
        "study server listening"
    );
    println!("Study server listening on http://{}", config.server.bind);
    axum::serve(listener, app).await?;

    Ok(())
}

// ============ Error response ============

#[derive(Serialize)]
struct ErrorBody {
    success: bool,
    code: String,
    message: String,
}

/// Error type that converts into a JSON HTTP response.
#[derive(Debug)]
pub struct AppError {
    status: StatusCode,
    code: String,
    message: String,
}

impl AppError {
    fn new(status: StatusCode, code: &str, message: impl Into<String>) -> Self {
        Self {
            status,
            code: code.to_string(),
            message: message.into(),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        if self.status.is_server_error() {
            tracing::error!(code = %self.code, message = %self.message, "request failed");
        }
        let body = ErrorBody {
            success: false,
            code: self.code,
            message: self.message,
        };
        (self.status, Json(body)).into_response()
    }
}

impl From<StudyError> for AppError {
    fn from(e: StudyError) -> Self {
        let status = match &e {
            StudyError::UnsupportedFormat(_)
            | StudyError::EmptyContent
            | StudyError::InvalidSource(_)
            | StudyError::EmptyQuestion
            | StudyError::NoTranscriptAvailable(_) => StatusCode::BAD_REQUEST,
            StudyError::ContentTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            StudyError::ExtractionFailed(_) => StatusCode::UNPROCESSABLE_ENTITY,
            StudyError::NoSessionLoaded => StatusCode::CONFLICT,
            StudyError::FetchFailed(_)
            | StudyError::GenerationFailed(_)
            | StudyError::MalformedGenerationOutput(_) => StatusCode::BAD_GATEWAY,
            StudyError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        AppError::new(status, e.code(), e.to_string())
    }
}

fn multipart_error(e: MultipartError) -> AppError {
    if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
        return AppError::new(
            StatusCode::PAYLOAD_TOO_LARGE,
            "content_too_large",
            "Upload exceeds the size limit",
        );
    }
    AppError::new(e.status(), "invalid_request", e.body_text())
}

// ============ Caller identity ============

/// The authenticated caller of a study route.
pub struct Caller {
    pub user_id: String,
}

impl FromRequestParts<AppState> for Caller {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, AppError> {
        let user_id = parts
            .headers
            .get("x-user-id")
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .ok_or_else(|| {
                AppError::new(StatusCode::UNAUTHORIZED, "unauthorized", "Missing x-user-id header")
            })?;

        if state.require_premium {
            let plan = parts
                .headers
                .get("x-user-plan")
                .and_then(|v| v.to_str().ok())
                .unwrap_or_default();
            if !plan.eq_ignore_ascii_case("premium") {
                return Err(AppError::new(
                    StatusCode::FORBIDDEN,
                    "premium_required",
                    "This feature is only available for premium users.",
                ));
            }
        }

        Ok(Caller {
            user_id: user_id.to_string(),
        })
    }
}

// ============ GET /health ============

#[derive(Serialize)]
struct HealthResponse {
    status: String,
    version: String,
}

async fn handle_health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

// ============ POST /api/ai/load-study-material ============

#[derive(Serialize)]
struct LoadResponse {
    success: bool,
    #[serde(flatten)]
    summary: LoadSummary,
}

/// Fields collected from the load form.
#[derive(Default)]
struct LoadForm {
    source_type: Option<String>,
    upload: Option<SpooledUpload>,
    website_url: Option<String>,
    youtube_url: Option<String>,
}

impl LoadForm {
    fn into_request(self) -> Result<SourceRequest, StudyError> {
        let source_type = self
            .source_type
            .ok_or_else(|| StudyError::InvalidSource("missing sourceType".to_string()))?;
        let non_blank = |v: Option<String>| v.filter(|s| !s.trim().is_empty());

        match source_type.trim() {
            "pdf" => self
                .upload
                .map(SourceRequest::Upload)
                .ok_or_else(|| StudyError::InvalidSource("no file uploaded".to_string())),
            "weblink" => non_blank(self.website_url)
                .map(|url| SourceRequest::WebPage { url })
                .ok_or_else(|| StudyError::InvalidSource("missing websiteUrl".to_string())),
            "youtube" => non_blank(self.youtube_url)
                .map(|url| SourceRequest::Video { url })
                .ok_or_else(|| StudyError::InvalidSource("missing youtubeUrl".to_string())),
            other => Err(StudyError::InvalidSource(format!(
                "unknown sourceType '{}'",
                other
            ))),
        }
    }
}

async fn spool_field(spool: &UploadSpool, mut field: Field<'_>) -> Result<SpooledUpload, AppError> {
    let filename = field.file_name().unwrap_or_default().to_string();
    if filename.trim().is_empty() {
        return Err(StudyError::InvalidSource("uploaded file has no filename".to_string()).into());
    }
    let mut writer = spool.begin(&filename).await?;
    while let Some(bytes) = field.chunk().await.map_err(multipart_error)? {
        writer.write_chunk(&bytes).await?;
    }
    Ok(writer.finish().await?)
}

async fn handle_load(
    State(state): State<AppState>,
    caller: Caller,
    mut multipart: Multipart,
) -> Result<Json<LoadResponse>, AppError> {
    let mut form = LoadForm::default();
    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "sourceType" => form.source_type = Some(field.text().await.map_err(multipart_error)?),
            "websiteUrl" => form.website_url = Some(field.text().await.map_err(multipart_error)?),
            "youtubeUrl" => form.youtube_url = Some(field.text().await.map_err(multipart_error)?),
            "file" => form.upload = Some(spool_field(&state.spool, field).await?),
            _ => {}
        }
    }

    let request = form.into_request()?;
    let summary = state.study.load(&caller.user_id, request).await?;
    Ok(Json(LoadResponse {
        success: true,
        summary,
    }))
}

// ============ POST /api/ai/study-assistant-chat ============

#[derive(Deserialize)]
struct ChatRequest {
    #[serde(default)]
    query: Option<String>,
    #[serde(default)]
    mode: Option<ChatMode>,
}

#[derive(Serialize)]
struct ChatResponse {
    success: bool,
    response: String,
}

async fn handle_chat(
    State(state): State<AppState>,
    caller: Caller,
    body: Result<Json<ChatRequest>, JsonRejection>,
) -> Result<Json<ChatResponse>, AppError> {
    let Json(req) = body.map_err(|e| {
        AppError::new(StatusCode::BAD_REQUEST, "invalid_request", e.body_text())
    })?;
    let response = state
        .study
        .chat(
            &caller.user_id,
            req.query.as_deref(),
            req.mode.unwrap_or_default(),
        )
        .await?;
    Ok(Json(ChatResponse {
        success: true,
        response,
    }))
}

// ============ POST /api/ai/study-session/reset ============

#[derive(Serialize)]
struct ResetResponse {
    success: bool,
    cleared: bool,
}

async fn handle_reset(
    State(state): State<AppState>,
    caller: Caller,
) -> Result<Json<ResetResponse>, AppError> {
    let cleared = state.study.reset(&caller.user_id).await?;
    Ok(Json(ResetResponse {
        success: true,
        cleared,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn study_errors_map_to_statuses() {
        let cases = [
            (StudyError::UnsupportedFormat(".pptx".into()), StatusCode::BAD_REQUEST),
            (StudyError::ContentTooLarge { limit: 1 }, StatusCode::PAYLOAD_TOO_LARGE),
            (StudyError::ExtractionFailed("x".into()), StatusCode::UNPROCESSABLE_ENTITY),
            (StudyError::NoSessionLoaded, StatusCode::CONFLICT),
            (StudyError::MalformedGenerationOutput("x".into()), StatusCode::BAD_GATEWAY),
            (StudyError::Store("x".into()), StatusCode::INTERNAL_SERVER_ERROR),
        ];
        for (err, status) in cases {
            let code = err.code();
            let app: AppError = err.into();
            assert_eq!(app.status, status);
            assert_eq!(app.code, code);
        }
    }

    #[test]
    fn load_form_requires_matching_field() {
        let form = LoadForm {
            source_type: Some("weblink".into()),
            youtube_url: Some("https://youtu.be/dQw4w9WgXcQ".into()),
            ..Default::default()
        };
        assert!(matches!(form.into_request(), Err(StudyError::InvalidSource(_))));

        let form = LoadForm {
            source_type: Some("youtube".into()),
            youtube_url: Some("https://youtu.be/dQw4w9WgXcQ".into()),
            ..Default::default()
        };
        assert!(matches!(form.into_request(), Ok(SourceRequest::Video { .. })));

        let form = LoadForm {
            source_type: Some("weblink".into()),
            website_url: Some("   ".into()),
            ..Default::default()
        };
        assert!(matches!(form.into_request(), Err(StudyError::InvalidSource(_))));

        assert!(matches!(
            LoadForm::default().into_request(),
            Err(StudyError::InvalidSource(_))
        ));
    }
}
