//! Configuration parsing and validation.
//!
//! Study Harness is configured via a TOML file (default: `config/study.toml`).
//! Every section and field has a default, so an empty file is a valid
//! configuration.
//!
//! # Example
//!
//! ```toml
//! [server]
//! bind = "127.0.0.1:5080"
//! require_premium = false
//!
//! [db]
//! path = "./data/study.sqlite"
//!
//! [study]
//! max_chunk_size = 18000
//! session_ttl_secs = 3600
//!
//! [selection]
//! top_k = 3
//! locator_chunks = 4
//!
//! [generation]
//! provider = "openai"
//! model = "gemini-2.0-flash"
//! api_key_env = "GEMINI_API_KEY"
//! ```

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

use study_harness_core::select::SelectionParams;

/// Upper bound for `study.session_ttl_secs` (30 days).
pub const MAX_SESSION_TTL_SECS: u64 = 30 * 24 * 60 * 60;

#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub db: DbConfig,
    pub study: StudyConfig,
    pub selection: SelectionConfig,
    pub generation: GenerationConfig,
    pub transcript: TranscriptConfig,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ServerConfig {
    pub bind: String,
    /// Directory for spooled uploads. Defaults to the system temp dir.
    pub upload_dir: Option<PathBuf>,
    /// Require the `x-user-plan: premium` header on study routes.
    pub require_premium: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1:5080".to_string(),
            upload_dir: None,
            require_premium: false,
        }
    }
}

impl ServerConfig {
    pub fn upload_dir(&self) -> PathBuf {
        self.upload_dir.clone().unwrap_or_else(std::env::temp_dir)
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct DbConfig {
    pub path: PathBuf,
    /// Append successful answers and quizzes to the `creations` table.
    pub record_history: bool,
}

impl Default for DbConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("./data/study.sqlite"),
            record_history: true,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct StudyConfig {
    pub max_chunk_size: usize,
    /// Character budget for the context embedded in a prompt.
    pub prompt_budget: usize,
    pub session_ttl_secs: u64,
    pub min_content_chars: usize,
    pub max_upload_bytes: u64,
    pub max_web_bytes: u64,
    pub fetch_timeout_secs: u64,
}

impl StudyConfig {
    /// Session lifetime, capped at [`MAX_SESSION_TTL_SECS`].
    pub fn session_ttl(&self) -> chrono::Duration {
        let secs = self.session_ttl_secs.min(MAX_SESSION_TTL_SECS);
        chrono::Duration::seconds(secs as i64)
    }
}

impl Default for StudyConfig {
    fn default() -> Self {
        Self {
            max_chunk_size: 18_000,
            prompt_budget: 18_000,
            session_ttl_secs: 3_600,
            min_content_chars: 50,
            max_upload_bytes: 10 * 1024 * 1024,
            max_web_bytes: 20 * 1024 * 1024,
            fetch_timeout_secs: 20,
        }
    }
}

/// Relevance heuristics. Defaults match [`SelectionParams::default`].
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct SelectionConfig {
    pub exact_phrase_weight: f64,
    pub keyword_weight: f64,
    pub proximity_weight: f64,
    pub proximity_window: usize,
    pub position_weight: f64,
    pub min_score: f64,
    pub top_k: usize,
    pub locator_chunks: usize,
    pub min_word_len: usize,
}

impl Default for SelectionConfig {
    fn default() -> Self {
        let p = SelectionParams::default();
        Self {
            exact_phrase_weight: p.exact_phrase_weight,
            keyword_weight: p.keyword_weight,
            proximity_weight: p.proximity_weight,
            proximity_window: p.proximity_window,
            position_weight: p.position_weight,
            min_score: p.min_score,
            top_k: p.top_k,
            locator_chunks: p.locator_chunks,
            min_word_len: p.min_word_len,
        }
    }
}

impl Config {
    /// Selection parameters with the prompt budget applied.
    pub fn selection_params(&self) -> SelectionParams {
        let s = &self.selection;
        SelectionParams {
            max_context_chars: self.study.prompt_budget,
            locator_chunks: s.locator_chunks,
            top_k: s.top_k,
            exact_phrase_weight: s.exact_phrase_weight,
            keyword_weight: s.keyword_weight,
            proximity_weight: s.proximity_weight,
            proximity_window: s.proximity_window,
            position_weight: s.position_weight,
            min_score: s.min_score,
            min_word_len: s.min_word_len,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct GenerationConfig {
    pub provider: String,
    /// Base URL of an OpenAI-compatible API (without `/chat/completions`).
    pub base_url: String,
    pub model: String,
    /// Name of the environment variable holding the API key.
    pub api_key_env: String,
    pub timeout_secs: u64,
    pub max_retries: u32,
    pub qa_temperature: f32,
    pub qa_max_tokens: u32,
    pub qa_top_p: f32,
    pub quiz_temperature: f32,
    pub quiz_max_tokens: u32,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            provider: "disabled".to_string(),
            base_url: "https://generativelanguage.googleapis.com/v1beta/openai".to_string(),
            model: "gemini-2.0-flash".to_string(),
            api_key_env: "GEMINI_API_KEY".to_string(),
            timeout_secs: 120,
            max_retries: 2,
            qa_temperature: 0.7,
            qa_max_tokens: 10_000,
            qa_top_p: 0.95,
            quiz_temperature: 0.8,
            quiz_max_tokens: 4_000,
        }
    }
}

impl GenerationConfig {
    pub fn is_enabled(&self) -> bool {
        self.provider != "disabled"
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct TranscriptConfig {
    /// Player endpoint that lists a video's caption tracks.
    pub player_url: String,
    pub client_name: String,
    pub client_version: String,
    /// Preferred caption language.
    pub lang: String,
}

impl Default for TranscriptConfig {
    fn default() -> Self {
        Self {
            player_url: "https://www.youtube.com/youtubei/v1/player".to_string(),
            client_name: "ANDROID".to_string(),
            client_version: "20.10.38".to_string(),
            lang: "en".to_string(),
        }
    }
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;
    validate(&config)?;
    Ok(config)
}

pub fn validate(config: &Config) -> Result<()> {
    if config.study.max_chunk_size == 0 {
        anyhow::bail!("study.max_chunk_size must be > 0");
    }
    if config.study.prompt_budget == 0 {
        anyhow::bail!("study.prompt_budget must be > 0");
    }
    if config.study.session_ttl_secs == 0 {
        anyhow::bail!("study.session_ttl_secs must be > 0");
    }
    if config.study.session_ttl_secs > MAX_SESSION_TTL_SECS {
        anyhow::bail!(
            "study.session_ttl_secs must be <= {} (30 days)",
            MAX_SESSION_TTL_SECS
        );
    }
    if config.selection.top_k == 0 {
        anyhow::bail!("selection.top_k must be >= 1");
    }
    if config.selection.locator_chunks == 0 {
        anyhow::bail!("selection.locator_chunks must be >= 1");
    }

    match config.generation.provider.as_str() {
        "disabled" | "openai" => {}
        other => anyhow::bail!(
            "Unknown generation provider: '{}'. Must be disabled or openai.",
            other
        ),
    }

    if config.generation.is_enabled() && config.generation.model.trim().is_empty() {
        anyhow::bail!(
            "generation.model must be specified when provider is '{}'",
            config.generation.provider
        );
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_uses_defaults() {
        let cfg: Config = toml::from_str("").unwrap();
        validate(&cfg).unwrap();
        assert_eq!(cfg.server.bind, "127.0.0.1:5080");
        assert_eq!(cfg.study.max_chunk_size, 18_000);
        assert_eq!(cfg.study.max_upload_bytes, 10 * 1024 * 1024);
        assert_eq!(cfg.selection.top_k, 3);
        assert!(!cfg.generation.is_enabled());
        assert!(cfg.db.record_history);
    }

    #[test]
    fn selection_params_carry_prompt_budget() {
        let cfg: Config = toml::from_str(
            "[study]\nprompt_budget = 900\n[selection]\ntop_k = 5\nmin_score = 2.5\n",
        )
        .unwrap();
        let p = cfg.selection_params();
        assert_eq!(p.max_context_chars, 900);
        assert_eq!(p.top_k, 5);
        assert_eq!(p.min_score, 2.5);
        assert_eq!(p.locator_chunks, 4);
    }

    #[test]
    fn rejects_unknown_provider() {
        let cfg: Config = toml::from_str("[generation]\nprovider = \"magic\"\n").unwrap();
        let err = validate(&cfg).unwrap_err();
        assert!(err.to_string().contains("Unknown generation provider"));
    }

    #[test]
    fn rejects_zero_chunk_size() {
        let cfg: Config = toml::from_str("[study]\nmax_chunk_size = 0\n").unwrap();
        assert!(validate(&cfg).is_err());
    }

    #[test]
    fn rejects_oversized_session_ttl() {
        let cfg: Config =
            toml::from_str("[study]\nsession_ttl_secs = 9223372036854775807\n").unwrap();
        let err = validate(&cfg).unwrap_err();
        assert!(err.to_string().contains("session_ttl_secs"));

        let cfg: Config = toml::from_str("[study]\nsession_ttl_secs = 2592000\n").unwrap();
        validate(&cfg).unwrap();
    }

    #[test]
    fn session_ttl_is_capped() {
        let study = StudyConfig {
            session_ttl_secs: u64::MAX,
            ..StudyConfig::default()
        };
        assert_eq!(study.session_ttl(), chrono::Duration::days(30));
        assert_eq!(StudyConfig::default().session_ttl(), chrono::Duration::hours(1));
    }

    #[test]
    fn example_config_matches_defaults() {
        let cfg: Config = toml::from_str(include_str!("../config/study.example.toml")).unwrap();
        validate(&cfg).unwrap();
        let defaults = Config::default();
        assert_eq!(cfg.server.bind, defaults.server.bind);
        assert_eq!(cfg.study.max_upload_bytes, defaults.study.max_upload_bytes);
        assert_eq!(cfg.study.max_web_bytes, defaults.study.max_web_bytes);
        assert_eq!(cfg.selection.min_score, defaults.selection.min_score);
        assert_eq!(cfg.generation.base_url, defaults.generation.base_url);
        assert_eq!(cfg.transcript.player_url, defaults.transcript.player_url);
        assert_eq!(cfg.transcript.client_version, defaults.transcript.client_version);
    }

    #[test]
    fn load_config_reports_missing_file() {
        let err = load_config(Path::new("/nonexistent/study.toml")).unwrap_err();
        assert!(err.to_string().contains("Failed to read config file"));
    }
}
