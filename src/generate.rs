//! Text-generation collaborator.
//!
//! Defines the [`TextGenerator`] trait and its implementations:
//!
//! | Provider | Backend |
//! |----------|---------|
//! | `disabled` | [`DisabledGenerator`]: always fails |
//! | `openai` | [`OpenAICompatGenerator`]: any OpenAI-compatible `/chat/completions` API |
//!
//! The default endpoint is Gemini's OpenAI-compatible surface. The API key
//! is read from the environment variable named by `generation.api_key_env`.
//!
//! # Retry
//!
//! HTTP 429, 5xx, and network errors are retried with exponential backoff
//! (1s, 2s, 4s, ...) up to `generation.max_retries` times. Other client
//! errors fail immediately.

use std::time::Duration;

use anyhow::{bail, Result};
use async_trait::async_trait;

use crate::config::GenerationConfig;

/// One generation call.
#[derive(Debug, Clone)]
pub struct GenerationRequest {
    pub prompt: String,
    pub temperature: f32,
    pub max_tokens: u32,
    pub top_p: Option<f32>,
}

impl GenerationRequest {
    pub fn qa(prompt: String, config: &GenerationConfig) -> Self {
        Self {
            prompt,
            temperature: config.qa_temperature,
            max_tokens: config.qa_max_tokens,
            top_p: Some(config.qa_top_p),
        }
    }

    pub fn quiz(prompt: String, config: &GenerationConfig) -> Self {
        Self {
            prompt,
            temperature: config.quiz_temperature,
            max_tokens: config.quiz_max_tokens,
            top_p: None,
        }
    }
}

/// Generates text from an assembled prompt.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    fn model_name(&self) -> &str;

    async fn generate(&self, request: &GenerationRequest) -> Result<String>;
}

/// Generator used when `generation.provider = "disabled"`.
pub struct DisabledGenerator;

#[async_trait]
impl TextGenerator for DisabledGenerator {
    fn model_name(&self) -> &str {
        "disabled"
    }

    async fn generate(&self, _request: &GenerationRequest) -> Result<String> {
        bail!("text generation is disabled (set generation.provider)")
    }
}

/// Client for OpenAI-compatible chat completion APIs.
pub struct OpenAICompatGenerator {
    client: reqwest::Client,
    endpoint: String,
    api_key: String,
    model: String,
    max_retries: u32,
}

impl OpenAICompatGenerator {
    pub fn new(config: &GenerationConfig) -> Result<Self> {
        let api_key = std::env::var(&config.api_key_env)
            .map_err(|_| anyhow::anyhow!("{} not set", config.api_key_env))?;
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self {
            client,
            endpoint: format!("{}/chat/completions", config.base_url.trim_end_matches('/')),
            api_key,
            model: config.model.clone(),
            max_retries: config.max_retries,
        })
    }
}

#[async_trait]
impl TextGenerator for OpenAICompatGenerator {
    fn model_name(&self) -> &str {
        &self.model
    }

    async fn generate(&self, request: &GenerationRequest) -> Result<String> {
        let mut body = serde_json::json!({
            "model": self.model,
            "messages": [{ "role": "user", "content": request.prompt }],
            "temperature": request.temperature,
            "max_tokens": request.max_tokens,
        });
        if let Some(top_p) = request.top_p {
            body["top_p"] = serde_json::json!(top_p);
        }

        let mut last_err = None;

        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                let delay = Duration::from_secs(1 << (attempt - 1).min(5));
                tracing::warn!(attempt, ?delay, "retrying generation request");
                tokio::time::sleep(delay).await;
            }

            let resp = self
                .client
                .post(&self.endpoint)
                .bearer_auth(&self.api_key)
                .json(&body)
                .send()
                .await;

            match resp {
                Ok(response) => {
                    let status = response.status();

                    if status.is_success() {
                        let json: serde_json::Value = response.json().await?;
                        return parse_chat_response(&json);
                    }

                    if status.as_u16() == 429 || status.is_server_error() {
                        let body_text = response.text().await.unwrap_or_default();
                        last_err = Some(anyhow::anyhow!(
                            "generation API error {}: {}",
                            status,
                            body_text
                        ));
                        continue;
                    }

                    let body_text = response.text().await.unwrap_or_default();
                    bail!("generation API error {}: {}", status, body_text);
                }
                Err(e) => {
                    last_err = Some(e.into());
                    continue;
                }
            }
        }

        Err(last_err.unwrap_or_else(|| anyhow::anyhow!("generation failed after retries")))
    }
}

/// Extract `choices[0].message.content` from a chat completion response.
fn parse_chat_response(json: &serde_json::Value) -> Result<String> {
    let content = json
        .pointer("/choices/0/message/content")
        .and_then(|c| c.as_str())
        .ok_or_else(|| anyhow::anyhow!("invalid chat completion response: missing content"))?;
    if content.trim().is_empty() {
        bail!("generation returned empty content");
    }
    Ok(content.to_string())
}

/// Build the generator selected by `config.provider`.
pub fn create_generator(config: &GenerationConfig) -> Result<Box<dyn TextGenerator>> {
    match config.provider.as_str() {
        "disabled" => Ok(Box::new(DisabledGenerator)),
        "openai" => Ok(Box::new(OpenAICompatGenerator::new(config)?)),
        other => bail!("Unknown generation provider: {}", other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_chat_completion_content() {
        let json = serde_json::json!({
            "choices": [{ "message": { "role": "assistant", "content": "Cells divide." } }]
        });
        assert_eq!(parse_chat_response(&json).unwrap(), "Cells divide.");
    }

    #[test]
    fn rejects_missing_or_blank_content() {
        assert!(parse_chat_response(&serde_json::json!({ "choices": [] })).is_err());
        let blank = serde_json::json!({ "choices": [{ "message": { "content": "  " } }] });
        assert!(parse_chat_response(&blank).is_err());
    }

    #[test]
    fn request_presets_follow_config() {
        let cfg = GenerationConfig::default();
        let qa = GenerationRequest::qa("p".into(), &cfg);
        assert_eq!(qa.max_tokens, 10_000);
        assert_eq!(qa.top_p, Some(0.95));
        let quiz = GenerationRequest::quiz("p".into(), &cfg);
        assert_eq!(quiz.max_tokens, 4_000);
        assert!(quiz.top_p.is_none());
    }

    #[tokio::test]
    async fn disabled_generator_fails() {
        let gen = create_generator(&GenerationConfig::default()).unwrap();
        assert_eq!(gen.model_name(), "disabled");
        let req = GenerationRequest::qa("hello".into(), &GenerationConfig::default());
        assert!(gen.generate(&req).await.is_err());
    }
}
