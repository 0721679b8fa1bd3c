//! Chat-completion backends.
//!
//! [`CompletionModel`] is the seam between the chains and the network:
//! [`OpenAIChat`] talks to `POST {base_url}/chat/completions`, tests plug in
//! their own implementations.
//!
//! Completion calls are never retried. A rate-limit or quota response is
//! surfaced as [`CompletionError::RateLimited`] for the caller to report.

use async_trait::async_trait;
use std::time::Duration;
use tracing::debug;

use crate::config::LlmConfig;
use crate::credentials::ApiKey;
use crate::error::CompletionError;

/// Anything that turns a prompt into free text.
#[async_trait]
pub trait CompletionModel: Send + Sync {
    /// Model identifier, for logging.
    fn model_name(&self) -> &str;

    /// Complete a single user prompt.
    async fn complete(&self, prompt: &str) -> Result<String, CompletionError>;
}

/// OpenAI chat completions client.
pub struct OpenAIChat {
    client: reqwest::Client,
    api_key: ApiKey,
    model: String,
    temperature: f32,
    endpoint: String,
}

impl OpenAIChat {
    /// Build a client from config. Fails only if the HTTP client cannot be
    /// constructed (e.g. TLS backend initialization).
    pub fn new(config: &LlmConfig, api_key: ApiKey) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            client,
            api_key,
            model: config.model.clone(),
            temperature: config.temperature,
            endpoint: format!("{}/chat/completions", config.base_url.trim_end_matches('/')),
        })
    }

    /// Same client with a different sampling temperature.
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    fn request_body(&self, prompt: &str) -> serde_json::Value {
        serde_json::json!({
            "model": self.model,
            "temperature": self.temperature,
            "messages": [
                { "role": "user", "content": prompt }
            ],
        })
    }
}

#[async_trait]
impl CompletionModel for OpenAIChat {
    fn model_name(&self) -> &str {
        &self.model
    }

    async fn complete(&self, prompt: &str) -> Result<String, CompletionError> {
        debug!(model = %self.model, endpoint = %self.endpoint, "requesting completion");

        let response = self
            .client
            .post(&self.endpoint)
            .header("Authorization", format!("Bearer {}", self.api_key.expose()))
            .header("Content-Type", "application/json")
            .json(&self.request_body(prompt))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body_text = response.text().await.unwrap_or_default();
            return Err(CompletionError::from_api(status.as_u16(), &body_text));
        }

        let json: serde_json::Value = response.json().await?;
        parse_chat_response(&json)
    }
}

/// Extract `choices[0].message.content` from a chat completion response.
pub fn parse_chat_response(json: &serde_json::Value) -> Result<String, CompletionError> {
    json.get("choices")
        .and_then(|c| c.as_array())
        .and_then(|c| c.first())
        .and_then(|choice| choice.get("message"))
        .and_then(|m| m.get("content"))
        .and_then(|c| c.as_str())
        .map(str::to_string)
        .ok_or_else(|| {
            CompletionError::Other(
                "Invalid OpenAI response: missing choices[0].message.content".to_string(),
            )
        })
}
