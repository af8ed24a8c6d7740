//! Reasoning backends.

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, instrument};
use triage_config::ArbitrationSettings;

use crate::error::ArbitrationError;

const API_KEY_ENV: &str = "OPENAI_API_KEY";

/// Prompt pair sent to a backend.
#[derive(Debug, Clone)]
pub struct ReasoningRequest {
    pub system_prompt: String,
    pub user_prompt: String,
}

impl ReasoningRequest {
    pub fn new(system_prompt: impl Into<String>, user_prompt: impl Into<String>) -> Self {
        Self {
            system_prompt: system_prompt.into(),
            user_prompt: user_prompt.into(),
        }
    }
}

/// Text-completion service behind an arbitrator.
#[async_trait]
pub trait ReasoningBackend: Send + Sync {
    /// Backend name used in logs.
    fn name(&self) -> &str;

    /// Return the raw answer text.
    async fn complete(&self, request: &ReasoningRequest) -> Result<String, ArbitrationError>;
}

#[derive(Debug, Deserialize)]
struct ChatMessage {
    content: Value,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

/// OpenAI-compatible chat completion backend with JSON response format.
#[derive(Debug, Clone)]
pub struct OpenAiChatBackend {
    client: Client,
    endpoint: String,
    api_key: String,
    model: String,
    temperature: f32,
    max_tokens: u32,
}

impl OpenAiChatBackend {
    /// Build from settings, taking the API key from the settings or the
    /// `OPENAI_API_KEY` environment variable.
    pub fn from_settings(settings: &ArbitrationSettings) -> Result<Self, ArbitrationError> {
        let api_key = settings
            .api_key
            .clone()
            .filter(|k| !k.trim().is_empty())
            .or_else(|| std::env::var(API_KEY_ENV).ok().filter(|k| !k.trim().is_empty()))
            .ok_or_else(|| {
                ArbitrationError::NotConfigured(format!(
                    "no API key in settings or {API_KEY_ENV}"
                ))
            })?;
        Self::new(settings, api_key)
    }

    pub fn new(settings: &ArbitrationSettings, api_key: impl Into<String>) -> Result<Self, ArbitrationError> {
        let client = Client::builder()
            .build()
            .map_err(|e| ArbitrationError::NotConfigured(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            client,
            endpoint: resolve_chat_endpoint(&settings.api_base),
            api_key: api_key.into(),
            model: settings.model.clone(),
            temperature: settings.temperature,
            max_tokens: settings.max_tokens,
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn payload(&self, request: &ReasoningRequest) -> Value {
        json!({
            "model": self.model,
            "messages": [
                {"role": "system", "content": request.system_prompt},
                {"role": "user", "content": request.user_prompt},
            ],
            "temperature": self.temperature,
            "max_tokens": self.max_tokens,
            "response_format": {"type": "json_object"},
        })
    }
}

#[async_trait]
impl ReasoningBackend for OpenAiChatBackend {
    fn name(&self) -> &str {
        "openai_chat"
    }

    #[instrument(skip(self, request), fields(model = %self.model))]
    async fn complete(&self, request: &ReasoningRequest) -> Result<String, ArbitrationError> {
        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&self.payload(request))
            .send()
            .await
            .map_err(|e| ArbitrationError::Backend(format!("chat request failed: {e}")))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(ArbitrationError::Backend(format!(
                "chat endpoint returned {status}: {}",
                truncate(&body, 320)
            )));
        }

        let body: ChatResponse = response
            .json()
            .await
            .map_err(|e| ArbitrationError::Malformed(format!("invalid chat response: {e}")))?;

        let choice = body
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| ArbitrationError::Backend("chat response had no choices".to_string()))?;
        debug!(finish_reason = ?choice.finish_reason, "chat completion received");

        let text = extract_text(&choice.message.content);
        if text.trim().is_empty() {
            return Err(ArbitrationError::Backend("chat response was empty".to_string()));
        }
        Ok(text)
    }
}

fn resolve_chat_endpoint(base: &str) -> String {
    if base.contains("/chat/completions") {
        base.to_string()
    } else {
        format!("{}/chat/completions", base.trim_end_matches('/'))
    }
}

fn extract_text(content: &Value) -> String {
    match content {
        Value::String(text) => text.clone(),
        Value::Array(parts) => parts
            .iter()
            .filter_map(|part| part.get("text").and_then(Value::as_str))
            .collect::<Vec<_>>()
            .join("\n"),
        _ => String::new(),
    }
}

fn truncate(value: &str, max_chars: usize) -> String {
    let mut chars = value.chars();
    let head: String = chars.by_ref().take(max_chars).collect();
    if chars.next().is_some() {
        format!("{head}...")
    } else {
        head
    }
}
