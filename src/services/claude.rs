use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::pipeline::cost::TokenUsage;

pub const ANTHROPIC_VERSION: &str = "2023-06-01";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessagesPayload {
    pub model: String,
    pub max_tokens: u32,
    pub messages: Vec<Message>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system: Option<SystemPrompt>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
}

impl MessagesPayload {
    /// Single-turn request whose system block is marked cacheable.
    pub fn cached(model: &str, max_tokens: u32, system: String, user: String) -> Self {
        Self {
            model: model.to_string(),
            max_tokens,
            messages: vec![Message::user(user)],
            system: Some(SystemPrompt::Blocks(vec![SystemBlock::cached(system)])),
            temperature: None,
        }
    }

    /// Single-turn request with a plain system string.
    pub fn plain(model: &str, max_tokens: u32, system: String, user: String) -> Self {
        Self {
            model: model.to_string(),
            max_tokens,
            messages: vec![Message::user(user)],
            system: Some(SystemPrompt::Text(system)),
            temperature: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub role: String,
    pub content: MessageContent,
}

impl Message {
    pub fn user(text: String) -> Self {
        Self {
            role: "user".into(),
            content: MessageContent::Text(text),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MessageContent {
    Text(String),
    Blocks(Vec<serde_json::Value>),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SystemPrompt {
    Text(String),
    Blocks(Vec<SystemBlock>),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SystemBlock {
    #[serde(rename = "type")]
    pub kind: String,
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cache_control: Option<CacheControl>,
}

impl SystemBlock {
    pub fn cached(text: String) -> Self {
        Self {
            kind: "text".into(),
            text,
            cache_control: Some(CacheControl::ephemeral()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheControl {
    #[serde(rename = "type")]
    pub kind: String,
}

impl CacheControl {
    pub fn ephemeral() -> Self {
        Self {
            kind: "ephemeral".into(),
        }
    }
}

#[derive(Deserialize)]
struct ClaudeResponse {
    content: Option<Vec<ContentBlock>>,
    usage: Option<TokenUsage>,
}

#[derive(Deserialize)]
struct ContentBlock {
    text: Option<String>,
}

#[derive(Deserialize)]
struct ClaudeErrorBody {
    error: Option<ClaudeErrorDetail>,
}

#[derive(Deserialize)]
struct ClaudeErrorDetail {
    message: Option<String>,
}

pub struct ClaudeResult {
    pub text: String,
    pub usage: TokenUsage,
}

/// Why a provider call produced no usable result.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message}")]
pub struct ProviderFailure {
    pub message: String,
}

impl ProviderFailure {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// The LLM endpoint the gateway forwards to.
#[async_trait]
pub trait LlmProvider: Send + Sync {
    async fn send(&self, payload: &MessagesPayload) -> Result<ClaudeResult, ProviderFailure>;
}

/// Anthropic Messages API over HTTPS.
pub struct ClaudeClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl ClaudeClient {
    pub fn new(base_url: &str, api_key: &str) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
        }
    }
}

/// Human-readable message from an error body, or a generic one.
pub fn error_message_from_body(body: &str) -> String {
    serde_json::from_str::<ClaudeErrorBody>(body)
        .ok()
        .and_then(|b| b.error)
        .and_then(|e| e.message)
        .filter(|m| !m.trim().is_empty())
        .unwrap_or_else(|| "Claude API error".to_string())
}

#[async_trait]
impl LlmProvider for ClaudeClient {
    async fn send(&self, payload: &MessagesPayload) -> Result<ClaudeResult, ProviderFailure> {
        let resp = self
            .http
            .post(format!("{}/v1/messages", self.base_url))
            .header("Content-Type", "application/json")
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .json(payload)
            .send()
            .await
            .map_err(|e| ProviderFailure::new(format!("Claude API request failed: {e}")))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            tracing::debug!(%status, "claude returned an error response");
            return Err(ProviderFailure::new(error_message_from_body(&body)));
        }

        let data: ClaudeResponse = resp
            .json()
            .await
            .map_err(|e| ProviderFailure::new(format!("Claude API returned an unreadable body: {e}")))?;
        let text = data
            .content
            .and_then(|c| c.into_iter().next())
            .and_then(|b| b.text)
            .unwrap_or_default();

        Ok(ClaudeResult {
            text,
            usage: data.usage.unwrap_or_default(),
        })
    }
}
