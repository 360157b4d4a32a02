use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

/// Settings for the chat-completions backend. Injected as a value at
/// construction; nothing here is read from ambient environment state at
/// call time.
#[derive(Debug, Clone, Deserialize)]
pub struct LlmConfig {
    /// Model identifier, e.g. "anthropic/claude-sonnet-4".
    pub model: String,
    pub api_key: String,
    /// API root, e.g. "https://openrouter.ai/api/v1".
    pub base_url: String,
    /// Optional HTTP-Referer header for gateway attribution.
    pub http_referer: Option<String>,
    /// Request timeout applied to the whole HTTP call.
    pub timeout_ms: u64,
}

/// One-shot chat completion: a system instruction plus a user message in,
/// free-form text out.
#[async_trait]
pub trait ChatModel: Send + Sync {
    async fn complete(&self, system: &str, user: &str) -> Result<String, LlmError>;
}

/// Client for an OpenRouter-compatible chat-completions endpoint.
pub struct OpenRouterClient {
    http: Client,
    config: LlmConfig,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Deserialize)]
struct ChatChoiceMessage {
    content: String,
}

impl OpenRouterClient {
    pub fn new(config: LlmConfig) -> Result<Self, LlmError> {
        let http = Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .build()
            .map_err(LlmError::Http)?;
        Ok(Self { http, config })
    }
}

#[async_trait]
impl ChatModel for OpenRouterClient {
    async fn complete(&self, system: &str, user: &str) -> Result<String, LlmError> {
        let url = format!(
            "{}/chat/completions",
            self.config.base_url.trim_end_matches('/')
        );

        let body = ChatRequest {
            model: &self.config.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: system,
                },
                ChatMessage {
                    role: "user",
                    content: user,
                },
            ],
        };

        let mut request = self
            .http
            .post(&url)
            .bearer_auth(&self.config.api_key)
            .json(&body);
        if let Some(referer) = &self.config.http_referer {
            request = request.header("HTTP-Referer", referer);
        }

        let response = request.send().await.map_err(LlmError::Http)?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(LlmError::Api {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: ChatResponse = response.json().await.map_err(LlmError::Http)?;
        parsed
            .choices
            .into_iter()
            .next()
            .map(|choice| choice.message.content)
            .ok_or(LlmError::EmptyResponse)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("model API returned status {status}: {body}")]
    Api { status: u16, body: String },

    #[error("model response contained no choices")]
    EmptyResponse,
}
