use serde::Deserialize;

use crate::services::llm::LlmConfig;

#[derive(Debug, Deserialize)]
pub struct AppConfig {
    /// Server bind address (e.g., "0.0.0.0:3000"). Optional for worker processes.
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,

    /// PostgreSQL connection string
    pub database_url: String,

    /// S3-compatible bucket holding plugin source files
    pub source_bucket: String,

    /// Source storage endpoint URL
    pub source_endpoint: String,

    /// Source storage access key ID
    pub source_access_key: String,

    /// Source storage secret access key
    pub source_secret_key: String,

    /// Model identifier sent to the chat-completions backend
    pub llm_model: String,

    /// API key for the chat-completions backend
    pub llm_api_key: String,

    /// Chat-completions API root
    #[serde(default = "default_llm_base_url")]
    pub llm_base_url: String,

    /// Optional HTTP-Referer header for gateway attribution
    #[serde(default)]
    pub llm_http_referer: Option<String>,

    /// Timeout for one model call, in milliseconds
    #[serde(default = "default_llm_timeout_ms")]
    pub llm_timeout_ms: u64,

    /// Jobs claimed per batch-processing pass
    #[serde(default = "default_batch_size")]
    pub batch_size: i64,

    /// Optional webhook endpoint receiving completion notifications
    #[serde(default)]
    pub notify_webhook_url: Option<String>,
}

fn default_bind_addr() -> String {
    "0.0.0.0:3000".to_string()
}

fn default_llm_base_url() -> String {
    "https://openrouter.ai/api/v1".to_string()
}

fn default_llm_timeout_ms() -> u64 {
    60_000
}

fn default_batch_size() -> i64 {
    10
}

impl AppConfig {
    pub fn from_env() -> Result<Self, envy::Error> {
        dotenvy::dotenv().ok();
        envy::from_env()
    }

    /// The injected value handed to the LLM client constructor.
    pub fn llm(&self) -> LlmConfig {
        LlmConfig {
            model: self.llm_model.clone(),
            api_key: self.llm_api_key.clone(),
            base_url: self.llm_base_url.clone(),
            http_referer: self.llm_http_referer.clone(),
            timeout_ms: self.llm_timeout_ms,
        }
    }
}
