//! # tasklens-llm
//!
//! The generative model collaborator: one `invoke(prompt) -> text` call,
//! used for criteria extraction (JSON-shaped output) and answer synthesis.
//!
//! Implementations:
//! - `ApiModel`: OpenAI-compatible, Anthropic and Ollama HTTP APIs with retry
//! - `MockModel`: scripted responses for tests and offline use

mod api;
mod mock;

pub use api::{ApiModel, ApiModelConfig, Provider};
pub use mock::MockModel;

use async_trait::async_trait;
use thiserror::Error;

/// Error type for model calls.
#[derive(Debug, Error)]
pub enum ModelError {
    #[error("API request failed: {0}")]
    ApiError(String),

    #[error("Failed to parse API response: {0}")]
    ParseError(String),

    #[error("Rate limit exceeded")]
    RateLimitExceeded,

    #[error("Invalid configuration: {0}")]
    ConfigError(String),

    #[error("Timeout waiting for response")]
    Timeout,

    #[error("No model configured")]
    Disabled,
}

/// Pluggable generative model.
///
/// Implementations must be safe to share across concurrent queries.
#[async_trait]
pub trait GenerativeModel: Send + Sync {
    /// Send a prompt and return the raw completion text.
    async fn invoke(&self, prompt: &str) -> Result<String, ModelError>;

    /// Short name for logs.
    fn name(&self) -> &str {
        "model"
    }
}

/// Extract a JSON object from model output.
///
/// Handles ```json fences, plain fences, and prose around a bare object.
pub fn extract_json(text: &str) -> String {
    if let Some(start) = text.find("```json") {
        let body = &text[start + 7..];
        if let Some(end) = body.find("```") {
            return body[..end].trim().to_string();
        }
    }

    if let Some(start) = text.find("```") {
        let body = &text[start + 3..];
        if let Some(end) = body.find("```") {
            return body[..end].trim().to_string();
        }
    }

    if let (Some(start), Some(end)) = (text.find('{'), text.rfind('}')) {
        if start < end {
            return text[start..=end].to_string();
        }
    }

    text.trim().to_string()
}
