//! HTTP model client for OpenAI-compatible, Anthropic and Ollama endpoints.

use async_trait::async_trait;
use backoff::{backoff::Backoff, ExponentialBackoff};
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, error, warn};

use tasklens_types::ModelSettings;

use crate::{GenerativeModel, ModelError};

/// Wire protocol spoken by the endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Provider {
    /// `POST {base}/chat/completions`
    OpenAi,
    /// `POST {base}/messages`
    Anthropic,
    /// `POST {base}/api/generate`
    Ollama,
}

impl Provider {
    pub fn parse(name: &str) -> Result<Self, ModelError> {
        match name.trim().to_ascii_lowercase().as_str() {
            "openai" => Ok(Provider::OpenAi),
            "anthropic" | "claude" => Ok(Provider::Anthropic),
            "ollama" => Ok(Provider::Ollama),
            "none" => Err(ModelError::Disabled),
            other => Err(ModelError::ConfigError(format!("unknown provider: {}", other))),
        }
    }
}

/// Configuration for the API model.
#[derive(Debug, Clone)]
pub struct ApiModelConfig {
    pub provider: Provider,

    /// API base URL (e.g., "https://api.openai.com/v1")
    pub base_url: String,

    pub model: String,

    /// Unused for Ollama
    pub api_key: SecretString,

    /// Per-request timeout
    pub timeout: Duration,

    /// Total attempts per call, including the first
    pub max_retries: u32,
}

impl ApiModelConfig {
    pub fn openai(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            provider: Provider::OpenAi,
            base_url: "https://api.openai.com/v1".to_string(),
            model: model.into(),
            api_key: SecretString::from(api_key.into()),
            timeout: Duration::from_secs(30),
            max_retries: 3,
        }
    }

    pub fn anthropic(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            provider: Provider::Anthropic,
            base_url: "https://api.anthropic.com/v1".to_string(),
            model: model.into(),
            api_key: SecretString::from(api_key.into()),
            timeout: Duration::from_secs(30),
            max_retries: 3,
        }
    }

    pub fn ollama(model: impl Into<String>) -> Self {
        Self {
            provider: Provider::Ollama,
            base_url: "http://localhost:11434".to_string(),
            model: model.into(),
            api_key: SecretString::from(String::new()),
            timeout: Duration::from_secs(30),
            max_retries: 2,
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    /// Build from settings. Returns `ModelError::Disabled` for provider "none".
    pub fn from_settings(settings: &ModelSettings) -> Result<Self, ModelError> {
        let provider = Provider::parse(&settings.provider)?;
        let key = settings.api_key.clone().unwrap_or_default();

        let mut config = match provider {
            Provider::OpenAi => Self::openai(key, &settings.model),
            Provider::Anthropic => Self::anthropic(key, &settings.model),
            Provider::Ollama => Self::ollama(&settings.model),
        };
        if provider != Provider::Ollama && config.api_key.expose_secret().is_empty() {
            return Err(ModelError::ConfigError(format!(
                "provider {} requires an api key",
                settings.provider
            )));
        }
        if let Some(url) = &settings.api_base_url {
            config = config.with_base_url(url.as_str());
        }
        config.timeout = settings.timeout();
        config.max_retries = settings.max_retries.max(1);
        Ok(config)
    }
}

/// API-backed generative model.
pub struct ApiModel {
    client: Client,
    config: ApiModelConfig,
}

impl ApiModel {
    pub fn new(config: ApiModelConfig) -> Result<Self, ModelError> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| ModelError::ConfigError(e.to_string()))?;

        Ok(Self { client, config })
    }

    pub fn config(&self) -> &ApiModelConfig {
        &self.config
    }

    /// Call the API with retry logic.
    async fn call_api(&self, prompt: &str) -> Result<String, ModelError> {
        let mut backoff = ExponentialBackoff {
            current_interval: Duration::from_millis(200),
            initial_interval: Duration::from_millis(200),
            max_elapsed_time: Some(self.config.timeout * self.config.max_retries.max(1)),
            ..Default::default()
        };

        let mut attempts = 0;

        loop {
            attempts += 1;
            debug!(attempt = attempts, provider = ?self.config.provider, "Calling model API");

            match self.make_request(prompt).await {
                Ok(response) => return Ok(response),
                Err(e) => {
                    if attempts >= self.config.max_retries || matches!(e, ModelError::ParseError(_)) {
                        error!(error = %e, attempts, "Model call failed");
                        return Err(e);
                    }

                    match backoff.next_backoff() {
                        Some(duration) => {
                            warn!(
                                error = %e,
                                retry_in_ms = duration.as_millis(),
                                "Model call failed, retrying"
                            );
                            tokio::time::sleep(duration).await;
                        }
                        None => {
                            error!(error = %e, "Backoff exhausted");
                            return Err(e);
                        }
                    }
                }
            }
        }
    }

    async fn make_request(&self, prompt: &str) -> Result<String, ModelError> {
        match self.config.provider {
            Provider::OpenAi => self.make_openai_request(prompt).await,
            Provider::Anthropic => self.make_anthropic_request(prompt).await,
            Provider::Ollama => self.make_ollama_request(prompt).await,
        }
    }

    async fn send(&self, request: reqwest::RequestBuilder) -> Result<reqwest::Response, ModelError> {
        let response = request.send().await.map_err(|e| {
            if e.is_timeout() {
                ModelError::Timeout
            } else {
                ModelError::ApiError(e.to_string())
            }
        })?;

        if response.status() == 429 {
            return Err(ModelError::RateLimitExceeded);
        }

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(ModelError::ApiError(format!("HTTP {}: {}", status, body)));
        }

        Ok(response)
    }

    async fn make_openai_request(&self, prompt: &str) -> Result<String, ModelError> {
        #[derive(Serialize)]
        struct ChatRequest<'a> {
            model: &'a str,
            messages: Vec<ChatMessage<'a>>,
            temperature: f32,
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
            message: ChatMessageResponse,
        }

        #[derive(Deserialize)]
        struct ChatMessageResponse {
            content: String,
        }

        let request = ChatRequest {
            model: &self.config.model,
            messages: vec![ChatMessage {
                role: "user",
                content: prompt,
            }],
            temperature: 0.0,
        };

        let url = format!("{}/chat/completions", self.config.base_url);
        let response = self
            .send(
                self.client
                    .post(&url)
                    .bearer_auth(self.config.api_key.expose_secret())
                    .json(&request),
            )
            .await?;

        let body: ChatResponse = response
            .json()
            .await
            .map_err(|e| ModelError::ParseError(e.to_string()))?;

        body.choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .ok_or_else(|| ModelError::ParseError("No choices in response".to_string()))
    }

    async fn make_anthropic_request(&self, prompt: &str) -> Result<String, ModelError> {
        #[derive(Serialize)]
        struct MessagesRequest<'a> {
            model: &'a str,
            max_tokens: u32,
            messages: Vec<Message<'a>>,
        }

        #[derive(Serialize)]
        struct Message<'a> {
            role: &'a str,
            content: &'a str,
        }

        #[derive(Deserialize)]
        struct MessagesResponse {
            content: Vec<ContentBlock>,
        }

        #[derive(Deserialize)]
        struct ContentBlock {
            #[serde(default)]
            text: String,
        }

        let request = MessagesRequest {
            model: &self.config.model,
            max_tokens: 1024,
            messages: vec![Message {
                role: "user",
                content: prompt,
            }],
        };

        let url = format!("{}/messages", self.config.base_url);
        let response = self
            .send(
                self.client
                    .post(&url)
                    .header("x-api-key", self.config.api_key.expose_secret())
                    .header("anthropic-version", "2023-06-01")
                    .json(&request),
            )
            .await?;

        let body: MessagesResponse = response
            .json()
            .await
            .map_err(|e| ModelError::ParseError(e.to_string()))?;

        body.content
            .into_iter()
            .next()
            .map(|c| c.text)
            .ok_or_else(|| ModelError::ParseError("No content in response".to_string()))
    }

    async fn make_ollama_request(&self, prompt: &str) -> Result<String, ModelError> {
        #[derive(Serialize)]
        struct GenerateRequest<'a> {
            model: &'a str,
            prompt: &'a str,
            stream: bool,
        }

        #[derive(Deserialize)]
        struct GenerateResponse {
            response: String,
        }

        let request = GenerateRequest {
            model: &self.config.model,
            prompt,
            stream: false,
        };

        let url = format!("{}/api/generate", self.config.base_url);
        let response = self.send(self.client.post(&url).json(&request)).await?;

        let body: GenerateResponse = response
            .json()
            .await
            .map_err(|e| ModelError::ParseError(e.to_string()))?;
        Ok(body.response)
    }
}

#[async_trait]
impl GenerativeModel for ApiModel {
    async fn invoke(&self, prompt: &str) -> Result<String, ModelError> {
        self.call_api(prompt).await
    }

    fn name(&self) -> &str {
        &self.config.model
    }
}
