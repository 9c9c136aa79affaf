//! Scripted model for tests and offline runs.

use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use crate::{GenerativeModel, ModelError};

/// Mock model that replays scripted responses.
///
/// Responses are returned in order; once the script is exhausted the
/// fallback response is returned for every further call. Prompts are
/// recorded so tests can assert on what was sent.
pub struct MockModel {
    script: Mutex<VecDeque<Result<String, String>>>,
    fallback: Option<String>,
    delay: Option<Duration>,
    prompts: Mutex<Vec<String>>,
}

impl MockModel {
    /// A model that always answers with `response`.
    pub fn new(response: impl Into<String>) -> Self {
        Self {
            script: Mutex::new(VecDeque::new()),
            fallback: Some(response.into()),
            delay: None,
            prompts: Mutex::new(Vec::new()),
        }
    }

    /// A model whose every call fails.
    pub fn failing() -> Self {
        Self {
            script: Mutex::new(VecDeque::new()),
            fallback: None,
            delay: None,
            prompts: Mutex::new(Vec::new()),
        }
    }

    /// Queue a response ahead of the fallback.
    pub fn then_respond(self, response: impl Into<String>) -> Self {
        self.push(Ok(response.into()))
    }

    /// Queue a failure ahead of the fallback.
    pub fn then_fail(self, message: impl Into<String>) -> Self {
        self.push(Err(message.into()))
    }

    /// Delay every call.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Prompts received so far, in call order.
    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().map(|p| p.clone()).unwrap_or_default()
    }

    pub fn call_count(&self) -> usize {
        self.prompts.lock().map(|p| p.len()).unwrap_or_default()
    }

    fn push(self, entry: Result<String, String>) -> Self {
        if let Ok(mut script) = self.script.lock() {
            script.push_back(entry);
        }
        self
    }
}

#[async_trait]
impl GenerativeModel for MockModel {
    async fn invoke(&self, prompt: &str) -> Result<String, ModelError> {
        if let Ok(mut prompts) = self.prompts.lock() {
            prompts.push(prompt.to_string());
        }

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        let next = self.script.lock().ok().and_then(|mut s| s.pop_front());
        match next {
            Some(Ok(response)) => Ok(response),
            Some(Err(message)) => Err(ModelError::ApiError(message)),
            None => self
                .fallback
                .clone()
                .ok_or_else(|| ModelError::ApiError("mock model failure".to_string())),
        }
    }

    fn name(&self) -> &str {
        "mock"
    }
}
