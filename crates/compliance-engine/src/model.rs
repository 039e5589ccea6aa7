//! Model invocation boundary
//!
//! The pipeline treats the model as an opaque oracle mapping a prompt string
//! to untrusted text. Transport concerns (timeouts, retry/backoff) live in
//! the client decorators here; the pipeline itself only sees
//! `invoke(prompt) -> String`.

use async_trait::async_trait;
use std::collections::VecDeque;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::warn;

/// Transport-level model failures
#[derive(Debug, Error)]
pub enum ModelError {
    #[error("model request failed: {0}")]
    Request(String),

    #[error("model throttled")]
    Throttled,

    #[error("malformed model response: {0}")]
    Malformed(String),
}

impl ModelError {
    pub fn is_retryable(&self) -> bool {
        matches!(self, ModelError::Request(_) | ModelError::Throttled)
    }
}

/// A single text-completion call
#[async_trait]
pub trait ModelClient: Send + Sync {
    async fn invoke(&self, prompt: &str) -> Result<String, ModelError>;
}

/// Decorator adding bounded exponential backoff on retryable errors
pub struct RetryingClient<C> {
    inner: C,
    max_retries: u32,
    base_delay: Duration,
}

impl<C> RetryingClient<C> {
    pub fn new(inner: C) -> Self {
        Self {
            inner,
            max_retries: 3,
            base_delay: Duration::from_millis(500),
        }
    }

    pub fn with_policy(mut self, max_retries: u32, base_delay: Duration) -> Self {
        self.max_retries = max_retries;
        self.base_delay = base_delay;
        self
    }
}

#[async_trait]
impl<C: ModelClient> ModelClient for RetryingClient<C> {
    async fn invoke(&self, prompt: &str) -> Result<String, ModelError> {
        let mut attempt = 0u32;
        loop {
            match self.inner.invoke(prompt).await {
                Ok(response) => return Ok(response),
                Err(e) if e.is_retryable() && attempt < self.max_retries => {
                    let delay = self.base_delay * 2u32.saturating_pow(attempt);
                    warn!(
                        "model call failed (attempt {}/{}), retrying in {:?}: {}",
                        attempt + 1,
                        self.max_retries,
                        delay,
                        e
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

/// Client used when no provider is configured; every batch yields zero
/// findings.
pub struct NoopClient;

#[async_trait]
impl ModelClient for NoopClient {
    async fn invoke(&self, _prompt: &str) -> Result<String, ModelError> {
        Ok("[]".to_string())
    }
}

/// Test double that pops scripted responses in invocation order
pub struct ScriptedClient {
    responses: Mutex<VecDeque<Result<String, ModelError>>>,
}

impl ScriptedClient {
    pub fn new(responses: Vec<Result<String, ModelError>>) -> Self {
        Self {
            responses: Mutex::new(responses.into()),
        }
    }

    /// A client that always answers with the same text
    pub fn always(response: &str) -> FnClient<impl Fn(&str) -> Result<String, ModelError>> {
        let response = response.to_string();
        FnClient(move |_prompt: &str| Ok(response.clone()))
    }
}

#[async_trait]
impl ModelClient for ScriptedClient {
    async fn invoke(&self, _prompt: &str) -> Result<String, ModelError> {
        self.responses
            .lock()
            .await
            .pop_front()
            .unwrap_or_else(|| Ok("[]".to_string()))
    }
}

/// Test double that computes its response from the prompt
pub struct FnClient<F>(pub F);

#[async_trait]
impl<F> ModelClient for FnClient<F>
where
    F: Fn(&str) -> Result<String, ModelError> + Send + Sync,
{
    async fn invoke(&self, prompt: &str) -> Result<String, ModelError> {
        (self.0)(prompt)
    }
}
