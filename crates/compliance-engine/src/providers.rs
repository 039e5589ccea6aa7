//! HTTP-backed model providers
//!
//! Enabled via the `anthropic` / `openai` cargo features. Both providers
//! implement the single-call [`ModelClient`] contract; retry/backoff is
//! layered on with [`RetryingClient`](crate::model::RetryingClient).

use async_trait::async_trait;
use std::time::Duration;

use crate::model::{ModelClient, ModelError};

const DEFAULT_TIMEOUT_SECS: u64 = 60;
const MAX_COMPLETION_TOKENS: u32 = 4096;

fn http_client() -> Result<reqwest::Client, ModelError> {
    reqwest::Client::builder()
        .timeout(Duration::from_secs(DEFAULT_TIMEOUT_SECS))
        .build()
        .map_err(|e| ModelError::Request(e.to_string()))
}

/// Anthropic messages API client
#[cfg(feature = "anthropic")]
pub struct AnthropicClient {
    client: reqwest::Client,
    api_key: String,
    model: String,
}

#[cfg(feature = "anthropic")]
impl AnthropicClient {
    pub fn new(api_key: String, model: String) -> Result<Self, ModelError> {
        Ok(Self {
            client: http_client()?,
            api_key,
            model,
        })
    }
}

#[cfg(feature = "anthropic")]
#[async_trait]
impl ModelClient for AnthropicClient {
    async fn invoke(&self, prompt: &str) -> Result<String, ModelError> {
        let body = serde_json::json!({
            "model": self.model,
            "max_tokens": MAX_COMPLETION_TOKENS,
            "messages": [{ "role": "user", "content": prompt }],
        });

        let response = self
            .client
            .post("https://api.anthropic.com/v1/messages")
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", "2023-06-01")
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| ModelError::Request(e.to_string()))?;

        if response.status() == 429 {
            return Err(ModelError::Throttled);
        }
        if !response.status().is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(ModelError::Request(text));
        }

        let data: serde_json::Value = response
            .json()
            .await
            .map_err(|e| ModelError::Malformed(e.to_string()))?;

        data["content"][0]["text"]
            .as_str()
            .map(|s| s.to_string())
            .ok_or_else(|| ModelError::Malformed("missing content[0].text".to_string()))
    }
}

/// OpenAI chat-completions API client
#[cfg(feature = "openai")]
pub struct OpenAiClient {
    client: reqwest::Client,
    api_key: String,
    model: String,
    base_url: String,
}

#[cfg(feature = "openai")]
impl OpenAiClient {
    pub fn new(api_key: String, model: String) -> Result<Self, ModelError> {
        Ok(Self {
            client: http_client()?,
            api_key,
            model,
            base_url: "https://api.openai.com/v1".to_string(),
        })
    }

    pub fn with_base_url(mut self, base_url: String) -> Self {
        self.base_url = base_url;
        self
    }
}

#[cfg(feature = "openai")]
#[async_trait]
impl ModelClient for OpenAiClient {
    async fn invoke(&self, prompt: &str) -> Result<String, ModelError> {
        let body = serde_json::json!({
            "model": self.model,
            "max_tokens": MAX_COMPLETION_TOKENS,
            "messages": [{ "role": "user", "content": prompt }],
        });

        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| ModelError::Request(e.to_string()))?;

        if response.status() == 429 {
            return Err(ModelError::Throttled);
        }
        if !response.status().is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(ModelError::Request(text));
        }

        let data: serde_json::Value = response
            .json()
            .await
            .map_err(|e| ModelError::Malformed(e.to_string()))?;

        data["choices"][0]["message"]["content"]
            .as_str()
            .map(|s| s.to_string())
            .ok_or_else(|| ModelError::Malformed("missing choices[0].message.content".to_string()))
    }
}
