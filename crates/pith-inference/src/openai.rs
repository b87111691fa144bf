//! OpenAI-compatible chat backend.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use pith_core::defaults::{LLM_DEFAULT_URL, LLM_TIMEOUT_SECS};
use pith_core::{ChatBackend, Error, Result};

/// Configuration for the OpenAI-compatible backend.
#[derive(Debug, Clone)]
pub struct OpenAIConfig {
    /// Base URL for the API endpoint.
    pub base_url: String,
    /// API key for authentication (optional for local endpoints).
    pub api_key: Option<String>,
    /// Request timeout in seconds.
    pub timeout_seconds: u64,
}

impl Default for OpenAIConfig {
    fn default() -> Self {
        Self {
            base_url: LLM_DEFAULT_URL.to_string(),
            api_key: None,
            timeout_seconds: LLM_TIMEOUT_SECS,
        }
    }
}

impl OpenAIConfig {
    /// Read from `LLM_BASE_URL`, `LLM_API_KEY`, `LLM_TIMEOUT` with defaults.
    pub fn from_env() -> Self {
        Self {
            base_url: std::env::var("LLM_BASE_URL").unwrap_or_else(|_| LLM_DEFAULT_URL.to_string()),
            api_key: std::env::var("LLM_API_KEY").ok(),
            timeout_seconds: std::env::var("LLM_TIMEOUT")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(LLM_TIMEOUT_SECS),
        }
    }
}

/// OpenAI-compatible chat completion backend.
///
/// The model identifier is supplied per call so one backend serves all
/// three tiers.
pub struct OpenAIBackend {
    client: Client,
    config: OpenAIConfig,
}

// ---------------------------------------------------------------------------
// Wire types
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
struct ChatMessage {
    role: String,
    content: String,
}

#[derive(Debug, Serialize)]
struct ChatCompletionRequest {
    model: String,
    messages: Vec<ChatMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatReplyMessage,
}

#[derive(Debug, Deserialize)]
struct ChatReplyMessage {
    content: String,
}

#[derive(Debug, Deserialize)]
struct OpenAIErrorResponse {
    error: OpenAIError,
}

#[derive(Debug, Deserialize)]
struct OpenAIError {
    message: String,
}

impl OpenAIBackend {
    /// Create a new backend with the given configuration.
    pub fn new(config: OpenAIConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()
            .map_err(|e| Error::Transport(format!("Failed to create HTTP client: {}", e)))?;

        info!(url = %config.base_url, "Initializing OpenAI-compatible backend");

        Ok(Self { client, config })
    }

    /// Create from environment variables.
    pub fn from_env() -> Result<Self> {
        Self::new(OpenAIConfig::from_env())
    }

    /// Get the current configuration.
    pub fn config(&self) -> &OpenAIConfig {
        &self.config
    }

    /// Build a POST request with authentication if configured.
    fn build_request(&self, endpoint: &str) -> reqwest::RequestBuilder {
        let url = format!("{}{}", self.config.base_url.trim_end_matches('/'), endpoint);
        let mut req = self.client.post(&url);

        if let Some(ref api_key) = self.config.api_key {
            req = req.header("Authorization", format!("Bearer {}", api_key));
        }

        req.header("Content-Type", "application/json")
    }
}

#[async_trait]
impl ChatBackend for OpenAIBackend {
    async fn chat(&self, model: &str, system: &str, prompt: &str) -> Result<String> {
        debug!(model, prompt_len = prompt.len(), "Chat completion request");

        let mut messages = Vec::new();
        if !system.is_empty() {
            messages.push(ChatMessage {
                role: "system".to_string(),
                content: system.to_string(),
            });
        }
        messages.push(ChatMessage {
            role: "user".to_string(),
            content: prompt.to_string(),
        });

        let request = ChatCompletionRequest {
            model: model.to_string(),
            messages,
            temperature: None,
        };

        let response = self
            .build_request("/chat/completions")
            .json(&request)
            .send()
            .await
            .map_err(|e| Error::Transport(format!("Request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body: OpenAIErrorResponse = response.json().await.unwrap_or(OpenAIErrorResponse {
                error: OpenAIError {
                    message: "Unknown error".to_string(),
                },
            });
            return Err(Error::Transport(format!(
                "Endpoint returned {}: {}",
                status, body.error.message
            )));
        }

        let result: ChatCompletionResponse = response
            .json()
            .await
            .map_err(|e| Error::Transport(format!("Failed to parse response: {}", e)))?;

        let content = result
            .choices
            .first()
            .map(|c| c.message.content.clone())
            .unwrap_or_default();

        debug!(response_len = content.len(), "Chat completion reply");
        Ok(content)
    }

    async fn health_check(&self) -> Result<bool> {
        let url = format!("{}/models", self.config.base_url.trim_end_matches('/'));
        let mut req = self.client.get(&url).timeout(Duration::from_secs(5));
        if let Some(ref api_key) = self.config.api_key {
            req = req.header("Authorization", format!("Bearer {}", api_key));
        }

        match req.send().await {
            Ok(resp) if resp.status().is_success() => Ok(true),
            Ok(resp) => {
                warn!(status = %resp.status(), "LLM health check failed");
                Ok(false)
            }
            Err(e) => {
                warn!(error = %e, "LLM health check error");
                Ok(false)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = OpenAIConfig::default();
        assert_eq!(config.base_url, LLM_DEFAULT_URL);
        assert_eq!(config.timeout_seconds, LLM_TIMEOUT_SECS);
        assert!(config.api_key.is_none());
    }

    #[test]
    fn test_backend_creation() {
        let backend = OpenAIBackend::new(OpenAIConfig::default());
        assert!(backend.is_ok());
        assert_eq!(backend.unwrap().config().base_url, LLM_DEFAULT_URL);
    }

    #[test]
    fn test_custom_config() {
        let config = OpenAIConfig {
            base_url: "http://localhost:8080/v1".to_string(),
            api_key: Some("test-key".to_string()),
            timeout_seconds: 60,
        };
        let backend = OpenAIBackend::new(config).unwrap();
        assert_eq!(backend.config().base_url, "http://localhost:8080/v1");
        assert_eq!(backend.config().api_key.as_deref(), Some("test-key"));
    }
}
