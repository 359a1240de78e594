use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

/// Default endpoint for OpenAI-compatible completion APIs.
pub const DEFAULT_BASE_URL: &str = "https://api.openai.com";

/// Errors that can occur while talking to the completion API
#[derive(Error, Debug)]
pub enum ClientError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Completion API returned {status}: {message}")]
    Api { status: u16, message: String },

    #[error("No API key configured. Run `gptoolkit configure` or set OPENAI_API_KEY")]
    MissingApiKey,

    #[error("Failed to decode completion response: {0}")]
    Decode(String),
}

/// Configuration for the HTTP completion client
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Base URL of the API, without the `/v1/...` path
    pub base_url: String,
    /// Key used when a request does not carry its own
    pub api_key: Option<String>,
    /// Optional request timeout (None = no limit)
    pub timeout: Option<Duration>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            api_key: None,
            timeout: None,
        }
    }
}

impl ClientConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            ..Default::default()
        }
    }

    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

/// A text completion request.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CompletionRequest {
    /// Engine (model) name
    #[serde(rename = "model")]
    pub engine: String,
    pub prompt: String,
    pub max_tokens: u32,
    pub temperature: f64,
    /// Per-request credential, overriding the client's configured key
    #[serde(skip)]
    pub api_key: Option<String>,
}

impl CompletionRequest {
    pub fn new(
        engine: impl Into<String>,
        prompt: impl Into<String>,
        max_tokens: u32,
        temperature: f64,
    ) -> Self {
        Self {
            engine: engine.into(),
            prompt: prompt.into(),
            max_tokens,
            temperature,
            api_key: None,
        }
    }

    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }
}

/// One generated alternative.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Choice {
    pub text: String,
    #[serde(default)]
    pub index: u32,
    #[serde(default)]
    pub finish_reason: Option<String>,
}

/// Response body of a completion call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompletionResponse {
    pub choices: Vec<Choice>,
}

impl CompletionResponse {
    /// Text of the first choice, if any.
    pub fn first_text(&self) -> Option<&str> {
        self.choices.first().map(|c| c.text.as_str())
    }
}

/// The core abstraction for completion backends
#[async_trait]
pub trait CompletionClient: Send + Sync {
    /// Human-readable name of the backend (e.g., "openai")
    fn name(&self) -> &str;

    /// Send one completion request and return the raw choices
    async fn complete(&self, request: &CompletionRequest)
        -> Result<CompletionResponse, ClientError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_body_shape() {
        let request = CompletionRequest::new("text-davinci-003", "Summarize: hi", 100, 0.3)
            .with_api_key("sk-secret");

        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "model": "text-davinci-003",
                "prompt": "Summarize: hi",
                "max_tokens": 100,
                "temperature": 0.3,
            })
        );
    }

    #[test]
    fn test_first_text() {
        let response: CompletionResponse = serde_json::from_str(
            r#"{"id":"cmpl-1","choices":[{"text":" one","index":0,"finish_reason":"stop"},{"text":" two","index":1}]}"#,
        )
        .unwrap();
        assert_eq!(response.first_text(), Some(" one"));

        let empty = CompletionResponse { choices: vec![] };
        assert_eq!(empty.first_text(), None);
    }

    #[test]
    fn test_config_builder() {
        let config = ClientConfig::new("http://localhost:8080")
            .with_api_key("k")
            .with_timeout(Duration::from_secs(5));
        assert_eq!(config.base_url, "http://localhost:8080");
        assert_eq!(config.api_key.as_deref(), Some("k"));
        assert_eq!(config.timeout, Some(Duration::from_secs(5)));

        assert_eq!(ClientConfig::default().base_url, DEFAULT_BASE_URL);
    }
}
