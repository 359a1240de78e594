use async_trait::async_trait;
use serde::Deserialize;
use std::time::Instant;
use tracing::{debug, info};

use crate::{ClientConfig, ClientError, CompletionClient, CompletionRequest, CompletionResponse};

/// Client for OpenAI-compatible `/v1/completions` endpoints.
pub struct OpenAiClient {
    http: reqwest::Client,
    config: ClientConfig,
}

#[derive(Deserialize)]
struct ApiErrorBody {
    error: ApiErrorDetail,
}

#[derive(Deserialize)]
struct ApiErrorDetail {
    message: String,
}

impl OpenAiClient {
    pub fn new(config: ClientConfig) -> Result<Self, ClientError> {
        let mut builder = reqwest::Client::builder();
        if let Some(timeout) = config.timeout {
            builder = builder.timeout(timeout);
        }

        Ok(Self {
            http: builder.build()?,
            config,
        })
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    fn endpoint(&self) -> String {
        format!("{}/v1/completions", self.config.base_url.trim_end_matches('/'))
    }

    fn api_key<'a>(&'a self, request: &'a CompletionRequest) -> Result<&'a str, ClientError> {
        request
            .api_key
            .as_deref()
            .or(self.config.api_key.as_deref())
            .filter(|key| !key.is_empty())
            .ok_or(ClientError::MissingApiKey)
    }

    fn error_message(status: reqwest::StatusCode, body: &str) -> String {
        if let Ok(parsed) = serde_json::from_str::<ApiErrorBody>(body) {
            return parsed.error.message;
        }

        let trimmed = body.trim();
        if trimmed.is_empty() {
            status
                .canonical_reason()
                .unwrap_or("unknown error")
                .to_string()
        } else {
            trimmed.to_string()
        }
    }
}

#[async_trait]
impl CompletionClient for OpenAiClient {
    fn name(&self) -> &str {
        "openai"
    }

    async fn complete(
        &self,
        request: &CompletionRequest,
    ) -> Result<CompletionResponse, ClientError> {
        let api_key = self.api_key(request)?;
        let url = self.endpoint();

        debug!(
            url = %url,
            engine = %request.engine,
            prompt_len = request.prompt.len(),
            max_tokens = request.max_tokens,
            temperature = request.temperature,
            "Sending completion request"
        );

        let started = Instant::now();
        let response = self
            .http
            .post(&url)
            .bearer_auth(api_key)
            .json(request)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;

        info!(
            status = status.as_u16(),
            duration_secs = started.elapsed().as_secs_f64(),
            "Completion API responded"
        );

        if !status.is_success() {
            return Err(ClientError::Api {
                status: status.as_u16(),
                message: Self::error_message(status, &body),
            });
        }

        serde_json::from_str(&body).map_err(|e| ClientError::Decode(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_trims_trailing_slash() {
        let client = OpenAiClient::new(ClientConfig::new("http://localhost:9999/")).unwrap();
        assert_eq!(client.endpoint(), "http://localhost:9999/v1/completions");
    }

    #[test]
    fn test_request_key_overrides_config_key() {
        let client =
            OpenAiClient::new(ClientConfig::default().with_api_key("from-config")).unwrap();

        let plain = CompletionRequest::new("e", "p", 1, 0.0);
        assert_eq!(client.api_key(&plain).unwrap(), "from-config");

        let keyed = plain.clone().with_api_key("from-row");
        assert_eq!(client.api_key(&keyed).unwrap(), "from-row");
    }

    #[test]
    fn test_missing_key() {
        let client = OpenAiClient::new(ClientConfig::default()).unwrap();
        let request = CompletionRequest::new("e", "p", 1, 0.0).with_api_key("");
        assert!(matches!(
            client.api_key(&request),
            Err(ClientError::MissingApiKey)
        ));
    }

    #[test]
    fn test_error_message_parsing() {
        let status = reqwest::StatusCode::UNAUTHORIZED;
        assert_eq!(
            OpenAiClient::error_message(
                status,
                r#"{"error":{"message":"Incorrect API key provided","type":"invalid_request_error"}}"#
            ),
            "Incorrect API key provided"
        );
        assert_eq!(OpenAiClient::error_message(status, "  nope \n"), "nope");
        assert_eq!(OpenAiClient::error_message(status, ""), "Unauthorized");
    }
}
