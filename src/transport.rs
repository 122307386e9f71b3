use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;

#[cfg(test)]
use mockall::automock;

use crate::error::InferenceError;
use crate::models::{GenerateRequest, GenerateResponse};

pub const GEMINI_API_URL: &str = "https://generativelanguage.googleapis.com/v1beta";
pub const DEFAULT_MODEL: &str = "gemini-2.0-flash";
pub const FALLBACK_REPLY: &str = "Could not understand the question.";

/// One-shot call to a generative-language model.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait InferenceClient: Send + Sync {
    /// Send `prompt` and return the answer text. A payload without an answer
    /// yields [`FALLBACK_REPLY`] rather than an error.
    async fn infer(&self, prompt: &str) -> Result<String, InferenceError>;
}

pub struct GeminiClient {
    client: Client,
    api_key: String,
    model: String,
    base_url: String,
}

impl GeminiClient {
    pub fn new(api_key: String, model: String, timeout: Duration) -> Result<Self, InferenceError> {
        Self::with_base_url(api_key, model, timeout, GEMINI_API_URL)
    }

    /// Client pointed at another endpoint root (proxies, wiremock).
    pub fn with_base_url(
        api_key: String,
        model: String,
        timeout: Duration,
        base_url: &str,
    ) -> Result<Self, InferenceError> {
        let client = Client::builder()
            .timeout(timeout)
            .connect_timeout(Duration::from_secs(10))
            .build()?;
        Ok(Self {
            client,
            api_key,
            model,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    fn endpoint(&self) -> String {
        format!("{}/models/{}:generateContent", self.base_url, self.model)
    }
}

#[async_trait]
impl InferenceClient for GeminiClient {
    async fn infer(&self, prompt: &str) -> Result<String, InferenceError> {
        tracing::debug!(model = %self.model, prompt_chars = prompt.chars().count(), "Calling Gemini");

        let response = self
            .client
            .post(self.endpoint())
            .query(&[("key", self.api_key.as_str())])
            .header("Content-Type", "application/json")
            .json(&GenerateRequest::from_prompt(prompt))
            .send()
            .await
            // The URL carries the API key.
            .map_err(|e| InferenceError::Transport(e.without_url()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            tracing::warn!("Gemini returned {}: {}", status, body);
            return Err(InferenceError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let body = response
            .text()
            .await
            .map_err(|e| InferenceError::Transport(e.without_url()))?;
        let parsed: GenerateResponse = match serde_json::from_str(&body) {
            Ok(parsed) => parsed,
            Err(e) => {
                tracing::warn!("Failed to parse Gemini response: {e}");
                GenerateResponse::default()
            }
        };

        match parsed.first_text() {
            Some(text) => Ok(text.to_string()),
            None => {
                tracing::warn!("Gemini response had no candidate text");
                Ok(FALLBACK_REPLY.to_string())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_strips_trailing_slash() {
        let client = GeminiClient::with_base_url(
            "k".to_string(),
            "gemini-test".to_string(),
            Duration::from_secs(5),
            "http://localhost:9999/v1beta/",
        )
        .unwrap();
        assert_eq!(
            client.endpoint(),
            "http://localhost:9999/v1beta/models/gemini-test:generateContent"
        );
    }

    #[test]
    fn test_request_body_shape() {
        let body = serde_json::to_value(GenerateRequest::from_prompt("hello")).unwrap();
        assert_eq!(
            body,
            serde_json::json!({ "contents": [{ "parts": [{ "text": "hello" }] }] })
        );
    }

    #[tokio::test]
    #[ignore = "calls the live Gemini API"]
    async fn test_live_gemini_call() {
        if let Ok(api_key) = std::env::var("GEMINI_API_KEY") {
            let client = match GeminiClient::new(api_key, DEFAULT_MODEL.to_string(), Duration::from_secs(30)) {
                Ok(c) => c,
                Err(e) => {
                    eprintln!("Failed to create client in test: {e}");
                    return;
                }
            };
            let res = client.infer("What is the capital of India?").await;
            assert!(res.is_ok());
        }
    }
}
