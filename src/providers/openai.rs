//! OpenAI chat-completions client.
//!
//! Used twice: once with a low temperature for quote/style extraction inside
//! the research pipeline, once with the conversational settings for chat
//! replies.

use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;

use crate::error::ProviderError;
use crate::providers::CompletionProvider;
use crate::types::ConversationMessage;

const PROVIDER: &str = "openai";

/// Default API base URL.
pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

/// OpenAI chat-completions client over `reqwest`.
#[derive(Debug, Clone)]
pub struct OpenAiChat {
    /// Model name (e.g. "gpt-4", "gpt-4o-mini").
    pub model: String,
    api_key: Option<String>,
    /// API base URL, without the trailing endpoint.
    pub base_url: String,
    pub temperature: Option<f64>,
    pub max_tokens: Option<u32>,
    /// Request timeout in seconds.
    pub timeout_secs: u64,
    /// Retries after the first attempt for retryable failures.
    pub max_retries: u32,
    client: reqwest::Client,
}

impl OpenAiChat {
    /// Create a client.
    ///
    /// # Arguments
    ///
    /// * `model` - OpenAI model name.
    /// * `api_key` - API key; calls fail with `MissingApiKey` when `None`.
    /// * `timeout_secs` - Per-request timeout.
    pub fn new(
        model: impl Into<String>,
        api_key: Option<String>,
        timeout_secs: u64,
    ) -> Result<Self, ProviderError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| ProviderError::from_reqwest(PROVIDER, timeout_secs, e))?;

        Ok(Self {
            model: model.into(),
            api_key,
            base_url: DEFAULT_BASE_URL.to_string(),
            temperature: None,
            max_tokens: None,
            timeout_secs,
            max_retries: 2,
            client,
        })
    }

    pub fn with_temperature(mut self, temperature: f64) -> Self {
        self.temperature = Some(temperature);
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: Option<u32>) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    /// Build the request body for the Chat Completions API.
    pub fn build_request_body(&self, messages: &[ConversationMessage]) -> Value {
        let mut body = serde_json::json!({
            "model": self.model,
            "messages": messages,
        });

        if let Some(temp) = self.temperature {
            body["temperature"] = serde_json::json!(temp);
        }
        if let Some(max_tokens) = self.max_tokens {
            body["max_tokens"] = serde_json::json!(max_tokens);
        }

        body
    }

    /// Pull the assistant text out of a Chat Completions response.
    pub fn parse_completion_response(response: &Value) -> Result<String, ProviderError> {
        let message = response
            .get("choices")
            .and_then(|c| c.get(0))
            .and_then(|c| c.get("message"))
            .ok_or_else(|| ProviderError::Malformed {
                provider: PROVIDER.to_string(),
                message: "No choices in OpenAI response".to_string(),
            })?;

        if let Some(usage) = response.get("usage") {
            log::debug!(
                "OpenAI token usage: prompt={}, completion={}, total={}",
                usage.get("prompt_tokens").and_then(|v| v.as_i64()).unwrap_or(0),
                usage.get("completion_tokens").and_then(|v| v.as_i64()).unwrap_or(0),
                usage.get("total_tokens").and_then(|v| v.as_i64()).unwrap_or(0),
            );
        }

        message
            .get("content")
            .and_then(|c| c.as_str())
            .map(str::to_string)
            .ok_or_else(|| ProviderError::Malformed {
                provider: PROVIDER.to_string(),
                message: "No content in OpenAI message".to_string(),
            })
    }

    async fn send_once(&self, api_key: &str, body: &Value) -> Result<String, ProviderError> {
        let endpoint = format!("{}/chat/completions", self.base_url);

        let response = self
            .client
            .post(&endpoint)
            .header("Content-Type", "application/json")
            .header("Authorization", format!("Bearer {}", api_key))
            .json(body)
            .send()
            .await
            .map_err(|e| ProviderError::from_reqwest(PROVIDER, self.timeout_secs, e))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| ProviderError::from_reqwest(PROVIDER, self.timeout_secs, e))?;

        if !status.is_success() {
            return Err(ProviderError::Status {
                provider: PROVIDER.to_string(),
                status: status.as_u16(),
                body: text.chars().take(500).collect(),
            });
        }

        let json: Value = serde_json::from_str(&text).map_err(|e| ProviderError::Malformed {
            provider: PROVIDER.to_string(),
            message: format!(
                "{} - Body: {}",
                e,
                text.chars().take(500).collect::<String>()
            ),
        })?;

        Self::parse_completion_response(&json)
    }
}

#[async_trait]
impl CompletionProvider for OpenAiChat {
    fn model(&self) -> &str {
        &self.model
    }

    async fn complete(&self, messages: &[ConversationMessage]) -> Result<String, ProviderError> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or_else(|| ProviderError::MissingApiKey {
                provider: PROVIDER.to_string(),
            })?;

        log::debug!(
            "OpenAiChat.complete: model={}, messages={}",
            self.model,
            messages.len()
        );

        let body = self.build_request_body(messages);
        let mut retry_delay = Duration::from_secs(1);
        let mut attempt = 0;

        loop {
            match self.send_once(api_key, &body).await {
                Ok(text) => return Ok(text),
                Err(err) if err.is_retryable() && attempt < self.max_retries => {
                    attempt += 1;
                    log::warn!(
                        "OpenAI API retry attempt {} after {:?}: {}",
                        attempt,
                        retry_delay,
                        err
                    );
                    tokio::time::sleep(retry_delay).await;
                    retry_delay *= 2;
                }
                Err(err) => return Err(err),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client() -> OpenAiChat {
        OpenAiChat::new("gpt-4o-mini", Some("sk-test".into()), 5).unwrap()
    }

    #[test]
    fn test_request_body_includes_optional_params() {
        let chat = client().with_temperature(0.1).with_max_tokens(Some(1000));
        let body = chat.build_request_body(&[
            ConversationMessage::system("sys"),
            ConversationMessage::user("hi"),
        ]);

        assert_eq!(body["model"], "gpt-4o-mini");
        assert_eq!(body["temperature"], 0.1);
        assert_eq!(body["max_tokens"], 1000);
        assert_eq!(body["messages"][0]["role"], "system");
        assert_eq!(body["messages"][1]["content"], "hi");
    }

    #[test]
    fn test_request_body_omits_unset_params() {
        let body = client().build_request_body(&[ConversationMessage::user("hi")]);
        assert!(body.get("temperature").is_none());
        assert!(body.get("max_tokens").is_none());
    }

    #[test]
    fn test_parse_completion_response() {
        let response = serde_json::json!({
            "choices": [{"message": {"role": "assistant", "content": "Hello there"}}],
            "usage": {"prompt_tokens": 3, "completion_tokens": 2, "total_tokens": 5}
        });
        assert_eq!(
            OpenAiChat::parse_completion_response(&response).unwrap(),
            "Hello there"
        );
    }

    #[test]
    fn test_parse_completion_response_without_choices() {
        let response = serde_json::json!({"choices": []});
        let err = OpenAiChat::parse_completion_response(&response).unwrap_err();
        assert!(matches!(err, ProviderError::Malformed { .. }));
    }

    #[test]
    fn test_base_url_trailing_slash_trimmed() {
        let chat = client().with_base_url("http://localhost:9999/v1/");
        assert_eq!(chat.base_url, "http://localhost:9999/v1");
    }

    #[tokio::test]
    async fn test_missing_api_key_fails_without_network() {
        let chat = OpenAiChat::new("gpt-4", None, 5).unwrap();
        let err = chat
            .complete(&[ConversationMessage::user("hi")])
            .await
            .unwrap_err();
        assert!(matches!(err, ProviderError::MissingApiKey { .. }));
    }
}
