//! Anthropic Messages API backend for `claude-*` tiers.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{error_for_status, InvokeError, ModelInvoker, ModelTier};

const ANTHROPIC_API_URL: &str = "https://api.anthropic.com/v1/messages";
const ANTHROPIC_VERSION: &str = "2023-06-01";

#[derive(Debug, Serialize)]
struct AnthropicRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    temperature: f32,
    system: &'a str,
    messages: Vec<AnthropicMessage<'a>>,
}

#[derive(Debug, Serialize)]
struct AnthropicMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct AnthropicResponse {
    content: Vec<ContentBlock>,
    usage: Usage,
}

#[derive(Debug, Deserialize)]
struct ContentBlock {
    #[serde(rename = "type")]
    block_type: String,
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Usage {
    input_tokens: u32,
    output_tokens: u32,
}

impl AnthropicResponse {
    /// Text of the first text block.
    fn text(&self) -> Option<&str> {
        self.content
            .iter()
            .find(|b| b.block_type == "text")
            .and_then(|b| b.text.as_deref())
    }
}

#[derive(Debug, Deserialize)]
struct AnthropicError {
    error: AnthropicErrorBody,
}

#[derive(Debug, Deserialize)]
struct AnthropicErrorBody {
    message: String,
}

/// Direct Anthropic backend. JSON output is enforced by the system prompt;
/// the validator strips any code fences the model adds.
#[derive(Clone)]
pub struct AnthropicInvoker {
    client: Client,
    api_key: String,
    api_url: String,
}

impl AnthropicInvoker {
    pub fn new(api_key: String) -> Self {
        Self {
            client: Client::new(),
            api_key,
            api_url: ANTHROPIC_API_URL.to_string(),
        }
    }

    pub fn with_api_url(mut self, api_url: impl Into<String>) -> Self {
        self.api_url = api_url.into();
        self
    }
}

#[async_trait]
impl ModelInvoker for AnthropicInvoker {
    async fn invoke(
        &self,
        tier: &ModelTier,
        system: &str,
        user: &str,
    ) -> Result<String, InvokeError> {
        let request_body = AnthropicRequest {
            model: &tier.model,
            max_tokens: tier.max_tokens,
            temperature: tier.temperature,
            system,
            messages: vec![AnthropicMessage {
                role: "user",
                content: user,
            }],
        };

        let response = self
            .client
            .post(&self.api_url)
            .timeout(tier.timeout())
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .header("content-type", "application/json")
            .json(&request_body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<AnthropicError>(&body)
                .map(|e| e.error.message)
                .unwrap_or(body);
            return Err(error_for_status(status, message));
        }

        let parsed: AnthropicResponse = response.json().await?;

        debug!(
            model = %tier.model,
            input_tokens = parsed.usage.input_tokens,
            output_tokens = parsed.usage.output_tokens,
            "Anthropic call succeeded"
        );

        parsed
            .text()
            .filter(|t| !t.trim().is_empty())
            .map(str::to_string)
            .ok_or(InvokeError::EmptyContent)
    }

    fn supports(&self, model: &str) -> bool {
        !self.api_key.is_empty() && model.starts_with("claude-")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tier() -> ModelTier {
        ModelTier::new("claude-sonnet-4-5").with_timeout_ms(5_000)
    }

    #[tokio::test]
    async fn test_returns_first_text_block() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/v1/messages")
            .match_header("x-api-key", "test-key")
            .match_header("anthropic-version", ANTHROPIC_VERSION)
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                r#"{"content":[{"type":"text","text":"{\"ok\":true}"}],
                   "usage":{"input_tokens":10,"output_tokens":5}}"#,
            )
            .create_async()
            .await;

        let invoker = AnthropicInvoker::new("test-key".into())
            .with_api_url(format!("{}/v1/messages", server.url()));
        let text = invoker.invoke(&tier(), "system", "user").await.unwrap();

        assert_eq!(text, "{\"ok\":true}");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_auth_failure_is_rejected_with_message() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/v1/messages")
            .with_status(401)
            .with_body(r#"{"error":{"type":"authentication_error","message":"invalid x-api-key"}}"#)
            .create_async()
            .await;

        let invoker = AnthropicInvoker::new("bad".into())
            .with_api_url(format!("{}/v1/messages", server.url()));
        let err = invoker.invoke(&tier(), "s", "u").await.unwrap_err();

        assert_eq!(
            err,
            InvokeError::Rejected {
                status: 401,
                message: "invalid x-api-key".into()
            }
        );
        assert!(!err.is_transient());
    }

    #[tokio::test]
    async fn test_overloaded_is_transient() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/v1/messages")
            .with_status(529)
            .with_body("overloaded")
            .create_async()
            .await;

        let invoker = AnthropicInvoker::new("k".into())
            .with_api_url(format!("{}/v1/messages", server.url()));
        let err = invoker.invoke(&tier(), "s", "u").await.unwrap_err();
        assert!(err.is_transient(), "got {err:?}");
    }

    #[tokio::test]
    async fn test_no_text_block_is_empty_content() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/v1/messages")
            .with_status(200)
            .with_body(r#"{"content":[],"usage":{"input_tokens":1,"output_tokens":0}}"#)
            .create_async()
            .await;

        let invoker = AnthropicInvoker::new("k".into())
            .with_api_url(format!("{}/v1/messages", server.url()));
        assert_eq!(
            invoker.invoke(&tier(), "s", "u").await.unwrap_err(),
            InvokeError::EmptyContent
        );
    }

    #[test]
    fn test_supports_only_claude_models_with_key() {
        assert!(AnthropicInvoker::new("k".into()).supports("claude-sonnet-4-5"));
        assert!(!AnthropicInvoker::new("k".into()).supports("gpt-4o"));
        assert!(!AnthropicInvoker::new(String::new()).supports("claude-sonnet-4-5"));
    }
}
