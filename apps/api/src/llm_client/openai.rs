//! OpenAI-compatible chat completions backend.
//!
//! Two routes share one implementation: `direct` talks to the official API,
//! `gateway` swaps the base URL for an AI gateway and adds its auth header.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{error_for_status, InvokeError, ModelInvoker, ModelTier};

const OPENAI_BASE_URL: &str = "https://api.openai.com/v1";
const GATEWAY_AUTH_HEADER: &str = "cf-aig-authorization";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Route {
    Direct,
    Gateway { token: Option<String> },
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: [ChatMessage<'a>; 2],
    temperature: f32,
    max_tokens: u32,
    response_format: ResponseFormat,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    format_type: &'static str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
    #[serde(default)]
    usage: Option<ChatUsage>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChatUsage {
    prompt_tokens: u32,
    completion_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct OpenAiError {
    error: OpenAiErrorBody,
}

#[derive(Debug, Deserialize)]
struct OpenAiErrorBody {
    message: String,
}

#[derive(Clone)]
pub struct OpenAiInvoker {
    client: Client,
    api_key: String,
    base_url: String,
    route: Route,
}

impl OpenAiInvoker {
    pub fn direct(api_key: String) -> Self {
        Self {
            client: Client::new(),
            api_key,
            base_url: OPENAI_BASE_URL.to_string(),
            route: Route::Direct,
        }
    }

    pub fn gateway(api_key: String, gateway_url: String, token: Option<String>) -> Self {
        Self {
            client: Client::new(),
            api_key,
            base_url: gateway_url.trim_end_matches('/').to_string(),
            route: Route::Gateway { token },
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    fn route_label(&self) -> &'static str {
        match self.route {
            Route::Direct => "direct",
            Route::Gateway { .. } => "gateway",
        }
    }
}

#[async_trait]
impl ModelInvoker for OpenAiInvoker {
    async fn invoke(
        &self,
        tier: &ModelTier,
        system: &str,
        user: &str,
    ) -> Result<String, InvokeError> {
        let body = ChatRequest {
            model: &tier.model,
            messages: [
                ChatMessage {
                    role: "system",
                    content: system,
                },
                ChatMessage {
                    role: "user",
                    content: user,
                },
            ],
            temperature: tier.temperature,
            max_tokens: tier.max_tokens,
            response_format: ResponseFormat {
                format_type: "json_object",
            },
        };

        let mut request = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .timeout(tier.timeout())
            .bearer_auth(&self.api_key)
            .json(&body);

        if let Route::Gateway { token: Some(token) } = &self.route {
            request = request.header(GATEWAY_AUTH_HEADER, format!("Bearer {token}"));
        }

        let response = request.send().await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<OpenAiError>(&body)
                .map(|e| e.error.message)
                .unwrap_or(body);
            return Err(error_for_status(status, message));
        }

        let parsed: ChatResponse = response.json().await?;

        if let Some(usage) = &parsed.usage {
            debug!(
                model = %tier.model,
                route = self.route_label(),
                prompt_tokens = usage.prompt_tokens,
                completion_tokens = usage.completion_tokens,
                "Chat completion succeeded"
            );
        }

        parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .filter(|t| !t.trim().is_empty())
            .ok_or(InvokeError::EmptyContent)
    }

    fn supports(&self, model: &str) -> bool {
        !self.api_key.is_empty() && !model.starts_with("claude-")
    }
}
