/// LLM Client: every model call in the service goes through a `ModelInvoker`.
///
/// ARCHITECTURAL RULE: callers depend on the trait only. Concrete backends
/// (direct OpenAI-compatible, gateway-routed, Anthropic) are wired in `main`.
///
/// An invoker performs exactly one exchange. Retries and tier fallback belong
/// to the cascade orchestrator.
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

pub mod anthropic;
pub mod openai;
pub mod prompts;

pub use anthropic::AnthropicInvoker;
pub use openai::OpenAiInvoker;

// ────────────────────────────────────────────────────────────────────────────
// Tier configuration
// ────────────────────────────────────────────────────────────────────────────

/// One configured model backend in a cascade.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelTier {
    pub model: String,
    /// Total attempts allowed on this tier for transient failures.
    pub max_retries: u32,
    pub timeout_ms: u64,
    pub temperature: f32,
    pub max_tokens: u32,
}

impl ModelTier {
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            max_retries: 3,
            timeout_ms: 30_000,
            temperature: 0.3,
            max_tokens: 4000,
        }
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn with_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = timeout_ms;
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Errors
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InvokeError {
    #[error("model call timed out")]
    Timeout,

    #[error("transport error: {0}")]
    Transport(String),

    #[error("rejected by backend (status {status}): {message}")]
    Rejected { status: u16, message: String },

    #[error("backend returned no text content")]
    EmptyContent,

    #[error("no backend configured for model '{0}'")]
    NoBackend(String),
}

impl InvokeError {
    /// Transient failures are retried on the same tier; the rest escalate.
    pub fn is_transient(&self) -> bool {
        matches!(self, InvokeError::Timeout | InvokeError::Transport(_))
    }
}

impl From<reqwest::Error> for InvokeError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            InvokeError::Timeout
        } else {
            InvokeError::Transport(e.to_string())
        }
    }
}

/// Maps a non-success HTTP status to an invoke error.
/// 429 and 5xx are transient; any other status (auth, bad request) is not.
pub(crate) fn error_for_status(status: StatusCode, body: String) -> InvokeError {
    if status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error() {
        InvokeError::Transport(format!("status {}: {}", status.as_u16(), body))
    } else {
        InvokeError::Rejected {
            status: status.as_u16(),
            message: body,
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Trait
// ────────────────────────────────────────────────────────────────────────────

#[async_trait]
pub trait ModelInvoker: Send + Sync {
    /// Sends one system + user exchange requesting a JSON object and returns
    /// the raw response text.
    async fn invoke(
        &self,
        tier: &ModelTier,
        system: &str,
        user: &str,
    ) -> Result<String, InvokeError>;

    /// Whether this invoker holds credentials for `model`. Checked once when
    /// the engine is constructed.
    fn supports(&self, model: &str) -> bool;
}

/// Runs one invocation bounded by the tier timeout. On expiry the in-flight
/// future is dropped, which aborts the underlying HTTP request.
pub async fn invoke_with_deadline(
    invoker: &dyn ModelInvoker,
    tier: &ModelTier,
    system: &str,
    user: &str,
) -> Result<String, InvokeError> {
    match tokio::time::timeout(tier.timeout(), invoker.invoke(tier, system, user)).await {
        Ok(result) => result,
        Err(_) => {
            debug!(model = %tier.model, timeout_ms = tier.timeout_ms, "Model call hit deadline");
            Err(InvokeError::Timeout)
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Router
// ────────────────────────────────────────────────────────────────────────────

/// Routes `claude-*` models to the Anthropic backend and everything else to
/// the OpenAI-compatible backend (direct or gateway).
#[derive(Clone, Default)]
pub struct ModelRouter {
    openai: Option<Arc<dyn ModelInvoker>>,
    anthropic: Option<Arc<dyn ModelInvoker>>,
}

impl ModelRouter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_openai(mut self, invoker: Arc<dyn ModelInvoker>) -> Self {
        self.openai = Some(invoker);
        self
    }

    pub fn with_anthropic(mut self, invoker: Arc<dyn ModelInvoker>) -> Self {
        self.anthropic = Some(invoker);
        self
    }

    fn backend_for(&self, model: &str) -> Option<&Arc<dyn ModelInvoker>> {
        if model.starts_with("claude-") {
            self.anthropic.as_ref()
        } else {
            self.openai.as_ref()
        }
    }
}

#[async_trait]
impl ModelInvoker for ModelRouter {
    async fn invoke(
        &self,
        tier: &ModelTier,
        system: &str,
        user: &str,
    ) -> Result<String, InvokeError> {
        let backend = self
            .backend_for(&tier.model)
            .ok_or_else(|| InvokeError::NoBackend(tier.model.clone()))?;
        backend.invoke(tier, system, user).await
    }

    fn supports(&self, model: &str) -> bool {
        self.backend_for(model)
            .map(|b| b.supports(model))
            .unwrap_or(false)
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Helpers
// ────────────────────────────────────────────────────────────────────────────

/// Strips ```json ... ``` or ``` ... ``` code fences from LLM output.
pub fn strip_json_fences(text: &str) -> &str {
    let text = text.trim();
    if let Some(stripped) = text.strip_prefix("```json") {
        stripped
            .trim_start()
            .strip_suffix("```")
            .map(|s| s.trim())
            .unwrap_or(stripped.trim_start())
    } else if let Some(stripped) = text.strip_prefix("```") {
        stripped
            .trim_start()
            .strip_suffix("```")
            .map(|s| s.trim())
            .unwrap_or(stripped.trim_start())
    } else {
        text
    }
}
