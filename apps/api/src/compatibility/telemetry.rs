//! Attempt telemetry. The orchestrator reports every model attempt to an
//! injected `AttemptSink`; what happens to the record is the sink's business.

use std::fmt;
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use serde::{Serialize, Serializer};
use tracing::{info, warn};
use uuid::Uuid;

use crate::compatibility::validator::ValidationError;
use crate::llm_client::InvokeError;

/// Why an attempt failed. `Display` gives the stable reason code used in logs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureReason {
    Timeout,
    TransportError(String),
    Rejected(u16),
    EmptyContent,
    NoBackend,
    MalformedJson,
    ValidationFailed(&'static str),
}

impl FailureReason {
    pub fn is_quality(&self) -> bool {
        matches!(
            self,
            FailureReason::MalformedJson | FailureReason::ValidationFailed(_)
        )
    }
}

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureReason::Timeout => f.write_str("timeout"),
            FailureReason::TransportError(_) => f.write_str("transport_error"),
            FailureReason::Rejected(status) => write!(f, "rejected:{status}"),
            FailureReason::EmptyContent => f.write_str("empty_content"),
            FailureReason::NoBackend => f.write_str("no_backend"),
            FailureReason::MalformedJson => f.write_str("malformed_json"),
            FailureReason::ValidationFailed(field) => write!(f, "validation_failed:{field}"),
        }
    }
}

impl Serialize for FailureReason {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl From<&InvokeError> for FailureReason {
    fn from(e: &InvokeError) -> Self {
        match e {
            InvokeError::Timeout => FailureReason::Timeout,
            InvokeError::Transport(detail) => FailureReason::TransportError(detail.clone()),
            InvokeError::Rejected { status, .. } => FailureReason::Rejected(*status),
            InvokeError::EmptyContent => FailureReason::EmptyContent,
            InvokeError::NoBackend(_) => FailureReason::NoBackend,
        }
    }
}

impl From<&ValidationError> for FailureReason {
    fn from(e: &ValidationError) -> Self {
        match e {
            ValidationError::MalformedJson(_) => FailureReason::MalformedJson,
            other => FailureReason::ValidationFailed(other.field()),
        }
    }
}

/// One model invocation, successful or not.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AttemptOutcome {
    pub call_id: Uuid,
    pub tier_index: usize,
    pub model: String,
    /// 1-based attempt number within the tier.
    pub attempt: u32,
    pub latency_ms: u64,
    pub success: bool,
    pub reason: Option<FailureReason>,
    pub started_at: DateTime<Utc>,
}

pub trait AttemptSink: Send + Sync {
    fn record(&self, outcome: &AttemptOutcome);
}

/// Default sink: one structured tracing event per attempt.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingAttemptSink;

impl AttemptSink for TracingAttemptSink {
    fn record(&self, outcome: &AttemptOutcome) {
        match &outcome.reason {
            None => info!(
                call_id = %outcome.call_id,
                tier = outcome.tier_index,
                model = %outcome.model,
                attempt = outcome.attempt,
                latency_ms = outcome.latency_ms,
                success = true,
                "Compatibility attempt succeeded"
            ),
            Some(reason) => {
                let detail = match reason {
                    FailureReason::TransportError(detail) => detail.as_str(),
                    _ => "",
                };
                warn!(
                    call_id = %outcome.call_id,
                    tier = outcome.tier_index,
                    model = %outcome.model,
                    attempt = outcome.attempt,
                    latency_ms = outcome.latency_ms,
                    success = false,
                    reason = %reason,
                    quality = reason.is_quality(),
                    detail,
                    "Compatibility attempt failed"
                )
            }
        }
    }
}

/// Keeps every outcome in memory, in arrival order.
#[derive(Debug, Default)]
pub struct CollectingAttemptSink {
    outcomes: Mutex<Vec<AttemptOutcome>>,
}

impl CollectingAttemptSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn outcomes(&self) -> Vec<AttemptOutcome> {
        self.outcomes
            .lock()
            .map(|o| o.clone())
            .unwrap_or_default()
    }
}

impl AttemptSink for CollectingAttemptSink {
    fn record(&self, outcome: &AttemptOutcome) {
        if let Ok(mut outcomes) = self.outcomes.lock() {
            outcomes.push(outcome.clone());
        }
    }
}
