//! Model cascade orchestrator.
//!
//! Tiers run strictly in order, one attempt at a time. Two failure axes:
//! - transient (timeout, transport): retried on the same tier up to
//!   `max_retries` total attempts with linear backoff `attempt × base_delay`
//! - quality (malformed JSON, failed validation) and non-retryable backend
//!   rejections: recorded once, then the next tier is tried
//!
//! When every tier is spent the caller gets `CascadeExhausted` with the full
//! attempt history. No placeholder analysis is ever produced.
//!
//! Cancellation is drop-based: dropping the `analyze` future drops the
//! in-flight invoker call and its HTTP request with it.

use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use thiserror::Error;
use tracing::{debug, info, info_span, warn, Instrument};
use uuid::Uuid;

use crate::compatibility::aggregator::build_analysis;
use crate::compatibility::cache::{cache_key, AnalysisCache};
use crate::compatibility::models::{CompatibilityAnalysis, CompatibilityRequest};
use crate::compatibility::prompts::build_prompts;
use crate::compatibility::telemetry::{
    AttemptOutcome, AttemptSink, FailureReason, TracingAttemptSink,
};
use crate::compatibility::validator::validate;
use crate::llm_client::{invoke_with_deadline, ModelInvoker, ModelTier};

pub const DEFAULT_BACKOFF_BASE: Duration = Duration::from_millis(1000);

// ────────────────────────────────────────────────────────────────────────────
// Errors
// ────────────────────────────────────────────────────────────────────────────

/// Construction-time configuration problems. The engine refuses to build
/// rather than fail every call the same way.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    #[error("cascade has no tiers")]
    EmptyCascade,

    #[error("tier {index} ({model}): {problem}")]
    InvalidTier {
        index: usize,
        model: String,
        problem: &'static str,
    },

    #[error("tier {index}: no credentials configured for model '{model}'")]
    MissingCredentials { index: usize, model: String },
}

/// Every tier failed. Carries the attempt history for diagnostics.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("no compatibility analysis available after {} attempts", attempts.len())]
pub struct CascadeExhausted {
    pub attempts: Vec<AttemptOutcome>,
}

// ────────────────────────────────────────────────────────────────────────────
// Cascade definition
// ────────────────────────────────────────────────────────────────────────────

/// Ordered tiers, cheapest first. Static configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct Cascade {
    tiers: Vec<ModelTier>,
}

impl Cascade {
    pub fn new(tiers: Vec<ModelTier>) -> Result<Self, ConfigError> {
        if tiers.is_empty() {
            return Err(ConfigError::EmptyCascade);
        }
        for (index, tier) in tiers.iter().enumerate() {
            let problem = if tier.model.trim().is_empty() {
                Some("model is empty")
            } else if tier.max_retries == 0 {
                Some("max_retries must be at least 1")
            } else if tier.timeout_ms == 0 {
                Some("timeout_ms must be positive")
            } else if tier.max_tokens == 0 {
                Some("max_tokens must be positive")
            } else if !(0.0..=2.0).contains(&tier.temperature) {
                Some("temperature must be within [0, 2]")
            } else {
                None
            };
            if let Some(problem) = problem {
                return Err(ConfigError::InvalidTier {
                    index,
                    model: tier.model.clone(),
                    problem,
                });
            }
        }
        Ok(Self { tiers })
    }

    /// Single authoritative tier, no fallback.
    pub fn single(tier: ModelTier) -> Result<Self, ConfigError> {
        Self::new(vec![tier])
    }

    pub fn tiers(&self) -> &[ModelTier] {
        &self.tiers
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Engine
// ────────────────────────────────────────────────────────────────────────────

/// Stateless between calls apart from the optional cache. Safe to share
/// behind an `Arc` across any number of concurrent `analyze` calls.
pub struct CompatibilityEngine {
    cascade: Cascade,
    invoker: Arc<dyn ModelInvoker>,
    cache: Option<Arc<dyn AnalysisCache>>,
    sink: Arc<dyn AttemptSink>,
    backoff_base: Duration,
}

enum TierResult {
    Done(CompatibilityAnalysis),
    Spent,
}

impl CompatibilityEngine {
    pub fn new(cascade: Cascade, invoker: Arc<dyn ModelInvoker>) -> Result<Self, ConfigError> {
        for (index, tier) in cascade.tiers().iter().enumerate() {
            if !invoker.supports(&tier.model) {
                return Err(ConfigError::MissingCredentials {
                    index,
                    model: tier.model.clone(),
                });
            }
        }
        Ok(Self {
            cascade,
            invoker,
            cache: None,
            sink: Arc::new(TracingAttemptSink),
            backoff_base: DEFAULT_BACKOFF_BASE,
        })
    }

    pub fn with_cache(mut self, cache: Arc<dyn AnalysisCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn with_sink(mut self, sink: Arc<dyn AttemptSink>) -> Self {
        self.sink = sink;
        self
    }

    pub fn with_backoff_base(mut self, backoff_base: Duration) -> Self {
        self.backoff_base = backoff_base;
        self
    }

    pub fn cascade(&self) -> &Cascade {
        &self.cascade
    }

    /// Scores `request`, returning a validated analysis or the attempt history.
    pub async fn analyze(
        &self,
        request: &CompatibilityRequest,
    ) -> Result<CompatibilityAnalysis, CascadeExhausted> {
        let call_id = Uuid::new_v4();
        let span = info_span!(
            "compatibility_analyze",
            %call_id,
            job_id = %request.job.id,
            candidate_id = %request.candidate.id
        );
        self.run(call_id, request).instrument(span).await
    }

    async fn run(
        &self,
        call_id: Uuid,
        request: &CompatibilityRequest,
    ) -> Result<CompatibilityAnalysis, CascadeExhausted> {
        let key = cache_key(request);
        if let Some(cache) = &self.cache {
            if let Some(hit) = cache.get(&key).await {
                debug!(key = %key, "Analysis cache hit");
                return Ok(hit);
            }
        }

        let (system, user) = build_prompts(request);
        let mut attempts = Vec::new();

        for (tier_index, tier) in self.cascade.tiers().iter().enumerate() {
            let result = self
                .run_tier(call_id, tier_index, tier, &system, &user, &mut attempts)
                .await;

            if let TierResult::Done(analysis) = result {
                info!(
                    tier = tier_index,
                    model = %tier.model,
                    overall_score = analysis.overall_score(),
                    recommendation = %analysis.recommendation(),
                    red_flags = analysis.red_flags().len(),
                    "Compatibility analysis complete"
                );
                if let Some(cache) = &self.cache {
                    cache.put(&key, &analysis).await;
                }
                return Ok(analysis);
            }

            if tier_index + 1 < self.cascade.tiers().len() {
                info!(tier = tier_index, model = %tier.model, "Tier spent, escalating to next tier");
            }
        }

        warn!(attempts = attempts.len(), "Model cascade exhausted");
        Err(CascadeExhausted { attempts })
    }

    async fn run_tier(
        &self,
        call_id: Uuid,
        tier_index: usize,
        tier: &ModelTier,
        system: &str,
        user: &str,
        attempts: &mut Vec<AttemptOutcome>,
    ) -> TierResult {
        for attempt in 1..=tier.max_retries {
            let started_at = Utc::now();
            let clock = Instant::now();
            let invoked = invoke_with_deadline(self.invoker.as_ref(), tier, system, user).await;
            let latency_ms = clock.elapsed().as_millis() as u64;

            let mut record = |reason: Option<FailureReason>| {
                let outcome = AttemptOutcome {
                    call_id,
                    tier_index,
                    model: tier.model.clone(),
                    attempt,
                    latency_ms,
                    success: reason.is_none(),
                    reason,
                    started_at,
                };
                self.sink.record(&outcome);
                attempts.push(outcome);
            };

            match invoked {
                Ok(raw) => match validate(&raw) {
                    Ok(output) => {
                        record(None);
                        return TierResult::Done(build_analysis(output));
                    }
                    // Quality failure: no same-tier retry.
                    Err(e) => {
                        debug!(tier = tier_index, error = %e, "Model output rejected");
                        record(Some(FailureReason::from(&e)));
                        return TierResult::Spent;
                    }
                },
                Err(e) if e.is_transient() && attempt < tier.max_retries => {
                    record(Some(FailureReason::from(&e)));
                    let delay = self.backoff_base * attempt;
                    debug!(
                        tier = tier_index,
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        "Transient model failure, retrying same tier"
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(e) => {
                    record(Some(FailureReason::from(&e)));
                    return TierResult::Spent;
                }
            }
        }
        TierResult::Spent
    }
}
