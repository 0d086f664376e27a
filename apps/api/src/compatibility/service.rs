//! Compatibility service: caller policy wrapped around the engine.
//!
//! Flow: primary cascade → (on exhaustion) single authoritative escalation
//! model → (on exhaustion, only if the caller opted in) labelled rule-based
//! estimate. Without opt-in the exhaustion is returned to the caller.

use std::sync::Arc;

use serde::Serialize;
use tracing::{info, warn};

use crate::compatibility::cascade::{CascadeExhausted, CompatibilityEngine};
use crate::compatibility::estimate::{estimate, RuleBasedEstimate};
use crate::compatibility::models::{CompatibilityAnalysis, CompatibilityRequest};

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "source", rename_all = "snake_case")]
pub enum ScoreResponse {
    Cascade {
        analysis: CompatibilityAnalysis,
    },
    Escalation {
        analysis: CompatibilityAnalysis,
    },
    RuleBasedEstimate {
        estimate: RuleBasedEstimate,
        failed_attempts: usize,
    },
}

#[derive(Clone)]
pub struct CompatibilityService {
    primary: Arc<CompatibilityEngine>,
    escalation: Option<Arc<CompatibilityEngine>>,
}

impl CompatibilityService {
    pub fn new(primary: Arc<CompatibilityEngine>) -> Self {
        Self {
            primary,
            escalation: None,
        }
    }

    pub fn with_escalation(mut self, escalation: Arc<CompatibilityEngine>) -> Self {
        self.escalation = Some(escalation);
        self
    }

    pub async fn score(
        &self,
        request: &CompatibilityRequest,
        allow_estimate: bool,
    ) -> Result<ScoreResponse, CascadeExhausted> {
        let mut exhausted = match self.primary.analyze(request).await {
            Ok(analysis) => return Ok(ScoreResponse::Cascade { analysis }),
            Err(e) => e,
        };

        if let Some(escalation) = &self.escalation {
            info!(
                job_id = %request.job.id,
                failed_attempts = exhausted.attempts.len(),
                "Primary cascade exhausted, escalating to authoritative model"
            );
            match escalation.analyze(request).await {
                Ok(analysis) => return Ok(ScoreResponse::Escalation { analysis }),
                Err(e) => exhausted.attempts.extend(e.attempts),
            }
        }

        if allow_estimate {
            warn!(
                job_id = %request.job.id,
                failed_attempts = exhausted.attempts.len(),
                "AI scoring unavailable, returning rule-based estimate"
            );
            return Ok(ScoreResponse::RuleBasedEstimate {
                estimate: estimate(request),
                failed_attempts: exhausted.attempts.len(),
            });
        }

        Err(exhausted)
    }
}
