//! Shared fixtures and a scripted `ModelInvoker` for the compatibility tests.

use std::collections::{BTreeMap, HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::NaiveDate;
use serde_json::{json, Value};

use crate::compatibility::aggregator::aggregate;
use crate::compatibility::models::{
    CandidateProfile, CompatibilityRequest, Dimension, DimensionResult, Education, JobPosting,
    Proficiency, SkillEntry, WorkArrangement, WorkExperience,
};
use crate::llm_client::{InvokeError, ModelInvoker, ModelTier};

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

pub fn senior_backend_request() -> CompatibilityRequest {
    CompatibilityRequest {
        job: JobPosting {
            id: "job-8841".into(),
            title: "Senior Backend Engineer".into(),
            company: "Ledgerline".into(),
            description: "Own the payments ledger services. Design event-driven systems \
                          in Rust and PostgreSQL handling 40k requests per second."
                .into(),
            location: Some("Berlin, Germany".into()),
            work_arrangement: WorkArrangement::Remote,
            salary_min: Some(150_000),
            salary_max: Some(190_000),
            required_skills: vec!["Rust".into(), "PostgreSQL".into(), "Kafka".into()],
            preferred_skills: vec!["Kubernetes".into()],
        },
        candidate: CandidateProfile {
            id: "cand-17".into(),
            profile_version: Some("v4".into()),
            full_name: "Sam Rivera".into(),
            headline: Some("Backend engineer, payments and streaming".into()),
            location: Some("Berlin, Germany".into()),
            summary: Some("Eight years building high-throughput backend systems.".into()),
            work_experience: vec![
                WorkExperience {
                    title: "Staff Backend Engineer".into(),
                    company: "Paystream".into(),
                    location: Some("Berlin".into()),
                    start_date: date(2020, 3, 1),
                    end_date: None,
                    description: Some("Payments platform team lead".into()),
                    accomplishments: vec![
                        "Cut settlement latency by 60% with a Rust rewrite".into(),
                        "Ran Kafka clusters processing 2B events per day".into(),
                    ],
                },
                WorkExperience {
                    title: "Backend Engineer".into(),
                    company: "Shoply".into(),
                    location: None,
                    start_date: date(2016, 1, 1),
                    end_date: Some(date(2020, 2, 28)),
                    description: None,
                    accomplishments: vec!["Migrated order storage to PostgreSQL".into()],
                },
            ],
            education: vec![Education {
                institution: "TU Munich".into(),
                degree: "MSc".into(),
                field_of_study: Some("Computer Science".into()),
                graduation_date: Some(date(2015, 9, 30)),
            }],
            skills: vec![
                SkillEntry {
                    name: "Rust".into(),
                    proficiency: Some(Proficiency::Expert),
                    years_of_experience: Some(8.0),
                },
                SkillEntry {
                    name: "PostgreSQL".into(),
                    proficiency: Some(Proficiency::Advanced),
                    years_of_experience: Some(8.0),
                },
                SkillEntry {
                    name: "Kafka".into(),
                    proficiency: Some(Proficiency::Advanced),
                    years_of_experience: Some(5.0),
                },
            ],
        },
    }
}

pub fn dimensions_from(scores: [u8; 10]) -> BTreeMap<Dimension, DimensionResult> {
    Dimension::ALL
        .iter()
        .zip(scores)
        .map(|(d, score)| {
            (
                *d,
                DimensionResult {
                    score,
                    justification: format!("{} evidence drawn from the candidate history", d.label()),
                },
            )
        })
        .collect()
}

/// A well-formed model reply with the given per-dimension scores.
pub fn output_json(scores: [u8; 10], red_flags: &[&str]) -> Value {
    let (overall, recommendation) = aggregate(&dimensions_from(scores));
    let dimensions: serde_json::Map<String, Value> = Dimension::ALL
        .iter()
        .zip(scores)
        .map(|(d, score)| {
            (
                d.key().to_string(),
                json!({
                    "score": score,
                    "justification": format!("{} evidence drawn from the candidate history", d.label()),
                }),
            )
        })
        .collect();

    json!({
        "overallScore": overall,
        "recommendation": recommendation.label(),
        "dimensions": dimensions,
        "strengths": ["Deep Rust experience", "Payments domain", "Kafka at scale"],
        "gaps": ["No Kubernetes", "Limited management", "No fintech licence work"],
        "redFlags": red_flags,
    })
}

pub fn uniform_output(score: u8) -> Value {
    output_json([score; 10], &[])
}

// ────────────────────────────────────────────────────────────────────────────
// Scripted invoker
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub enum Reply {
    Text(String),
    Error(InvokeError),
    /// Never completes; only a deadline or a drop ends it.
    Hang,
}

struct InflightGuard(Arc<AtomicUsize>);

impl Drop for InflightGuard {
    fn drop(&mut self) {
        self.0.fetch_add(1, Ordering::SeqCst);
    }
}

/// Replays queued replies per model. An empty queue answers with a
/// transport error.
#[derive(Default)]
pub struct ScriptedInvoker {
    scripts: Mutex<HashMap<String, VecDeque<Reply>>>,
    calls: Mutex<HashMap<String, usize>>,
    supported: Option<HashSet<String>>,
    last_prompts: Mutex<Option<(String, String)>>,
    dropped: Arc<AtomicUsize>,
}

impl ScriptedInvoker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn script(self, model: &str, replies: Vec<Reply>) -> Self {
        self.scripts
            .lock()
            .unwrap()
            .insert(model.to_string(), replies.into());
        self
    }

    pub fn supporting(mut self, models: &[&str]) -> Self {
        self.supported = Some(models.iter().map(|m| m.to_string()).collect());
        self
    }

    pub fn calls(&self, model: &str) -> usize {
        self.calls.lock().unwrap().get(model).copied().unwrap_or(0)
    }

    pub fn dropped_inflight(&self) -> usize {
        self.dropped.load(Ordering::SeqCst)
    }

    pub fn last_prompts(&self) -> Option<(String, String)> {
        self.last_prompts.lock().unwrap().clone()
    }
}

#[async_trait]
impl ModelInvoker for ScriptedInvoker {
    async fn invoke(
        &self,
        tier: &ModelTier,
        system: &str,
        user: &str,
    ) -> Result<String, InvokeError> {
        *self.calls.lock().unwrap().entry(tier.model.clone()).or_default() += 1;
        *self.last_prompts.lock().unwrap() = Some((system.to_string(), user.to_string()));

        let reply = self
            .scripts
            .lock()
            .unwrap()
            .get_mut(&tier.model)
            .and_then(|q| q.pop_front());

        match reply {
            Some(Reply::Text(text)) => Ok(text),
            Some(Reply::Error(e)) => Err(e),
            Some(Reply::Hang) => {
                let _guard = InflightGuard(self.dropped.clone());
                std::future::pending().await
            }
            None => Err(InvokeError::Transport("script exhausted".into())),
        }
    }

    fn supports(&self, model: &str) -> bool {
        self.supported
            .as_ref()
            .map(|s| s.contains(model))
            .unwrap_or(true)
    }
}
