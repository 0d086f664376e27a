//! Rule-based estimate: keyword coverage of the job's skill lists.
//!
//! This is NOT a compatibility analysis. It is only produced by the caller
//! service after the model cascade (and any escalation) failed, and only when
//! the caller explicitly opts in. It carries no recommendation category and is
//! labelled `rule_based_estimate` so it can never pass for an AI-derived score.
//!
//! Algorithm:
//! 1. Each required skill has weight 1.0, each preferred skill 0.5
//! 2. Candidate skill entry with the same name → strength 1.0
//!    Mention in experience/summary text → strength 0.6
//!    Otherwise → 0.0 (listed as missing)
//! 3. estimated_score = Σ(strength × weight) / Σ(weight) × 100

use serde::Serialize;

use crate::compatibility::models::{CandidateProfile, CompatibilityRequest};

pub const ESTIMATE_KIND: &str = "rule_based_estimate";

const REQUIRED_WEIGHT: f32 = 1.0;
const PREFERRED_WEIGHT: f32 = 0.5;
const SKILL_ENTRY_STRENGTH: f32 = 1.0;
const TEXT_MENTION_STRENGTH: f32 = 0.6;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SkillCoverage {
    pub skill: String,
    pub required: bool,
    pub strength: f32,
    pub evidence: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RuleBasedEstimate {
    pub kind: &'static str,
    /// `None` when the job lists no skills to compare against.
    pub estimated_score: Option<u32>,
    pub covered: Vec<SkillCoverage>,
    pub missing: Vec<String>,
    pub note: String,
}

pub fn estimate(request: &CompatibilityRequest) -> RuleBasedEstimate {
    let job = &request.job;
    let keywords = job
        .required_skills
        .iter()
        .map(|s| (s, true))
        .chain(job.preferred_skills.iter().map(|s| (s, false)));

    let corpus = candidate_text(&request.candidate);

    let mut covered = Vec::new();
    let mut missing = Vec::new();
    let mut total_weight = 0.0_f32;
    let mut total_score = 0.0_f32;

    for (skill, required) in keywords {
        let skill_lower = skill.trim().to_lowercase();
        if skill_lower.is_empty() {
            continue;
        }
        let weight = if required {
            REQUIRED_WEIGHT
        } else {
            PREFERRED_WEIGHT
        };
        total_weight += weight;

        let listed = request
            .candidate
            .skills
            .iter()
            .find(|s| s.name.trim().to_lowercase() == skill_lower);

        let (strength, evidence) = if let Some(entry) = listed {
            (SKILL_ENTRY_STRENGTH, format!("skill entry '{}'", entry.name))
        } else if corpus.contains(&skill_lower) {
            (TEXT_MENTION_STRENGTH, "mentioned in experience".to_string())
        } else {
            (0.0, String::new())
        };

        total_score += strength * weight;

        if strength > 0.0 {
            covered.push(SkillCoverage {
                skill: skill.clone(),
                required,
                strength,
                evidence,
            });
        } else {
            missing.push(skill.clone());
        }
    }

    let estimated_score = if total_weight > 0.0 {
        Some(((total_score / total_weight) * 100.0).round() as u32)
    } else {
        None
    };

    RuleBasedEstimate {
        kind: ESTIMATE_KIND,
        estimated_score,
        covered,
        missing,
        note: "AI compatibility scoring is unavailable. This is a rule-based skill coverage \
               estimate, not an AI-derived compatibility score."
            .to_string(),
    }
}

/// Lowercased free text from the profile, for mention matching.
fn candidate_text(candidate: &CandidateProfile) -> String {
    let mut parts: Vec<&str> = Vec::new();
    parts.extend(candidate.headline.as_deref());
    parts.extend(candidate.summary.as_deref());
    for exp in &candidate.work_experience {
        parts.push(&exp.title);
        parts.extend(exp.description.as_deref());
        parts.extend(exp.accomplishments.iter().map(String::as_str));
    }
    parts.join("\n").to_lowercase()
}
