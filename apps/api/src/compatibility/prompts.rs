// Prompt constants and the prompt builder for compatibility scoring.
// Output must be byte-identical for identical requests: the cache key relies on it.

use std::fmt::Write as _;

use crate::compatibility::models::{CandidateProfile, CompatibilityRequest, Dimension, JobPosting};
use crate::compatibility::validator::MIN_JUSTIFICATION_CHARS;
use crate::llm_client::prompts::JSON_ONLY_SYSTEM;

/// System prompt template.
/// Replace: {json_only}, {dimension_table}, {min_justification}, {output_shape}
pub const COMPATIBILITY_SYSTEM_TEMPLATE: &str = r#"You are an expert technical recruiter scoring how well a candidate fits a job posting.

{json_only}

Score the candidate on EXACTLY these ten dimensions, each an integer from 1 to 10:
{dimension_table}

SCORING BANDS (apply to every dimension):
- 9-10: candidate excels, clearly exceeds the requirement
- 7-8: candidate meets the requirement
- 5-6: partial match, some relevant evidence
- 3-4: significant gap
- 1-2: minimal or no match

Each justification MUST cite concrete evidence from the candidate profile and job posting
and be at least {min_justification} characters long. Do NOT give generic justifications.

OVERALL SCORE:
overallScore = round(sum(score_i * weight_i) / 10), an integer from 0 to 100.

RECOMMENDATION (derived from overallScore):
- 80-100: "Strong Match"
- 65-79: "Good Match"
- 50-64: "Moderate Match"
- 35-49: "Weak Match"
- 0-34: "Poor Match"

Return a JSON object with this EXACT shape (all ten dimension keys are mandatory):
{output_shape}

HARD RULES:
1. "strengths" has exactly 3 entries: the candidate's strongest selling points for this role
2. "gaps" has exactly 3 entries: the most important missing qualifications or risks
3. "redFlags" lists serious concerns (e.g. unexplained employment gaps, title regression); use [] if none
4. Base every statement on the provided data only. Do NOT invent experience."#;

/// Builds the (system, user) prompt pair for one request. Pure and deterministic.
pub fn build_prompts(request: &CompatibilityRequest) -> (String, String) {
    (build_system_prompt(), build_user_prompt(request))
}

pub fn build_system_prompt() -> String {
    COMPATIBILITY_SYSTEM_TEMPLATE
        .replace("{json_only}", JSON_ONLY_SYSTEM)
        .replace("{dimension_table}", &dimension_table())
        .replace("{min_justification}", &MIN_JUSTIFICATION_CHARS.to_string())
        .replace("{output_shape}", &output_shape())
}

fn dimension_table() -> String {
    Dimension::ALL
        .iter()
        .map(|d| format!("- {} (key \"{}\", weight {}%)", d.label(), d.key(), d.weight()))
        .collect::<Vec<_>>()
        .join("\n")
}

fn output_shape() -> String {
    let dimensions = Dimension::ALL
        .iter()
        .map(|d| {
            format!(
                "    \"{}\": {{\"score\": <1-10>, \"justification\": \"<evidence>\"}}",
                d.key()
            )
        })
        .collect::<Vec<_>>()
        .join(",\n");

    format!(
        "{{\n  \"overallScore\": <0-100>,\n  \"recommendation\": \"<category>\",\n  \"dimensions\": {{\n{dimensions}\n  }},\n  \"strengths\": [\"<1>\", \"<2>\", \"<3>\"],\n  \"gaps\": [\"<1>\", \"<2>\", \"<3>\"],\n  \"redFlags\": []\n}}"
    )
}

// ────────────────────────────────────────────────────────────────────────────
// User prompt
// ────────────────────────────────────────────────────────────────────────────

pub fn build_user_prompt(request: &CompatibilityRequest) -> String {
    let mut out = String::new();
    write_job(&mut out, &request.job);
    out.push('\n');
    write_candidate(&mut out, &request.candidate);
    out.push_str("\nScore this candidate against this job and return the JSON object.");
    out
}

fn write_job(out: &mut String, job: &JobPosting) {
    out.push_str("=== JOB POSTING ===\n");
    let _ = writeln!(out, "Job ID: {}", job.id);
    let _ = writeln!(out, "Title: {}", job.title);
    let _ = writeln!(out, "Company: {}", job.company);
    let _ = writeln!(out, "Location: {}", or_unspecified(job.location.as_deref()));
    let _ = writeln!(out, "Work Arrangement: {}", job.work_arrangement.label());
    let _ = writeln!(out, "Salary Range: {}", salary_range(job.salary_min, job.salary_max));
    let _ = writeln!(out, "Required Skills: {}", list_or_none(&job.required_skills));
    let _ = writeln!(out, "Preferred Skills: {}", list_or_none(&job.preferred_skills));
    out.push_str("Description:\n");
    out.push_str(job.description.trim());
    out.push('\n');
}

fn write_candidate(out: &mut String, candidate: &CandidateProfile) {
    out.push_str("=== CANDIDATE PROFILE ===\n");
    let _ = writeln!(out, "Candidate ID: {}", candidate.id);
    let _ = writeln!(
        out,
        "Profile Version: {}",
        or_unspecified(candidate.profile_version.as_deref())
    );
    let _ = writeln!(out, "Name: {}", candidate.full_name);
    let _ = writeln!(out, "Headline: {}", or_unspecified(candidate.headline.as_deref()));
    let _ = writeln!(out, "Location: {}", or_unspecified(candidate.location.as_deref()));
    let _ = writeln!(out, "Summary: {}", or_unspecified(candidate.summary.as_deref()));

    out.push_str("\n--- Work Experience ---\n");
    if candidate.work_experience.is_empty() {
        out.push_str("None listed\n");
    }
    for (i, exp) in candidate.work_experience.iter().enumerate() {
        let end = exp
            .end_date
            .map(|d| d.to_string())
            .unwrap_or_else(|| "Present".to_string());
        let _ = writeln!(out, "{}. {} at {}", i + 1, exp.title, exp.company);
        let _ = writeln!(out, "   Period: {} to {}", exp.start_date, end);
        let _ = writeln!(out, "   Location: {}", or_unspecified(exp.location.as_deref()));
        let _ = writeln!(out, "   Description: {}", or_unspecified(exp.description.as_deref()));
        if exp.accomplishments.is_empty() {
            out.push_str("   Accomplishments: None listed\n");
        } else {
            out.push_str("   Accomplishments:\n");
            for accomplishment in &exp.accomplishments {
                let _ = writeln!(out, "   - {accomplishment}");
            }
        }
    }

    out.push_str("\n--- Education ---\n");
    if candidate.education.is_empty() {
        out.push_str("None listed\n");
    }
    for (i, edu) in candidate.education.iter().enumerate() {
        let field = edu
            .field_of_study
            .as_deref()
            .map(|f| format!(" in {f}"))
            .unwrap_or_default();
        let graduated = edu
            .graduation_date
            .map(|d| d.to_string())
            .unwrap_or_else(|| "Not specified".to_string());
        let _ = writeln!(
            out,
            "{}. {}{} from {} (graduated: {})",
            i + 1,
            edu.degree,
            field,
            edu.institution,
            graduated
        );
    }

    out.push_str("\n--- Skills ---\n");
    if candidate.skills.is_empty() {
        out.push_str("None listed\n");
    }
    for skill in &candidate.skills {
        let proficiency = skill
            .proficiency
            .map(|p| format!("{p:?}").to_lowercase())
            .unwrap_or_else(|| "unspecified".to_string());
        let years = skill
            .years_of_experience
            .map(|y| format!("{y} years"))
            .unwrap_or_else(|| "years unspecified".to_string());
        let _ = writeln!(out, "- {} ({proficiency}, {years})", skill.name);
    }
}

fn or_unspecified(value: Option<&str>) -> &str {
    match value {
        Some(v) if !v.trim().is_empty() => v,
        _ => "Not specified",
    }
}

fn list_or_none(items: &[String]) -> String {
    if items.is_empty() {
        "None listed".to_string()
    } else {
        items.join(", ")
    }
}

fn salary_range(min: Option<u32>, max: Option<u32>) -> String {
    match (min, max) {
        (Some(lo), Some(hi)) => format!("{lo} - {hi}"),
        (Some(lo), None) => format!("from {lo}"),
        (None, Some(hi)) => format!("up to {hi}"),
        (None, None) => "Not specified".to_string(),
    }
}
