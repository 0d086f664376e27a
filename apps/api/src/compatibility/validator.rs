//! Output validator: the quality gate between raw model text and the aggregator.
//!
//! Malformed model output is an expected condition, so every failure is a typed
//! `ValidationError`; nothing here panics on bad input. Checks run in a fixed
//! order and stop at the first failure:
//!
//! 1. JSON parse (markdown fences stripped first)
//! 2. `overallScore` is a number in [0, 100]
//! 3. `recommendation` is one of the five category labels
//! 4. every dimension present, whole-number score in [1, 10], substantive justification
//! 5. `strengths` / `gaps` have at least 3 non-empty strings, `redFlags` is a string array

use std::collections::BTreeMap;

use serde_json::{Map, Value};
use thiserror::Error;

use crate::compatibility::models::{Dimension, DimensionResult, Recommendation};
use crate::llm_client::strip_json_fences;

/// Minimum trimmed justification length, in characters.
pub const MIN_JUSTIFICATION_CHARS: usize = 30;

const MIN_LIST_ENTRIES: usize = 3;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("malformed JSON: {0}")]
    MalformedJson(String),

    #[error("overallScore missing or outside [0, 100]")]
    BadOverallScore,

    #[error("recommendation missing or not a known category")]
    BadRecommendation,

    #[error("dimension '{0}' missing or invalid")]
    BadDimension(Dimension),

    #[error("'{0}' missing or too short")]
    BadList(&'static str),
}

impl ValidationError {
    /// Field name reported in `validation_failed:<field>` attempt reasons.
    pub fn field(&self) -> &'static str {
        match self {
            ValidationError::MalformedJson(_) => "json",
            ValidationError::BadOverallScore => "overallScore",
            ValidationError::BadRecommendation => "recommendation",
            ValidationError::BadDimension(d) => d.key(),
            ValidationError::BadList(field) => field,
        }
    }
}

/// Model output that passed every check. Strongly typed; no `Value` escapes
/// past this point.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidatedOutput {
    pub dimensions: BTreeMap<Dimension, DimensionResult>,
    /// The model's own claimed score. The aggregator recomputes it.
    pub claimed_overall: f64,
    pub claimed_recommendation: Recommendation,
    pub strengths: Vec<String>,
    pub gaps: Vec<String>,
    pub red_flags: Vec<String>,
}

pub fn validate(raw_text: &str) -> Result<ValidatedOutput, ValidationError> {
    let value: Value = serde_json::from_str(strip_json_fences(raw_text))
        .map_err(|e| ValidationError::MalformedJson(e.to_string()))?;

    let obj = value
        .as_object()
        .ok_or_else(|| ValidationError::MalformedJson("top level is not an object".to_string()))?;

    let claimed_overall = obj
        .get("overallScore")
        .and_then(Value::as_f64)
        .filter(|s| (0.0..=100.0).contains(s))
        .ok_or(ValidationError::BadOverallScore)?;

    let claimed_recommendation = obj
        .get("recommendation")
        .and_then(Value::as_str)
        .and_then(|s| Recommendation::from_label(s.trim()))
        .ok_or(ValidationError::BadRecommendation)?;

    let dimensions = validate_dimensions(obj)?;

    let strengths = string_list(obj, "strengths", MIN_LIST_ENTRIES, Blank::Reject)?;
    let gaps = string_list(obj, "gaps", MIN_LIST_ENTRIES, Blank::Reject)?;
    let red_flags = string_list(obj, "redFlags", 0, Blank::Skip)?;

    Ok(ValidatedOutput {
        dimensions,
        claimed_overall,
        claimed_recommendation,
        strengths,
        gaps,
        red_flags,
    })
}

fn validate_dimensions(
    obj: &Map<String, Value>,
) -> Result<BTreeMap<Dimension, DimensionResult>, ValidationError> {
    let container = obj.get("dimensions").and_then(Value::as_object);

    let mut dimensions = BTreeMap::new();
    for dimension in Dimension::ALL {
        let result = container
            .and_then(|c| c.get(dimension.key()))
            .and_then(parse_dimension)
            .ok_or(ValidationError::BadDimension(dimension))?;
        dimensions.insert(dimension, result);
    }
    Ok(dimensions)
}

fn parse_dimension(value: &Value) -> Option<DimensionResult> {
    let score = whole_score(value.get("score")?)?;
    let justification = value.get("justification")?.as_str()?.trim();
    if justification.chars().count() < MIN_JUSTIFICATION_CHARS {
        return None;
    }
    Some(DimensionResult {
        score,
        justification: justification.to_string(),
    })
}

/// Accepts `8` and `8.0`; rejects fractions and anything outside [1, 10].
fn whole_score(value: &Value) -> Option<u8> {
    let score = value.as_f64()?;
    if score.fract() != 0.0 || !(1.0..=10.0).contains(&score) {
        return None;
    }
    Some(score as u8)
}

/// How a list treats entries that are empty after trimming.
#[derive(Clone, Copy, PartialEq, Eq)]
enum Blank {
    Reject,
    Skip,
}

fn string_list(
    obj: &Map<String, Value>,
    field: &'static str,
    min_entries: usize,
    blank: Blank,
) -> Result<Vec<String>, ValidationError> {
    let items = obj
        .get(field)
        .and_then(Value::as_array)
        .ok_or(ValidationError::BadList(field))?;

    let mut out = Vec::with_capacity(items.len());
    for item in items {
        match item.as_str().map(str::trim) {
            Some(s) if !s.is_empty() => out.push(s.to_string()),
            Some(_) if blank == Blank::Skip => {}
            _ => return Err(ValidationError::BadList(field)),
        }
    }

    if out.len() < min_entries {
        return Err(ValidationError::BadList(field));
    }
    Ok(out)
}
