//! Axum route handlers for the Compatibility API.

use axum::{extract::State, Json};
use serde::Deserialize;

use crate::compatibility::models::CompatibilityRequest;
use crate::compatibility::service::ScoreResponse;
use crate::errors::AppError;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct AnalyzeRequest {
    pub request: CompatibilityRequest,
    /// Accept a labelled rule-based estimate when AI scoring is unavailable.
    #[serde(default)]
    pub allow_estimate: bool,
}

/// POST /api/v1/compatibility/analyze
///
/// Scores a candidate against a job. Responds 503 SCORING_UNAVAILABLE when
/// every model tier failed and the caller did not opt into an estimate.
/// A client disconnect drops this future and aborts the in-flight model call.
pub async fn handle_analyze(
    State(state): State<AppState>,
    Json(body): Json<AnalyzeRequest>,
) -> Result<Json<ScoreResponse>, AppError> {
    check_request(&body.request)?;

    let response = state
        .compatibility
        .score(&body.request, body.allow_estimate)
        .await?;

    Ok(Json(response))
}

fn check_request(request: &CompatibilityRequest) -> Result<(), AppError> {
    if request.job.id.trim().is_empty() {
        return Err(AppError::Validation("job.id cannot be empty".to_string()));
    }
    if request.job.title.trim().is_empty() {
        return Err(AppError::Validation("job.title cannot be empty".to_string()));
    }
    if request.candidate.id.trim().is_empty() {
        return Err(AppError::Validation(
            "candidate.id cannot be empty".to_string(),
        ));
    }
    if let (Some(min), Some(max)) = (request.job.salary_min, request.job.salary_max) {
        if min > max {
            return Err(AppError::Validation(
                "job.salary_min cannot exceed job.salary_max".to_string(),
            ));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compatibility::test_support::senior_backend_request;

    #[test]
    fn test_check_request_accepts_fixture() {
        assert!(check_request(&senior_backend_request()).is_ok());
    }

    #[test]
    fn test_check_request_rejects_blank_title() {
        let mut request = senior_backend_request();
        request.job.title = "  ".into();
        assert!(matches!(
            check_request(&request),
            Err(AppError::Validation(msg)) if msg.contains("title")
        ));
    }

    #[test]
    fn test_check_request_rejects_inverted_salary() {
        let mut request = senior_backend_request();
        request.job.salary_min = Some(200_000);
        request.job.salary_max = Some(100_000);
        assert!(check_request(&request).is_err());
    }

    #[test]
    fn test_allow_estimate_defaults_to_false() {
        let body: AnalyzeRequest = serde_json::from_value(serde_json::json!({
            "request": senior_backend_request()
        }))
        .unwrap();
        assert!(!body.allow_estimate);
    }
}
