use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::compatibility::cascade::CascadeExhausted;

/// Application-level error type.
/// Implements `IntoResponse` so Axum handlers can return `Result<T, AppError>`.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Validation error: {0}")]
    Validation(String),

    /// Every model tier failed. Never rendered as a zero or default score.
    #[error("Compatibility scoring unavailable after {attempts} attempts")]
    ScoringUnavailable { attempts: usize },

    #[error("Internal server error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl From<CascadeExhausted> for AppError {
    fn from(e: CascadeExhausted) -> Self {
        AppError::ScoringUnavailable {
            attempts: e.attempts.len(),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            AppError::Validation(msg) => (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", msg.clone()),
            AppError::ScoringUnavailable { attempts } => {
                tracing::warn!("Compatibility scoring unavailable after {attempts} attempts");
                (
                    StatusCode::SERVICE_UNAVAILABLE,
                    "SCORING_UNAVAILABLE",
                    format!(
                        "Automated compatibility scoring is temporarily unavailable \
                         ({attempts} attempts failed). Retry later or review this match manually."
                    ),
                )
            }
            AppError::Internal(e) => {
                tracing::error!("Internal error: {e:?}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "INTERNAL_ERROR",
                    "An internal server error occurred".to_string(),
                )
            }
        };

        let body = Json(json!({
            "error": {
                "code": code,
                "message": message
            }
        }));

        (status, body).into_response()
    }
}
