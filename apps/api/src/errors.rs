use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::triage::models::TriageError;

/// Application-level error type.
/// Implements `IntoResponse` so Axum handlers can return `Result<T, AppError>`.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("LLM error: {0}")]
    Llm(String),

    #[error("Timed out: {0}")]
    Timeout(String),
}

impl From<TriageError> for AppError {
    fn from(err: TriageError) -> Self {
        match err {
            TriageError::Precondition { .. } => AppError::Validation(err.to_string()),
            TriageError::Oracle { .. } => AppError::Llm(err.to_string()),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            AppError::Validation(msg) => (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", msg.clone()),
            AppError::Llm(msg) => {
                tracing::error!("LLM error: {msg}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "LLM_ERROR",
                    format!("An AI processing error occurred: {msg}"),
                )
            }
            AppError::Timeout(msg) => {
                tracing::error!("Run timed out: {msg}");
                (StatusCode::GATEWAY_TIMEOUT, "TIMEOUT", msg.clone())
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
