use axum::{
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::recommendation::service::RecommendError;
use crate::recommendation::table_parser::ParseError;

/// Application-level error type.
/// Implements `IntoResponse` so Axum handlers can return `Result<T, AppError>`.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Index error: {0}")]
    Index(String),

    #[error("LLM error: {0}")]
    Llm(String),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Internal server error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl From<RecommendError> for AppError {
    fn from(err: RecommendError) -> Self {
        match err {
            RecommendError::Validation(msg) => AppError::Validation(msg),
            RecommendError::IndexUnavailable(e) => AppError::Index(e.to_string()),
            RecommendError::GenerationFailed(e) => AppError::Llm(e.to_string()),
            RecommendError::Parse(e @ ParseError::NoValidRecommendations { .. }) => {
                AppError::NotFound(e.to_string())
            }
            RecommendError::Parse(e) => AppError::Parse(e.to_string()),
        }
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        AppError::Validation(rejection.body_text())
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            AppError::Validation(msg) => (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", msg.clone()),
            AppError::NotFound(_) => (
                StatusCode::NOT_FOUND,
                "NO_RECOMMENDATIONS",
                "No valid recommendations found".to_string(),
            ),
            AppError::Index(msg) => {
                tracing::error!("Index error: {msg}");
                (
                    StatusCode::BAD_GATEWAY,
                    "INDEX_UNAVAILABLE",
                    "The assessment index is unavailable".to_string(),
                )
            }
            AppError::Llm(msg) => {
                tracing::error!("LLM error: {msg}");
                (
                    StatusCode::BAD_GATEWAY,
                    "GENERATION_FAILED",
                    "Error generating recommendations".to_string(),
                )
            }
            AppError::Parse(msg) => {
                tracing::error!("Parse error: {msg}");
                (StatusCode::BAD_GATEWAY, "INVALID_MODEL_OUTPUT", msg.clone())
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
            "error": message,
            "code": code
        }));

        (status, body).into_response()
    }
}
