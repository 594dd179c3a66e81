use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

/// Fatal failures of an evaluation workflow. Oracle failures and duplicate
/// scoring rows are not here: they are absorbed as data by the component
/// that meets them.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("Role '{0}' not found")]
    NotFound(String),

    #[error("No candidates available to evaluate")]
    EmptyPool,

    #[error("Failed to read from storage: {0:#}")]
    Storage(#[source] anyhow::Error),

    #[error("Failed to wipe previous evaluations: {0:#}")]
    Wipe(#[source] anyhow::Error),

    #[error("Evaluation batch rolled back: {0:#}")]
    TransactionFailure(#[source] anyhow::Error),
}

/// Application-level error type.
/// Implements `IntoResponse` so Axum handlers can return `Result<T, AppError>`.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error(transparent)]
    Pipeline(#[from] PipelineError),

    #[error("Internal server error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, "NOT_FOUND", msg.clone()),
            AppError::Validation(msg) => (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", msg.clone()),
            AppError::Pipeline(PipelineError::NotFound(role)) => (
                StatusCode::NOT_FOUND,
                "ROLE_NOT_FOUND",
                format!("Role '{role}' not found"),
            ),
            AppError::Pipeline(PipelineError::EmptyPool) => (
                StatusCode::UNPROCESSABLE_ENTITY,
                "EMPTY_POOL",
                "No candidates available to evaluate".to_string(),
            ),
            AppError::Pipeline(e) => {
                tracing::error!("Evaluation failed: {e}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "EVALUATION_FAILED",
                    "The evaluation could not be completed".to_string(),
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
