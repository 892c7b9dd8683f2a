use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::dna::session::DnaError;
use crate::dna::store::StoreError;

pub const GENERATION_FAILED_MESSAGE: &str =
    "The decision test could not continue; your answers so far have been saved.";

/// Application-level error type.
/// Implements `IntoResponse` so Axum handlers can return `Result<T, AppError>`.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Invalid choice: {0}")]
    InvalidChoice(String),

    #[error("Session closed: {0}")]
    SessionClosed(String),

    #[error("Scenario pending: {0}")]
    ScenarioPending(String),

    #[error("Scenario generation failed: {reason}")]
    GenerationFailed { reason: String, partial_saved: bool },

    #[error("Persistence error: {0}")]
    Persistence(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Internal server error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl From<DnaError> for AppError {
    fn from(err: DnaError) -> Self {
        match err {
            DnaError::InvalidChoice { .. } => AppError::InvalidChoice(err.to_string()),
            DnaError::SessionClosed { .. } => AppError::SessionClosed(err.to_string()),
            DnaError::ScenarioPending { .. } => AppError::ScenarioPending(err.to_string()),
            DnaError::InvalidRequest(msg) => AppError::Validation(msg),
            DnaError::GenerationFailed { partial_saved, .. } => AppError::GenerationFailed {
                reason: err.to_string(),
                partial_saved,
            },
            DnaError::Persistence(msg) => AppError::Persistence(msg),
        }
    }
}

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        AppError::Conflict(err.to_string())
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, "NOT_FOUND", msg.clone()),
            AppError::Validation(msg) => (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", msg.clone()),
            AppError::Conflict(msg) => (StatusCode::CONFLICT, "CONFLICT", msg.clone()),
            AppError::InvalidChoice(msg) => (StatusCode::BAD_REQUEST, "INVALID_CHOICE", msg.clone()),
            AppError::SessionClosed(msg) => (StatusCode::CONFLICT, "SESSION_CLOSED", msg.clone()),
            AppError::ScenarioPending(msg) => (StatusCode::CONFLICT, "SCENARIO_PENDING", msg.clone()),
            AppError::GenerationFailed {
                reason,
                partial_saved,
            } => {
                tracing::error!("Decision DNA session failed: {reason} (partial saved: {partial_saved})");
                let message = if *partial_saved {
                    GENERATION_FAILED_MESSAGE.to_string()
                } else {
                    "The decision test could not continue.".to_string()
                };
                (StatusCode::BAD_GATEWAY, "GENERATION_FAILED", message)
            }
            AppError::Persistence(msg) => {
                tracing::error!("Persistence error: {msg}");
                (
                    StatusCode::SERVICE_UNAVAILABLE,
                    "PERSISTENCE_ERROR",
                    "Results could not be saved; retry the save later".to_string(),
                )
            }
            AppError::Database(e) => {
                tracing::error!("Database error: {e}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "DATABASE_ERROR",
                    "A database error occurred".to_string(),
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
