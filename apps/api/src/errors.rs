use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::{json, Value};
use thiserror::Error;

use crate::models::note::ValidationError;
use crate::models::rpc::RpcResponse;

/// Service-level error type.
/// Every variant renders as the RPC envelope with `success: false`, so callers
/// only ever have to understand one response shape.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Agent/Asset, user and DB configuration are required")]
    MissingContext,

    #[error("Exception parsing input: {0}")]
    InvalidParams(String),

    #[error("{0}")]
    Validation(#[from] ValidationError),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Forbidden(String),

    #[error("Unknown method '{0}'")]
    UnknownMethod(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Internal server error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl AppError {
    fn parts(&self) -> (StatusCode, &'static str, String) {
        match self {
            AppError::MissingContext => (
                StatusCode::UNAUTHORIZED,
                "MISSING_CONTEXT",
                self.to_string(),
            ),
            AppError::InvalidParams(_) => {
                (StatusCode::BAD_REQUEST, "INVALID_PARAMS", self.to_string())
            }
            AppError::Validation(e) => {
                (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", e.to_string())
            }
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, "NOT_FOUND", msg.clone()),
            AppError::Forbidden(msg) => (StatusCode::FORBIDDEN, "FORBIDDEN", msg.clone()),
            AppError::UnknownMethod(_) => {
                (StatusCode::NOT_FOUND, "UNKNOWN_METHOD", self.to_string())
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
                    "An unexpected error occurred".to_string(),
                )
            }
        }
    }
}

impl From<AppError> for RpcResponse<Value> {
    fn from(err: AppError) -> Self {
        let (_, code, message) = err.parts();
        RpcResponse {
            success: false,
            data: Some(json!({ "code": code })),
            message: Some(message),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, _, _) = self.parts();
        let body: RpcResponse<Value> = self.into();
        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_envelope_carries_code_and_message() {
        let envelope: RpcResponse<Value> = AppError::Forbidden("Note not removed".into()).into();
        assert!(!envelope.success);
        assert_eq!(envelope.message.as_deref(), Some("Note not removed"));
        assert_eq!(envelope.data, Some(json!({"code": "FORBIDDEN"})));
    }

    #[test]
    fn test_internal_errors_hide_details() {
        let envelope: RpcResponse<Value> = AppError::Internal(anyhow::anyhow!("disk on fire")).into();
        assert_eq!(envelope.message.as_deref(), Some("An unexpected error occurred"));
    }

    #[test]
    fn test_status_codes() {
        assert_eq!(AppError::MissingContext.into_response().status(), StatusCode::UNAUTHORIZED);
        assert_eq!(
            AppError::UnknownMethod("notes.fly".into()).into_response().status(),
            StatusCode::NOT_FOUND
        );
    }
}
