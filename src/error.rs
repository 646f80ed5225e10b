use crate::assets::TransferError;
use crate::auth::AuthenticationError;
use crate::orchestration::StreamError;
use crate::permit::AuthorizationError;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;
use tracing::error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(String),
    #[error("Internal server error: {0}")]
    Internal(String),
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Bad request: {0}")]
    BadRequest(String),
    #[error("Forbidden: {0}")]
    Forbidden(String),
    #[error("Conflict: {0}")]
    Conflict(String),
}

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        AppError::Internal(err.to_string())
    }
}

impl From<crate::config::ConfigError> for AppError {
    fn from(err: crate::config::ConfigError) -> Self {
        AppError::Config(err.to_string())
    }
}

impl From<StreamError> for AppError {
    fn from(err: StreamError) -> Self {
        let msg = err.to_string();
        match err {
            StreamError::InvalidInput(_) => AppError::BadRequest(msg),
            StreamError::Unauthorized(_) => AppError::Forbidden(msg),
            StreamError::OperationNotAllowed { .. }
            | StreamError::InvalidPosition(_)
            | StreamError::ExceedsBalance { .. } => AppError::Conflict(msg),
            StreamError::Authorization(AuthorizationError::Disabled) => AppError::NotFound(msg),
            StreamError::Authorization(_) => AppError::Forbidden(msg),
            StreamError::Transfer(TransferError::InsufficientBalance { .. }) => {
                AppError::Conflict(msg)
            }
            StreamError::Transfer(TransferError::Unauthorized(_)) => AppError::Forbidden(msg),
            StreamError::Math(_) => {
                error!("Arithmetic invariant violated: {}", msg);
                AppError::Internal(msg)
            }
            StreamError::Transfer(TransferError::Backend(_)) | StreamError::Store(_) => {
                AppError::Internal(msg)
            }
        }
    }
}

impl From<AuthenticationError> for AppError {
    fn from(err: AuthenticationError) -> Self {
        AppError::Forbidden(err.to_string())
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_message) = match self {
            AppError::Config(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
            AppError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            AppError::Forbidden(msg) => (StatusCode::FORBIDDEN, msg),
            AppError::Conflict(msg) => (StatusCode::CONFLICT, msg),
        };

        let body = Json(json!({
            "error": error_message,
        }));

        (status, body).into_response()
    }
}
