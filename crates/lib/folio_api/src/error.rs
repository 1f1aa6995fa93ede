//! Application error types.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use folio_core::auth::AuthError;
use thiserror::Error;
use tracing::error;

use crate::models::ErrorResponse;

/// Convenience alias for handler return types.
pub type AppResult<T> = Result<T, AppError>;

/// Application-level errors with HTTP status mapping.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Invalid credentials")]
    AuthFailed,

    #[error("Authentication required: {0}")]
    AuthRequired(String),

    #[error("Invalid or expired token")]
    TokenInvalid,

    #[error("Invalid refresh token")]
    RefreshRejected,

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Reset token is invalid or expired")]
    InvalidOrExpired,

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Service unavailable: {0}")]
    Unavailable(String),

    #[error("Internal server error")]
    Internal(String),
}

impl AppError {
    fn parts(&self) -> (StatusCode, &'static str, String) {
        match self {
            AppError::AuthFailed => (StatusCode::UNAUTHORIZED, "auth_failed", self.to_string()),
            AppError::AuthRequired(m) => (StatusCode::UNAUTHORIZED, "auth_required", m.clone()),
            AppError::TokenInvalid => (StatusCode::UNAUTHORIZED, "token_invalid", self.to_string()),
            AppError::RefreshRejected => {
                (StatusCode::UNAUTHORIZED, "refresh_rejected", self.to_string())
            }
            AppError::Forbidden(m) => (StatusCode::FORBIDDEN, "forbidden", m.clone()),
            AppError::InvalidOrExpired => {
                (StatusCode::BAD_REQUEST, "invalid_or_expired", self.to_string())
            }
            AppError::Validation(m) => (StatusCode::BAD_REQUEST, "validation_error", m.clone()),
            AppError::NotFound(m) => (StatusCode::NOT_FOUND, "not_found", m.clone()),
            AppError::Unavailable(m) => {
                (StatusCode::SERVICE_UNAVAILABLE, "service_unavailable", m.clone())
            }
            AppError::Internal(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "internal_error",
                "Internal server error".to_string(),
            ),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        if let AppError::Internal(detail) = &self {
            error!("internal error: {detail}");
        }
        let (status, error, message) = self.parts();
        let body = Json(ErrorResponse {
            error: error.to_string(),
            message,
        });
        (status, body).into_response()
    }
}

impl From<AuthError> for AppError {
    fn from(e: AuthError) -> Self {
        match e {
            AuthError::AuthFailed => AppError::AuthFailed,
            AuthError::AuthRequired => AppError::AuthRequired("Missing bearer token".into()),
            AuthError::TokenInvalid => AppError::TokenInvalid,
            AuthError::RefreshRejected => AppError::RefreshRejected,
            AuthError::Forbidden => AppError::Forbidden("Insufficient role".into()),
            AuthError::InvalidOrExpired => AppError::InvalidOrExpired,
            AuthError::Validation(msg) => AppError::Validation(msg),
            AuthError::StoreTimeout(after) => {
                AppError::Unavailable(format!("store timed out after {after:?}"))
            }
            AuthError::Db(sqlx_error) => match sqlx_error {
                sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::Io(_) => {
                    AppError::Unavailable("database unavailable".into())
                }
                other => AppError::Internal(other.to_string()),
            },
            AuthError::Internal(msg) => AppError::Internal(msg),
        }
    }
}
