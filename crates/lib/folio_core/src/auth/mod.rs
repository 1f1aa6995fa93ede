//! Authentication and session lifecycle.
//!
//! Provides the access-token codec, password hashing, token generation, the
//! store contracts with PostgreSQL and in-memory implementations, and the
//! [`session::SessionService`] that ties them together.

pub mod jwt;
pub mod memory;
pub mod notify;
pub mod password;
pub mod queries;
pub mod session;
pub mod store;
pub mod tokens;

use std::time::Duration;

use thiserror::Error;

/// Authentication errors.
#[derive(Debug, Error)]
pub enum AuthError {
    /// Bad credentials at login. Never says which part was wrong.
    #[error("Invalid credentials")]
    AuthFailed,

    #[error("Authentication required")]
    AuthRequired,

    #[error("Invalid or expired token")]
    TokenInvalid,

    #[error("Invalid refresh token")]
    RefreshRejected,

    #[error("Insufficient role")]
    Forbidden,

    #[error("Reset token is invalid or expired")]
    InvalidOrExpired,

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Database error: {0}")]
    Db(#[from] sqlx::Error),

    #[error("Store call timed out after {0:?}")]
    StoreTimeout(Duration),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Normalise an email address for lookup and storage.
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}
