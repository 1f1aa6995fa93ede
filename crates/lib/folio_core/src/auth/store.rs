//! Store contracts used by the session service.
//!
//! Implemented for PostgreSQL in [`super::queries`] and in memory in
//! [`super::memory`].

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use super::AuthError;
use crate::models::auth::{RefreshTokenRecord, Role, User};

/// User records and their credentials.
///
/// Emails passed in are already normalised. Password hashes never leave the
/// store: callers hand over plaintext and the store hashes or compares.
#[async_trait]
pub trait CredentialStore: Send + Sync {
    async fn find_by_email(&self, email: &str) -> Result<Option<User>, AuthError>;

    async fn find_by_id(&self, user_id: &str) -> Result<Option<User>, AuthError>;

    /// Create a user, hashing `password`. Fails with `Validation` on a duplicate email.
    async fn create_user(
        &self,
        email: &str,
        password: &str,
        name: Option<&str>,
        role: Role,
    ) -> Result<User, AuthError>;

    /// Compare `password` against the stored hash. `false` for unknown users
    /// or accounts without a password.
    async fn verify_password(&self, user_id: &str, password: &str) -> Result<bool, AuthError>;

    /// Spend the work of a failed [`Self::verify_password`] without an account.
    /// Always `false`.
    async fn verify_password_for_unknown(&self, password: &str) -> Result<bool, AuthError>;

    /// Overwrite the user's reset-token digest and expiry, leaving other fields alone.
    async fn set_reset_token(
        &self,
        user_id: &str,
        token_hash: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<(), AuthError>;

    /// Find the user whose reset digest matches and has not expired at `now`.
    async fn find_by_reset_token(
        &self,
        token_hash: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<User>, AuthError>;

    /// Atomically: if a user holds `token_hash` unexpired at `now`, set the new
    /// password and clear both reset fields. Returns the user id on success.
    async fn consume_reset_token(
        &self,
        token_hash: &str,
        new_password: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<String>, AuthError>;
}

/// Refresh token records.
#[async_trait]
pub trait RefreshTokenStore: Send + Sync {
    async fn create(&self, record: &RefreshTokenRecord) -> Result<(), AuthError>;

    async fn find_by_token(&self, token: &str) -> Result<Option<RefreshTokenRecord>, AuthError>;

    /// Set `revoked` if and only if it is currently unset. Returns whether
    /// this call performed the transition.
    async fn compare_and_revoke(&self, token: &str) -> Result<bool, AuthError>;

    /// Revoke every unrevoked token owned by `user_id`, returning how many changed.
    async fn revoke_all_by_user(&self, user_id: &str) -> Result<u64, AuthError>;
}
