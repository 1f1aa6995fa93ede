//! Session service: login, refresh rotation, logout, bulk revocation and the
//! password-reset flow.
//!
//! This is the only component that creates, rotates or revokes refresh tokens
//! and the only one that issues reset tokens.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration as StdDuration;

use chrono::{Duration, Utc};
use tokio::time::timeout;
use tracing::{debug, error, info, warn};

use super::jwt::TokenCodec;
use super::notify::ResetNotifier;
use super::password::validate_password;
use super::store::{CredentialStore, RefreshTokenStore};
use super::tokens::{digest_token, generate_refresh_token, generate_reset_token};
use super::{AuthError, normalize_email};
use crate::models::auth::{RefreshTokenRecord, Role, TokenClaims, TokenPayload, User};

/// Access token lifetime: 15 minutes.
pub const ACCESS_TOKEN_TTL_SECS: i64 = 15 * 60;

/// Refresh token lifetime: 7 days.
pub const REFRESH_TOKEN_TTL_DAYS: i64 = 7;

/// Password-reset token lifetime: 1 hour.
pub const RESET_TOKEN_TTL_SECS: i64 = 60 * 60;

/// Upper bound on any single store or notifier call.
pub const DEFAULT_STORE_TIMEOUT: StdDuration = StdDuration::from_secs(5);

/// Token lifetimes and store-call bound.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub access_ttl: Duration,
    pub refresh_ttl: Duration,
    pub reset_ttl: Duration,
    pub store_timeout: StdDuration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            access_ttl: Duration::seconds(ACCESS_TOKEN_TTL_SECS),
            refresh_ttl: Duration::days(REFRESH_TOKEN_TTL_DAYS),
            reset_ttl: Duration::seconds(RESET_TOKEN_TTL_SECS),
            store_timeout: DEFAULT_STORE_TIMEOUT,
        }
    }
}

/// A freshly issued access/refresh pair.
#[derive(Debug, Clone)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
}

/// Result of a successful login.
#[derive(Debug, Clone)]
pub struct LoginOutcome {
    pub tokens: TokenPair,
    pub user: User,
}

pub struct SessionService {
    credentials: Arc<dyn CredentialStore>,
    refresh_tokens: Arc<dyn RefreshTokenStore>,
    notifier: Arc<dyn ResetNotifier>,
    codec: TokenCodec,
    config: SessionConfig,
}

impl SessionService {
    pub fn new(
        credentials: Arc<dyn CredentialStore>,
        refresh_tokens: Arc<dyn RefreshTokenStore>,
        notifier: Arc<dyn ResetNotifier>,
        codec: TokenCodec,
        config: SessionConfig,
    ) -> Self {
        Self {
            credentials,
            refresh_tokens,
            notifier,
            codec,
            config,
        }
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Authenticate with email + password and open a new session.
    pub async fn login(&self, email: &str, password: &str) -> Result<LoginOutcome, AuthError> {
        let email = normalize_email(email);

        let Some(user) = self.bounded(self.credentials.find_by_email(&email)).await? else {
            self.bounded(self.credentials.verify_password_for_unknown(password)).await?;
            debug!("login failed: unknown email");
            return Err(AuthError::AuthFailed);
        };

        if !self
            .bounded(self.credentials.verify_password(&user.id, password))
            .await?
        {
            debug!(user_id = %user.id, "login failed: password mismatch");
            return Err(AuthError::AuthFailed);
        }

        let tokens = self.issue_pair(&user).await?;
        info!(user_id = %user.id, "login succeeded");
        Ok(LoginOutcome { tokens, user })
    }

    /// Exchange a refresh token for a new pair, revoking the presented one.
    ///
    /// The revoke is a compare-and-set on the store, so of several concurrent
    /// calls presenting the same token at most one succeeds.
    pub async fn refresh(&self, presented: &str) -> Result<TokenPair, AuthError> {
        let Some(record) = self.bounded(self.refresh_tokens.find_by_token(presented)).await? else {
            debug!("refresh rejected: unknown token");
            return Err(AuthError::RefreshRejected);
        };

        if record.revoked {
            warn!(user_id = %record.user_id, "refresh rejected: token already revoked (possible replay)");
            return Err(AuthError::RefreshRejected);
        }

        if record.is_expired(Utc::now()) {
            debug!(user_id = %record.user_id, "refresh rejected: token expired");
            return Err(AuthError::RefreshRejected);
        }

        if !self
            .bounded(self.refresh_tokens.compare_and_revoke(presented))
            .await?
        {
            warn!(user_id = %record.user_id, "refresh rejected: token rotated by a concurrent request");
            return Err(AuthError::RefreshRejected);
        }

        let Some(user) = self.bounded(self.credentials.find_by_id(&record.user_id)).await? else {
            warn!(user_id = %record.user_id, "refresh rejected: owner no longer exists");
            return Err(AuthError::RefreshRejected);
        };

        let tokens = self.issue_pair(&user).await.inspect_err(|e| {
            warn!(user_id = %user.id, "refresh token revoked but no replacement issued: {e}");
        })?;
        debug!(user_id = %user.id, "refresh token rotated");
        Ok(tokens)
    }

    /// Revoke a refresh token. Unknown or already revoked tokens are a no-op.
    pub async fn logout(&self, refresh_token: &str) -> Result<(), AuthError> {
        if self
            .bounded(self.refresh_tokens.compare_and_revoke(refresh_token))
            .await?
        {
            debug!("refresh token revoked on logout");
        }
        Ok(())
    }

    /// Revoke every live refresh token owned by `user_id`. Returns how many changed.
    pub async fn revoke_all_for_user(&self, user_id: &str) -> Result<u64, AuthError> {
        let revoked = self
            .bounded(self.refresh_tokens.revoke_all_by_user(user_id))
            .await?;
        info!(user_id, revoked, "revoked all refresh tokens for user");
        Ok(revoked)
    }

    /// Verify an access token. Signature and expiry only: access tokens stay
    /// valid until they expire, even after logout.
    pub fn verify_access_token(&self, token: &str) -> Result<TokenClaims, AuthError> {
        self.codec.verify(token)
    }

    /// Issue a reset token for `email` and hand it to the notifier.
    ///
    /// Returns nothing: callers observe the same outcome whether or not the
    /// email belongs to an account, and whatever happens downstream. Only the
    /// account lookup runs inline. Storing the token and delivering it happen
    /// on a background task, so response time does not depend on the account
    /// existing or on the notifier.
    pub async fn request_password_reset(&self, email: &str) {
        let email = normalize_email(email);
        let user = match self.bounded(self.credentials.find_by_email(&email)).await {
            Ok(Some(user)) => user,
            Ok(None) => {
                debug!("password reset requested for unknown email");
                return;
            }
            Err(e) => {
                error!("password reset lookup failed: {e}");
                return;
            }
        };

        let credentials = self.credentials.clone();
        let notifier = self.notifier.clone();
        let limit = self.config.store_timeout;
        let expires_at = Utc::now() + self.config.reset_ttl;
        tokio::spawn(async move {
            let token = generate_reset_token();
            let stored = bounded_by(
                limit,
                credentials.set_reset_token(&user.id, &digest_token(&token), expires_at),
            )
            .await;
            if let Err(e) = stored {
                error!(user_id = %user.id, "storing reset token failed: {e}");
                return;
            }

            match timeout(limit, notifier.send_password_reset(&user, &token)).await {
                Ok(Ok(())) => info!(user_id = %user.id, "password reset requested"),
                Ok(Err(e)) => warn!(user_id = %user.id, "reset notification failed: {e}"),
                Err(_) => warn!(user_id = %user.id, "reset notification timed out"),
            }
        });
    }

    /// Whether `token` currently matches an unexpired reset digest. Read-only.
    pub async fn verify_reset_token(&self, token: &str) -> Result<bool, AuthError> {
        let user = self
            .bounded(
                self.credentials
                    .find_by_reset_token(&digest_token(token), Utc::now()),
            )
            .await?;
        Ok(user.is_some())
    }

    /// Set a new password using a reset token, consuming the token and ending
    /// every session of the account.
    ///
    /// Sessions are revoked before the token is consumed. If that fails the
    /// password and token are untouched and the caller can retry. A second
    /// revoke after the consume catches logins made in between.
    pub async fn reset_password(&self, token: &str, new_password: &str) -> Result<(), AuthError> {
        validate_password(new_password)?;

        let digest = digest_token(token);
        let Some(user) = self
            .bounded(self.credentials.find_by_reset_token(&digest, Utc::now()))
            .await?
        else {
            debug!("password reset rejected: token invalid or expired");
            return Err(AuthError::InvalidOrExpired);
        };

        self.revoke_all_for_user(&user.id).await?;

        let Some(user_id) = self
            .bounded(
                self.credentials
                    .consume_reset_token(&digest, new_password, Utc::now()),
            )
            .await?
        else {
            debug!(user_id = %user.id, "password reset rejected: token consumed concurrently");
            return Err(AuthError::InvalidOrExpired);
        };

        info!(user_id = %user_id, "password reset completed");
        if let Err(e) = self.revoke_all_for_user(&user_id).await {
            warn!(user_id = %user_id, "revoking sessions opened during password reset failed: {e}");
        }
        Ok(())
    }

    /// Fetch the public record of a user.
    pub async fn find_user(&self, user_id: &str) -> Result<Option<User>, AuthError> {
        self.bounded(self.credentials.find_by_id(user_id)).await
    }

    /// Create an account unless one already exists for `email`.
    pub async fn ensure_user(
        &self,
        email: &str,
        password: &str,
        name: Option<&str>,
        role: Role,
    ) -> Result<User, AuthError> {
        let email = normalize_email(email);
        if let Some(existing) = self.bounded(self.credentials.find_by_email(&email)).await? {
            return Ok(existing);
        }
        validate_password(password)?;
        let user = self
            .bounded(self.credentials.create_user(&email, password, name, role))
            .await?;
        info!(user_id = %user.id, role = %user.role, "user created");
        Ok(user)
    }

    async fn issue_pair(&self, user: &User) -> Result<TokenPair, AuthError> {
        let access_token = self
            .codec
            .mint(&TokenPayload::from(user), self.config.access_ttl)?;
        let record = RefreshTokenRecord {
            token: generate_refresh_token(),
            user_id: user.id.clone(),
            expires_at: Utc::now() + self.config.refresh_ttl,
            revoked: false,
        };
        self.bounded(self.refresh_tokens.create(&record)).await?;
        Ok(TokenPair {
            access_token,
            refresh_token: record.token,
        })
    }

    async fn bounded<T, F>(&self, fut: F) -> Result<T, AuthError>
    where
        F: Future<Output = Result<T, AuthError>>,
    {
        bounded_by(self.config.store_timeout, fut).await
    }
}

async fn bounded_by<T, F>(limit: StdDuration, fut: F) -> Result<T, AuthError>
where
    F: Future<Output = Result<T, AuthError>>,
{
    timeout(limit, fut)
        .await
        .map_err(|_| AuthError::StoreTimeout(limit))?
}
