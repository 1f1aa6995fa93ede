//! PostgreSQL-backed credential and refresh-token stores.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use super::AuthError;
use super::password::{
    BCRYPT_COST, hash_password_with_cost, mismatch_after_hashing, verify_password,
};
use super::store::{CredentialStore, RefreshTokenStore};
use crate::models::auth::{RefreshTokenRecord, Role, User};

type UserRow = (String, String, Option<String>, String);

fn user_from_row((id, email, name, role): UserRow) -> Result<User, AuthError> {
    let role = role.parse::<Role>().map_err(AuthError::Internal)?;
    Ok(User {
        id,
        email,
        name,
        role,
    })
}

/// Ids that are not UUIDs cannot match any row.
fn parse_user_id(user_id: &str) -> Option<Uuid> {
    Uuid::parse_str(user_id).ok()
}

/// Users table access.
#[derive(Debug, Clone)]
pub struct PgCredentialStore {
    pool: PgPool,
    bcrypt_cost: u32,
}

impl PgCredentialStore {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool,
            bcrypt_cost: BCRYPT_COST,
        }
    }
}

#[async_trait]
impl CredentialStore for PgCredentialStore {
    async fn find_by_email(&self, email: &str) -> Result<Option<User>, AuthError> {
        let row = sqlx::query_as::<_, UserRow>(
            "SELECT id::text, email, name, role FROM users WHERE email = $1",
        )
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;
        row.map(user_from_row).transpose()
    }

    async fn find_by_id(&self, user_id: &str) -> Result<Option<User>, AuthError> {
        let Some(id) = parse_user_id(user_id) else {
            return Ok(None);
        };
        let row = sqlx::query_as::<_, UserRow>(
            "SELECT id::text, email, name, role FROM users WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        row.map(user_from_row).transpose()
    }

    async fn create_user(
        &self,
        email: &str,
        password: &str,
        name: Option<&str>,
        role: Role,
    ) -> Result<User, AuthError> {
        let password_hash = hash_password_with_cost(password, self.bcrypt_cost)?;
        let user_id = sqlx::query_scalar::<_, String>(
            "INSERT INTO users (email, name, password_hash, role) VALUES ($1, $2, $3, $4) \
             ON CONFLICT (email) DO NOTHING \
             RETURNING id::text",
        )
        .bind(email)
        .bind(name)
        .bind(&password_hash)
        .bind(role.as_str())
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| AuthError::Validation("Email already registered".into()))?;

        Ok(User {
            id: user_id,
            email: email.to_string(),
            name: name.map(str::to_string),
            role,
        })
    }

    async fn verify_password(&self, user_id: &str, password: &str) -> Result<bool, AuthError> {
        let Some(id) = parse_user_id(user_id) else {
            return mismatch_after_hashing(password, self.bcrypt_cost);
        };
        let hash = sqlx::query_scalar::<_, Option<String>>(
            "SELECT password_hash FROM users WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?
        .flatten();

        match hash {
            Some(h) => verify_password(password, &h),
            None => mismatch_after_hashing(password, self.bcrypt_cost),
        }
    }

    async fn verify_password_for_unknown(&self, password: &str) -> Result<bool, AuthError> {
        mismatch_after_hashing(password, self.bcrypt_cost)
    }

    async fn set_reset_token(
        &self,
        user_id: &str,
        token_hash: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<(), AuthError> {
        let Some(id) = parse_user_id(user_id) else {
            return Ok(());
        };
        sqlx::query(
            "UPDATE users SET reset_token_hash = $2, reset_token_expires_at = $3, updated_at = now() \
             WHERE id = $1",
        )
        .bind(id)
        .bind(token_hash)
        .bind(expires_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn find_by_reset_token(
        &self,
        token_hash: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<User>, AuthError> {
        let row = sqlx::query_as::<_, UserRow>(
            "SELECT id::text, email, name, role FROM users \
             WHERE reset_token_hash = $1 AND reset_token_expires_at > $2",
        )
        .bind(token_hash)
        .bind(now)
        .fetch_optional(&self.pool)
        .await?;
        row.map(user_from_row).transpose()
    }

    async fn consume_reset_token(
        &self,
        token_hash: &str,
        new_password: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<String>, AuthError> {
        let password_hash = hash_password_with_cost(new_password, self.bcrypt_cost)?;
        let user_id = sqlx::query_scalar::<_, String>(
            "UPDATE users \
             SET password_hash = $1, reset_token_hash = NULL, reset_token_expires_at = NULL, \
                 updated_at = now() \
             WHERE reset_token_hash = $2 AND reset_token_expires_at > $3 \
             RETURNING id::text",
        )
        .bind(&password_hash)
        .bind(token_hash)
        .bind(now)
        .fetch_optional(&self.pool)
        .await?;
        Ok(user_id)
    }
}

/// Refresh tokens table access.
#[derive(Debug, Clone)]
pub struct PgRefreshTokenStore {
    pool: PgPool,
}

impl PgRefreshTokenStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl RefreshTokenStore for PgRefreshTokenStore {
    async fn create(&self, record: &RefreshTokenRecord) -> Result<(), AuthError> {
        let user_id = parse_user_id(&record.user_id)
            .ok_or_else(|| AuthError::Internal(format!("bad user id: {}", record.user_id)))?;
        sqlx::query(
            "INSERT INTO refresh_tokens (token, user_id, expires_at, revoked) VALUES ($1, $2, $3, $4)",
        )
        .bind(&record.token)
        .bind(user_id)
        .bind(record.expires_at)
        .bind(record.revoked)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn find_by_token(&self, token: &str) -> Result<Option<RefreshTokenRecord>, AuthError> {
        let row = sqlx::query_as::<_, (String, String, DateTime<Utc>, bool)>(
            "SELECT token, user_id::text, expires_at, revoked FROM refresh_tokens WHERE token = $1",
        )
        .bind(token)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(|(token, user_id, expires_at, revoked)| RefreshTokenRecord {
            token,
            user_id,
            expires_at,
            revoked,
        }))
    }

    async fn compare_and_revoke(&self, token: &str) -> Result<bool, AuthError> {
        let result = sqlx::query(
            "UPDATE refresh_tokens SET revoked = TRUE, revoked_at = now() \
             WHERE token = $1 AND revoked = FALSE",
        )
        .bind(token)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    async fn revoke_all_by_user(&self, user_id: &str) -> Result<u64, AuthError> {
        let Some(id) = parse_user_id(user_id) else {
            return Ok(0);
        };
        let result = sqlx::query(
            "UPDATE refresh_tokens SET revoked = TRUE, revoked_at = now() \
             WHERE user_id = $1 AND revoked = FALSE",
        )
        .bind(id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }
}
