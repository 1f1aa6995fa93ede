//! In-memory stores backed by `DashMap`.
//!
//! Conditional updates run under the owning entry's shard lock, which gives
//! the same single-winner behaviour as the conditional `UPDATE`s in
//! [`super::queries`].

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use uuid::Uuid;

use super::AuthError;
use super::password::{
    BCRYPT_COST, hash_password_with_cost, mismatch_after_hashing, verify_password,
};
use super::store::{CredentialStore, RefreshTokenStore};
use crate::models::auth::{RefreshTokenRecord, Role, User};

#[derive(Debug, Clone)]
struct StoredUser {
    user: User,
    password_hash: Option<String>,
    reset_token_hash: Option<String>,
    reset_token_expires_at: Option<DateTime<Utc>>,
}

impl StoredUser {
    fn holds_reset_token(&self, token_hash: &str, now: DateTime<Utc>) -> bool {
        self.reset_token_hash.as_deref() == Some(token_hash)
            && self.reset_token_expires_at.is_some_and(|exp| exp > now)
    }
}

/// In-memory user store.
#[derive(Debug)]
pub struct MemoryCredentialStore {
    users: DashMap<String, StoredUser>,
    emails: DashMap<String, String>,
    bcrypt_cost: u32,
}

impl MemoryCredentialStore {
    pub fn new() -> Self {
        Self::with_cost(BCRYPT_COST)
    }

    /// Use a lower bcrypt cost (minimum 4), e.g. to keep tests fast.
    pub fn with_cost(bcrypt_cost: u32) -> Self {
        Self {
            users: DashMap::new(),
            emails: DashMap::new(),
            bcrypt_cost,
        }
    }
}

impl Default for MemoryCredentialStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CredentialStore for MemoryCredentialStore {
    async fn find_by_email(&self, email: &str) -> Result<Option<User>, AuthError> {
        let Some(id) = self.emails.get(email).map(|e| e.value().clone()) else {
            return Ok(None);
        };
        Ok(self.users.get(&id).map(|u| u.user.clone()))
    }

    async fn find_by_id(&self, user_id: &str) -> Result<Option<User>, AuthError> {
        Ok(self.users.get(user_id).map(|u| u.user.clone()))
    }

    async fn create_user(
        &self,
        email: &str,
        password: &str,
        name: Option<&str>,
        role: Role,
    ) -> Result<User, AuthError> {
        let password_hash = hash_password_with_cost(password, self.bcrypt_cost)?;
        let id = Uuid::new_v4().to_string();

        match self.emails.entry(email.to_string()) {
            Entry::Occupied(_) => {
                return Err(AuthError::Validation("Email already registered".into()));
            }
            Entry::Vacant(slot) => {
                slot.insert(id.clone());
            }
        }

        let user = User {
            id: id.clone(),
            email: email.to_string(),
            name: name.map(str::to_string),
            role,
        };
        self.users.insert(
            id,
            StoredUser {
                user: user.clone(),
                password_hash: Some(password_hash),
                reset_token_hash: None,
                reset_token_expires_at: None,
            },
        );
        Ok(user)
    }

    async fn verify_password(&self, user_id: &str, password: &str) -> Result<bool, AuthError> {
        let hash = self
            .users
            .get(user_id)
            .and_then(|u| u.password_hash.clone());
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
        if let Some(mut stored) = self.users.get_mut(user_id) {
            stored.reset_token_hash = Some(token_hash.to_string());
            stored.reset_token_expires_at = Some(expires_at);
        }
        Ok(())
    }

    async fn find_by_reset_token(
        &self,
        token_hash: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<User>, AuthError> {
        Ok(self
            .users
            .iter()
            .find(|entry| entry.holds_reset_token(token_hash, now))
            .map(|entry| entry.user.clone()))
    }

    async fn consume_reset_token(
        &self,
        token_hash: &str,
        new_password: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<String>, AuthError> {
        let password_hash = hash_password_with_cost(new_password, self.bcrypt_cost)?;
        for mut entry in self.users.iter_mut() {
            if entry.holds_reset_token(token_hash, now) {
                entry.password_hash = Some(password_hash);
                entry.reset_token_hash = None;
                entry.reset_token_expires_at = None;
                return Ok(Some(entry.user.id.clone()));
            }
        }
        Ok(None)
    }
}

/// In-memory refresh token store.
#[derive(Debug, Default)]
pub struct MemoryRefreshTokenStore {
    tokens: DashMap<String, RefreshTokenRecord>,
}

impl MemoryRefreshTokenStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl RefreshTokenStore for MemoryRefreshTokenStore {
    async fn create(&self, record: &RefreshTokenRecord) -> Result<(), AuthError> {
        match self.tokens.entry(record.token.clone()) {
            Entry::Occupied(_) => Err(AuthError::Internal("duplicate refresh token".into())),
            Entry::Vacant(slot) => {
                slot.insert(record.clone());
                Ok(())
            }
        }
    }

    async fn find_by_token(&self, token: &str) -> Result<Option<RefreshTokenRecord>, AuthError> {
        Ok(self.tokens.get(token).map(|r| r.value().clone()))
    }

    async fn compare_and_revoke(&self, token: &str) -> Result<bool, AuthError> {
        match self.tokens.get_mut(token) {
            Some(mut record) if !record.revoked => {
                record.revoked = true;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn revoke_all_by_user(&self, user_id: &str) -> Result<u64, AuthError> {
        let mut revoked = 0;
        for mut record in self.tokens.iter_mut() {
            if record.user_id == user_id && !record.revoked {
                record.revoked = true;
                revoked += 1;
            }
        }
        Ok(revoked)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn record(token: &str, user_id: &str) -> RefreshTokenRecord {
        RefreshTokenRecord {
            token: token.into(),
            user_id: user_id.into(),
            expires_at: Utc::now() + Duration::days(7),
            revoked: false,
        }
    }

    #[tokio::test]
    async fn compare_and_revoke_wins_once() {
        let store = MemoryRefreshTokenStore::new();
        store.create(&record("t1", "u1")).await.unwrap();
        assert!(store.compare_and_revoke("t1").await.unwrap());
        assert!(!store.compare_and_revoke("t1").await.unwrap());
        assert!(!store.compare_and_revoke("missing").await.unwrap());
        assert!(store.find_by_token("t1").await.unwrap().unwrap().revoked);
    }

    #[tokio::test]
    async fn revoke_all_only_touches_owner() {
        let store = MemoryRefreshTokenStore::new();
        store.create(&record("a1", "alice")).await.unwrap();
        store.create(&record("a2", "alice")).await.unwrap();
        store.create(&record("b1", "bob")).await.unwrap();

        assert_eq!(store.revoke_all_by_user("alice").await.unwrap(), 2);
        assert_eq!(store.revoke_all_by_user("alice").await.unwrap(), 0);
        assert!(!store.find_by_token("b1").await.unwrap().unwrap().revoked);
    }

    #[tokio::test]
    async fn duplicate_token_rejected() {
        let store = MemoryRefreshTokenStore::new();
        store.create(&record("t1", "u1")).await.unwrap();
        assert!(store.create(&record("t1", "u2")).await.is_err());
    }

    #[tokio::test]
    async fn duplicate_email_rejected() {
        let store = MemoryCredentialStore::with_cost(4);
        store
            .create_user("a@x.com", "secret123", None, Role::User)
            .await
            .unwrap();
        let err = store
            .create_user("a@x.com", "other-pass", None, Role::Admin)
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::Validation(_)));
    }

    #[tokio::test]
    async fn reset_token_consumed_once() {
        let store = MemoryCredentialStore::with_cost(4);
        let user = store
            .create_user("a@x.com", "secret123", None, Role::User)
            .await
            .unwrap();
        let now = Utc::now();
        store
            .set_reset_token(&user.id, "digest", now + Duration::hours(1))
            .await
            .unwrap();

        let consumed = store
            .consume_reset_token("digest", "new-password", now)
            .await
            .unwrap();
        assert_eq!(consumed, Some(user.id.clone()));
        assert!(store.verify_password(&user.id, "new-password").await.unwrap());
        assert_eq!(
            store
                .consume_reset_token("digest", "again-password", now)
                .await
                .unwrap(),
            None
        );
    }

    #[tokio::test]
    async fn expired_reset_token_not_found() {
        let store = MemoryCredentialStore::with_cost(4);
        let user = store
            .create_user("a@x.com", "secret123", None, Role::User)
            .await
            .unwrap();
        let now = Utc::now();
        store
            .set_reset_token(&user.id, "digest", now - Duration::seconds(1))
            .await
            .unwrap();
        assert!(store.find_by_reset_token("digest", now).await.unwrap().is_none());
    }
}
