//! In-memory storage backend.
//!
//! Holds users and tokens in process memory behind async locks. Used by the
//! test suites and by `folio_api_server --memory` for local development.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{EMAIL_TAKEN, USERNAME_TAKEN, UserStore};
use crate::auth::AuthError;
use crate::auth::tokens::hash_token;
use crate::models::auth::{
    NewResetToken, NewUser, ResetTokenRecord, TokenState, User, UserRecord,
    VerificationTokenRecord,
};
use crate::reset_tokens::PasswordResetTokenStore;
use crate::uuid::uuidv7;
use crate::verification::EmailVerificationStore;

#[derive(Debug, Default)]
pub struct MemoryStore {
    users: RwLock<HashMap<Uuid, UserRecord>>,
    /// Keyed by token hash.
    reset_tokens: RwLock<HashMap<String, ResetTokenRecord>>,
    /// Keyed by token hash.
    verifications: RwLock<HashMap<String, VerificationTokenRecord>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of reset token rows, in any state.
    pub async fn reset_token_count(&self) -> usize {
        self.reset_tokens.read().await.len()
    }

    /// Raw row lookup regardless of state.
    pub async fn reset_token_snapshot(&self, token: &str) -> Option<ResetTokenRecord> {
        self.reset_tokens.read().await.get(&hash_token(token)).cloned()
    }

    /// Number of verification token rows, in any state.
    pub async fn verification_count(&self) -> usize {
        self.verifications.read().await.len()
    }
}

#[async_trait]
impl UserStore for MemoryStore {
    async fn find_by_email(&self, email: &str) -> Result<Option<UserRecord>, AuthError> {
        let users = self.users.read().await;
        Ok(users.values().find(|u| u.user.email == email).cloned())
    }

    async fn find_by_username(&self, username: &str) -> Result<Option<UserRecord>, AuthError> {
        let wanted = username.to_lowercase();
        let users = self.users.read().await;
        Ok(users
            .values()
            .find(|u| u.user.username.to_lowercase() == wanted)
            .cloned())
    }

    async fn find_by_id(&self, user_id: Uuid) -> Result<Option<UserRecord>, AuthError> {
        Ok(self.users.read().await.get(&user_id).cloned())
    }

    async fn create_user(&self, new: NewUser) -> Result<UserRecord, AuthError> {
        // Single write lock so the uniqueness checks and the insert are atomic.
        let mut users = self.users.write().await;
        if users.values().any(|u| u.user.email == new.email) {
            return Err(AuthError::Conflict(EMAIL_TAKEN.into()));
        }
        let lower = new.username.to_lowercase();
        if users
            .values()
            .any(|u| u.user.username.to_lowercase() == lower)
        {
            return Err(AuthError::Conflict(USERNAME_TAKEN.into()));
        }
        let record = UserRecord {
            user: User {
                id: Uuid::new_v4(),
                email: new.email,
                username: new.username,
                email_verified: false,
                created_at: Utc::now(),
            },
            password_hash: new.password_hash,
        };
        users.insert(record.user.id, record.clone());
        Ok(record)
    }

    async fn update_password(&self, user_id: Uuid, password_hash: &str) -> Result<(), AuthError> {
        let mut users = self.users.write().await;
        let record = users
            .get_mut(&user_id)
            .ok_or_else(|| AuthError::NotFound("user not found".into()))?;
        record.password_hash = password_hash.to_string();
        Ok(())
    }

    async fn mark_email_verified(&self, user_id: Uuid) -> Result<(), AuthError> {
        let mut users = self.users.write().await;
        let record = users
            .get_mut(&user_id)
            .ok_or_else(|| AuthError::NotFound("user not found".into()))?;
        record.user.email_verified = true;
        Ok(())
    }
}

#[async_trait]
impl PasswordResetTokenStore for MemoryStore {
    async fn create(&self, new: NewResetToken) -> Result<ResetTokenRecord, AuthError> {
        let record = ResetTokenRecord {
            id: uuidv7(),
            user_id: new.user_id,
            token_hash: hash_token(&new.token),
            expires_at: new.expires_at,
            used_at: None,
            created_at: Utc::now(),
            request_ip: new.request_ip,
            request_user_agent: new.request_user_agent,
        };
        let mut tokens = self.reset_tokens.write().await;
        if tokens.contains_key(&record.token_hash) {
            return Err(AuthError::Conflict("reset token already exists".into()));
        }
        tokens.insert(record.token_hash.clone(), record.clone());
        Ok(record)
    }

    async fn get_valid_token(&self, token: &str) -> Result<Option<ResetTokenRecord>, AuthError> {
        let now = Utc::now();
        let tokens = self.reset_tokens.read().await;
        Ok(tokens
            .get(&hash_token(token))
            .filter(|r| r.state(now) == TokenState::Active)
            .cloned())
    }

    async fn mark_used(&self, token: &str) -> Result<(), AuthError> {
        let mut tokens = self.reset_tokens.write().await;
        if let Some(record) = tokens.get_mut(&hash_token(token))
            && record.used_at.is_none()
        {
            record.used_at = Some(Utc::now());
        }
        Ok(())
    }

    async fn invalidate_all_for_user(&self, user_id: Uuid) -> Result<u64, AuthError> {
        let now = Utc::now();
        let mut tokens = self.reset_tokens.write().await;
        let mut count = 0;
        for record in tokens.values_mut() {
            if record.user_id == user_id && record.state(now) == TokenState::Active {
                record.used_at = Some(now);
                count += 1;
            }
        }
        Ok(count)
    }

    async fn cleanup_expired(&self) -> Result<u64, AuthError> {
        let now = Utc::now();
        let mut tokens = self.reset_tokens.write().await;
        let before = tokens.len();
        tokens.retain(|_, r| r.state(now) == TokenState::Active);
        Ok((before - tokens.len()) as u64)
    }
}

#[async_trait]
impl EmailVerificationStore for MemoryStore {
    async fn create_verification(
        &self,
        user_id: Uuid,
        token: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<VerificationTokenRecord, AuthError> {
        let record = VerificationTokenRecord {
            id: uuidv7(),
            user_id,
            token_hash: hash_token(token),
            expires_at,
            used_at: None,
            created_at: Utc::now(),
        };
        self.verifications
            .write()
            .await
            .insert(record.token_hash.clone(), record.clone());
        Ok(record)
    }

    async fn get_valid_verification(
        &self,
        token: &str,
    ) -> Result<Option<VerificationTokenRecord>, AuthError> {
        let now = Utc::now();
        let tokens = self.verifications.read().await;
        Ok(tokens
            .get(&hash_token(token))
            .filter(|r| r.state(now) == TokenState::Active)
            .cloned())
    }

    async fn mark_verification_used(&self, token: &str) -> Result<(), AuthError> {
        let mut tokens = self.verifications.write().await;
        if let Some(record) = tokens.get_mut(&hash_token(token))
            && record.used_at.is_none()
        {
            record.used_at = Some(Utc::now());
        }
        Ok(())
    }

    async fn invalidate_verifications_for_user(&self, user_id: Uuid) -> Result<u64, AuthError> {
        let now = Utc::now();
        let mut tokens = self.verifications.write().await;
        let mut count = 0;
        for record in tokens.values_mut() {
            if record.user_id == user_id && record.state(now) == TokenState::Active {
                record.used_at = Some(now);
                count += 1;
            }
        }
        Ok(count)
    }

    async fn cleanup_expired_verifications(&self) -> Result<u64, AuthError> {
        let now = Utc::now();
        let mut tokens = self.verifications.write().await;
        let before = tokens.len();
        tokens.retain(|_, r| r.state(now) == TokenState::Active);
        Ok((before - tokens.len()) as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_user(email: &str, username: &str) -> NewUser {
        NewUser {
            email: email.into(),
            username: username.into(),
            password_hash: "$2b$04$hash".into(),
        }
    }

    #[tokio::test]
    async fn create_and_find_user() {
        let store = MemoryStore::new();
        let created = store.create_user(new_user("a@b.com", "Alice")).await.unwrap();
        assert!(!created.user.email_verified);
        assert_eq!(created.user.id.get_version(), Some(uuid::Version::Random));

        let by_email = store.find_by_email("a@b.com").await.unwrap().unwrap();
        assert_eq!(by_email.user.id, created.user.id);
        let by_name = store.find_by_username("ALICE").await.unwrap().unwrap();
        assert_eq!(by_name.user.username, "Alice");
        assert!(store.find_by_id(created.user.id).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn duplicate_email_conflicts() {
        let store = MemoryStore::new();
        store.create_user(new_user("a@b.com", "alice")).await.unwrap();
        let err = store
            .create_user(new_user("a@b.com", "bob"))
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::Conflict(m) if m == EMAIL_TAKEN));
    }

    #[tokio::test]
    async fn duplicate_username_conflicts_case_insensitively() {
        let store = MemoryStore::new();
        store.create_user(new_user("a@b.com", "alice")).await.unwrap();
        let err = store
            .create_user(new_user("c@d.com", "ALICE"))
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::Conflict(m) if m == USERNAME_TAKEN));
    }

    #[tokio::test]
    async fn update_password_and_verify_email() {
        let store = MemoryStore::new();
        let created = store.create_user(new_user("a@b.com", "alice")).await.unwrap();
        let id = created.user.id;

        store.update_password(id, "new-hash").await.unwrap();
        store.mark_email_verified(id).await.unwrap();

        let record = store.find_by_id(id).await.unwrap().unwrap();
        assert_eq!(record.password_hash, "new-hash");
        assert!(record.user.email_verified);
    }

    #[tokio::test]
    async fn updating_missing_user_is_not_found() {
        let store = MemoryStore::new();
        let err = store.update_password(Uuid::new_v4(), "h").await.unwrap_err();
        assert!(matches!(err, AuthError::NotFound(_)));
    }
}
