//! Password reset token lifecycle.
//!
//! A token is `active` until it is used or its expiry passes; both are
//! terminal. Lookups collapse "unknown", "used" and "expired" into one
//! absent result so callers cannot leak which applies.

use async_trait::async_trait;
use uuid::Uuid;

use crate::auth::AuthError;
use crate::models::auth::{NewResetToken, ResetTokenRecord};

/// Persistence contract for password reset tokens.
///
/// Implementations key rows by the SHA-256 of the raw token; the raw value
/// only ever exists in the emailed link.
#[async_trait]
pub trait PasswordResetTokenStore: Send + Sync {
    /// Insert a new active token. A user may hold several at once.
    async fn create(&self, new: NewResetToken) -> Result<ResetTokenRecord, AuthError>;

    /// The record, only if it exists, is unused and has not expired.
    async fn get_valid_token(&self, token: &str) -> Result<Option<ResetTokenRecord>, AuthError>;

    /// Stamp `used_at`. Marking an already-used token is a no-op.
    async fn mark_used(&self, token: &str) -> Result<(), AuthError>;

    /// Stamp `used_at` on every active token of the user. Returns how many
    /// tokens were invalidated.
    async fn invalidate_all_for_user(&self, user_id: Uuid) -> Result<u64, AuthError>;

    /// Delete expired and used rows. Returns how many were deleted.
    async fn cleanup_expired(&self) -> Result<u64, AuthError>;
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, Utc};

    use super::*;
    use crate::auth::tokens::generate_default_token;
    use crate::models::auth::TokenState;
    use crate::store::MemoryStore;

    fn new_token(user_id: Uuid, ttl: Duration) -> NewResetToken {
        NewResetToken {
            user_id,
            token: generate_default_token(),
            expires_at: Utc::now() + ttl,
            request_ip: Some("203.0.113.7".into()),
            request_user_agent: Some("tests".into()),
        }
    }

    #[tokio::test]
    async fn fresh_token_is_valid() {
        let store = MemoryStore::new();
        let user = Uuid::new_v4();
        let new = new_token(user, Duration::hours(1));
        let raw = new.token.clone();
        let created = store.create(new).await.unwrap();

        assert_eq!(created.state(Utc::now()), TokenState::Active);
        assert_ne!(created.token_hash, raw);
        assert_eq!(created.request_ip.as_deref(), Some("203.0.113.7"));

        let found = store.get_valid_token(&raw).await.unwrap().unwrap();
        assert_eq!(found.id, created.id);
        assert_eq!(found.user_id, user);
    }

    #[tokio::test]
    async fn unknown_token_is_absent() {
        let store = MemoryStore::new();
        assert!(store.get_valid_token("nope").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn used_token_is_absent() {
        let store = MemoryStore::new();
        let new = new_token(Uuid::new_v4(), Duration::hours(1));
        let raw = new.token.clone();
        store.create(new).await.unwrap();

        store.mark_used(&raw).await.unwrap();
        assert!(store.get_valid_token(&raw).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn mark_used_is_idempotent() {
        let store = MemoryStore::new();
        let new = new_token(Uuid::new_v4(), Duration::hours(1));
        let raw = new.token.clone();
        store.create(new).await.unwrap();

        store.mark_used(&raw).await.unwrap();
        let first = store.reset_token_snapshot(&raw).await.unwrap().used_at;
        store.mark_used(&raw).await.unwrap();
        let second = store.reset_token_snapshot(&raw).await.unwrap().used_at;
        assert!(first.is_some());
        assert_eq!(first, second);
        store.mark_used("unknown").await.unwrap();
    }

    #[tokio::test]
    async fn expired_token_is_absent_even_if_unused() {
        let store = MemoryStore::new();
        let new = new_token(Uuid::new_v4(), Duration::seconds(-1));
        let raw = new.token.clone();
        let created = store.create(new).await.unwrap();
        assert_eq!(created.state(Utc::now()), TokenState::Expired);
        assert!(store.get_valid_token(&raw).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn invalidate_all_for_user_kills_every_active_token() {
        let store = MemoryStore::new();
        let user = Uuid::new_v4();
        let other = Uuid::new_v4();
        let mut raws = Vec::new();
        for _ in 0..3 {
            let new = new_token(user, Duration::hours(1));
            raws.push(new.token.clone());
            store.create(new).await.unwrap();
        }
        let keep = new_token(other, Duration::hours(1));
        let keep_raw = keep.token.clone();
        store.create(keep).await.unwrap();

        assert_eq!(store.invalidate_all_for_user(user).await.unwrap(), 3);
        for raw in &raws {
            assert!(store.get_valid_token(raw).await.unwrap().is_none());
        }
        assert!(store.get_valid_token(&keep_raw).await.unwrap().is_some());
        assert_eq!(store.invalidate_all_for_user(user).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn cleanup_removes_expired_and_used() {
        let store = MemoryStore::new();
        let user = Uuid::new_v4();
        let expired = new_token(user, Duration::seconds(-5));
        let used = new_token(user, Duration::hours(1));
        let used_raw = used.token.clone();
        let live = new_token(user, Duration::hours(1));
        let live_raw = live.token.clone();
        store.create(expired).await.unwrap();
        store.create(used).await.unwrap();
        store.create(live).await.unwrap();
        store.mark_used(&used_raw).await.unwrap();

        assert_eq!(store.cleanup_expired().await.unwrap(), 2);
        assert_eq!(store.reset_token_count().await, 1);
        assert!(store.get_valid_token(&live_raw).await.unwrap().is_some());
    }
}
