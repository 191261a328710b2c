//! Email verification tokens.
//!
//! Same active → used | expired lifecycle as password reset tokens. Issuing
//! a new link retires the older ones for that user.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::auth::AuthError;
use crate::models::auth::VerificationTokenRecord;

/// Default lifetime of a verification link: 24 hours.
pub const VERIFICATION_TOKEN_TTL_SECS: i64 = 24 * 60 * 60;

#[async_trait]
pub trait EmailVerificationStore: Send + Sync {
    async fn create_verification(
        &self,
        user_id: Uuid,
        token: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<VerificationTokenRecord, AuthError>;

    async fn get_valid_verification(
        &self,
        token: &str,
    ) -> Result<Option<VerificationTokenRecord>, AuthError>;

    async fn mark_verification_used(&self, token: &str) -> Result<(), AuthError>;

    async fn invalidate_verifications_for_user(&self, user_id: Uuid) -> Result<u64, AuthError>;

    async fn cleanup_expired_verifications(&self) -> Result<u64, AuthError>;
}
