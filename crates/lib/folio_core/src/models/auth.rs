//! Authentication domain models.
//!
//! These are internal domain models, distinct from the API request/response
//! models (which have `#[serde(rename_all = "camelCase")]` etc.).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Public view of a user account. Never carries the password hash.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    pub username: String,
    pub email_verified: bool,
    pub created_at: DateTime<Utc>,
}

/// User with password hash (for internal auth flows).
#[derive(Debug, Clone)]
pub struct UserRecord {
    pub user: User,
    pub password_hash: String,
}

/// Input for creating a user. `email` is expected to be normalized already.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub email: String,
    pub username: String,
    pub password_hash: String,
}

/// Lifecycle state of a single-use token, derived from its timestamps.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenState {
    Active,
    Used,
    Expired,
}

impl TokenState {
    /// `used` wins over `expired`: a consumed token stays consumed.
    pub fn derive(
        used_at: Option<DateTime<Utc>>,
        expires_at: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Self {
        if used_at.is_some() {
            TokenState::Used
        } else if expires_at <= now {
            TokenState::Expired
        } else {
            TokenState::Active
        }
    }
}

/// Password reset token row. Only the SHA-256 of the token is stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResetTokenRecord {
    pub id: Uuid,
    pub user_id: Uuid,
    pub token_hash: String,
    pub expires_at: DateTime<Utc>,
    pub used_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub request_ip: Option<String>,
    pub request_user_agent: Option<String>,
}

impl ResetTokenRecord {
    pub fn state(&self, now: DateTime<Utc>) -> TokenState {
        TokenState::derive(self.used_at, self.expires_at, now)
    }
}

/// Input for creating a password reset token. `token` is the raw value
/// that goes into the emailed link.
#[derive(Debug, Clone)]
pub struct NewResetToken {
    pub user_id: Uuid,
    pub token: String,
    pub expires_at: DateTime<Utc>,
    pub request_ip: Option<String>,
    pub request_user_agent: Option<String>,
}

/// Email verification token row, stored hashed like reset tokens.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerificationTokenRecord {
    pub id: Uuid,
    pub user_id: Uuid,
    pub token_hash: String,
    pub expires_at: DateTime<Utc>,
    pub used_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl VerificationTokenRecord {
    pub fn state(&self, now: DateTime<Utc>) -> TokenState {
        TokenState::derive(self.used_at, self.expires_at, now)
    }
}

/// JWT claims embedded in session tokens.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionClaims {
    /// Subject: user ID (standard JWT `sub` claim).
    pub sub: Uuid,
    /// User email.
    pub email: String,
    /// Username as displayed.
    pub username: String,
    /// Issued at (unix timestamp).
    pub iat: i64,
    /// Expiry (unix timestamp).
    pub exp: i64,
    /// Token ID, used by the logout denylist.
    pub jti: String,
}
