//! Storage collaborators.
//!
//! The security core talks to persistence only through these traits.
//! `PgStore` is the production backend; `MemoryStore` backs tests and local
//! runs without a database.

pub mod memory;
pub mod postgres;

use async_trait::async_trait;
use uuid::Uuid;

pub use memory::MemoryStore;
pub use postgres::PgStore;

use crate::auth::AuthError;
use crate::models::auth::{NewUser, UserRecord};
use crate::reset_tokens::PasswordResetTokenStore;
use crate::verification::EmailVerificationStore;

/// Credential records. Email and lowercase username are each unique.
#[async_trait]
pub trait UserStore: Send + Sync {
    /// `email` must already be normalized.
    async fn find_by_email(&self, email: &str) -> Result<Option<UserRecord>, AuthError>;

    /// Case-insensitive.
    async fn find_by_username(&self, username: &str) -> Result<Option<UserRecord>, AuthError>;

    async fn find_by_id(&self, user_id: Uuid) -> Result<Option<UserRecord>, AuthError>;

    /// Fails with `AuthError::Conflict` if the email or username is taken.
    async fn create_user(&self, new: NewUser) -> Result<UserRecord, AuthError>;

    async fn update_password(&self, user_id: Uuid, password_hash: &str) -> Result<(), AuthError>;

    async fn mark_email_verified(&self, user_id: Uuid) -> Result<(), AuthError>;
}

/// Everything the auth flows need from storage.
pub trait AuthStore: UserStore + PasswordResetTokenStore + EmailVerificationStore {}

impl<T> AuthStore for T where T: UserStore + PasswordResetTokenStore + EmailVerificationStore {}

pub const EMAIL_TAKEN: &str = "Email is already registered";
pub const USERNAME_TAKEN: &str = "Username is already taken";
