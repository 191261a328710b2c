//! Authentication primitives.
//!
//! Provides password hashing, secure token generation, session token
//! management and the logout denylist, shared by `folio_api` and the
//! token stores.

pub mod denylist;
pub mod password;
pub mod session;
pub mod tokens;

use thiserror::Error;

pub use session::SessionError;

/// Authentication errors.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Invalid credentials")]
    CredentialError,

    #[error("Session error: {0}")]
    Session(#[from] SessionError),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Database error: {0}")]
    DbError(#[from] sqlx::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}
