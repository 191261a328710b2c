//! Password hashing via bcrypt.

use std::sync::OnceLock;

use tracing::warn;

use super::AuthError;

/// Default bcrypt cost factor.
pub const DEFAULT_BCRYPT_COST: u32 = 10;

/// Plaintext used to build the padding digest for unknown-account logins.
const DUMMY_PASSWORD: &str = "folio-timing-padding";

/// bcrypt hasher with a tunable work factor.
#[derive(Debug)]
pub struct PasswordHasher {
    cost: u32,
    dummy_digest: OnceLock<Option<String>>,
}

impl PasswordHasher {
    pub fn new(cost: u32) -> Self {
        Self {
            cost,
            dummy_digest: OnceLock::new(),
        }
    }

    pub fn cost(&self) -> u32 {
        self.cost
    }

    /// Hash a password. Each call draws a fresh random salt.
    pub fn hash(&self, password: &str) -> Result<String, AuthError> {
        bcrypt::hash(password, self.cost)
            .map_err(|e| AuthError::Internal(format!("bcrypt hash: {e}")))
    }

    /// Verify a password against a bcrypt digest.
    ///
    /// Never errors: a malformed digest counts as a mismatch.
    pub fn verify(&self, password: &str, digest: &str) -> bool {
        if password.is_empty() {
            return false;
        }
        match bcrypt::verify(password, digest) {
            Ok(matched) => matched,
            Err(e) => {
                warn!(error = %e, "bcrypt verify failed, treating as mismatch");
                false
            }
        }
    }

    /// Burn one verification's worth of CPU for a login against an unknown
    /// account, so response time does not reveal whether the email exists.
    /// Always returns `false`.
    pub fn verify_dummy(&self, password: &str) -> bool {
        let digest = self
            .dummy_digest
            .get_or_init(|| bcrypt::hash(DUMMY_PASSWORD, self.cost).ok());
        if let Some(digest) = digest {
            let _ = bcrypt::verify(password, digest);
        }
        false
    }
}

impl Default for PasswordHasher {
    fn default() -> Self {
        Self::new(DEFAULT_BCRYPT_COST)
    }
}

/// Hash a password with bcrypt (cost 10).
pub fn hash_password(password: &str) -> Result<String, AuthError> {
    PasswordHasher::default().hash(password)
}

/// Verify a password against a bcrypt hash.
pub fn verify_password(password: &str, hash: &str) -> bool {
    PasswordHasher::default().verify(password, hash)
}
