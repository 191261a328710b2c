//! Logout denylist for session tokens.
//!
//! Sessions are otherwise only invalidated by expiry. Entries live until the
//! token they name would have expired anyway, so the map stays small.

use chrono::Utc;
use dashmap::DashMap;

use crate::models::auth::SessionClaims;

/// In-memory set of revoked session IDs (`jti`), keyed to their expiry.
#[derive(Debug, Default)]
pub struct SessionDenylist {
    revoked: DashMap<String, i64>,
}

impl SessionDenylist {
    pub fn new() -> Self {
        Self::default()
    }

    /// Revoke the session these claims belong to.
    pub fn revoke(&self, claims: &SessionClaims) {
        self.revoked.insert(claims.jti.clone(), claims.exp);
    }

    pub fn is_revoked(&self, claims: &SessionClaims) -> bool {
        self.revoked.contains_key(&claims.jti)
    }

    /// Drop entries whose tokens have expired on their own. Returns the
    /// number removed.
    pub fn cleanup_expired(&self) -> usize {
        let now = Utc::now().timestamp();
        let before = self.revoked.len();
        self.revoked.retain(|_, exp| *exp >= now);
        before.saturating_sub(self.revoked.len())
    }

    pub fn len(&self) -> usize {
        self.revoked.len()
    }

    pub fn is_empty(&self) -> bool {
        self.revoked.is_empty()
    }
}
