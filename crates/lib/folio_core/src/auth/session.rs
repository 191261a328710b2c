//! Session token issuance and verification.
//!
//! Sessions are stateless HS256 JWTs. Verification needs only the signing
//! secret; there is no database round trip.

use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use thiserror::Error;
use tracing::warn;
use uuid::Uuid;

use super::AuthError;
use super::tokens::generate_token;
use crate::config::{AppEnv, ConfigError};
use crate::models::auth::SessionClaims;

/// Session lifetime: 24 hours.
pub const SESSION_LIFETIME_SECS: i64 = 24 * 60 * 60;

/// Signing secret used outside production when none is configured.
pub const DEV_FALLBACK_SECRET: &str = "folio-dev-session-secret-do-not-use-in-production";

/// What went wrong verifying a session token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum SessionError {
    #[error("session expired")]
    Expired,
    #[error("invalid session token")]
    Invalid,
}

/// Identity fields embedded in a new session.
#[derive(Debug, Clone)]
pub struct SessionSubject {
    pub user_id: Uuid,
    pub email: String,
    pub username: String,
}

/// A freshly signed session token and the claims it carries.
#[derive(Debug, Clone)]
pub struct IssuedSession {
    pub token: String,
    pub claims: SessionClaims,
}

/// HS256 keys plus the fixed session lifetime.
#[derive(Clone)]
pub struct SessionKeys {
    encoding: EncodingKey,
    decoding: DecodingKey,
    lifetime: Duration,
}

impl std::fmt::Debug for SessionKeys {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionKeys")
            .field("lifetime", &self.lifetime)
            .finish_non_exhaustive()
    }
}

impl SessionKeys {
    pub fn new(secret: &[u8], lifetime: Duration) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret),
            decoding: DecodingKey::from_secret(secret),
            lifetime,
        }
    }

    /// Keys with the standard 24 hour lifetime.
    pub fn from_secret(secret: &[u8]) -> Self {
        Self::new(secret, Duration::seconds(SESSION_LIFETIME_SECS))
    }

    /// Sign a new session valid from now.
    pub fn issue(&self, subject: &SessionSubject) -> Result<IssuedSession, AuthError> {
        self.issue_at(subject, Utc::now())
    }

    /// Sign a new session as of `now`.
    pub fn issue_at(
        &self,
        subject: &SessionSubject,
        now: DateTime<Utc>,
    ) -> Result<IssuedSession, AuthError> {
        let claims = SessionClaims {
            sub: subject.user_id,
            email: subject.email.clone(),
            username: subject.username.clone(),
            iat: now.timestamp(),
            exp: (now + self.lifetime).timestamp(),
            jti: generate_token(16),
        };
        let token = encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)
            .map_err(|e| AuthError::Internal(format!("jwt encode: {e}")))?;
        Ok(IssuedSession { token, claims })
    }

    /// Verify signature, structure and expiry.
    pub fn verify(&self, token: &str) -> Result<SessionClaims, SessionError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        validation.validate_exp = true;
        validation.set_required_spec_claims(&["exp", "sub"]);
        decode::<SessionClaims>(token, &self.decoding, &validation)
            .map(|data| data.claims)
            .map_err(|e| match e.kind() {
                ErrorKind::ExpiredSignature => SessionError::Expired,
                _ => SessionError::Invalid,
            })
    }
}

/// Pull a session token from an `Authorization` header value or a cookie
/// value. The header wins when both are present.
///
/// A header that is not exactly `Bearer <token>` counts as no token at all.
pub fn extract_token<'a>(
    authorization: Option<&'a str>,
    cookie: Option<&'a str>,
) -> Option<&'a str> {
    if let Some(token) = authorization.and_then(bearer_token) {
        return Some(token);
    }
    cookie.map(str::trim).filter(|c| !c.is_empty())
}

fn bearer_token(header: &str) -> Option<&str> {
    let mut parts = header.split(' ');
    match (parts.next(), parts.next(), parts.next()) {
        (Some("Bearer"), Some(token), None) if !token.is_empty() => Some(token),
        _ => None,
    }
}

/// Resolve the session signing secret from the process environment.
pub fn resolve_session_secret(env: AppEnv) -> Result<String, ConfigError> {
    resolve_session_secret_with(env, |key| std::env::var(key).ok())
}

/// Resolve the signing secret: `SESSION_SECRET` → `JWT_SECRET` → dev fallback.
///
/// Production refuses to start without a configured secret.
pub fn resolve_session_secret_with(
    env: AppEnv,
    lookup: impl Fn(&str) -> Option<String>,
) -> Result<String, ConfigError> {
    for key in ["SESSION_SECRET", "JWT_SECRET"] {
        if let Some(secret) = lookup(key)
            && !secret.trim().is_empty()
        {
            return Ok(secret);
        }
    }
    if env.is_production() {
        return Err(ConfigError::MissingSessionSecret);
    }
    warn!(
        env = %env,
        "!!! SESSION_SECRET is not set; signing sessions with the built-in development \
         secret. Anyone can forge sessions for this server. Never run like this in production !!!"
    );
    Ok(DEV_FALLBACK_SECRET.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn keys() -> SessionKeys {
        SessionKeys::from_secret(b"test-secret")
    }

    fn subject() -> SessionSubject {
        SessionSubject {
            user_id: Uuid::new_v4(),
            email: "a@b.com".into(),
            username: "alice".into(),
        }
    }

    #[test]
    fn issued_token_verifies_with_same_claims() {
        let keys = keys();
        let subject = subject();
        let issued = keys.issue(&subject).unwrap();
        let claims = keys.verify(&issued.token).unwrap();

        assert_eq!(claims, issued.claims);
        assert_eq!(claims.sub, subject.user_id);
        assert_eq!(claims.email, "a@b.com");
        assert_eq!(claims.username, "alice");
        assert!(claims.iat < claims.exp);
        assert_eq!(claims.exp - claims.iat, SESSION_LIFETIME_SECS);
    }

    #[test]
    fn each_session_has_distinct_jti() {
        let keys = keys();
        let subject = subject();
        let a = keys.issue(&subject).unwrap();
        let b = keys.issue(&subject).unwrap();
        assert_ne!(a.claims.jti, b.claims.jti);
    }

    #[test]
    fn expired_token_reports_expiry() {
        let keys = keys();
        let issued = keys
            .issue_at(&subject(), Utc::now() - Duration::hours(25))
            .unwrap();
        assert_eq!(keys.verify(&issued.token), Err(SessionError::Expired));
    }

    #[test]
    fn tampered_signature_is_invalid() {
        let keys = keys();
        let issued = keys.issue(&subject()).unwrap();
        let sig_start = issued.token.rfind('.').unwrap() + 1;
        let mut bytes = issued.token.into_bytes();
        let i = sig_start + 5;
        bytes[i] = if bytes[i] == b'A' { b'B' } else { b'A' };
        let tampered = String::from_utf8(bytes).unwrap();
        assert_eq!(keys.verify(&tampered), Err(SessionError::Invalid));
    }

    #[test]
    fn tampered_payload_is_invalid() {
        let keys = keys();
        let issued = keys.issue(&subject()).unwrap();
        let parts: Vec<&str> = issued.token.split('.').collect();
        let other = keys.issue(&subject()).unwrap();
        let other_payload = other.token.split('.').nth(1).unwrap();
        let spliced = format!("{}.{}.{}", parts[0], other_payload, parts[2]);
        assert_eq!(keys.verify(&spliced), Err(SessionError::Invalid));
    }

    #[test]
    fn wrong_secret_is_invalid() {
        let issued = keys().issue(&subject()).unwrap();
        let other = SessionKeys::from_secret(b"another-secret");
        assert_eq!(other.verify(&issued.token), Err(SessionError::Invalid));
    }

    #[test]
    fn garbage_is_invalid() {
        assert_eq!(keys().verify("not.a.jwt"), Err(SessionError::Invalid));
        assert_eq!(keys().verify(""), Err(SessionError::Invalid));
    }

    #[test]
    fn bearer_header_is_extracted() {
        assert_eq!(extract_token(Some("Bearer abc"), None), Some("abc"));
    }

    #[test]
    fn header_takes_precedence_over_cookie() {
        assert_eq!(
            extract_token(Some("Bearer from-header"), Some("from-cookie")),
            Some("from-header")
        );
    }

    #[test]
    fn malformed_header_is_treated_as_absent() {
        assert_eq!(extract_token(Some("Bearer"), None), None);
        assert_eq!(extract_token(Some("Basic abc"), None), None);
        assert_eq!(extract_token(Some("bearer abc"), None), None);
        assert_eq!(extract_token(Some("Bearer a b"), None), None);
        assert_eq!(extract_token(Some("abc"), None), None);
    }

    #[test]
    fn bearer_parts_are_separated_by_exactly_one_space() {
        assert_eq!(extract_token(Some("Bearer  abc"), None), None);
        assert_eq!(extract_token(Some("Bearer\tabc"), None), None);
        assert_eq!(extract_token(Some("Bearer "), None), None);
        assert_eq!(extract_token(Some(" Bearer abc"), None), None);
        assert_eq!(extract_token(Some("Bearer abc "), None), None);
    }

    #[test]
    fn malformed_header_falls_back_to_cookie() {
        assert_eq!(extract_token(Some("Token abc"), Some("c")), Some("c"));
    }

    #[test]
    fn empty_cookie_is_absent() {
        assert_eq!(extract_token(None, Some("")), None);
        assert_eq!(extract_token(None, None), None);
    }

    #[test]
    fn configured_secret_is_used() {
        let secret = resolve_session_secret_with(AppEnv::Production, |k| {
            (k == "SESSION_SECRET").then(|| "s3cret".to_string())
        })
        .unwrap();
        assert_eq!(secret, "s3cret");
    }

    #[test]
    fn jwt_secret_is_second_choice() {
        let secret = resolve_session_secret_with(AppEnv::Production, |k| {
            (k == "JWT_SECRET").then(|| "legacy".to_string())
        })
        .unwrap();
        assert_eq!(secret, "legacy");
    }

    #[test]
    fn production_without_secret_is_an_error() {
        let err = resolve_session_secret_with(AppEnv::Production, |_| None).unwrap_err();
        assert!(matches!(err, ConfigError::MissingSessionSecret));
        let blank = resolve_session_secret_with(AppEnv::Production, |_| Some("  ".into()));
        assert!(blank.is_err());
    }

    #[test]
    fn development_falls_back_to_dev_secret() {
        let secret = resolve_session_secret_with(AppEnv::Development, |_| None).unwrap();
        assert_eq!(secret, DEV_FALLBACK_SECRET);
    }
}
