//! Authentication guard: session token extraction and verification.

use axum::{
    extract::{FromRequestParts, Request, State},
    http::{HeaderMap, header::AUTHORIZATION, request::Parts},
    middleware::Next,
    response::Response,
};
use axum_extra::extract::cookie::CookieJar;
use folio_core::auth::denylist::SessionDenylist;
use folio_core::auth::session::{SessionKeys, extract_token};
use folio_core::models::auth::SessionClaims;
use std::convert::Infallible;

use crate::AppState;
use crate::error::{AUTH_REQUIRED, AppError, INVALID_SESSION};
use crate::services::cookies::SESSION_COOKIE;

/// Key used to store `SessionClaims` in request extensions.
#[derive(Debug, Clone)]
pub struct AuthenticatedUser(pub SessionClaims);

/// Who is calling, for routes that also serve anonymous callers.
#[derive(Debug, Clone, PartialEq)]
pub enum Identity {
    Authenticated(SessionClaims),
    Anonymous,
}

/// The raw session token from the `Authorization` header or the session
/// cookie. The header wins.
pub fn session_token(headers: &HeaderMap) -> Option<String> {
    let authorization = headers.get(AUTHORIZATION).and_then(|v| v.to_str().ok());
    let jar = CookieJar::from_headers(headers);
    let cookie = jar.get(SESSION_COOKIE).map(|c| c.value());
    extract_token(authorization, cookie).map(str::to_string)
}

/// Verify the caller's session. Revoked sessions count as invalid.
pub fn authenticate(
    headers: &HeaderMap,
    keys: &SessionKeys,
    denylist: &SessionDenylist,
) -> Result<SessionClaims, AppError> {
    let token =
        session_token(headers).ok_or_else(|| AppError::Unauthorized(AUTH_REQUIRED.into()))?;
    let claims = keys.verify(&token)?;
    if denylist.is_revoked(&claims) {
        return Err(AppError::Unauthorized(INVALID_SESSION.into()));
    }
    Ok(claims)
}

/// Like `authenticate`, but any failure means `Anonymous`.
pub fn optional_authenticate(
    headers: &HeaderMap,
    keys: &SessionKeys,
    denylist: &SessionDenylist,
) -> Identity {
    match authenticate(headers, keys, denylist) {
        Ok(claims) => Identity::Authenticated(claims),
        Err(_) => Identity::Anonymous,
    }
}

/// Axum middleware: verifies the session and injects `AuthenticatedUser`
/// into request extensions.
pub async fn require_auth(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let claims = authenticate(request.headers(), &state.sessions, &state.denylist)?;
    request.extensions_mut().insert(AuthenticatedUser(claims));
    Ok(next.run(request).await)
}

impl FromRequestParts<AppState> for Identity {
    type Rejection = Infallible;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        if let Some(AuthenticatedUser(claims)) = parts.extensions.get::<AuthenticatedUser>() {
            return Ok(Identity::Authenticated(claims.clone()));
        }
        Ok(optional_authenticate(
            &parts.headers,
            &state.sessions,
            &state.denylist,
        ))
    }
}

#[cfg(test)]
mod tests {
    use axum::http::HeaderValue;
    use axum::http::header::COOKIE;
    use chrono::{Duration, Utc};
    use folio_core::auth::session::SessionSubject;
    use uuid::Uuid;

    use super::*;
    use crate::error::SESSION_EXPIRED;

    fn keys() -> SessionKeys {
        SessionKeys::from_secret(b"guard-test-secret")
    }

    fn subject() -> SessionSubject {
        SessionSubject {
            user_id: Uuid::new_v4(),
            email: "a@b.com".into(),
            username: "alice".into(),
        }
    }

    fn bearer(token: &str) -> HeaderMap {
        let mut h = HeaderMap::new();
        h.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {token}")).unwrap(),
        );
        h
    }

    fn unauthorized_message(err: AppError) -> String {
        match err {
            AppError::Unauthorized(m) => m,
            other => panic!("expected 401, got {other:?}"),
        }
    }

    #[test]
    fn no_token_requires_authentication() {
        let err = authenticate(&HeaderMap::new(), &keys(), &SessionDenylist::new()).unwrap_err();
        assert_eq!(unauthorized_message(err), AUTH_REQUIRED);
    }

    #[test]
    fn valid_bearer_token_authenticates() {
        let keys = keys();
        let issued = keys.issue(&subject()).unwrap();
        let claims = authenticate(&bearer(&issued.token), &keys, &SessionDenylist::new()).unwrap();
        assert_eq!(claims, issued.claims);
    }

    #[test]
    fn cookie_token_authenticates() {
        let keys = keys();
        let issued = keys.issue(&subject()).unwrap();
        let mut h = HeaderMap::new();
        h.insert(
            COOKIE,
            HeaderValue::from_str(&format!("other=1; {SESSION_COOKIE}={}", issued.token)).unwrap(),
        );
        assert!(authenticate(&h, &keys, &SessionDenylist::new()).is_ok());
    }

    #[test]
    fn expired_and_tampered_tokens_differ() {
        let keys = keys();
        let old = keys
            .issue_at(&subject(), Utc::now() - Duration::hours(25))
            .unwrap();
        let err = authenticate(&bearer(&old.token), &keys, &SessionDenylist::new()).unwrap_err();
        assert_eq!(unauthorized_message(err), SESSION_EXPIRED);

        let err = authenticate(&bearer("not.a.jwt"), &keys, &SessionDenylist::new()).unwrap_err();
        assert_eq!(unauthorized_message(err), INVALID_SESSION);
    }

    #[test]
    fn revoked_session_is_invalid() {
        let keys = keys();
        let denylist = SessionDenylist::new();
        let issued = keys.issue(&subject()).unwrap();
        denylist.revoke(&issued.claims);
        let err = authenticate(&bearer(&issued.token), &keys, &denylist).unwrap_err();
        assert_eq!(unauthorized_message(err), INVALID_SESSION);
    }

    #[test]
    fn optional_authentication_is_anonymous_on_failure() {
        let keys = keys();
        let denylist = SessionDenylist::new();
        assert_eq!(
            optional_authenticate(&bearer("garbage"), &keys, &denylist),
            Identity::Anonymous
        );
        let issued = keys.issue(&subject()).unwrap();
        assert_eq!(
            optional_authenticate(&bearer(&issued.token), &keys, &denylist),
            Identity::Authenticated(issued.claims)
        );
    }
}
