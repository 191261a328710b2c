//! Application error types.

use axum::{
    Json,
    http::{HeaderValue, StatusCode, header::RETRY_AFTER},
    response::{IntoResponse, Response},
};
use folio_core::auth::{AuthError, SessionError};
use folio_core::email::EmailError;
use folio_core::rate_limit::RateLimited;
use thiserror::Error;
use tracing::error;

use crate::models::ErrorResponse;

/// Convenience alias for handler return types.
pub type AppResult<T> = Result<T, AppError>;

pub const AUTH_REQUIRED: &str = "Authentication required";
pub const SESSION_EXPIRED: &str = "Session expired, please log in again";
pub const INVALID_SESSION: &str = "Invalid session token";
pub const INVALID_CREDENTIALS: &str = "Invalid email or password";

const X_RATELIMIT_LIMIT: &str = "x-ratelimit-limit";
const X_RATELIMIT_REMAINING: &str = "x-ratelimit-remaining";
const X_RATELIMIT_RESET: &str = "x-ratelimit-reset";

/// Application-level errors with HTTP status mapping.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("{0}")]
    RateLimited(RateLimited),

    #[error("Internal server error")]
    Internal(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error, message) = match &self {
            AppError::Validation(m) => (StatusCode::BAD_REQUEST, "validation_error", m.clone()),
            AppError::Unauthorized(m) => (StatusCode::UNAUTHORIZED, "unauthorized", m.clone()),
            AppError::NotFound(m) => (StatusCode::NOT_FOUND, "not_found", m.clone()),
            AppError::Conflict(m) => (StatusCode::CONFLICT, "conflict", m.clone()),
            AppError::RateLimited(r) => (
                StatusCode::TOO_MANY_REQUESTS,
                "rate_limited",
                format!(
                    "Too many requests. Please try again in {} seconds.",
                    r.retry_after_secs
                ),
            ),
            AppError::Internal(detail) => {
                error!(error = %detail, "internal error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal_error",
                    "Internal server error".to_string(),
                )
            }
        };
        let body = Json(ErrorResponse {
            error: error.to_string(),
            message,
        });
        let mut response = (status, body).into_response();
        if let AppError::RateLimited(r) = &self {
            let headers = response.headers_mut();
            headers.insert(RETRY_AFTER, HeaderValue::from(r.retry_after_secs));
            headers.insert(X_RATELIMIT_LIMIT, HeaderValue::from(r.limit));
            headers.insert(X_RATELIMIT_REMAINING, HeaderValue::from_static("0"));
            headers.insert(X_RATELIMIT_RESET, HeaderValue::from(r.reset_epoch_secs));
        }
        response
    }
}

impl From<RateLimited> for AppError {
    fn from(r: RateLimited) -> Self {
        AppError::RateLimited(r)
    }
}

impl From<sqlx::Error> for AppError {
    fn from(e: sqlx::Error) -> Self {
        match e {
            sqlx::Error::RowNotFound => AppError::NotFound("row not found".into()),
            _ => AppError::Internal(e.to_string()),
        }
    }
}

impl From<SessionError> for AppError {
    fn from(e: SessionError) -> Self {
        match e {
            SessionError::Expired => AppError::Unauthorized(SESSION_EXPIRED.into()),
            SessionError::Invalid => AppError::Unauthorized(INVALID_SESSION.into()),
        }
    }
}

impl From<AuthError> for AppError {
    fn from(e: AuthError) -> Self {
        match e {
            AuthError::CredentialError => AppError::Unauthorized(INVALID_CREDENTIALS.into()),
            AuthError::Session(e) => AppError::from(e),
            AuthError::Conflict(msg) => AppError::Conflict(msg),
            AuthError::NotFound(msg) => AppError::NotFound(msg),
            AuthError::DbError(e) => AppError::from(e),
            AuthError::Internal(msg) => AppError::Internal(msg),
        }
    }
}

impl From<EmailError> for AppError {
    fn from(e: EmailError) -> Self {
        AppError::Internal(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn statuses() {
        let cases = [
            (AppError::Validation("x".into()), StatusCode::BAD_REQUEST),
            (AppError::Unauthorized("x".into()), StatusCode::UNAUTHORIZED),
            (AppError::NotFound("x".into()), StatusCode::NOT_FOUND),
            (AppError::Conflict("x".into()), StatusCode::CONFLICT),
            (AppError::Internal("boom".into()), StatusCode::INTERNAL_SERVER_ERROR),
        ];
        for (err, status) in cases {
            assert_eq!(err.into_response().status(), status);
        }
    }

    #[test]
    fn rate_limited_sets_headers() {
        let resp = AppError::RateLimited(RateLimited {
            endpoint: "login".into(),
            limit: 10,
            retry_after_secs: 42,
            reset_epoch_secs: 1_700_000_000,
        })
        .into_response();
        assert_eq!(resp.status(), StatusCode::TOO_MANY_REQUESTS);
        let h = resp.headers();
        assert_eq!(h[RETRY_AFTER], "42");
        assert_eq!(h["x-ratelimit-limit"], "10");
        assert_eq!(h["x-ratelimit-remaining"], "0");
        assert_eq!(h["x-ratelimit-reset"], "1700000000");
    }

    #[test]
    fn session_errors_keep_their_messages() {
        match AppError::from(AuthError::Session(SessionError::Expired)) {
            AppError::Unauthorized(m) => assert_eq!(m, SESSION_EXPIRED),
            other => panic!("unexpected {other:?}"),
        }
        match AppError::from(SessionError::Invalid) {
            AppError::Unauthorized(m) => assert_eq!(m, INVALID_SESSION),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn credential_errors_are_generic() {
        let resp = AppError::from(AuthError::CredentialError).into_response();
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
        match AppError::from(AuthError::CredentialError) {
            AppError::Unauthorized(m) => assert_eq!(m, INVALID_CREDENTIALS),
            other => panic!("unexpected {other:?}"),
        }
    }
}
