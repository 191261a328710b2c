//! Authentication flows behind the `/auth/*` handlers.
//!
//! Each flow takes the caller identity it is rate limited by; the limiter is
//! consulted before any other work.

use std::sync::Arc;

use chrono::Utc;
use folio_core::auth::password::PasswordHasher;
use folio_core::auth::session::SessionSubject;
use folio_core::auth::tokens::{generate_default_token, token_fingerprint};
use folio_core::auth::AuthError;
use folio_core::email::EmailMessage;
use folio_core::email::templates::{
    password_changed_email, password_reset_email, reset_password_link, verification_email,
    verify_email_link,
};
use folio_core::models::auth::{NewResetToken, NewUser, SessionClaims, User};
use folio_core::rate_limit::Endpoint;
use folio_core::store::{EMAIL_TAKEN, USERNAME_TAKEN};
use folio_core::validation::{
    honeypot_tripped, normalize_email, validate_email, validate_password, validate_username,
};
use tracing::{error, info, warn};

use crate::AppState;
use crate::error::{AppError, AppResult};
use crate::middleware::auth::Identity;
use crate::models::{
    AuthResponse, ForgotPasswordRequest, ForgotPasswordResponse, LoginRequest, MeResponse,
    MessageResponse, RegisterRequest, ResetPasswordRequest, SuccessResponse, VerifyEmailRequest,
};

pub const FORGOT_PASSWORD_DETAILS: &str =
    "If an account exists for that email, a password reset link has been sent.";
pub const INVALID_RESET_TOKEN: &str = "Invalid or expired reset token";
pub const INVALID_VERIFICATION_TOKEN: &str = "Invalid or expired verification token";
pub const ALREADY_VERIFIED: &str = "Email is already verified";
pub const USER_NOT_FOUND: &str = "User not found";
const REJECTED_REGISTRATION: &str = "Invalid registration request";

/// Where a reset request came from, stored with the token.
#[derive(Debug, Clone, Default)]
pub struct RequestOrigin {
    pub ip: String,
    pub user_agent: Option<String>,
}

fn enforce_rate_limit(state: &AppState, identity: &str, endpoint: Endpoint) -> AppResult<()> {
    let limit = state.config.rate_limits.limit_for(endpoint);
    state
        .rate_limiter
        .enforce(identity, endpoint.as_str(), limit)
        .map(|_| ())
        .map_err(|limited| {
            warn!(
                target: "auth.rate_limited",
                identity,
                endpoint = %endpoint,
                retry_after = limited.retry_after_secs,
                "rate limit exceeded"
            );
            AppError::RateLimited(limited)
        })
}

async fn hash_password(hasher: &Arc<PasswordHasher>, password: &str) -> AppResult<String> {
    let hasher = Arc::clone(hasher);
    let password = password.to_string();
    tokio::task::spawn_blocking(move || hasher.hash(&password))
        .await
        .map_err(|e| AppError::Internal(format!("password hash task: {e}")))?
        .map_err(AppError::from)
}

/// Check a password; with no digest, burns the same bcrypt work and fails.
async fn verify_password(
    hasher: &Arc<PasswordHasher>,
    password: &str,
    digest: Option<String>,
) -> AppResult<bool> {
    let hasher = Arc::clone(hasher);
    let password = password.to_string();
    tokio::task::spawn_blocking(move || match digest {
        Some(digest) => hasher.verify(&password, &digest),
        None => hasher.verify_dummy(&password),
    })
    .await
    .map_err(|e| AppError::Internal(format!("password verify task: {e}")))
}

fn session_response(state: &AppState, user: User, message: &str) -> AppResult<AuthResponse> {
    let issued = state.sessions.issue(&SessionSubject {
        user_id: user.id,
        email: user.email.clone(),
        username: user.username.clone(),
    })?;
    Ok(AuthResponse {
        message: message.to_string(),
        user: user.into(),
        token: issued.token,
    })
}

async fn deliver(state: &AppState, message: EmailMessage, kind: &'static str) -> AppResult<()> {
    state.mailer.send(message).await.map_err(|e| {
        error!(kind, error = %e, "email delivery failed");
        AppError::from(e)
    })
}

/// Retire older verification links and send a fresh one.
async fn send_verification(state: &AppState, user: &User) -> AppResult<()> {
    state.store.invalidate_verifications_for_user(user.id).await?;
    let token = generate_default_token();
    let expires_at = Utc::now() + state.config.verification_token_ttl;
    state
        .store
        .create_verification(user.id, &token, expires_at)
        .await?;
    let link = verify_email_link(&state.config.app_base_url, &token)?;
    deliver(
        state,
        verification_email(&user.email, &user.username, &link),
        "verification",
    )
    .await
}

/// Create an account and start a session for it.
pub async fn register(
    state: &AppState,
    client_ip: &str,
    req: RegisterRequest,
) -> AppResult<AuthResponse> {
    enforce_rate_limit(state, client_ip, Endpoint::Register)?;

    if honeypot_tripped(req.website.as_deref()) {
        warn!(target: "auth.register", client_ip, "honeypot field filled; rejecting");
        return Err(AppError::Validation(REJECTED_REGISTRATION.into()));
    }
    let email = validate_email(&req.email).map_err(AppError::Validation)?;
    let username = validate_username(&req.username).map_err(AppError::Validation)?;
    validate_password(&req.password).map_err(AppError::Validation)?;

    if state.store.find_by_email(&email).await?.is_some() {
        return Err(AppError::Conflict(EMAIL_TAKEN.into()));
    }
    if state.store.find_by_username(&username).await?.is_some() {
        return Err(AppError::Conflict(USERNAME_TAKEN.into()));
    }

    let password_hash = hash_password(&state.hasher, &req.password).await?;
    let record = state
        .store
        .create_user(NewUser {
            email,
            username,
            password_hash,
        })
        .await?;
    let user = record.user;
    info!(target: "auth.register", user_id = %user.id, "account created");

    if let Err(e) = send_verification(state, &user).await {
        warn!(
            target: "auth.register",
            user_id = %user.id,
            error = %e,
            "verification email not sent"
        );
    }

    session_response(state, user, "Registration successful")
}

/// Exchange credentials for a session.
pub async fn login(
    state: &AppState,
    client_ip: &str,
    req: LoginRequest,
) -> AppResult<AuthResponse> {
    enforce_rate_limit(state, client_ip, Endpoint::Login)?;

    let email = normalize_email(&req.email);
    if email.is_empty() || req.password.is_empty() {
        return Err(AppError::Validation("Email and password are required".into()));
    }

    let record = state.store.find_by_email(&email).await?;
    let digest = record.as_ref().map(|r| r.password_hash.clone());
    let known = digest.is_some();
    let ok = verify_password(&state.hasher, &req.password, digest).await?;

    match record {
        Some(record) if ok => {
            info!(target: "auth.login", user_id = %record.user.id, success = true, "login");
            session_response(state, record.user, "Login successful")
        }
        _ => {
            info!(
                target: "auth.login",
                client_ip,
                success = false,
                known_account = known,
                "login rejected"
            );
            Err(AuthError::CredentialError.into())
        }
    }
}

/// Revoke the presented session, if any. Always succeeds.
pub fn logout(state: &AppState, identity: &Identity) -> MessageResponse {
    if let Identity::Authenticated(claims) = identity {
        state.denylist.revoke(claims);
        info!(target: "auth.logout", user_id = %claims.sub, "session revoked");
    }
    MessageResponse {
        message: "Logged out successfully".into(),
    }
}

/// The current user's profile.
pub async fn me(state: &AppState, claims: &SessionClaims) -> AppResult<MeResponse> {
    let record = state
        .store
        .find_by_id(claims.sub)
        .await?
        .ok_or_else(|| AppError::NotFound(USER_NOT_FOUND.into()))?;
    Ok(MeResponse {
        user: record.user.into(),
    })
}

/// Start a password reset. The response never reveals whether the account
/// exists.
///
/// Only the per-IP limit and the email format are checked inline. Lookup,
/// token creation and delivery run on a spawned task so every branch answers
/// in the same time.
pub async fn forgot_password(
    state: &AppState,
    origin: &RequestOrigin,
    req: ForgotPasswordRequest,
) -> AppResult<ForgotPasswordResponse> {
    enforce_rate_limit(state, &origin.ip, Endpoint::ForgotPassword)?;

    let generic = ForgotPasswordResponse {
        success: true,
        details: FORGOT_PASSWORD_DETAILS.into(),
    };

    let Ok(email) = validate_email(&req.email) else {
        return Ok(generic);
    };
    let state = state.clone();
    let origin = origin.clone();
    tokio::spawn(async move {
        if let Err(e) = issue_reset_link(&state, &origin, &email).await {
            error!(
                target: "auth.password.reset_requested",
                client_ip = %origin.ip,
                error = %e,
                "password reset request failed"
            );
        }
    });
    Ok(generic)
}

async fn issue_reset_link(state: &AppState, origin: &RequestOrigin, email: &str) -> AppResult<()> {
    let Some(record) = state.store.find_by_email(email).await? else {
        info!(
            target: "auth.password.reset_requested",
            client_ip = %origin.ip,
            account_found = false,
            "password reset requested"
        );
        return Ok(());
    };
    let user = record.user;

    let email_budget = state.rate_limiter.check(
        email,
        Endpoint::ForgotPasswordEmail.as_str(),
        state.config.rate_limits.forgot_password_email,
    );
    if email_budget.limited {
        warn!(
            target: "auth.rate_limited",
            user_id = %user.id,
            endpoint = %Endpoint::ForgotPasswordEmail,
            "per-account reset budget exhausted; no email sent"
        );
        return Ok(());
    }

    let token = generate_default_token();
    let ttl = state.config.reset_token_ttl;
    state
        .store
        .create(NewResetToken {
            user_id: user.id,
            token: token.clone(),
            expires_at: Utc::now() + ttl,
            request_ip: Some(origin.ip.clone()),
            request_user_agent: origin.user_agent.clone(),
        })
        .await?;
    info!(
        target: "auth.password.reset_requested",
        user_id = %user.id,
        client_ip = %origin.ip,
        token = %token_fingerprint(&token),
        account_found = true,
        "password reset requested"
    );

    let link = reset_password_link(&state.config.app_base_url, &token)?;
    let message = password_reset_email(&user.email, &user.username, &link, ttl.num_minutes());
    deliver(state, message, "password_reset").await
}

/// Complete a password reset with a single-use token.
pub async fn reset_password(
    state: &AppState,
    client_ip: &str,
    req: ResetPasswordRequest,
) -> AppResult<SuccessResponse> {
    enforce_rate_limit(state, client_ip, Endpoint::ResetPassword)?;

    validate_password(&req.password).map_err(AppError::Validation)?;
    let token = req.token.trim();
    let fingerprint = token_fingerprint(token);

    let invalid = || {
        warn!(
            target: "auth.password.reset_failed",
            client_ip,
            token = %fingerprint,
            "invalid, used or expired reset token"
        );
        AppError::Validation(INVALID_RESET_TOKEN.into())
    };
    if token.is_empty() {
        return Err(invalid());
    }
    let Some(reset) = state.store.get_valid_token(token).await? else {
        return Err(invalid());
    };
    let Some(record) = state.store.find_by_id(reset.user_id).await? else {
        return Err(invalid());
    };
    let user = record.user;

    let password_hash = hash_password(&state.hasher, &req.password).await?;
    state.store.update_password(user.id, &password_hash).await?;

    // The new password is committed; later failures only get logged.
    if let Err(e) = state.store.mark_used(token).await {
        error!(user_id = %user.id, error = %e, "failed to mark reset token used");
    }
    match state.store.invalidate_all_for_user(user.id).await {
        Ok(n) if n > 0 => {
            info!(
                user_id = %user.id,
                invalidated = n,
                "outstanding reset tokens invalidated"
            );
        }
        Ok(_) => {}
        Err(e) => error!(user_id = %user.id, error = %e, "failed to invalidate reset tokens"),
    }
    let _ = deliver(
        state,
        password_changed_email(&user.email, &user.username),
        "password_changed",
    )
    .await;

    info!(
        target: "auth.password.reset_completed",
        user_id = %user.id,
        token = %fingerprint,
        "password reset completed"
    );
    Ok(SuccessResponse::new("Password has been reset successfully"))
}

/// Consume an email verification link.
pub async fn verify_email(
    state: &AppState,
    client_ip: &str,
    req: VerifyEmailRequest,
) -> AppResult<SuccessResponse> {
    enforce_rate_limit(state, client_ip, Endpoint::VerifyEmail)?;

    let token = req.token.trim();
    let invalid = || AppError::Validation(INVALID_VERIFICATION_TOKEN.into());
    if token.is_empty() {
        return Err(invalid());
    }
    let Some(verification) = state.store.get_valid_verification(token).await? else {
        return Err(invalid());
    };
    match state.store.mark_email_verified(verification.user_id).await {
        Ok(()) => {}
        Err(AuthError::NotFound(_)) => return Err(invalid()),
        Err(e) => return Err(e.into()),
    }
    state.store.mark_verification_used(token).await?;
    info!(target: "auth.email.verified", user_id = %verification.user_id, "email verified");
    Ok(SuccessResponse::new("Email verified successfully"))
}

/// Send a new verification link to the signed-in user.
pub async fn resend_verification(
    state: &AppState,
    claims: &SessionClaims,
) -> AppResult<SuccessResponse> {
    let identity = format!("user:{}", claims.sub);
    enforce_rate_limit(state, &identity, Endpoint::ResendVerification)?;

    let record = state
        .store
        .find_by_id(claims.sub)
        .await?
        .ok_or_else(|| AppError::NotFound(USER_NOT_FOUND.into()))?;
    if record.user.email_verified {
        return Err(AppError::Validation(ALREADY_VERIFIED.into()));
    }
    send_verification(state, &record.user).await?;
    Ok(SuccessResponse::new("Verification email sent"))
}
