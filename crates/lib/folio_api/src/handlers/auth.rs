//! Authentication request handlers.

use axum::extract::State;
use axum::http::StatusCode;
use axum::{Extension, Json};
use axum_extra::extract::cookie::CookieJar;

use crate::AppState;
use crate::error::AppResult;
use crate::extract::{ApiJson, ClientIp, UserAgent};
use crate::middleware::auth::{AuthenticatedUser, Identity};
use crate::models::{
    AuthResponse, ForgotPasswordRequest, ForgotPasswordResponse, LoginRequest, MeResponse,
    MessageResponse, RegisterRequest, ResetPasswordRequest, SuccessResponse, VerifyEmailRequest,
};
use crate::services::auth::{self, RequestOrigin};
use crate::services::cookies::{clear_session_cookie, session_cookie};

fn with_session_cookie(state: &AppState, jar: CookieJar, token: &str) -> CookieJar {
    jar.add(session_cookie(
        token,
        state.config.session_lifetime.num_seconds(),
        state.config.secure_cookies(),
    ))
}

/// `POST /auth/register`: create an account and sign it in.
pub async fn register_handler(
    State(state): State<AppState>,
    ClientIp(ip): ClientIp,
    jar: CookieJar,
    ApiJson(body): ApiJson<RegisterRequest>,
) -> AppResult<(StatusCode, CookieJar, Json<AuthResponse>)> {
    let resp = auth::register(&state, &ip, body).await?;
    let jar = with_session_cookie(&state, jar, &resp.token);
    Ok((StatusCode::CREATED, jar, Json(resp)))
}

/// `POST /auth/login`: authenticate with email + password.
pub async fn login_handler(
    State(state): State<AppState>,
    ClientIp(ip): ClientIp,
    jar: CookieJar,
    ApiJson(body): ApiJson<LoginRequest>,
) -> AppResult<(CookieJar, Json<AuthResponse>)> {
    let resp = auth::login(&state, &ip, body).await?;
    let jar = with_session_cookie(&state, jar, &resp.token);
    Ok((jar, Json(resp)))
}

/// `POST /auth/logout`: revoke the session, if any, and clear the cookie.
pub async fn logout_handler(
    State(state): State<AppState>,
    identity: Identity,
    jar: CookieJar,
) -> (CookieJar, Json<MessageResponse>) {
    let resp = auth::logout(&state, &identity);
    let jar = jar.add(clear_session_cookie(state.config.secure_cookies()));
    (jar, Json(resp))
}

/// `GET /auth/me`: the signed-in user.
pub async fn me_handler(
    State(state): State<AppState>,
    Extension(AuthenticatedUser(claims)): Extension<AuthenticatedUser>,
) -> AppResult<Json<MeResponse>> {
    Ok(Json(auth::me(&state, &claims).await?))
}

/// `POST /auth/forgot-password`: request a reset link.
pub async fn forgot_password_handler(
    State(state): State<AppState>,
    ClientIp(ip): ClientIp,
    UserAgent(user_agent): UserAgent,
    ApiJson(body): ApiJson<ForgotPasswordRequest>,
) -> AppResult<Json<ForgotPasswordResponse>> {
    let origin = RequestOrigin { ip, user_agent };
    Ok(Json(auth::forgot_password(&state, &origin, body).await?))
}

/// `POST /auth/reset-password`: set a new password with a reset token.
pub async fn reset_password_handler(
    State(state): State<AppState>,
    ClientIp(ip): ClientIp,
    ApiJson(body): ApiJson<ResetPasswordRequest>,
) -> AppResult<Json<SuccessResponse>> {
    Ok(Json(auth::reset_password(&state, &ip, body).await?))
}

/// `POST /auth/verify-email`
pub async fn verify_email_handler(
    State(state): State<AppState>,
    ClientIp(ip): ClientIp,
    ApiJson(body): ApiJson<VerifyEmailRequest>,
) -> AppResult<Json<SuccessResponse>> {
    Ok(Json(auth::verify_email(&state, &ip, body).await?))
}

/// `POST /auth/resend-verification`: requires authentication.
pub async fn resend_verification_handler(
    State(state): State<AppState>,
    Extension(AuthenticatedUser(claims)): Extension<AuthenticatedUser>,
) -> AppResult<Json<SuccessResponse>> {
    Ok(Json(auth::resend_verification(&state, &claims).await?))
}
