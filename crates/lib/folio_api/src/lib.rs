//! # folio_api
//!
//! HTTP API library for Folio account security.

pub mod config;
pub mod error;
pub mod extract;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;

use std::sync::Arc;

use axum::Router;
use axum::routing::{get, post};
use folio_core::auth::denylist::SessionDenylist;
use folio_core::auth::password::PasswordHasher;
use folio_core::auth::session::SessionKeys;
use folio_core::email::Mailer;
use folio_core::rate_limit::RateLimiter;
use folio_core::store::AuthStore;
use sqlx::PgPool;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::config::ApiConfig;
use crate::handlers::auth;

/// Shared application state passed to all handlers.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn AuthStore>,
    pub mailer: Arc<dyn Mailer>,
    pub sessions: SessionKeys,
    pub denylist: Arc<SessionDenylist>,
    pub rate_limiter: Arc<RateLimiter>,
    pub hasher: Arc<PasswordHasher>,
    /// API configuration.
    pub config: ApiConfig,
}

impl AppState {
    /// State with fresh in-process limiter and denylist.
    pub fn new(config: ApiConfig, store: Arc<dyn AuthStore>, mailer: Arc<dyn Mailer>) -> Self {
        Self {
            store,
            mailer,
            sessions: SessionKeys::new(config.session_secret.as_bytes(), config.session_lifetime),
            denylist: Arc::new(SessionDenylist::new()),
            rate_limiter: Arc::new(RateLimiter::new()),
            hasher: Arc::new(PasswordHasher::new(config.bcrypt_cost)),
            config,
        }
    }
}

/// Run embedded database migrations.
///
/// Delegates to `folio_core::migrate::migrate()` which owns the migration files.
pub async fn migrate(pool: &PgPool) -> Result<(), sqlx::migrate::MigrateError> {
    folio_core::migrate::migrate(pool).await
}

/// Builds the Axum router with all routes and shared state.
pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    // Public routes (no auth required)
    let public = Router::new()
        .route(routes::POST_AUTH_REGISTER, post(auth::register_handler))
        .route(routes::POST_AUTH_LOGIN, post(auth::login_handler))
        .route(routes::POST_AUTH_LOGOUT, post(auth::logout_handler))
        .route(
            routes::POST_AUTH_FORGOT_PASSWORD,
            post(auth::forgot_password_handler),
        )
        .route(
            routes::POST_AUTH_RESET_PASSWORD,
            post(auth::reset_password_handler),
        )
        .route(routes::POST_AUTH_VERIFY_EMAIL, post(auth::verify_email_handler));

    // Protected routes (require auth)
    let protected = Router::new()
        .route(routes::GET_AUTH_ME, get(auth::me_handler))
        .route(
            routes::POST_AUTH_RESEND_VERIFICATION,
            post(auth::resend_verification_handler),
        )
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            middleware::auth::require_auth,
        ));

    Router::new()
        .merge(public)
        .merge(protected)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
