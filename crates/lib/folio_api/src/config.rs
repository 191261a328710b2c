//! API server configuration.

use chrono::Duration;
use folio_core::auth::password::DEFAULT_BCRYPT_COST;
use folio_core::auth::session::{SESSION_LIFETIME_SECS, resolve_session_secret};
use folio_core::config::{AppEnv, ConfigError, env_or};
use folio_core::rate_limit::RateLimitPolicy;
use folio_core::verification::VERIFICATION_TOKEN_TTL_SECS;

/// Reset links stay valid for one hour.
pub const RESET_TOKEN_TTL_SECS: i64 = 60 * 60;

pub const DEFAULT_APP_BASE_URL: &str = "http://localhost:3000";
pub const DEFAULT_RATE_LIMIT_PER_IP: u32 = 3;

/// Configuration for the API server.
#[derive(Clone)]
pub struct ApiConfig {
    /// Address to bind the HTTP listener (e.g. "127.0.0.1:3100").
    pub bind_addr: String,
    /// PostgreSQL connection URL.
    pub database_url: String,
    pub app_env: AppEnv,
    /// HS256 signing secret for session tokens.
    pub session_secret: String,
    pub session_lifetime: Duration,
    /// Origin used to build links in outgoing email.
    pub app_base_url: String,
    pub bcrypt_cost: u32,
    pub reset_token_ttl: Duration,
    pub verification_token_ttl: Duration,
    pub rate_limits: RateLimitPolicy,
    /// Take the client address from `X-Forwarded-For` / `X-Real-IP`. Only
    /// safe behind a reverse proxy that overwrites those headers.
    pub trust_proxy: bool,
}

impl std::fmt::Debug for ApiConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiConfig")
            .field("bind_addr", &self.bind_addr)
            .field("app_env", &self.app_env)
            .field("session_secret", &"<redacted>")
            .field("app_base_url", &self.app_base_url)
            .field("bcrypt_cost", &self.bcrypt_cost)
            .field("rate_limits", &self.rate_limits)
            .field("trust_proxy", &self.trust_proxy)
            .finish_non_exhaustive()
    }
}

impl ApiConfig {
    /// Reads configuration from environment variables with sensible defaults.
    ///
    /// | Variable            | Default                          |
    /// |---------------------|----------------------------------|
    /// | `BIND_ADDR`         | `127.0.0.1:3100`                 |
    /// | `DATABASE_URL`      | `postgres://localhost:5432/folio` |
    /// | `APP_ENV`           | `development`                    |
    /// | `SESSION_SECRET` / `JWT_SECRET` | dev fallback, required in production |
    /// | `APP_BASE_URL`      | `http://localhost:3000`          |
    /// | `BCRYPT_COST`       | `10`                             |
    /// | `RATE_LIMIT_PER_IP` | `3`                              |
    /// | `TRUST_PROXY`       | `false`                          |
    pub fn from_env() -> Result<Self, ConfigError> {
        let app_env = AppEnv::from_env()?;
        let session_secret = resolve_session_secret(app_env)?;
        let rate_limit_per_ip = env_or("RATE_LIMIT_PER_IP", DEFAULT_RATE_LIMIT_PER_IP)?;
        Ok(Self {
            bind_addr: std::env::var("BIND_ADDR").unwrap_or_else(|_| "127.0.0.1:3100".into()),
            database_url: std::env::var("DATABASE_URL")
                .unwrap_or_else(|_| "postgres://localhost:5432/folio".into()),
            app_env,
            session_secret,
            session_lifetime: Duration::seconds(SESSION_LIFETIME_SECS),
            app_base_url: std::env::var("APP_BASE_URL")
                .ok()
                .filter(|v| !v.trim().is_empty())
                .unwrap_or_else(|| DEFAULT_APP_BASE_URL.into()),
            bcrypt_cost: env_or("BCRYPT_COST", DEFAULT_BCRYPT_COST)?,
            reset_token_ttl: Duration::seconds(RESET_TOKEN_TTL_SECS),
            verification_token_ttl: Duration::seconds(VERIFICATION_TOKEN_TTL_SECS),
            rate_limits: RateLimitPolicy::with_forgot_password_per_ip(rate_limit_per_ip),
            trust_proxy: env_or("TRUST_PROXY", false)?,
        })
    }

    /// Deterministic config for tests: fixed secret, minimum bcrypt cost.
    pub fn for_tests() -> Self {
        Self {
            bind_addr: "127.0.0.1:0".into(),
            database_url: String::new(),
            app_env: AppEnv::Test,
            session_secret: "folio-test-secret".into(),
            session_lifetime: Duration::seconds(SESSION_LIFETIME_SECS),
            app_base_url: DEFAULT_APP_BASE_URL.into(),
            bcrypt_cost: 4,
            reset_token_ttl: Duration::seconds(RESET_TOKEN_TTL_SECS),
            verification_token_ttl: Duration::seconds(VERIFICATION_TOKEN_TTL_SECS),
            rate_limits: RateLimitPolicy::default(),
            trust_proxy: false,
        }
    }

    /// Cookies are `Secure` only in production.
    pub fn secure_cookies(&self) -> bool {
        self.app_env.is_production()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn debug_redacts_secret() {
        let rendered = format!("{:?}", ApiConfig::for_tests());
        assert!(!rendered.contains("folio-test-secret"));
        assert!(rendered.contains("<redacted>"));
    }

    #[test]
    fn test_config_is_not_production() {
        let config = ApiConfig::for_tests();
        assert!(!config.secure_cookies());
        assert_eq!(config.session_lifetime.num_hours(), 24);
        assert_eq!(config.reset_token_ttl.num_minutes(), 60);
        assert!(!config.trust_proxy);
    }
}
