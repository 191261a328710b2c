//! Runtime environment and configuration errors.

use std::fmt;
use std::str::FromStr;

use thiserror::Error;

/// Configuration errors surfaced at startup.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("SESSION_SECRET must be set when APP_ENV=production")]
    MissingSessionSecret,

    #[error("Invalid value for {key}: {value:?}")]
    InvalidValue { key: String, value: String },
}

/// Deployment environment, from `APP_ENV`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AppEnv {
    Production,
    #[default]
    Development,
    Test,
}

impl AppEnv {
    pub fn is_production(self) -> bool {
        matches!(self, AppEnv::Production)
    }

    /// Read `APP_ENV`, defaulting to development.
    pub fn from_env() -> Result<Self, ConfigError> {
        match std::env::var("APP_ENV") {
            Ok(v) if !v.trim().is_empty() => v.parse(),
            _ => Ok(AppEnv::default()),
        }
    }
}

impl FromStr for AppEnv {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "production" | "prod" => Ok(AppEnv::Production),
            "development" | "dev" => Ok(AppEnv::Development),
            "test" => Ok(AppEnv::Test),
            _ => Err(ConfigError::InvalidValue {
                key: "APP_ENV".into(),
                value: s.to_string(),
            }),
        }
    }
}

impl fmt::Display for AppEnv {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            AppEnv::Production => "production",
            AppEnv::Development => "development",
            AppEnv::Test => "test",
        })
    }
}

/// Parse an optional numeric env var, falling back to `default` when unset.
pub fn env_or<T: FromStr>(key: &str, default: T) -> Result<T, ConfigError> {
    match std::env::var(key) {
        Ok(raw) if !raw.trim().is_empty() => {
            raw.trim()
                .parse()
                .map_err(|_| ConfigError::InvalidValue {
                    key: key.to_string(),
                    value: raw,
                })
        }
        _ => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_known_environments() {
        assert_eq!("production".parse::<AppEnv>().unwrap(), AppEnv::Production);
        assert_eq!("PROD".parse::<AppEnv>().unwrap(), AppEnv::Production);
        assert_eq!("dev".parse::<AppEnv>().unwrap(), AppEnv::Development);
        assert_eq!("test".parse::<AppEnv>().unwrap(), AppEnv::Test);
    }

    #[test]
    fn rejects_unknown_environment() {
        assert!("staging".parse::<AppEnv>().is_err());
    }

    #[test]
    fn only_production_is_production() {
        assert!(AppEnv::Production.is_production());
        assert!(!AppEnv::Development.is_production());
        assert!(!AppEnv::Test.is_production());
    }
}
