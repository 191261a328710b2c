//! # folio_core
//!
//! Account security core for Folio: credentials, sessions, single-use
//! account tokens and request rate limiting.

pub mod auth;
pub mod config;
pub mod email;
pub mod migrate;
pub mod models;
pub mod rate_limit;
pub mod reset_tokens;
pub mod store;
pub mod sweep;
pub mod uuid;
pub mod validation;
pub mod verification;
