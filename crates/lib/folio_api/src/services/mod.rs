pub mod auth;
pub mod cookies;
