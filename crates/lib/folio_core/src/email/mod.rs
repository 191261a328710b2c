//! Outbound transactional email.
//!
//! Delivery is an external collaborator behind the `Mailer` trait. The
//! built-in `LogMailer` only writes messages to the log.

pub mod templates;

use async_trait::async_trait;
use thiserror::Error;
use tracing::{debug, info};

/// Email delivery errors.
#[derive(Debug, Error)]
pub enum EmailError {
    #[error("Email delivery failed: {0}")]
    Delivery(String),

    #[error("Invalid link: {0}")]
    Link(#[from] url::ParseError),
}

/// A rendered message ready for delivery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmailMessage {
    pub to: String,
    pub subject: String,
    pub html: String,
    pub text: String,
}

#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, message: EmailMessage) -> Result<(), EmailError>;
}

/// Writes messages to the log instead of delivering them.
#[derive(Debug, Default, Clone)]
pub struct LogMailer;

#[async_trait]
impl Mailer for LogMailer {
    async fn send(&self, message: EmailMessage) -> Result<(), EmailError> {
        info!(to = %message.to, subject = %message.subject, "email (log mailer)");
        debug!(body = %message.text, "email body");
        Ok(())
    }
}
