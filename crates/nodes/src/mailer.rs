//! Email delivery channel used by the `send_email` action.

use async_trait::async_trait;
use tracing::info;

use crate::error::MailError;

/// A message handed to the delivery channel. Fields are already truncated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmailMessage {
    pub to: String,
    pub subject: String,
    pub body: String,
}

/// Delivers (or queues) outbound email.
#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, email: &EmailMessage) -> Result<(), MailError>;
}

/// Records the intent to send in the log and nothing else.
///
/// This is the default channel; a deployment that actually delivers mail
/// injects its own [`Mailer`].
#[derive(Debug, Default, Clone, Copy)]
pub struct LogMailer;

#[async_trait]
impl Mailer for LogMailer {
    async fn send(&self, email: &EmailMessage) -> Result<(), MailError> {
        info!(
            to = %email.to,
            subject = %email.subject,
            body_chars = email.body.chars().count(),
            "email recorded for delivery"
        );
        Ok(())
    }
}
