use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{Map, Value};
use tracing::warn;

use super::{MAX_EMAIL_SUBJECT_CHARS, MAX_EMAIL_TO_CHARS, MAX_MESSAGE_CHARS};
use crate::config::{string_field, truncate_chars};
use crate::mailer::{EmailMessage, Mailer};
use crate::{ActionContext, ActionHandler, ActionOutput, NodeError};

/// `send_email`: hands a bounded message to the injected [`Mailer`].
pub struct SendEmailAction {
    mailer: Arc<dyn Mailer>,
}

impl SendEmailAction {
    pub fn new(mailer: Arc<dyn Mailer>) -> Self {
        Self { mailer }
    }
}

#[async_trait]
impl ActionHandler for SendEmailAction {
    async fn execute(
        &self,
        config: &Map<String, Value>,
        ctx: &ActionContext,
    ) -> Result<ActionOutput, NodeError> {
        let email = EmailMessage {
            to: truncate_chars(&string_field(config, "to"), MAX_EMAIL_TO_CHARS),
            subject: truncate_chars(&string_field(config, "subject"), MAX_EMAIL_SUBJECT_CHARS),
            body: truncate_chars(&string_field(config, "body"), MAX_MESSAGE_CHARS),
        };

        if let Err(e) = self.mailer.send(&email).await {
            warn!(node_id = %ctx.node_id, error = %e, "email delivery failed");
            return Err(NodeError::Failed("Email delivery failed".into()));
        }

        Ok(ActionOutput::EmailSent { to: email.to, subject: email.subject })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builtin::test_support::{config, ctx};
    use crate::mock::RecordingMailer;
    use serde_json::json;

    #[tokio::test]
    async fn fields_are_truncated_before_delivery() {
        let mailer = Arc::new(RecordingMailer::new());
        let action = SendEmailAction::new(mailer.clone());

        let out = action
            .execute(
                &config(json!({
                    "to": "a".repeat(300),
                    "subject": "s".repeat(600),
                    "body": "hello",
                })),
                &ctx(),
            )
            .await
            .unwrap();

        let sent = mailer.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].to.len(), MAX_EMAIL_TO_CHARS);
        assert_eq!(sent[0].subject.len(), MAX_EMAIL_SUBJECT_CHARS);
        assert_eq!(sent[0].body, "hello");
        assert_eq!(
            out,
            ActionOutput::EmailSent { to: sent[0].to.clone(), subject: sent[0].subject.clone() }
        );
    }

    #[tokio::test]
    async fn delivery_error_is_reported_generically() {
        let action = SendEmailAction::new(Arc::new(RecordingMailer::failing("smtp 554 relay denied")));
        let err = action
            .execute(&config(json!({ "to": "ops@example.com" })), &ctx())
            .await
            .unwrap_err();

        assert_eq!(err, NodeError::Failed("Email delivery failed".into()));
    }
}
