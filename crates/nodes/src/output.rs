//! Typed results of the built-in actions.

use serde_json::{json, Value};

/// What an action produced. Flattened to JSON only when it is stored on a
/// step or exposed to condition expressions.
#[derive(Debug, Clone, PartialEq)]
pub enum ActionOutput {
    MessageSent { message: String },
    AgentStarted { agent_id: String },
    EmailSent { to: String, subject: String },
    /// Any completed HTTP exchange, whatever the status code.
    WebhookCalled { status: u16 },
    Waited { delay_ms: u64 },
    /// Output of a handler registered from outside this crate.
    Custom(Value),
    /// No handler was registered for the action type.
    Empty,
}

impl ActionOutput {
    pub fn into_value(self) -> Value {
        match self {
            Self::MessageSent { message } => json!({ "message_sent": true, "message": message }),
            Self::AgentStarted { agent_id } => json!({ "agent_started": true, "agent_id": agent_id }),
            Self::EmailSent { to, subject } => {
                json!({ "email_sent": true, "to": to, "subject": subject })
            }
            Self::WebhookCalled { status } => json!({ "webhook_called": true, "status": status }),
            Self::Waited { delay_ms } => json!({ "waited": true, "delay": delay_ms }),
            Self::Custom(value) => value,
            Self::Empty => json!({}),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn webhook_output_keeps_non_success_status() {
        let value = ActionOutput::WebhookCalled { status: 503 }.into_value();
        assert_eq!(value, json!({ "webhook_called": true, "status": 503 }));
    }

    #[test]
    fn empty_output_is_an_empty_object() {
        assert_eq!(ActionOutput::Empty.into_value(), json!({}));
    }
}
