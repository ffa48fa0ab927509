use async_trait::async_trait;
use serde_json::{Map, Value};

use super::MAX_MESSAGE_CHARS;
use crate::config::{string_field, truncate_chars};
use crate::{ActionContext, ActionHandler, ActionOutput, NodeError};

/// `send_message`: records the (truncated) message. No I/O.
#[derive(Debug, Default, Clone, Copy)]
pub struct SendMessageAction;

#[async_trait]
impl ActionHandler for SendMessageAction {
    async fn execute(
        &self,
        config: &Map<String, Value>,
        _ctx: &ActionContext,
    ) -> Result<ActionOutput, NodeError> {
        let message = truncate_chars(&string_field(config, "message"), MAX_MESSAGE_CHARS);
        Ok(ActionOutput::MessageSent { message })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builtin::test_support::{config, ctx};
    use serde_json::json;

    #[tokio::test]
    async fn long_messages_are_truncated() {
        let long = "x".repeat(MAX_MESSAGE_CHARS + 50);
        let out = SendMessageAction
            .execute(&config(json!({ "message": long })), &ctx())
            .await
            .unwrap();

        match out {
            ActionOutput::MessageSent { message } => {
                assert_eq!(message.chars().count(), MAX_MESSAGE_CHARS)
            }
            other => panic!("unexpected output {other:?}"),
        }
    }

    #[tokio::test]
    async fn missing_message_sends_empty_text() {
        let out = SendMessageAction.execute(&config(json!({})), &ctx()).await.unwrap();
        assert_eq!(out, ActionOutput::MessageSent { message: String::new() });
    }
}
