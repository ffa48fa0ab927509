//! Action dispatch: a table from action type to handler.
//!
//! New action types are added by [`ActionDispatcher::register`]; the engine's
//! traversal loop never changes for them.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use serde_json::{Map, Value};
use tracing::debug;

use crate::builtin::{
    RunAgentAction, SendEmailAction, SendMessageAction, WaitAction, WebhookAction,
};
use crate::mailer::Mailer;
use crate::transport::WebhookTransport;
use crate::{ActionContext, ActionHandler, ActionOutput, NodeError};

pub const SEND_MESSAGE: &str = "send_message";
pub const RUN_AGENT: &str = "run_agent";
pub const SEND_EMAIL: &str = "send_email";
pub const WEBHOOK: &str = "webhook";
pub const WAIT: &str = "wait";

/// Bounds applied by the built-in handlers.
#[derive(Debug, Clone)]
pub struct ActionLimits {
    /// Ceiling on a whole webhook exchange.
    pub webhook_timeout: Duration,
    /// Ceiling on a `wait` action's delay.
    pub max_wait: Duration,
}

impl Default for ActionLimits {
    fn default() -> Self {
        Self {
            webhook_timeout: Duration::from_secs(30),
            max_wait: Duration::from_millis(60_000),
        }
    }
}

/// Maps action-type strings to handlers.
#[derive(Default, Clone)]
pub struct ActionDispatcher {
    handlers: HashMap<String, Arc<dyn ActionHandler>>,
}

impl ActionDispatcher {
    /// A dispatcher with no handlers; every action is a no-op.
    pub fn new() -> Self {
        Self::default()
    }

    /// A dispatcher with the five built-in action types registered.
    pub fn with_builtins(
        mailer: Arc<dyn Mailer>,
        transport: Arc<dyn WebhookTransport>,
        limits: &ActionLimits,
    ) -> Self {
        let mut dispatcher = Self::new();
        dispatcher.register(SEND_MESSAGE, Arc::new(SendMessageAction));
        dispatcher.register(RUN_AGENT, Arc::new(RunAgentAction));
        dispatcher.register(SEND_EMAIL, Arc::new(SendEmailAction::new(mailer)));
        dispatcher.register(WEBHOOK, Arc::new(WebhookAction::new(transport, limits.webhook_timeout)));
        dispatcher.register(WAIT, Arc::new(WaitAction::new(limits.max_wait)));
        dispatcher
    }

    /// Register (or replace) the handler for `action_type`.
    pub fn register(
        &mut self,
        action_type: impl Into<String>,
        handler: Arc<dyn ActionHandler>,
    ) -> Option<Arc<dyn ActionHandler>> {
        self.handlers.insert(action_type.into(), handler)
    }

    pub fn handles(&self, action_type: &str) -> bool {
        self.handlers.contains_key(action_type)
    }

    /// Run the handler for `action_type`.
    ///
    /// A missing or unregistered action type is not an error: it completes
    /// with [`ActionOutput::Empty`].
    pub async fn dispatch(
        &self,
        action_type: Option<&str>,
        config: &Map<String, Value>,
        ctx: &ActionContext,
    ) -> Result<ActionOutput, NodeError> {
        let Some(handler) = action_type.and_then(|t| self.handlers.get(t)) else {
            debug!(node_id = %ctx.node_id, ?action_type, "no handler registered, skipping");
            return Ok(ActionOutput::Empty);
        };

        handler.execute(config, ctx).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::{MockHandler, RecordingMailer, RecordingTransport};
    use serde_json::json;
    use uuid::Uuid;

    fn ctx() -> ActionContext {
        ActionContext {
            workflow_id: Uuid::new_v4(),
            execution_id: Uuid::new_v4(),
            node_id: "n".into(),
            trigger_data: json!({}),
        }
    }

    fn builtins() -> ActionDispatcher {
        ActionDispatcher::with_builtins(
            Arc::new(RecordingMailer::new()),
            Arc::new(RecordingTransport::responding(200)),
            &ActionLimits::default(),
        )
    }

    #[test]
    fn builtins_cover_every_action_type() {
        let dispatcher = builtins();
        for t in [SEND_MESSAGE, RUN_AGENT, SEND_EMAIL, WEBHOOK, WAIT] {
            assert!(dispatcher.handles(t), "{t} not registered");
        }
    }

    #[tokio::test]
    async fn unknown_action_type_is_a_no_op() {
        let out = builtins()
            .dispatch(Some("post_to_slack"), &Map::new(), &ctx())
            .await
            .unwrap();
        assert_eq!(out, ActionOutput::Empty);

        let out = builtins().dispatch(None, &Map::new(), &ctx()).await.unwrap();
        assert_eq!(out, ActionOutput::Empty);
    }

    #[tokio::test]
    async fn registered_handler_is_dispatched() {
        let handler = Arc::new(MockHandler::returning(ActionOutput::Custom(json!({ "ok": 1 }))));
        let mut dispatcher = ActionDispatcher::new();
        assert!(dispatcher.register("custom", handler.clone()).is_none());

        let config = json!({ "k": "v" }).as_object().cloned().unwrap();
        let out = dispatcher.dispatch(Some("custom"), &config, &ctx()).await.unwrap();

        assert_eq!(out, ActionOutput::Custom(json!({ "ok": 1 })));
        assert_eq!(handler.call_count(), 1);
        assert_eq!(handler.calls.lock().unwrap()[0], config);
    }

    #[tokio::test]
    async fn registering_twice_replaces_the_handler() {
        let mut dispatcher = builtins();
        let replacement = Arc::new(MockHandler::failing("nope"));
        assert!(dispatcher.register(SEND_MESSAGE, replacement).is_some());

        let err = dispatcher
            .dispatch(Some(SEND_MESSAGE), &Map::new(), &ctx())
            .await
            .unwrap_err();
        assert_eq!(err, NodeError::Failed("nope".into()));
    }

    #[tokio::test]
    async fn rejections_reach_the_caller_unchanged() {
        let mut dispatcher = ActionDispatcher::new();
        dispatcher.register("strict", Arc::new(MockHandler::rejecting("Missing recipient")));

        let err = dispatcher
            .dispatch(Some("strict"), &Map::new(), &ctx())
            .await
            .unwrap_err();
        assert_eq!(err, NodeError::Rejected("Missing recipient".into()));
        assert_eq!(err.message(), "Missing recipient");
    }
}
