//! The `ActionHandler` trait: the contract every action type fulfils.

use async_trait::async_trait;
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::{ActionOutput, NodeError};

/// Read-only facts about the run a handler executes in.
#[derive(Debug, Clone)]
pub struct ActionContext {
    /// ID of the workflow being executed.
    pub workflow_id: Uuid,
    /// ID of the current execution run.
    pub execution_id: Uuid,
    /// ID of the node whose action is being dispatched.
    pub node_id: String,
    /// Payload the execution was triggered with.
    pub trigger_data: Value,
}

/// A side-effecting action, registered under an action type in the
/// [`crate::ActionDispatcher`].
#[async_trait]
pub trait ActionHandler: Send + Sync {
    /// Run the action with the node's configuration mapping.
    async fn execute(
        &self,
        config: &Map<String, Value>,
        ctx: &ActionContext,
    ) -> Result<ActionOutput, NodeError>;
}
