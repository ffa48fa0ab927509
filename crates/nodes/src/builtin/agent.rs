use async_trait::async_trait;
use serde_json::{Map, Value};
use tracing::info;

use crate::config::{optional_str, parse_uuid};
use crate::{ActionContext, ActionHandler, ActionOutput, NodeError};

/// `run_agent`: accepts the request to start an agent after checking the id.
#[derive(Debug, Default, Clone, Copy)]
pub struct RunAgentAction;

#[async_trait]
impl ActionHandler for RunAgentAction {
    async fn execute(
        &self,
        config: &Map<String, Value>,
        ctx: &ActionContext,
    ) -> Result<ActionOutput, NodeError> {
        let agent_id = optional_str(config, "agent_id")
            .and_then(parse_uuid)
            .ok_or_else(|| NodeError::Rejected("Invalid agent_id: expected a UUID".into()))?;

        info!(%agent_id, execution_id = %ctx.execution_id, "agent run requested");
        Ok(ActionOutput::AgentStarted { agent_id: agent_id.to_string() })
    }
}
