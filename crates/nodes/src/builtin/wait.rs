use std::time::Duration;

use async_trait::async_trait;
use serde_json::{Map, Value};

use crate::config::number_field;
use crate::{ActionContext, ActionHandler, ActionOutput, NodeError};

/// `wait`: suspends for `config.delay` milliseconds, clamped to
/// `[0, max_wait]`.
#[derive(Debug, Clone, Copy)]
pub struct WaitAction {
    max_wait: Duration,
}

impl WaitAction {
    pub fn new(max_wait: Duration) -> Self {
        Self { max_wait }
    }
}

#[async_trait]
impl ActionHandler for WaitAction {
    async fn execute(
        &self,
        config: &Map<String, Value>,
        _ctx: &ActionContext,
    ) -> Result<ActionOutput, NodeError> {
        let max_ms = self.max_wait.as_millis() as f64;
        let delay_ms = number_field(config, "delay").unwrap_or(0.0).clamp(0.0, max_ms) as u64;

        tokio::time::sleep(Duration::from_millis(delay_ms)).await;

        Ok(ActionOutput::Waited { delay_ms })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builtin::test_support::{config, ctx};
    use serde_json::json;
    use tokio::time::Instant;

    #[tokio::test(start_paused = true)]
    async fn sleeps_for_the_configured_delay() {
        let action = WaitAction::new(Duration::from_secs(60));
        let start = Instant::now();

        let out = action.execute(&config(json!({ "delay": 1500 })), &ctx()).await.unwrap();

        assert_eq!(out, ActionOutput::Waited { delay_ms: 1500 });
        assert!(start.elapsed() >= Duration::from_millis(1500));
    }

    #[tokio::test(start_paused = true)]
    async fn delay_is_clamped() {
        let action = WaitAction::new(Duration::from_secs(60));

        let out = action.execute(&config(json!({ "delay": 9_000_000 })), &ctx()).await.unwrap();
        assert_eq!(out, ActionOutput::Waited { delay_ms: 60_000 });

        let out = action.execute(&config(json!({ "delay": -5 })), &ctx()).await.unwrap();
        assert_eq!(out, ActionOutput::Waited { delay_ms: 0 });

        let out = action.execute(&config(json!({ "delay": "soon" })), &ctx()).await.unwrap();
        assert_eq!(out, ActionOutput::Waited { delay_ms: 0 });
    }
}
