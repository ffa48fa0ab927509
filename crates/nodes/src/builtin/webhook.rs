use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Map, Value};
use tracing::{info, warn};

use crate::config::optional_str;
use crate::transport::{HttpMethod, WebhookRequest, WebhookTransport};
use crate::url_guard::check_url;
use crate::{ActionContext, ActionHandler, ActionOutput, NodeError};

const BLOCKED_URL: &str =
    "Webhook URL is not allowed: only public http(s) addresses may be called";
const REQUEST_FAILED: &str = "Webhook request failed";

/// `webhook`: calls a user-configured URL with the run's trigger payload.
///
/// The URL is checked by the URL guard before the transport is touched, and
/// the whole exchange is bounded by `timeout`; dropping the in-flight future
/// on expiry releases its connection.
pub struct WebhookAction {
    transport: Arc<dyn WebhookTransport>,
    timeout: Duration,
}

impl WebhookAction {
    pub fn new(transport: Arc<dyn WebhookTransport>, timeout: Duration) -> Self {
        Self { transport, timeout }
    }

    fn build_request(
        config: &Map<String, Value>,
        ctx: &ActionContext,
    ) -> Result<WebhookRequest, NodeError> {
        let raw_url = optional_str(config, "url")
            .filter(|u| !u.trim().is_empty())
            .ok_or_else(|| NodeError::Rejected("Webhook URL is required".into()))?;

        let url = check_url(raw_url).map_err(|reason| {
            warn!(node_id = %ctx.node_id, %reason, "webhook URL rejected");
            NodeError::Rejected(BLOCKED_URL.into())
        })?;

        let method = match config.get("method") {
            None | Some(Value::Null) => HttpMethod::Post,
            Some(Value::String(m)) => HttpMethod::parse(m).ok_or_else(|| {
                NodeError::Rejected(format!("Unsupported webhook method '{m}'"))
            })?,
            Some(_) => return Err(NodeError::Rejected("Webhook method must be a string".into())),
        };

        let headers = config
            .get("headers")
            .and_then(Value::as_object)
            .map(|map| {
                map.iter()
                    .filter_map(|(name, value)| match value {
                        Value::String(s) => Some((name.clone(), s.clone())),
                        Value::Number(_) | Value::Bool(_) => Some((name.clone(), value.to_string())),
                        _ => None,
                    })
                    .collect()
            })
            .unwrap_or_default();

        Ok(WebhookRequest {
            method,
            url,
            headers,
            body: json!({
                "workflow_id": ctx.workflow_id,
                "execution_id": ctx.execution_id,
                "trigger_data": ctx.trigger_data,
            }),
        })
    }
}

#[async_trait]
impl ActionHandler for WebhookAction {
    async fn execute(
        &self,
        config: &Map<String, Value>,
        ctx: &ActionContext,
    ) -> Result<ActionOutput, NodeError> {
        let request = Self::build_request(config, ctx)?;
        let method = request.method;
        let host = request.url.host_str().unwrap_or_default().to_owned();

        match tokio::time::timeout(self.timeout, self.transport.send(request)).await {
            Ok(Ok(status)) => {
                info!(node_id = %ctx.node_id, %method, %host, status, "webhook called");
                Ok(ActionOutput::WebhookCalled { status })
            }
            Ok(Err(e)) => {
                warn!(node_id = %ctx.node_id, %method, %host, error = %e, "webhook request failed");
                Err(NodeError::Failed(REQUEST_FAILED.into()))
            }
            Err(_) => {
                warn!(
                    node_id = %ctx.node_id,
                    %method,
                    %host,
                    timeout_ms = self.timeout.as_millis() as u64,
                    "webhook request timed out"
                );
                Err(NodeError::Failed(REQUEST_FAILED.into()))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builtin::test_support::{config, ctx};
    use crate::mock::RecordingTransport;

    fn action(transport: Arc<RecordingTransport>) -> WebhookAction {
        WebhookAction::new(transport, Duration::from_secs(30))
    }

    #[tokio::test]
    async fn posts_trigger_payload_to_allowed_url() {
        let transport = Arc::new(RecordingTransport::responding(200));
        let ctx = ctx();

        let out = action(transport.clone())
            .execute(&config(json!({ "url": "https://api.example.com/hook" })), &ctx)
            .await
            .unwrap();

        assert_eq!(out, ActionOutput::WebhookCalled { status: 200 });

        let sent = transport.requests();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].method, HttpMethod::Post);
        assert_eq!(sent[0].url.as_str(), "https://api.example.com/hook");
        assert_eq!(sent[0].body["trigger_data"], json!({ "amount": 42 }));
        assert_eq!(sent[0].body["execution_id"], json!(ctx.execution_id));
        assert_eq!(sent[0].body["workflow_id"], json!(ctx.workflow_id));
    }

    #[tokio::test]
    async fn non_success_status_still_completes() {
        let transport = Arc::new(RecordingTransport::responding(500));
        let out = action(transport)
            .execute(&config(json!({ "url": "https://api.example.com/hook" })), &ctx())
            .await
            .unwrap();
        assert_eq!(out, ActionOutput::WebhookCalled { status: 500 });
    }

    #[tokio::test]
    async fn private_address_is_rejected_without_a_request() {
        let transport = Arc::new(RecordingTransport::responding(200));
        let err = action(transport.clone())
            .execute(&config(json!({ "url": "http://10.0.0.5/internal" })), &ctx())
            .await
            .unwrap_err();

        assert_eq!(err, NodeError::Rejected(BLOCKED_URL.into()));
        assert!(transport.requests().is_empty());
    }

    #[tokio::test]
    async fn missing_url_is_rejected() {
        let transport = Arc::new(RecordingTransport::responding(200));
        let err = action(transport.clone()).execute(&config(json!({})), &ctx()).await.unwrap_err();
        assert!(matches!(err, NodeError::Rejected(_)));
        assert!(transport.requests().is_empty());
    }

    #[tokio::test]
    async fn configured_method_and_headers_are_used() {
        let transport = Arc::new(RecordingTransport::responding(204));
        action(transport.clone())
            .execute(
                &config(json!({
                    "url": "https://api.example.com/hook",
                    "method": "put",
                    "headers": { "X-Token": "abc", "X-Retry": 3, "X-Nested": { "a": 1 } },
                })),
                &ctx(),
            )
            .await
            .unwrap();

        let sent = transport.requests();
        assert_eq!(sent[0].method, HttpMethod::Put);
        assert!(sent[0].headers.contains(&("X-Token".into(), "abc".into())));
        assert!(sent[0].headers.contains(&("X-Retry".into(), "3".into())));
        assert_eq!(sent[0].headers.len(), 2);
    }

    #[tokio::test]
    async fn unsupported_method_is_rejected() {
        let transport = Arc::new(RecordingTransport::responding(200));
        let err = action(transport.clone())
            .execute(
                &config(json!({ "url": "https://api.example.com/hook", "method": "TRACE" })),
                &ctx(),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, NodeError::Rejected(_)));
        assert!(transport.requests().is_empty());
    }

    #[tokio::test]
    async fn transport_error_does_not_leak_details() {
        let transport = Arc::new(RecordingTransport::failing("dns error: no such host internal-db"));
        let err = action(transport)
            .execute(&config(json!({ "url": "https://api.example.com/hook" })), &ctx())
            .await
            .unwrap_err();
        assert_eq!(err, NodeError::Failed(REQUEST_FAILED.into()));
    }

    #[tokio::test(start_paused = true)]
    async fn hanging_request_times_out() {
        let transport = Arc::new(RecordingTransport::hanging());
        let err = action(transport.clone())
            .execute(&config(json!({ "url": "https://slow.example.com/" })), &ctx())
            .await
            .unwrap_err();

        assert_eq!(err, NodeError::Failed(REQUEST_FAILED.into()));
        assert_eq!(transport.requests().len(), 1);
    }
}
