pub mod executions;

use std::sync::Arc;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::{json, Value};
use uuid::Uuid;

use engine::{EngineError, WorkflowExecutor};

/// Shared state handed to every handler.
#[derive(Clone)]
pub struct AppState {
    pub executor: Arc<WorkflowExecutor>,
}

impl AppState {
    pub fn new(executor: WorkflowExecutor) -> Self {
        Self { executor: Arc::new(executor) }
    }
}

/// Error body: `{ "error": <message>, "status": <code> }`.
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub message: String,
}

impl ApiError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self { status, message: message.into() }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }
}

impl From<EngineError> for ApiError {
    fn from(err: EngineError) -> Self {
        let status =
            StatusCode::from_u16(err.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        if status.is_server_error() {
            tracing::error!(error = %err, "request failed");
        }
        Self::new(status, err.public_message())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = Json(json!({
            "error": self.message,
            "status": self.status.as_u16(),
        }));
        (self.status, body).into_response()
    }
}

/// Parse a path segment as a canonical UUID.
pub(crate) fn parse_id(raw: &str, what: &str) -> Result<Uuid, ApiError> {
    nodes::config::parse_uuid(raw)
        .ok_or_else(|| ApiError::bad_request(format!("invalid {what} id: '{raw}'")))
}

pub async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}
