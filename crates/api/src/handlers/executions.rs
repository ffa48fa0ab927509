use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use serde_json::Value;

use engine::{Execution, ExecutionStep, ExecutionSummary};

use super::{parse_id, ApiError, AppState};

fn empty_payload() -> Value {
    Value::Object(Default::default())
}

#[derive(Debug, Deserialize)]
pub struct CreateExecutionDto {
    #[serde(default = "empty_payload")]
    pub trigger_data: Value,
}

/// `POST /api/v1/workflows/{id}/executions`: create a pending execution.
pub async fn create(
    Path(workflow_id): Path<String>,
    State(state): State<AppState>,
    Json(payload): Json<CreateExecutionDto>,
) -> Result<(StatusCode, Json<Execution>), ApiError> {
    let workflow_id = parse_id(&workflow_id, "workflow")?;
    let execution = state
        .executor
        .create_execution(workflow_id, payload.trigger_data)
        .await?;
    Ok((StatusCode::CREATED, Json(execution)))
}

/// `POST /api/v1/executions/{id}/run`: run a pending execution to completion.
///
/// A run that fails still answers 200 with `success: false`; error statuses
/// are for requests that could not start a run.
pub async fn run(
    Path(execution_id): Path<String>,
    State(state): State<AppState>,
) -> Result<Json<ExecutionSummary>, ApiError> {
    let summary = state.executor.run_execution(&execution_id).await?;
    Ok(Json(summary))
}

pub async fn get(
    Path(execution_id): Path<String>,
    State(state): State<AppState>,
) -> Result<Json<Execution>, ApiError> {
    let id = parse_id(&execution_id, "execution")?;
    Ok(Json(state.executor.get_execution(id).await?))
}

pub async fn steps(
    Path(execution_id): Path<String>,
    State(state): State<AppState>,
) -> Result<Json<Vec<ExecutionStep>>, ApiError> {
    let id = parse_id(&execution_id, "execution")?;
    Ok(Json(state.executor.list_steps(id).await?))
}
