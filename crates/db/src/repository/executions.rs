//! Execution and execution-step repository functions.

use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::{
    DbError,
    models::{ExecutionFinish, ExecutionRow, ExecutionStepRow},
};

const EXECUTION_COLUMNS: &str =
    "id, workflow_id, trigger_data, status, error, started_at, completed_at, duration_ms, created_at";

// ---------------------------------------------------------------------------
// executions
// ---------------------------------------------------------------------------

/// Create a new execution record in `pending` status.
pub async fn create_execution(
    pool: &PgPool,
    workflow_id: Uuid,
    trigger_data: serde_json::Value,
) -> Result<ExecutionRow, DbError> {
    let sql = format!(
        r#"
        INSERT INTO executions (id, workflow_id, trigger_data, status, created_at)
        VALUES ($1, $2, $3, 'pending', $4)
        RETURNING {EXECUTION_COLUMNS}
        "#
    );

    let row = sqlx::query_as::<_, ExecutionRow>(&sql)
        .bind(Uuid::new_v4())
        .bind(workflow_id)
        .bind(trigger_data)
        .bind(Utc::now())
        .fetch_one(pool)
        .await?;

    Ok(row)
}

/// Fetch an execution by id.
pub async fn get_execution(pool: &PgPool, id: Uuid) -> Result<ExecutionRow, DbError> {
    let sql = format!("SELECT {EXECUTION_COLUMNS} FROM executions WHERE id = $1");

    sqlx::query_as::<_, ExecutionRow>(&sql)
        .bind(id)
        .fetch_optional(pool)
        .await?
        .ok_or(DbError::NotFound)
}

/// Move a `pending` execution to `running`.
///
/// Returns `false` when the row was not `pending` any more, i.e. somebody
/// else already started it.
pub async fn mark_running(
    pool: &PgPool,
    id: Uuid,
    started_at: DateTime<Utc>,
) -> Result<bool, DbError> {
    let result = sqlx::query(
        r#"
        UPDATE executions
        SET status = 'running', started_at = $2
        WHERE id = $1 AND status = 'pending'
        "#,
    )
    .bind(id)
    .bind(started_at)
    .execute(pool)
    .await?;

    Ok(result.rows_affected() == 1)
}

/// Write the terminal status of a `running` execution.
pub async fn finish_execution(
    pool: &PgPool,
    id: Uuid,
    finish: &ExecutionFinish,
) -> Result<(), DbError> {
    let result = sqlx::query(
        r#"
        UPDATE executions
        SET status = $2, error = $3, completed_at = $4, duration_ms = $5
        WHERE id = $1 AND status = 'running'
        "#,
    )
    .bind(id)
    .bind(&finish.status)
    .bind(&finish.error)
    .bind(finish.completed_at)
    .bind(finish.duration_ms)
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(DbError::NotFound);
    }

    Ok(())
}

// ---------------------------------------------------------------------------
// execution_steps
// ---------------------------------------------------------------------------

/// Append a step to the audit trail. Steps are never updated.
pub async fn insert_step(pool: &PgPool, step: &ExecutionStepRow) -> Result<(), DbError> {
    sqlx::query(
        r#"
        INSERT INTO execution_steps
            (id, execution_id, node_id, status, input, output, error, started_at, completed_at)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
        "#,
    )
    .bind(step.id)
    .bind(step.execution_id)
    .bind(&step.node_id)
    .bind(&step.status)
    .bind(&step.input)
    .bind(&step.output)
    .bind(&step.error)
    .bind(step.started_at)
    .bind(step.completed_at)
    .execute(pool)
    .await?;

    Ok(())
}

/// All steps of an execution in the order they were recorded.
pub async fn list_steps(
    pool: &PgPool,
    execution_id: Uuid,
) -> Result<Vec<ExecutionStepRow>, DbError> {
    let rows = sqlx::query_as::<_, ExecutionStepRow>(
        r#"
        SELECT id, execution_id, node_id, status, input, output, error, started_at, completed_at
        FROM execution_steps
        WHERE execution_id = $1
        ORDER BY seq ASC
        "#,
    )
    .bind(execution_id)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}
