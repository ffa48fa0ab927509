//! The persistence seam consumed by the engine.
//!
//! The engine never touches `sqlx` directly: it is handed an
//! `Arc<dyn ExecutionStore>`. [`PgStore`] forwards to the repository
//! functions; [`MemoryStore`] keeps everything in process and backs the unit
//! tests and the CLI `simulate` command.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::models::{
    EdgeRow, ExecutionFinish, ExecutionRow, ExecutionStepRow, NodeRow, WorkflowRow,
};
use crate::repository::{executions, workflows};
use crate::{DbError, DbPool};

/// Everything the engine reads and writes while running an execution.
///
/// Steps can only be inserted and listed; no operation rewrites one.
#[async_trait]
pub trait ExecutionStore: Send + Sync {
    async fn create_execution(
        &self,
        workflow_id: Uuid,
        trigger_data: serde_json::Value,
    ) -> Result<ExecutionRow, DbError>;

    async fn get_execution(&self, id: Uuid) -> Result<ExecutionRow, DbError>;

    /// Atomic `pending → running`. `Ok(false)` means the execution was not
    /// pending.
    async fn mark_running(&self, id: Uuid, started_at: DateTime<Utc>) -> Result<bool, DbError>;

    /// Terminal write; only valid while the execution is `running`.
    async fn finish_execution(&self, id: Uuid, finish: &ExecutionFinish) -> Result<(), DbError>;

    async fn get_workflow(&self, id: Uuid) -> Result<WorkflowRow, DbError>;

    async fn list_nodes(&self, workflow_id: Uuid) -> Result<Vec<NodeRow>, DbError>;

    async fn list_edges(&self, workflow_id: Uuid) -> Result<Vec<EdgeRow>, DbError>;

    async fn insert_step(&self, step: &ExecutionStepRow) -> Result<(), DbError>;

    async fn list_steps(&self, execution_id: Uuid) -> Result<Vec<ExecutionStepRow>, DbError>;
}

// ---------------------------------------------------------------------------
// Postgres
// ---------------------------------------------------------------------------

/// [`ExecutionStore`] backed by Postgres.
#[derive(Clone)]
pub struct PgStore {
    pool: DbPool,
}

impl PgStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &DbPool {
        &self.pool
    }

    /// Persist a workflow definition in one transaction. Node and edge order
    /// becomes `position`. Nothing is written if any insert fails.
    pub async fn save_workflow(
        &self,
        workflow: &WorkflowRow,
        nodes: &[NodeRow],
        edges: &[EdgeRow],
    ) -> Result<(), DbError> {
        let mut tx = self.pool.begin().await?;

        workflows::insert_workflow(&mut *tx, workflow).await?;
        for (position, node) in (0i32..).zip(nodes) {
            workflows::insert_node(&mut *tx, node, position).await?;
        }
        for (position, edge) in (0i32..).zip(edges) {
            workflows::insert_edge(&mut *tx, edge, position).await?;
        }

        tx.commit().await?;
        Ok(())
    }
}

#[async_trait]
impl ExecutionStore for PgStore {
    async fn create_execution(
        &self,
        workflow_id: Uuid,
        trigger_data: serde_json::Value,
    ) -> Result<ExecutionRow, DbError> {
        executions::create_execution(&self.pool, workflow_id, trigger_data).await
    }

    async fn get_execution(&self, id: Uuid) -> Result<ExecutionRow, DbError> {
        executions::get_execution(&self.pool, id).await
    }

    async fn mark_running(&self, id: Uuid, started_at: DateTime<Utc>) -> Result<bool, DbError> {
        executions::mark_running(&self.pool, id, started_at).await
    }

    async fn finish_execution(&self, id: Uuid, finish: &ExecutionFinish) -> Result<(), DbError> {
        executions::finish_execution(&self.pool, id, finish).await
    }

    async fn get_workflow(&self, id: Uuid) -> Result<WorkflowRow, DbError> {
        workflows::get_workflow(&self.pool, id).await
    }

    async fn list_nodes(&self, workflow_id: Uuid) -> Result<Vec<NodeRow>, DbError> {
        workflows::list_nodes(&self.pool, workflow_id).await
    }

    async fn list_edges(&self, workflow_id: Uuid) -> Result<Vec<EdgeRow>, DbError> {
        workflows::list_edges(&self.pool, workflow_id).await
    }

    async fn insert_step(&self, step: &ExecutionStepRow) -> Result<(), DbError> {
        executions::insert_step(&self.pool, step).await
    }

    async fn list_steps(&self, execution_id: Uuid) -> Result<Vec<ExecutionStepRow>, DbError> {
        executions::list_steps(&self.pool, execution_id).await
    }
}

// ---------------------------------------------------------------------------
// In-memory
// ---------------------------------------------------------------------------

#[derive(Default)]
struct MemoryState {
    workflows: HashMap<Uuid, WorkflowRow>,
    nodes: HashMap<Uuid, Vec<NodeRow>>,
    edges: HashMap<Uuid, Vec<EdgeRow>>,
    executions: HashMap<Uuid, ExecutionRow>,
    steps: HashMap<Uuid, Vec<ExecutionStepRow>>,
}

/// [`ExecutionStore`] that lives entirely in memory.
#[derive(Default)]
pub struct MemoryStore {
    state: Mutex<MemoryState>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a workflow definition. Node and edge order is preserved.
    pub async fn insert_workflow(&self, workflow: WorkflowRow, nodes: Vec<NodeRow>, edges: Vec<EdgeRow>) {
        let mut state = self.state.lock().await;
        state.nodes.insert(workflow.id, nodes);
        state.edges.insert(workflow.id, edges);
        state.workflows.insert(workflow.id, workflow);
    }
}

#[async_trait]
impl ExecutionStore for MemoryStore {
    async fn create_execution(
        &self,
        workflow_id: Uuid,
        trigger_data: serde_json::Value,
    ) -> Result<ExecutionRow, DbError> {
        let row = ExecutionRow {
            id: Uuid::new_v4(),
            workflow_id,
            trigger_data,
            status: "pending".to_owned(),
            error: None,
            started_at: None,
            completed_at: None,
            duration_ms: None,
            created_at: Utc::now(),
        };
        self.state.lock().await.executions.insert(row.id, row.clone());
        Ok(row)
    }

    async fn get_execution(&self, id: Uuid) -> Result<ExecutionRow, DbError> {
        self.state
            .lock()
            .await
            .executions
            .get(&id)
            .cloned()
            .ok_or(DbError::NotFound)
    }

    async fn mark_running(&self, id: Uuid, started_at: DateTime<Utc>) -> Result<bool, DbError> {
        let mut state = self.state.lock().await;
        let row = state.executions.get_mut(&id).ok_or(DbError::NotFound)?;
        if row.status != "pending" {
            return Ok(false);
        }
        row.status = "running".to_owned();
        row.started_at = Some(started_at);
        Ok(true)
    }

    async fn finish_execution(&self, id: Uuid, finish: &ExecutionFinish) -> Result<(), DbError> {
        let mut state = self.state.lock().await;
        let row = state
            .executions
            .get_mut(&id)
            .filter(|row| row.status == "running")
            .ok_or(DbError::NotFound)?;
        row.status = finish.status.clone();
        row.error = finish.error.clone();
        row.completed_at = Some(finish.completed_at);
        row.duration_ms = Some(finish.duration_ms);
        Ok(())
    }

    async fn get_workflow(&self, id: Uuid) -> Result<WorkflowRow, DbError> {
        self.state
            .lock()
            .await
            .workflows
            .get(&id)
            .cloned()
            .ok_or(DbError::NotFound)
    }

    async fn list_nodes(&self, workflow_id: Uuid) -> Result<Vec<NodeRow>, DbError> {
        Ok(self.state.lock().await.nodes.get(&workflow_id).cloned().unwrap_or_default())
    }

    async fn list_edges(&self, workflow_id: Uuid) -> Result<Vec<EdgeRow>, DbError> {
        Ok(self.state.lock().await.edges.get(&workflow_id).cloned().unwrap_or_default())
    }

    async fn insert_step(&self, step: &ExecutionStepRow) -> Result<(), DbError> {
        let mut state = self.state.lock().await;
        if !state.executions.contains_key(&step.execution_id) {
            return Err(DbError::NotFound);
        }
        state.steps.entry(step.execution_id).or_default().push(step.clone());
        Ok(())
    }

    async fn list_steps(&self, execution_id: Uuid) -> Result<Vec<ExecutionStepRow>, DbError> {
        Ok(self.state.lock().await.steps.get(&execution_id).cloned().unwrap_or_default())
    }
}

// ============================================================
// Unit tests
// ============================================================
#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn workflow() -> WorkflowRow {
        WorkflowRow { id: Uuid::new_v4(), name: "wf".into(), created_at: Utc::now() }
    }

    fn step(execution_id: Uuid, node_id: &str) -> ExecutionStepRow {
        ExecutionStepRow {
            id: Uuid::new_v4(),
            execution_id,
            node_id: node_id.into(),
            status: "completed".into(),
            input: json!({}),
            output: json!({}),
            error: None,
            started_at: Utc::now(),
            completed_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn new_execution_is_pending() {
        let store = MemoryStore::new();
        let wf = workflow();
        store.insert_workflow(wf.clone(), vec![], vec![]).await;

        let exec = store.create_execution(wf.id, json!({ "a": 1 })).await.unwrap();
        let fetched = store.get_execution(exec.id).await.unwrap();
        assert_eq!(fetched.status, "pending");
        assert_eq!(fetched.trigger_data, json!({ "a": 1 }));
        assert!(fetched.started_at.is_none());
    }

    #[tokio::test]
    async fn mark_running_only_wins_once() {
        let store = MemoryStore::new();
        let exec = store.create_execution(Uuid::new_v4(), json!({})).await.unwrap();

        assert!(store.mark_running(exec.id, Utc::now()).await.unwrap());
        assert!(!store.mark_running(exec.id, Utc::now()).await.unwrap());
    }

    #[tokio::test]
    async fn finish_requires_running() {
        let store = MemoryStore::new();
        let exec = store.create_execution(Uuid::new_v4(), json!({})).await.unwrap();
        let finish = ExecutionFinish {
            status: "completed".into(),
            error: None,
            completed_at: Utc::now(),
            duration_ms: 5,
        };

        assert!(matches!(
            store.finish_execution(exec.id, &finish).await,
            Err(DbError::NotFound)
        ));

        store.mark_running(exec.id, Utc::now()).await.unwrap();
        store.finish_execution(exec.id, &finish).await.unwrap();

        let row = store.get_execution(exec.id).await.unwrap();
        assert_eq!(row.status, "completed");
        assert_eq!(row.duration_ms, Some(5));

        // Terminal: a second finish is refused.
        assert!(store.finish_execution(exec.id, &finish).await.is_err());
    }

    #[tokio::test]
    async fn steps_are_listed_in_insertion_order() {
        let store = MemoryStore::new();
        let exec = store.create_execution(Uuid::new_v4(), json!({})).await.unwrap();

        for id in ["a", "b", "c"] {
            store.insert_step(&step(exec.id, id)).await.unwrap();
        }

        let ids: Vec<String> = store
            .list_steps(exec.id)
            .await
            .unwrap()
            .into_iter()
            .map(|s| s.node_id)
            .collect();
        assert_eq!(ids, vec!["a", "b", "c"]);
    }

    #[tokio::test]
    async fn step_for_unknown_execution_is_rejected() {
        let store = MemoryStore::new();
        let result = store.insert_step(&step(Uuid::new_v4(), "a")).await;
        assert!(matches!(result, Err(DbError::NotFound)));
    }

    #[tokio::test]
    async fn unknown_workflow_has_no_nodes() {
        let store = MemoryStore::new();
        let id = Uuid::new_v4();
        assert!(matches!(store.get_workflow(id).await, Err(DbError::NotFound)));
        assert!(store.list_nodes(id).await.unwrap().is_empty());
        assert!(store.list_edges(id).await.unwrap().is_empty());
    }
}
