//! Execution lifecycle: `pending → running → {completed | failed}`.
//!
//! [`ExecutionLifecycle`] is the only writer of the execution record during a
//! run. The terminal status is never chosen by the caller; it is derived from
//! whether the run failed.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::time::Instant;
use tracing::{info, warn};
use uuid::Uuid;

use db::models::ExecutionFinish;
use db::{DbError, ExecutionStore};

use crate::models::{Execution, ExecutionStatus};
use crate::EngineError;

/// Wall-clock anchor taken right after the run was marked `running`.
#[derive(Debug, Clone, Copy)]
pub struct RunClock {
    pub started_at: DateTime<Utc>,
    started: Instant,
}

impl RunClock {
    fn start(started_at: DateTime<Utc>) -> Self {
        Self { started_at, started: Instant::now() }
    }

    pub fn elapsed_ms(&self) -> i64 {
        i64::try_from(self.started.elapsed().as_millis()).unwrap_or(i64::MAX)
    }
}

/// What the lifecycle wrote when the run ended.
#[derive(Debug, Clone)]
pub struct FinishedRun {
    pub status: ExecutionStatus,
    pub completed_at: DateTime<Utc>,
    pub duration_ms: i64,
}

#[derive(Clone)]
pub struct ExecutionLifecycle {
    store: Arc<dyn ExecutionStore>,
}

impl ExecutionLifecycle {
    pub fn new(store: Arc<dyn ExecutionStore>) -> Self {
        Self { store }
    }

    pub async fn load(&self, id: Uuid) -> Result<Execution, EngineError> {
        match self.store.get_execution(id).await {
            Ok(row) => Execution::try_from(row),
            Err(DbError::NotFound) => Err(EngineError::ExecutionNotFound(id)),
            Err(e) => Err(e.into()),
        }
    }

    /// Move a pending execution to `running`.
    ///
    /// # Errors
    /// [`EngineError::AlreadyStarted`] if the execution is not pending, or if
    /// another caller won the transition first.
    pub async fn start(&self, execution: &Execution) -> Result<RunClock, EngineError> {
        if execution.status != ExecutionStatus::Pending {
            return Err(EngineError::AlreadyStarted {
                execution_id: execution.id,
                status: execution.status.to_string(),
            });
        }

        let started_at = Utc::now();
        if !self.store.mark_running(execution.id, started_at).await? {
            warn!(execution_id = %execution.id, "lost the race to start execution");
            return Err(EngineError::AlreadyStarted {
                execution_id: execution.id,
                status: ExecutionStatus::Running.to_string(),
            });
        }

        let clock = RunClock::start(started_at);
        info!(execution_id = %execution.id, "execution running");
        Ok(clock)
    }

    /// Write the terminal status, `completed_at` and `duration_ms`.
    ///
    /// `step_failed` and `error` decide the status: either one makes the run
    /// `failed`.
    pub async fn finish(
        &self,
        id: Uuid,
        clock: &RunClock,
        step_failed: bool,
        error: Option<String>,
    ) -> Result<FinishedRun, EngineError> {
        let status = ExecutionStatus::from_outcome(step_failed, error.is_some());
        let finished = FinishedRun {
            status,
            completed_at: Utc::now(),
            duration_ms: clock.elapsed_ms(),
        };

        self.store
            .finish_execution(
                id,
                &ExecutionFinish {
                    status: status.to_string(),
                    error,
                    completed_at: finished.completed_at,
                    duration_ms: finished.duration_ms,
                },
            )
            .await?;

        info!(
            execution_id = %id,
            status = %status,
            duration_ms = finished.duration_ms,
            "execution finished"
        );
        Ok(finished)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use db::MemoryStore;
    use serde_json::json;

    async fn pending(store: &Arc<MemoryStore>) -> Execution {
        let row = store.create_execution(Uuid::new_v4(), json!({})).await.unwrap();
        Execution::try_from(row).unwrap()
    }

    #[tokio::test]
    async fn unknown_execution_is_not_found() {
        let lifecycle = ExecutionLifecycle::new(Arc::new(MemoryStore::new()));
        let id = Uuid::new_v4();
        assert!(matches!(
            lifecycle.load(id).await,
            Err(EngineError::ExecutionNotFound(missing)) if missing == id
        ));
    }

    #[tokio::test]
    async fn start_then_finish_records_terminal_fields() {
        let store = Arc::new(MemoryStore::new());
        let lifecycle = ExecutionLifecycle::new(store.clone());
        let execution = pending(&store).await;

        let clock = lifecycle.start(&execution).await.unwrap();
        let running = lifecycle.load(execution.id).await.unwrap();
        assert_eq!(running.status, ExecutionStatus::Running);
        assert_eq!(running.started_at, Some(clock.started_at));

        let finished = lifecycle.finish(execution.id, &clock, false, None).await.unwrap();
        assert_eq!(finished.status, ExecutionStatus::Completed);

        let done = lifecycle.load(execution.id).await.unwrap();
        assert_eq!(done.status, ExecutionStatus::Completed);
        assert_eq!(done.completed_at, Some(finished.completed_at));
        assert_eq!(done.duration_ms, Some(finished.duration_ms));
        assert!(done.error.is_none());
    }

    #[tokio::test]
    async fn setup_error_fails_the_run() {
        let store = Arc::new(MemoryStore::new());
        let lifecycle = ExecutionLifecycle::new(store.clone());
        let execution = pending(&store).await;

        let clock = lifecycle.start(&execution).await.unwrap();
        let finished = lifecycle
            .finish(execution.id, &clock, false, Some("No trigger node found".into()))
            .await
            .unwrap();
        assert_eq!(finished.status, ExecutionStatus::Failed);

        let done = lifecycle.load(execution.id).await.unwrap();
        assert_eq!(done.error.as_deref(), Some("No trigger node found"));
    }

    #[tokio::test]
    async fn second_start_is_rejected() {
        let store = Arc::new(MemoryStore::new());
        let lifecycle = ExecutionLifecycle::new(store.clone());
        let execution = pending(&store).await;

        lifecycle.start(&execution).await.unwrap();

        // Stale snapshot still says pending: the store's compare-and-set refuses.
        assert!(matches!(
            lifecycle.start(&execution).await,
            Err(EngineError::AlreadyStarted { .. })
        ));

        let current = lifecycle.load(execution.id).await.unwrap();
        assert!(matches!(
            lifecycle.start(&current).await,
            Err(EngineError::AlreadyStarted { status, .. }) if status == "running"
        ));
    }
}
