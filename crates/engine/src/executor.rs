//! Workflow execution engine.
//!
//! `WorkflowExecutor` is the central orchestrator:
//! 1. Loads the execution and moves it `pending → running`.
//! 2. Loads the workflow graph and locates its unique trigger node.
//! 3. Walks the graph one node at a time, dispatching actions via
//!    `ActionDispatcher` and evaluating conditions against an immutable
//!    `ExecutionContext` snapshot.
//! 4. Appends one step per visited node, failed or not.
//! 5. Stops on an `end` node, a failed step, a dangling node, or the step
//!    limit, then finalizes the execution.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use futures::FutureExt;
use serde::Serialize;
use serde_json::{json, Value};
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

use db::{DbError, ExecutionStore};
use nodes::config::{number_field, parse_uuid, string_field};
use nodes::{ActionContext, ActionDispatcher, NodeError};

use crate::condition;
use crate::context::ExecutionContext;
use crate::graph::WorkflowGraph;
use crate::lifecycle::{ExecutionLifecycle, FinishedRun, RunClock};
use crate::models::{
    Execution, ExecutionStatus, ExecutionStep, Node, NodeKind, NodeOutput, StepStatus, Workflow,
};
use crate::EngineError;

/// Step error recorded when a handler panics.
pub const UNEXPECTED_NODE_ERROR: &str = "Unexpected error while executing node";
/// Execution error recorded when persistence fails mid-run.
pub const ABORTED_ERROR: &str = "Execution aborted due to an internal error";
/// Execution error recorded when the workflow row is gone.
pub const WORKFLOW_NOT_FOUND: &str = "Workflow not found";

/// Attempts at writing the terminal status before giving up.
const FINALIZE_ATTEMPTS: u32 = 3;
const FINALIZE_BACKOFF: Duration = Duration::from_millis(250);

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Tuning knobs for the executor.
#[derive(Debug, Clone)]
pub struct ExecutorConfig {
    /// Maximum number of nodes a single run may visit.
    pub max_steps: usize,
    /// Ceiling on a `delay` node's pause.
    pub max_delay: Duration,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            max_steps: 100,
            max_delay: Duration::from_secs(300),
        }
    }
}

// ---------------------------------------------------------------------------
// Results
// ---------------------------------------------------------------------------

/// What the trigger surface returns for a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExecutionSummary {
    pub success: bool,
    pub execution_id: Uuid,
    pub duration_ms: i64,
    pub steps_executed: usize,
}

/// How the traversal loop ended.
#[derive(Debug, Clone, Default)]
struct TraversalOutcome {
    steps_executed: usize,
    step_failed: bool,
    /// Reason the run could not start traversing (no trigger, no workflow).
    setup_error: Option<String>,
}

impl TraversalOutcome {
    fn setup_failed(reason: impl Into<String>) -> Self {
        Self { setup_error: Some(reason.into()), ..Self::default() }
    }
}

// ---------------------------------------------------------------------------
// WorkflowExecutor
// ---------------------------------------------------------------------------

/// Runs executions against an [`ExecutionStore`].
///
/// Holds no per-run state, so one executor serves any number of concurrent
/// runs.
#[derive(Clone)]
pub struct WorkflowExecutor {
    store: Arc<dyn ExecutionStore>,
    dispatcher: ActionDispatcher,
    config: ExecutorConfig,
    lifecycle: ExecutionLifecycle,
}

impl WorkflowExecutor {
    pub fn new(
        store: Arc<dyn ExecutionStore>,
        dispatcher: ActionDispatcher,
        config: ExecutorConfig,
    ) -> Self {
        let lifecycle = ExecutionLifecycle::new(store.clone());
        Self { store, dispatcher, config, lifecycle }
    }

    /// Create a `pending` execution of an existing workflow.
    pub async fn create_execution(
        &self,
        workflow_id: Uuid,
        trigger_data: Value,
    ) -> Result<Execution, EngineError> {
        match self.store.get_workflow(workflow_id).await {
            Ok(_) => {}
            Err(DbError::NotFound) => return Err(EngineError::WorkflowNotFound(workflow_id)),
            Err(e) => return Err(e.into()),
        }
        let row = self.store.create_execution(workflow_id, trigger_data).await?;
        info!(execution_id = %row.id, workflow_id = %workflow_id, "execution created");
        Execution::try_from(row)
    }

    pub async fn get_execution(&self, id: Uuid) -> Result<Execution, EngineError> {
        self.lifecycle.load(id).await
    }

    /// The step log of an execution, in the order the steps were recorded.
    pub async fn list_steps(&self, id: Uuid) -> Result<Vec<ExecutionStep>, EngineError> {
        self.lifecycle.load(id).await?;
        self.store
            .list_steps(id)
            .await?
            .into_iter()
            .map(ExecutionStep::try_from)
            .collect()
    }

    /// Run the execution named by `execution_id`.
    ///
    /// # Errors
    /// - [`EngineError::InvalidExecutionId`] if the id is not a UUID.
    /// - [`EngineError::ExecutionNotFound`] if no such execution exists.
    /// - [`EngineError::AlreadyStarted`] if it is not `pending`.
    /// - [`EngineError::Database`] if persistence fails. The execution is
    ///   still finalized as `failed` when that is possible.
    ///
    /// A run that fails (missing trigger, failed step) is not an error: it
    /// returns a summary with `success: false`.
    pub async fn run_execution(&self, execution_id: &str) -> Result<ExecutionSummary, EngineError> {
        let id = parse_uuid(execution_id)
            .ok_or_else(|| EngineError::InvalidExecutionId(execution_id.to_owned()))?;
        self.run(id).await
    }

    /// Run `id` on its own task and wait for the result.
    ///
    /// Dropping the returned future does not cancel the run: it still
    /// reaches a terminal status.
    pub async fn run(&self, id: Uuid) -> Result<ExecutionSummary, EngineError> {
        let executor = self.clone();
        tokio::spawn(async move { executor.run_attached(id).await })
            .await
            .map_err(|e| {
                error!(execution_id = %id, error = %e, "run task did not complete");
                EngineError::RunInterrupted { execution_id: id, reason: e.to_string() }
            })?
    }

    #[instrument(skip(self), fields(execution_id = %id))]
    async fn run_attached(&self, id: Uuid) -> Result<ExecutionSummary, EngineError> {
        let execution = self.lifecycle.load(id).await?;
        let clock = self.lifecycle.start(&execution).await?;

        let outcome = match self.drive(&execution).await {
            Ok(outcome) => outcome,
            Err(e) => {
                error!(error = %e, "execution aborted");
                if let Err(finish_err) =
                    self.finalize(id, &clock, true, Some(ABORTED_ERROR.to_owned())).await
                {
                    error!(error = %finish_err, "could not finalize aborted execution");
                }
                return Err(e);
            }
        };

        if let Some(reason) = &outcome.setup_error {
            warn!(reason = %reason, "execution failed before traversal");
        }

        let finished = self
            .finalize(id, &clock, outcome.step_failed, outcome.setup_error)
            .await?;

        Ok(ExecutionSummary {
            success: finished.status == ExecutionStatus::Completed,
            execution_id: id,
            duration_ms: finished.duration_ms,
            steps_executed: outcome.steps_executed,
        })
    }

    /// [`ExecutionLifecycle::finish`], retried on transient store errors.
    async fn finalize(
        &self,
        id: Uuid,
        clock: &RunClock,
        step_failed: bool,
        error: Option<String>,
    ) -> Result<FinishedRun, EngineError> {
        let mut attempt = 1;
        loop {
            match self.lifecycle.finish(id, clock, step_failed, error.clone()).await {
                Ok(finished) => return Ok(finished),
                // The record is no longer `running`; retrying cannot help.
                Err(e @ EngineError::Database(DbError::NotFound)) => return Err(e),
                Err(e) if attempt >= FINALIZE_ATTEMPTS => {
                    error!(attempt, error = %e, "giving up on finalizing execution");
                    return Err(e);
                }
                Err(e) => {
                    warn!(attempt, error = %e, "finalizing execution failed, retrying");
                    tokio::time::sleep(FINALIZE_BACKOFF * attempt).await;
                    attempt += 1;
                }
            }
        }
    }

    // -----------------------------------------------------------------------
    // Internal: load the graph, then traverse it.
    // -----------------------------------------------------------------------

    async fn drive(&self, execution: &Execution) -> Result<TraversalOutcome, EngineError> {
        let workflow_row = match self.store.get_workflow(execution.workflow_id).await {
            Ok(row) => row,
            Err(DbError::NotFound) => return Ok(TraversalOutcome::setup_failed(WORKFLOW_NOT_FOUND)),
            Err(e) => return Err(e.into()),
        };
        let nodes = self.store.list_nodes(execution.workflow_id).await?;
        let edges = self.store.list_edges(execution.workflow_id).await?;
        let graph = WorkflowGraph::new(Workflow::from_rows(workflow_row, nodes, edges));

        if let Err(e) = graph.check_reserved_ids() {
            return Ok(TraversalOutcome::setup_failed(e.to_string()));
        }
        let trigger = match graph.trigger() {
            Ok(node) => node,
            Err(e) => return Ok(TraversalOutcome::setup_failed(e.to_string())),
        };

        info!(
            workflow_id = %execution.workflow_id,
            nodes = graph.workflow().nodes.len(),
            trigger = %trigger.id,
            "traversal starting"
        );
        self.traverse(execution, &graph, trigger).await
    }

    async fn traverse(
        &self,
        execution: &Execution,
        graph: &WorkflowGraph,
        trigger: &Node,
    ) -> Result<TraversalOutcome, EngineError> {
        let mut outcome = TraversalOutcome::default();
        let mut context = ExecutionContext::new(execution.trigger_data.clone());
        let mut current = Some(trigger);

        while let Some(node) = current {
            if outcome.steps_executed >= self.config.max_steps {
                warn!(
                    max_steps = self.config.max_steps,
                    next_node = %node.id,
                    "step limit reached, traversal truncated"
                );
                break;
            }

            let started_at = Utc::now();
            let result = self.visit(execution, node, &context).await;
            let completed_at = Utc::now();

            let (status, output, error_message, condition_result) = match result {
                Ok(output) => {
                    let condition_result = output.condition_result();
                    (StepStatus::Completed, output.into_value(), None, condition_result)
                }
                Err(message) => (StepStatus::Failed, json!({}), Some(message), None),
            };

            let step = ExecutionStep {
                id: Uuid::new_v4(),
                execution_id: execution.id,
                node_id: node.id.clone(),
                status,
                input: context.input_summary(),
                output: output.clone(),
                error: error_message,
                started_at,
                completed_at,
            };
            self.store.insert_step(&step.to_row()).await?;
            outcome.steps_executed += 1;

            context = context.with_output(&node.id, output);
            if let Some(result) = condition_result {
                context = context.with_condition_result(result);
            }

            if status == StepStatus::Failed {
                outcome.step_failed = true;
                break;
            }
            if node.kind == NodeKind::End {
                debug!(node_id = %node.id, "end node reached");
                break;
            }

            current = graph.next_node(node, context.condition_result());
        }

        Ok(outcome)
    }

    /// Execute one node, turning handler errors and panics into a step error
    /// message.
    async fn visit(
        &self,
        execution: &Execution,
        node: &Node,
        context: &ExecutionContext,
    ) -> Result<NodeOutput, String> {
        let run = AssertUnwindSafe(self.execute_node(execution, node, context));

        match run.catch_unwind().await {
            Ok(Ok(output)) => {
                info!(node_id = %node.id, node_type = node.kind.as_str(), "node completed");
                Ok(output)
            }
            Ok(Err(e)) => {
                warn!(node_id = %node.id, node_type = node.kind.as_str(), error = %e, "node failed");
                Err(e.message().to_owned())
            }
            Err(_) => {
                error!(node_id = %node.id, node_type = node.kind.as_str(), "node handler panicked");
                Err(UNEXPECTED_NODE_ERROR.to_owned())
            }
        }
    }

    async fn execute_node(
        &self,
        execution: &Execution,
        node: &Node,
        context: &ExecutionContext,
    ) -> Result<NodeOutput, NodeError> {
        match &node.kind {
            NodeKind::Trigger => Ok(NodeOutput::Trigger(execution.trigger_data.clone())),

            NodeKind::Action { action_type } => {
                let ctx = ActionContext {
                    workflow_id: execution.workflow_id,
                    execution_id: execution.id,
                    node_id: node.id.clone(),
                    trigger_data: execution.trigger_data.clone(),
                };
                self.dispatcher
                    .dispatch(action_type.as_deref(), &node.config, &ctx)
                    .await
                    .map(NodeOutput::Action)
            }

            NodeKind::Condition => {
                let expression = string_field(&node.config, "condition");
                let result = condition::evaluate(&expression, context.as_map());
                debug!(node_id = %node.id, %expression, result, "condition evaluated");
                Ok(NodeOutput::Condition { result, expression })
            }

            NodeKind::Delay => {
                let max = self.config.max_delay.as_secs_f64();
                let seconds = number_field(&node.config, "delay").unwrap_or(0.0).clamp(0.0, max);
                tokio::time::sleep(Duration::from_secs_f64(seconds)).await;
                Ok(NodeOutput::Delay { seconds })
            }

            NodeKind::End => Ok(NodeOutput::End),

            NodeKind::Other(node_type) => {
                debug!(node_id = %node.id, %node_type, "unknown node type, passing through");
                Ok(NodeOutput::Passthrough)
            }
        }
    }
}
