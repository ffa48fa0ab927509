//! Core domain models for the workflow engine.
//!
//! These types are the source of truth for what a workflow and a run look
//! like in memory. They are built from the `db` crate's row structs and, for
//! workflow files, from [`WorkflowDefinition`].

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use uuid::Uuid;

use db::models::{EdgeRow, ExecutionRow, ExecutionStepRow, NodeRow, WorkflowRow};
use nodes::ActionOutput;

use crate::EngineError;

// ---------------------------------------------------------------------------
// Node
// ---------------------------------------------------------------------------

/// What a node does when the traversal reaches it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeKind {
    /// Entry point; echoes the trigger payload.
    Trigger,
    /// Side effect, looked up by action type in the dispatcher.
    Action { action_type: Option<String> },
    /// Branch point driven by `config.condition`.
    Condition,
    /// Timed pause of `config.delay` seconds.
    Delay,
    /// Terminal marker.
    End,
    /// A node type this engine does not know. Runs as a pass-through.
    Other(String),
}

impl NodeKind {
    pub fn from_parts(node_type: &str, action_type: Option<String>) -> Self {
        match node_type {
            "trigger" => Self::Trigger,
            "action" => Self::Action { action_type },
            "condition" => Self::Condition,
            "delay" => Self::Delay,
            "end" => Self::End,
            other => Self::Other(other.to_owned()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::Trigger => "trigger",
            Self::Action { .. } => "action",
            Self::Condition => "condition",
            Self::Delay => "delay",
            Self::End => "end",
            Self::Other(t) => t,
        }
    }
}

/// A single node in the workflow graph.
#[derive(Debug, Clone)]
pub struct Node {
    /// Unique within the workflow (referenced by edges).
    pub id: String,
    pub workflow_id: Uuid,
    pub kind: NodeKind,
    pub label: Option<String>,
    /// Shape depends on the node/action type.
    pub config: Map<String, Value>,
}

impl From<NodeRow> for Node {
    fn from(row: NodeRow) -> Self {
        let config = match row.config {
            Value::Object(map) => map,
            _ => Map::new(),
        };
        Self {
            kind: NodeKind::from_parts(&row.node_type, row.action_type),
            id: row.id,
            workflow_id: row.workflow_id,
            label: row.label,
            config,
        }
    }
}

// ---------------------------------------------------------------------------
// Edge
// ---------------------------------------------------------------------------

/// Directed edge from one node to another.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Edge {
    pub id: String,
    pub source: String,
    pub target: String,
    /// `"true"`, `"false"` or `"default"`; only read on condition nodes.
    pub source_handle: Option<String>,
}

impl From<EdgeRow> for Edge {
    fn from(row: EdgeRow) -> Self {
        Self {
            id: row.id,
            source: row.source_node_id,
            target: row.target_node_id,
            source_handle: row.source_handle,
        }
    }
}

// ---------------------------------------------------------------------------
// Workflow
// ---------------------------------------------------------------------------

/// A complete workflow. Read-only for the duration of a run.
#[derive(Debug, Clone)]
pub struct Workflow {
    pub id: Uuid,
    pub name: String,
    pub nodes: Vec<Node>,
    /// In authored order; the first matching edge wins.
    pub edges: Vec<Edge>,
}

impl Workflow {
    pub fn from_rows(row: WorkflowRow, nodes: Vec<NodeRow>, edges: Vec<EdgeRow>) -> Self {
        Self {
            id: row.id,
            name: row.name,
            nodes: nodes.into_iter().map(Node::from).collect(),
            edges: edges.into_iter().map(Edge::from).collect(),
        }
    }
}

// ---------------------------------------------------------------------------
// Workflow files
// ---------------------------------------------------------------------------

/// A node as written in a workflow JSON file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeDefinition {
    pub id: String,
    #[serde(rename = "type")]
    pub node_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(default)]
    pub config: Value,
}

/// An edge as written in a workflow JSON file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EdgeDefinition {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub source: String,
    pub target: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_handle: Option<String>,
}

/// A workflow JSON file: `{ "name", "nodes": [...], "edges": [...] }`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowDefinition {
    #[serde(default = "Uuid::new_v4")]
    pub id: Uuid,
    #[serde(default)]
    pub name: String,
    pub nodes: Vec<NodeDefinition>,
    #[serde(default)]
    pub edges: Vec<EdgeDefinition>,
}

impl WorkflowDefinition {
    /// Split into the rows a store persists. Edges without an id get
    /// `e<index>`.
    pub fn into_rows(self) -> (WorkflowRow, Vec<NodeRow>, Vec<EdgeRow>) {
        let workflow_id = self.id;
        let nodes = self
            .nodes
            .into_iter()
            .map(|n| NodeRow {
                id: n.id,
                workflow_id,
                node_type: n.node_type,
                action_type: n.action_type,
                label: n.label,
                config: n.config,
            })
            .collect();
        let edges = self
            .edges
            .into_iter()
            .enumerate()
            .map(|(i, e)| EdgeRow {
                id: e.id.unwrap_or_else(|| format!("e{i}")),
                workflow_id,
                source_node_id: e.source,
                target_node_id: e.target,
                source_handle: e.source_handle,
            })
            .collect();
        let row = WorkflowRow { id: workflow_id, name: self.name, created_at: Utc::now() };
        (row, nodes, edges)
    }

    pub fn into_workflow(self) -> Workflow {
        let (row, nodes, edges) = self.into_rows();
        Workflow::from_rows(row, nodes, edges)
    }
}

// ---------------------------------------------------------------------------
// Node output
// ---------------------------------------------------------------------------

/// Typed result of visiting one node. Flattened to JSON when it is written to
/// the step log and the execution context.
#[derive(Debug, Clone, PartialEq)]
pub enum NodeOutput {
    Trigger(Value),
    Action(ActionOutput),
    Condition { result: bool, expression: String },
    Delay { seconds: f64 },
    End,
    Passthrough,
}

impl NodeOutput {
    pub fn condition_result(&self) -> Option<bool> {
        match self {
            Self::Condition { result, .. } => Some(*result),
            _ => None,
        }
    }

    pub fn into_value(self) -> Value {
        match self {
            Self::Trigger(payload) => payload,
            Self::Action(output) => output.into_value(),
            Self::Condition { result, expression } => {
                json!({ "condition_result": result, "expression": expression })
            }
            Self::Delay { seconds } => json!({ "delayed": true, "seconds": seconds }),
            Self::End => json!({ "ended": true }),
            Self::Passthrough => json!({}),
        }
    }
}

// ---------------------------------------------------------------------------
// Execution
// ---------------------------------------------------------------------------

/// Lifecycle of an execution: `pending → running → {completed | failed}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionStatus {
    Pending,
    Running,
    Completed,
    Failed,
}

impl ExecutionStatus {
    /// The terminal status of a finished run. Never set independently.
    pub fn from_outcome(step_failed: bool, setup_failed: bool) -> Self {
        if step_failed || setup_failed {
            Self::Failed
        } else {
            Self::Completed
        }
    }
}

impl fmt::Display for ExecutionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::Running => write!(f, "running"),
            Self::Completed => write!(f, "completed"),
            Self::Failed => write!(f, "failed"),
        }
    }
}

impl FromStr for ExecutionStatus {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending"   => Ok(Self::Pending),
            "running"   => Ok(Self::Running),
            "completed" => Ok(Self::Completed),
            "failed"    => Ok(Self::Failed),
            other       => Err(format!("unknown execution status: {other}")),
        }
    }
}

/// One run of a workflow against a trigger payload.
#[derive(Debug, Clone, Serialize)]
pub struct Execution {
    pub id: Uuid,
    pub workflow_id: Uuid,
    pub trigger_data: Value,
    pub status: ExecutionStatus,
    pub error: Option<String>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub duration_ms: Option<i64>,
    pub created_at: DateTime<Utc>,
}

impl TryFrom<ExecutionRow> for Execution {
    type Error = EngineError;

    fn try_from(row: ExecutionRow) -> Result<Self, Self::Error> {
        let status = row.status.parse().map_err(EngineError::InvalidRecord)?;
        Ok(Self {
            id: row.id,
            workflow_id: row.workflow_id,
            trigger_data: row.trigger_data,
            status,
            error: row.error,
            started_at: row.started_at,
            completed_at: row.completed_at,
            duration_ms: row.duration_ms,
            created_at: row.created_at,
        })
    }
}

// ---------------------------------------------------------------------------
// Execution step
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    Completed,
    Failed,
}

impl fmt::Display for StepStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Completed => write!(f, "completed"),
            Self::Failed => write!(f, "failed"),
        }
    }
}

impl FromStr for StepStatus {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "completed" => Ok(Self::Completed),
            "failed"    => Ok(Self::Failed),
            other       => Err(format!("unknown step status: {other}")),
        }
    }
}

/// Audit record of one node visit. Written once, never updated.
#[derive(Debug, Clone, Serialize)]
pub struct ExecutionStep {
    pub id: Uuid,
    pub execution_id: Uuid,
    pub node_id: String,
    pub status: StepStatus,
    /// Summary of the context the node saw, not its full contents.
    pub input: Value,
    pub output: Value,
    pub error: Option<String>,
    pub started_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
}

impl ExecutionStep {
    pub fn to_row(&self) -> ExecutionStepRow {
        ExecutionStepRow {
            id: self.id,
            execution_id: self.execution_id,
            node_id: self.node_id.clone(),
            status: self.status.to_string(),
            input: self.input.clone(),
            output: self.output.clone(),
            error: self.error.clone(),
            started_at: self.started_at,
            completed_at: self.completed_at,
        }
    }
}

impl TryFrom<ExecutionStepRow> for ExecutionStep {
    type Error = EngineError;

    fn try_from(row: ExecutionStepRow) -> Result<Self, Self::Error> {
        Ok(Self {
            status: row.status.parse().map_err(EngineError::InvalidRecord)?,
            id: row.id,
            execution_id: row.execution_id,
            node_id: row.node_id,
            input: row.input,
            output: row.output,
            error: row.error,
            started_at: row.started_at,
            completed_at: row.completed_at,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_node_type_is_kept_as_other() {
        assert_eq!(NodeKind::from_parts("loop", None), NodeKind::Other("loop".into()));
        assert_eq!(
            NodeKind::from_parts("action", Some("webhook".into())),
            NodeKind::Action { action_type: Some("webhook".into()) }
        );
    }

    #[test]
    fn non_object_config_reads_as_empty() {
        let node = Node::from(NodeRow {
            id: "n".into(),
            workflow_id: Uuid::new_v4(),
            node_type: "action".into(),
            action_type: None,
            label: None,
            config: Value::Null,
        });
        assert!(node.config.is_empty());
    }

    #[test]
    fn status_is_derived_from_outcome() {
        assert_eq!(ExecutionStatus::from_outcome(false, false), ExecutionStatus::Completed);
        assert_eq!(ExecutionStatus::from_outcome(true, false), ExecutionStatus::Failed);
        assert_eq!(ExecutionStatus::from_outcome(false, true), ExecutionStatus::Failed);
    }

    #[test]
    fn definition_parses_from_json_and_numbers_edges() {
        let def: WorkflowDefinition = serde_json::from_value(json!({
            "name": "demo",
            "nodes": [
                { "id": "t", "type": "trigger" },
                { "id": "a", "type": "action", "action_type": "send_message",
                  "config": { "message": "hi" } }
            ],
            "edges": [{ "source": "t", "target": "a" }]
        }))
        .unwrap();

        let wf = def.into_workflow();
        assert_eq!(wf.nodes.len(), 2);
        assert_eq!(wf.nodes[0].kind, NodeKind::Trigger);
        assert_eq!(wf.edges[0].id, "e0");
        assert_eq!(wf.nodes[1].config["message"], "hi");
    }

    #[test]
    fn status_strings_round_trip_through_rows() {
        for s in ["pending", "running", "completed", "failed"] {
            let status: ExecutionStatus = s.parse().unwrap();
            assert_eq!(status.to_string(), s);
        }
        assert!("succeeded".parse::<ExecutionStatus>().is_err());
    }
}
