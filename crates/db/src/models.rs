//! Row structs that map 1-to-1 onto database tables.
//!
//! These are *persistence* models and carry no domain behaviour.
//! Domain types live in the `engine` crate.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

// ---------------------------------------------------------------------------
// workflows
// ---------------------------------------------------------------------------

/// A persisted workflow header row. Nodes and edges live in their own tables.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct WorkflowRow {
    pub id: Uuid,
    pub name: String,
    pub created_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// workflow_nodes / workflow_edges
// ---------------------------------------------------------------------------

/// A persisted graph node.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct NodeRow {
    pub id: String,
    pub workflow_id: Uuid,
    /// `trigger`, `action`, `condition`, `delay` or `end`.
    pub node_type: String,
    /// Only set for `action` nodes.
    pub action_type: Option<String>,
    pub label: Option<String>,
    pub config: serde_json::Value,
}

/// A persisted directed edge. Rows are returned in `position` order.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct EdgeRow {
    pub id: String,
    pub workflow_id: Uuid,
    pub source_node_id: String,
    pub target_node_id: String,
    /// `"true"`, `"false"` or `"default"` on edges leaving a condition node.
    pub source_handle: Option<String>,
}

// ---------------------------------------------------------------------------
// executions
// ---------------------------------------------------------------------------

/// A persisted execution row.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct ExecutionRow {
    pub id: Uuid,
    pub workflow_id: Uuid,
    pub trigger_data: serde_json::Value,
    pub status: String,
    /// Reason recorded when the run failed before any step could execute.
    pub error: Option<String>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub duration_ms: Option<i64>,
    pub created_at: DateTime<Utc>,
}

/// Terminal fields written exactly once when a run ends.
#[derive(Debug, Clone)]
pub struct ExecutionFinish {
    pub status: String,
    pub error: Option<String>,
    pub completed_at: DateTime<Utc>,
    pub duration_ms: i64,
}

// ---------------------------------------------------------------------------
// execution_steps
// ---------------------------------------------------------------------------

/// A persisted execution step. Insert-only.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct ExecutionStepRow {
    pub id: Uuid,
    pub execution_id: Uuid,
    pub node_id: String,
    pub status: String,
    pub input: serde_json::Value,
    pub output: serde_json::Value,
    pub error: Option<String>,
    pub started_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
}
