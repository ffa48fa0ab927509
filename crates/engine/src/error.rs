//! Engine-level error types.

use thiserror::Error;
use uuid::Uuid;

/// Errors produced by the workflow engine (validation + execution).
///
/// Step-local failures are *not* errors here: they are recorded as failed
/// steps and reflected in the execution's status.
#[derive(Debug, Error)]
pub enum EngineError {
    // ------ Validation errors ------

    /// Two or more nodes share the same ID.
    #[error("duplicate node ID: '{0}'")]
    DuplicateNodeId(String),

    /// Two or more edges share the same ID.
    #[error("duplicate edge ID: '{0}'")]
    DuplicateEdgeId(String),

    /// An edge references a node ID that doesn't exist in the workflow.
    #[error("edge references unknown node '{node_id}' ({side} side)")]
    UnknownNodeReference {
        node_id: String,
        side: &'static str,
    },

    /// The workflow has no trigger node.
    #[error("No trigger node found")]
    MissingTrigger,

    /// The workflow has more than one trigger node.
    #[error("Multiple trigger nodes found")]
    MultipleTriggers,

    /// A node ID collides with a key the engine writes into the context.
    #[error("node ID '{0}' is reserved")]
    ReservedNodeId(String),

    /// A condition node's expression is outside the supported grammar.
    #[error("condition on node '{node_id}' cannot be evaluated: '{expression}'")]
    InvalidCondition {
        node_id: String,
        expression: String,
    },

    // ------ Execution errors ------

    /// The execution id is not a well-formed UUID.
    #[error("invalid execution id: '{0}'")]
    InvalidExecutionId(String),

    /// No execution with this id exists.
    #[error("execution {0} not found")]
    ExecutionNotFound(Uuid),

    /// No workflow with this id exists.
    #[error("workflow {0} not found")]
    WorkflowNotFound(Uuid),

    /// The execution has already been started (or finished).
    #[error("execution {execution_id} cannot be started: status is '{status}'")]
    AlreadyStarted {
        execution_id: Uuid,
        status: String,
    },

    /// The task driving a run ended without producing a result.
    #[error("execution {execution_id} run task ended abnormally: {reason}")]
    RunInterrupted {
        execution_id: Uuid,
        reason: String,
    },

    /// A stored row holds a value the engine does not understand.
    #[error("invalid stored record: {0}")]
    InvalidRecord(String),

    /// Persistence error from the db crate.
    #[error("database error: {0}")]
    Database(#[from] db::DbError),
}

impl EngineError {
    /// HTTP-style status code for callers of the trigger surface.
    pub fn status_code(&self) -> u16 {
        match self {
            Self::InvalidExecutionId(_)
            | Self::DuplicateNodeId(_)
            | Self::DuplicateEdgeId(_)
            | Self::UnknownNodeReference { .. }
            | Self::MissingTrigger
            | Self::MultipleTriggers
            | Self::ReservedNodeId(_)
            | Self::InvalidCondition { .. } => 400,
            Self::ExecutionNotFound(_) | Self::WorkflowNotFound(_) => 404,
            Self::AlreadyStarted { .. } => 409,
            Self::InvalidRecord(_) | Self::Database(_) | Self::RunInterrupted { .. } => 500,
        }
    }

    /// Message safe to hand to a caller. Internal failures are not described.
    pub fn public_message(&self) -> String {
        match self.status_code() {
            500 => "internal error".to_owned(),
            _ => self.to_string(),
        }
    }
}
