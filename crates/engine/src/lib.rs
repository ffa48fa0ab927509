//! `engine` crate — domain models, condition evaluation, graph traversal and
//! the execution lifecycle.

pub mod condition;
pub mod context;
pub mod error;
pub mod executor;
pub mod graph;
pub mod lifecycle;
pub mod models;

pub use context::ExecutionContext;
pub use error::EngineError;
pub use executor::{ExecutionSummary, ExecutorConfig, WorkflowExecutor};
pub use graph::{validate_workflow, WorkflowGraph};
pub use lifecycle::ExecutionLifecycle;
pub use models::{
    Edge, Execution, ExecutionStatus, ExecutionStep, Node, NodeKind, StepStatus, Workflow,
    WorkflowDefinition,
};
