//! SQL for each table, one `async fn` per statement.
//!
//! `workflows` covers the definition tables (`workflows`, `workflow_nodes`,
//! `workflow_edges`); `executions` covers `executions` and the insert-only
//! `execution_steps`. Callers outside this crate go through
//! [`crate::PgStore`].

pub mod executions;
pub mod workflows;
