//! Workflow definition reads (and the inserts used to seed them).
//!
//! The inserts take a connection so a whole definition can be written inside
//! one transaction.

use sqlx::{PgConnection, PgPool};
use uuid::Uuid;

use crate::{
    DbError,
    models::{EdgeRow, NodeRow, WorkflowRow},
};

/// Insert a workflow header row.
pub async fn insert_workflow(conn: &mut PgConnection, workflow: &WorkflowRow) -> Result<(), DbError> {
    sqlx::query(
        r#"
        INSERT INTO workflows (id, name, created_at)
        VALUES ($1, $2, $3)
        "#,
    )
    .bind(workflow.id)
    .bind(&workflow.name)
    .bind(workflow.created_at)
    .execute(&mut *conn)
    .await?;

    Ok(())
}

/// Fetch a single workflow by its primary key.
pub async fn get_workflow(pool: &PgPool, id: Uuid) -> Result<WorkflowRow, DbError> {
    sqlx::query_as::<_, WorkflowRow>(
        r#"SELECT id, name, created_at FROM workflows WHERE id = $1"#,
    )
    .bind(id)
    .fetch_optional(pool)
    .await?
    .ok_or(DbError::NotFound)
}

/// Insert one node. `position` fixes the order nodes are listed in.
pub async fn insert_node(conn: &mut PgConnection, node: &NodeRow, position: i32) -> Result<(), DbError> {
    sqlx::query(
        r#"
        INSERT INTO workflow_nodes
            (id, workflow_id, node_type, action_type, label, config, position)
        VALUES ($1, $2, $3, $4, $5, $6, $7)
        "#,
    )
    .bind(&node.id)
    .bind(node.workflow_id)
    .bind(&node.node_type)
    .bind(&node.action_type)
    .bind(&node.label)
    .bind(&node.config)
    .bind(position)
    .execute(&mut *conn)
    .await?;

    Ok(())
}

/// Insert one edge. `position` decides which edge wins when several leave
/// the same node.
pub async fn insert_edge(conn: &mut PgConnection, edge: &EdgeRow, position: i32) -> Result<(), DbError> {
    sqlx::query(
        r#"
        INSERT INTO workflow_edges
            (id, workflow_id, source_node_id, target_node_id, source_handle, position)
        VALUES ($1, $2, $3, $4, $5, $6)
        "#,
    )
    .bind(&edge.id)
    .bind(edge.workflow_id)
    .bind(&edge.source_node_id)
    .bind(&edge.target_node_id)
    .bind(&edge.source_handle)
    .bind(position)
    .execute(&mut *conn)
    .await?;

    Ok(())
}

/// All nodes of a workflow.
pub async fn list_nodes(pool: &PgPool, workflow_id: Uuid) -> Result<Vec<NodeRow>, DbError> {
    let rows = sqlx::query_as::<_, NodeRow>(
        r#"
        SELECT id, workflow_id, node_type, action_type, label, config
        FROM workflow_nodes
        WHERE workflow_id = $1
        ORDER BY position ASC
        "#,
    )
    .bind(workflow_id)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}

/// All edges of a workflow in their authored order.
pub async fn list_edges(pool: &PgPool, workflow_id: Uuid) -> Result<Vec<EdgeRow>, DbError> {
    let rows = sqlx::query_as::<_, EdgeRow>(
        r#"
        SELECT id, workflow_id, source_node_id, target_node_id, source_handle
        FROM workflow_edges
        WHERE workflow_id = $1
        ORDER BY position ASC
        "#,
    )
    .bind(workflow_id)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}
