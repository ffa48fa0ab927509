//! Postgres connection pool.

use std::time::Duration;

use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use tracing::info;

use crate::DbError;

/// Type alias for the shared Postgres pool used by [`crate::PgStore`].
pub type DbPool = PgPool;

/// Open a pool against `database_url` with at most `max_connections`.
/// Waiting for a free connection gives up after ten seconds.
pub async fn create_pool(database_url: &str, max_connections: u32) -> Result<DbPool, DbError> {
    info!(max_connections, "connecting to database");
    let pool = PgPoolOptions::new()
        .max_connections(max_connections)
        .acquire_timeout(Duration::from_secs(10))
        .connect(database_url)
        .await?;
    Ok(pool)
}

/// Apply the SQL files under `migrations/` at the workspace root.
pub async fn run_migrations(pool: &DbPool) -> Result<(), DbError> {
    let migrator = sqlx::migrate!("../../migrations");
    info!(count = migrator.iter().count(), "applying database migrations");
    migrator.run(pool).await?;
    Ok(())
}
