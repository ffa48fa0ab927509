//! Errors surfaced by the persistence layer.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum DbError {
    /// Connection or query failure.
    #[error("database query failed: {0}")]
    Sqlx(#[from] sqlx::Error),

    /// No row with that id, or the row is not in the state a conditional
    /// write requires (e.g. finishing an execution that is not running).
    #[error("row not found")]
    NotFound,

    #[error("could not apply migrations: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),
}
