//! `db` crate — pure persistence layer.
//!
//! Provides a connection pool, typed row structs, repository functions for
//! every table in the schema, and the [`ExecutionStore`] seam the engine
//! talks to. No business logic lives here.

pub mod error;
pub mod pool;
pub mod repository;
pub mod models;
pub mod store;

pub use pool::DbPool;
pub use error::DbError;
pub use store::{ExecutionStore, MemoryStore, PgStore};
