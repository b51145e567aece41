//! SQLite session bootstrap and schema migration entry points.
//!
//! # Responsibility
//! - Open and configure SQLite connections for applications using repokit.
//! - Apply caller-supplied schema migrations in deterministic order.
//! - Provide the savepoint scope used by multi-statement writes.
//!
//! # Invariants
//! - Migration version is tracked via `PRAGMA user_version`.
//! - Repositories never open, commit or close a caller's connection.

use thiserror::Error;

pub mod migrations;
mod open;
mod savepoint;

pub use migrations::Migration;
pub use open::{open_db, open_db_in_memory};
pub(crate) use savepoint::SavepointScope;

pub type DbResult<T> = Result<T, DbError>;

#[derive(Debug, Error)]
pub enum DbError {
    #[error("{0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("database schema version {db_version} is newer than supported {latest_supported}")]
    UnsupportedSchemaVersion {
        db_version: u32,
        latest_supported: u32,
    },
    #[error("migration versions must be strictly increasing; {version} follows {previous}")]
    UnorderedMigrations { previous: u32, version: u32 },
}
