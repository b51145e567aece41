//! Error taxonomy shared by repositories and services.
//!
//! # Responsibility
//! - Separate parameter mistakes (`ParamError`) from execution failures.
//! - Translate SQLite constraint failures into semantic variants.
//!
//! # Invariants
//! - Parameter errors are raised before any statement is executed.
//! - Execution failures keep the original `rusqlite::Error` as `source()`.
//! - Nothing in this crate retries or swallows an error.

use crate::model::field::FieldType;
use crate::model::query::FilterOp;
use rusqlite::ErrorCode;
use thiserror::Error;

pub type RepoResult<T> = Result<T, RepoError>;

/// Malformed or unsafe query parameters.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParamError {
    #[error("limit must be zero or a positive integer, got {0}")]
    NegativeLimit(i64),
    #[error("offset must be zero or a positive integer, got {0}")]
    NegativeOffset(i64),
    #[error("{name} {value} exceeds the supported range")]
    OutOfRange { name: &'static str, value: u64 },
    #[error("unknown field `{field}` on entity `{entity}`")]
    UnknownField { entity: &'static str, field: String },
    #[error("unknown relation `{relation}` on entity `{entity}`")]
    UnknownRelation {
        entity: &'static str,
        relation: String,
    },
    #[error("operator `{op}` is not supported for field `{field}` of type {ty}")]
    UnsupportedOperator {
        field: String,
        op: FilterOp,
        ty: FieldType,
    },
    #[error("field `{field}` expects a {expected} value")]
    TypeMismatch { field: String, expected: FieldType },
    #[error("payload for entity `{0}` has no fields")]
    EmptyPayload(&'static str),
    #[error("relation updates for entity `{0}` must go through a service")]
    UnexpectedRelations(&'static str),
    #[error("entity `{0}` has no soft-delete field configured")]
    SoftDeleteUnavailable(&'static str),
    #[error("batch row {index} for entity `{entity}` sets different fields than row 0")]
    MismatchedBatch { entity: &'static str, index: usize },
    #[error("upsert for entity `{0}` leaves no column to update on conflict")]
    EmptyUpdateSet(&'static str),
    #[error("invalid field registry for entity `{entity}`: {reason}")]
    InvalidRegistry {
        entity: &'static str,
        reason: String,
    },
}

/// Errors from repository and service operations.
#[derive(Debug, Error)]
pub enum RepoError {
    #[error("invalid parameter: {0}")]
    InvalidParameter(#[from] ParamError),
    #[error("query execution failed: {0}")]
    QueryExecution(#[source] rusqlite::Error),
    #[error("relation `{relation}` references missing target {target}")]
    SyncConflict { relation: String, target: String },
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },
    #[error("{entity} already exists")]
    AlreadyExists {
        entity: &'static str,
        #[source]
        source: rusqlite::Error,
    },
    #[error("{entity} references a related row that does not exist")]
    RelatedNotFound {
        entity: &'static str,
        #[source]
        source: rusqlite::Error,
    },
    #[error("repository requires table `{0}`")]
    MissingTable(String),
    #[error("repository requires column `{column}` in table `{table}`")]
    MissingColumn { table: String, column: String },
    #[error("invalid persisted data: {0}")]
    InvalidData(String),
    #[error("failed to render output: {0}")]
    Render(#[from] serde_json::Error),
}

impl From<rusqlite::Error> for RepoError {
    fn from(value: rusqlite::Error) -> Self {
        Self::QueryExecution(value)
    }
}

impl RepoError {
    /// Maps a statement failure for `entity`, splitting out constraint kinds.
    pub(crate) fn from_write(entity: &'static str, err: rusqlite::Error) -> Self {
        let extended = match &err {
            rusqlite::Error::SqliteFailure(failure, _)
                if failure.code == ErrorCode::ConstraintViolation =>
            {
                failure.extended_code
            }
            _ => return Self::QueryExecution(err),
        };

        match extended {
            rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE | rusqlite::ffi::SQLITE_CONSTRAINT_PRIMARYKEY => {
                Self::AlreadyExists {
                    entity,
                    source: err,
                }
            }
            rusqlite::ffi::SQLITE_CONSTRAINT_FOREIGNKEY => Self::RelatedNotFound {
                entity,
                source: err,
            },
            _ => Self::QueryExecution(err),
        }
    }

    /// Stable machine-readable code used in log lines.
    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidParameter(_) => "invalid_parameter",
            Self::QueryExecution(_) => "query_execution",
            Self::SyncConflict { .. } => "sync_conflict",
            Self::NotFound { .. } => "not_found",
            Self::AlreadyExists { .. } => "already_exists",
            Self::RelatedNotFound { .. } => "related_not_found",
            Self::MissingTable(_) => "missing_table",
            Self::MissingColumn { .. } => "missing_column",
            Self::InvalidData(_) => "invalid_data",
            Self::Render(_) => "render_failed",
        }
    }
}
