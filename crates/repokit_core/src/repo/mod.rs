//! Repository layer: bounded statements and page windows over one table.
//!
//! # Responsibility
//! - Compile validated parameters into SQLite statements.
//! - Compute consistent `(items, total)` pages.
//!
//! # Invariants
//! - Count and window queries share one filter compiler.
//! - Repositories are immutable after construction and safe to share.

pub mod insert;
pub mod pagination;
pub mod repository;
mod sql;

use crate::error::RepoError;
use log::{debug, error, warn};
use std::time::Instant;

/// Emits one `event=repo_<op>` line for a finished call.
pub(crate) fn log_outcome(entity: &str, op: &str, started_at: Instant, outcome: Result<usize, &RepoError>) {
    let duration_ms = started_at.elapsed().as_millis();
    match outcome {
        Ok(rows) => debug!(
            "event=repo_{op} module=repo status=ok entity={entity} rows={rows} duration_ms={duration_ms}"
        ),
        Err(err) if is_rejection(err) => warn!(
            "event=repo_{op} module=repo status=rejected entity={entity} duration_ms={duration_ms} error_code={}",
            err.code()
        ),
        Err(err) => error!(
            "event=repo_{op} module=repo status=error entity={entity} duration_ms={duration_ms} error_code={} error={}",
            err.code(),
            err
        ),
    }
}

/// Caller-side mistakes and constraint outcomes, as opposed to failures.
fn is_rejection(err: &RepoError) -> bool {
    matches!(
        err,
        RepoError::InvalidParameter(_)
            | RepoError::NotFound { .. }
            | RepoError::SyncConflict { .. }
            | RepoError::AlreadyExists { .. }
            | RepoError::RelatedNotFound { .. }
    )
}
