//! Many-to-many association sync.
//!
//! # Responsibility
//! - Declare association tables statically per owning entity.
//! - Apply `Add`/`Replace` membership changes for one owner.
//!
//! # Invariants
//! - Targets must match the relation's declared key type; they are compared
//!   with existing rows in that type's canonical form.
//! - Every target is checked against its table before any row changes.
//! - Existing association rows that stay in the set are left untouched.
//! - Callers run `sync` inside a savepoint; this module never commits.

use crate::error::{ParamError, RepoError, RepoResult};
use crate::model::entity::display_value;
use crate::model::field::{quote_ident, FieldType};
use log::debug;
use rusqlite::types::Value;
use rusqlite::{params, Connection};
use serde::{Deserialize, Serialize};
use std::time::Instant;

/// How a supplied target set is applied to an owner's associations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncMode {
    /// Keep existing associations and append missing ones.
    Add,
    /// Make the association set exactly the supplied targets.
    #[default]
    Replace,
}

impl SyncMode {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Add => "add",
            Self::Replace => "replace",
        }
    }
}

/// Static description of one association table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ManyToManyRelation {
    /// Name used in payloads and `sync_relation` calls.
    pub name: &'static str,
    pub association_table: &'static str,
    /// Association column referencing the owner's primary key.
    pub owner_column: &'static str,
    /// Association column referencing the target's key.
    pub target_column: &'static str,
    pub target_table: &'static str,
    pub target_key: &'static str,
    /// Type of `target_key`; `Integer` unless overridden.
    pub target_type: FieldType,
}

impl ManyToManyRelation {
    pub const fn new(
        name: &'static str,
        association_table: &'static str,
        owner_column: &'static str,
        target_column: &'static str,
        target_table: &'static str,
        target_key: &'static str,
    ) -> Self {
        Self {
            name,
            association_table,
            owner_column,
            target_column,
            target_table,
            target_key,
            target_type: FieldType::Integer,
        }
    }

    pub const fn with_target_type(self, target_type: FieldType) -> Self {
        Self {
            target_type,
            ..self
        }
    }
}

/// Association rows touched by one sync.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncReport {
    pub added: usize,
    pub removed: usize,
}

/// Returns the owner's current targets in ascending key order.
pub(crate) fn related_ids(
    conn: &Connection,
    relation: &ManyToManyRelation,
    owner: &Value,
) -> RepoResult<Vec<Value>> {
    let sql = format!(
        "SELECT {target} FROM {table} WHERE {owner} = ?1 ORDER BY {target} ASC;",
        target = quote_ident(relation.target_column),
        table = quote_ident(relation.association_table),
        owner = quote_ident(relation.owner_column),
    );
    let mut stmt = conn.prepare(&sql)?;
    let mut rows = stmt.query([owner])?;
    let mut ids = Vec::new();
    while let Some(row) = rows.next()? {
        ids.push(row.get::<_, Value>(0)?);
    }
    Ok(ids)
}

/// Applies `targets` to `owner`'s associations under `mode`.
///
/// Duplicate targets collapse to one association.
pub(crate) fn sync(
    conn: &Connection,
    relation: &ManyToManyRelation,
    owner: &Value,
    targets: &[Value],
    mode: SyncMode,
) -> RepoResult<SyncReport> {
    let started_at = Instant::now();
    let targets = check_targets(relation, targets)?;
    for target in &targets {
        if !target_exists(conn, relation, target)? {
            return Err(RepoError::SyncConflict {
                relation: relation.name.to_string(),
                target: display_value(target),
            });
        }
    }

    let current = related_ids(conn, relation, owner)?
        .into_iter()
        .map(|value| canonical(relation.target_type, value))
        .collect::<Vec<_>>();
    let mut report = SyncReport::default();

    if mode == SyncMode::Replace {
        let delete_sql = format!(
            "DELETE FROM {} WHERE {} = ?1 AND {} = ?2;",
            quote_ident(relation.association_table),
            quote_ident(relation.owner_column),
            quote_ident(relation.target_column),
        );
        for stale in current.iter().filter(|id| !targets.contains(id)) {
            report.removed += conn.execute(&delete_sql, params![owner, stale])?;
        }
    }

    let insert_sql = format!(
        "INSERT INTO {} ({}, {}) VALUES (?1, ?2);",
        quote_ident(relation.association_table),
        quote_ident(relation.owner_column),
        quote_ident(relation.target_column),
    );
    for target in targets.iter().filter(|id| !current.contains(id)) {
        report.added += conn.execute(&insert_sql, params![owner, target])?;
    }

    debug!(
        "event=m2m_sync module=service status=ok relation={} mode={} added={} removed={} duration_ms={}",
        relation.name,
        mode.as_str(),
        report.added,
        report.removed,
        started_at.elapsed().as_millis()
    );
    Ok(report)
}

fn target_exists(conn: &Connection, relation: &ManyToManyRelation, target: &Value) -> RepoResult<bool> {
    let sql = format!(
        "SELECT EXISTS(SELECT 1 FROM {} WHERE {} = ?1);",
        quote_ident(relation.target_table),
        quote_ident(relation.target_key),
    );
    let exists: i64 = conn.query_row(&sql, [target], |row| row.get(0))?;
    Ok(exists == 1)
}

/// Type-checks `targets` against the relation's key type and returns them
/// canonicalized with duplicates collapsed.
pub(crate) fn check_targets(
    relation: &ManyToManyRelation,
    targets: &[Value],
) -> Result<Vec<Value>, ParamError> {
    let mut unique: Vec<Value> = Vec::with_capacity(targets.len());
    for target in targets {
        if !relation.target_type.accepts(target) {
            return Err(ParamError::TypeMismatch {
                field: format!("{}.{}", relation.name, relation.target_key),
                expected: relation.target_type,
            });
        }
        let target = canonical(relation.target_type, target.clone());
        if !unique.contains(&target) {
            unique.push(target);
        }
    }
    Ok(unique)
}

fn canonical(ty: FieldType, value: Value) -> Value {
    match (ty, value) {
        (FieldType::Real, Value::Integer(int)) => Value::Real(int as f64),
        (_, value) => value,
    }
}
