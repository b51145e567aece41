//! Multi-row and conflict-aware inserts.
//!
//! # Invariants
//! - Every call is one `INSERT ... RETURNING` statement.
//! - Conflict targets default to the primary key.
//! - Conflict predicates only narrow the target index; configured default
//!   filters do not apply to them.

use crate::error::{ParamError, RepoError, RepoResult};
use crate::model::entity::Entity;
use crate::model::field::quote_ident;
use crate::model::payload::Payload;
use crate::model::query::{validate_expressions, Filter};
use crate::repo::log_outcome;
use crate::repo::repository::Repository;
use crate::repo::sql::Statement;
use rusqlite::Connection;
use std::time::Instant;

/// Unique column set (plus optional partial-index predicate) an insert may
/// collide with.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConflictTarget {
    columns: Vec<String>,
    filters: Vec<Filter>,
}

impl ConflictTarget {
    /// Conflicts on the entity's primary key.
    pub fn primary_key() -> Self {
        Self::default()
    }

    pub fn columns<S: Into<String>>(columns: impl IntoIterator<Item = S>) -> Self {
        Self {
            columns: columns.into_iter().map(Into::into).collect(),
            filters: Vec::new(),
        }
    }

    /// Predicate of the partial unique index named by the columns.
    pub fn with_filters(mut self, filters: impl IntoIterator<Item = Filter>) -> Self {
        self.filters.extend(filters);
        self
    }

    fn compile<E: Entity>(&self, stmt: &mut Statement) -> Result<(), ParamError> {
        let registry = E::registry();
        let columns = if self.columns.is_empty() {
            vec![quote_ident(E::PRIMARY_KEY)]
        } else {
            self.columns
                .iter()
                .map(|column| registry.require(column).map(|def| quote_ident(def.name)))
                .collect::<Result<Vec<_>, _>>()?
        };
        validate_expressions::<E>(&self.filters, &[])?;

        stmt.sql.push_str(&format!(" ON CONFLICT ({})", columns.join(", ")));
        stmt.push_where(&[], &self.filters, None);
        Ok(())
    }
}

/// Payload columns an upsert overwrites when the row already exists.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum UpdateColumns {
    #[default]
    All,
    Only(Vec<String>),
    Except(Vec<String>),
}

impl UpdateColumns {
    pub fn only<S: Into<String>>(columns: impl IntoIterator<Item = S>) -> Self {
        Self::Only(columns.into_iter().map(Into::into).collect())
    }

    pub fn except<S: Into<String>>(columns: impl IntoIterator<Item = S>) -> Self {
        Self::Except(columns.into_iter().map(Into::into).collect())
    }

    fn assignments<E: Entity>(&self, payload: &Payload) -> Result<String, ParamError> {
        let registry = E::registry();
        let named = match self {
            Self::All => &[][..],
            Self::Only(columns) | Self::Except(columns) => columns.as_slice(),
        };
        for column in named {
            registry.require(column)?;
        }

        let assignments = payload
            .values()
            .iter()
            .map(|(field, _)| field)
            .filter(|field| match self {
                Self::All => true,
                Self::Only(columns) => columns.contains(field),
                Self::Except(columns) => !columns.contains(field),
            })
            .map(|field| format!("{0} = excluded.{0}", quote_ident(field)))
            .collect::<Vec<_>>();
        if assignments.is_empty() {
            return Err(ParamError::EmptyUpdateSet(E::NAME));
        }
        Ok(assignments.join(", "))
    }
}

impl<E: Entity> Repository<E> {
    /// Inserts every payload in one statement. All payloads must set the same
    /// fields.
    pub fn bulk_create(&self, conn: &Connection, payloads: &[Payload]) -> RepoResult<Vec<E>> {
        let started_at = Instant::now();
        let result = self.insert_batch(conn, payloads);
        log_outcome(E::NAME, "bulk_create", started_at, result.as_ref().map(Vec::len));
        result
    }

    /// Inserts one row unless it collides with `target`; `None` when skipped.
    pub fn create_or_skip(
        &self,
        conn: &Connection,
        payload: &Payload,
        target: &ConflictTarget,
    ) -> RepoResult<Option<E>> {
        let started_at = Instant::now();
        let result = self
            .insert_on_conflict(conn, payload, target, None)
            .map(|mut rows| rows.pop());
        log_outcome(
            E::NAME,
            "create_or_skip",
            started_at,
            result.as_ref().map(|row| usize::from(row.is_some())),
        );
        result
    }

    /// Inserts one row, or overwrites `update` columns of the row colliding
    /// with `target`.
    pub fn upsert(
        &self,
        conn: &Connection,
        payload: &Payload,
        target: &ConflictTarget,
        update: &UpdateColumns,
    ) -> RepoResult<E> {
        let started_at = Instant::now();
        let result = self
            .insert_on_conflict(conn, payload, target, Some(update))
            .and_then(|mut rows| {
                rows.pop()
                    .ok_or_else(|| RepoError::InvalidData(format!("{} upsert returned no row", E::NAME)))
            });
        log_outcome(E::NAME, "upsert", started_at, result.as_ref().map(|_| 1));
        result
    }

    fn insert_batch(&self, conn: &Connection, payloads: &[Payload]) -> RepoResult<Vec<E>> {
        let Some(first) = payloads.first() else {
            return Ok(Vec::new());
        };
        for payload in payloads {
            payload.validate_columns::<E>()?;
        }
        if first.values().is_empty() {
            return Err(ParamError::EmptyPayload(E::NAME).into());
        }

        let columns = first
            .values()
            .iter()
            .map(|(field, _)| field.as_str())
            .collect::<Vec<_>>();
        let mut stmt = values_head::<E>(&columns);
        let tuple = format!("({})", vec!["?"; columns.len()].join(", "));
        let mut tuples = Vec::with_capacity(payloads.len());
        for (index, payload) in payloads.iter().enumerate() {
            let mismatch = || ParamError::MismatchedBatch {
                entity: E::NAME,
                index,
            };
            if payload.values().len() != columns.len() {
                return Err(mismatch().into());
            }
            for column in &columns {
                let value = payload
                    .values()
                    .iter()
                    .find(|(field, _)| field == column)
                    .map(|(_, value)| value.clone())
                    .ok_or_else(mismatch)?;
                stmt.binds.push(value);
            }
            tuples.push(tuple.as_str());
        }
        stmt.sql.push_str(&tuples.join(", "));
        stmt.sql.push_str(&self.returning());
        self.fetch(conn, stmt)
    }

    fn insert_on_conflict(
        &self,
        conn: &Connection,
        payload: &Payload,
        target: &ConflictTarget,
        update: Option<&UpdateColumns>,
    ) -> RepoResult<Vec<E>> {
        payload.validate_columns::<E>()?;
        if payload.values().is_empty() {
            return Err(ParamError::EmptyPayload(E::NAME).into());
        }
        let assignments = update
            .map(|update| update.assignments::<E>(payload))
            .transpose()?;

        let columns = payload
            .values()
            .iter()
            .map(|(field, _)| field.as_str())
            .collect::<Vec<_>>();
        let mut stmt = values_head::<E>(&columns);
        stmt.sql
            .push_str(&format!("({})", vec!["?"; columns.len()].join(", ")));
        stmt.binds
            .extend(payload.values().iter().map(|(_, value)| value.clone()));
        target.compile::<E>(&mut stmt)?;
        match assignments {
            Some(assignments) => {
                stmt.sql.push_str(" DO UPDATE SET ");
                stmt.sql.push_str(&assignments);
            }
            None => stmt.sql.push_str(" DO NOTHING"),
        }
        stmt.sql.push_str(&self.returning());
        self.fetch(conn, stmt)
    }
}

fn values_head<E: Entity>(columns: &[&str]) -> Statement {
    let columns = columns
        .iter()
        .map(|column| quote_ident(column))
        .collect::<Vec<_>>();
    Statement::new(format!(
        "INSERT INTO {} ({}) VALUES ",
        quote_ident(E::TABLE),
        columns.join(", ")
    ))
}
