//! Generic SQLite repository bound to one entity type.
//!
//! # Responsibility
//! - Turn validated parameters into single, bounded statements.
//! - Own CRUD and soft-delete statements for the bound table.
//!
//! # Invariants
//! - Each public call issues exactly one statement against the caller's
//!   connection (schema verification aside).
//! - Filters are validated against the static registry before execution.
//! - With a soft-delete field configured, reads skip tombstoned rows unless
//!   the parameters ask for them.
//! - Configured default filters precede caller filters in every `WHERE`;
//!   default ordering precedes caller ordering.

use crate::error::{ParamError, RepoError, RepoResult};
use crate::model::entity::{display_value, Entity};
use crate::model::field::{quote_ident, FieldRegistry, FieldType};
use crate::model::payload::Payload;
use crate::model::query::{validate_expressions, Filter, Limit, OrderBy, QueryParams};
use crate::repo::log_outcome;
use crate::repo::sql::{sql_int, Statement};
use rusqlite::types::Value;
use rusqlite::{params_from_iter, Connection};
use serde::Deserialize;
use std::marker::PhantomData;
use std::time::Instant;

/// Row cap applied when a call leaves the limit unspecified.
pub const DEFAULT_LIMIT: u64 = 50;

const SOFT_DELETE_STAMP_SQL: &str = "(strftime('%s', 'now') * 1000)";

/// Static repository configuration.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct RepoConfig {
    /// Applied when neither a bound nor "unbounded" was requested.
    pub default_limit: u64,
    /// Nullable `Timestamp` column marking tombstoned rows.
    pub soft_delete_field: Option<String>,
    /// ANDed ahead of caller filters on reads, counts, updates and deletes.
    #[serde(skip)]
    pub default_filters: Vec<Filter>,
    /// Sort keys placed ahead of caller ordering.
    pub default_ordering: Vec<OrderBy>,
}

impl Default for RepoConfig {
    fn default() -> Self {
        Self {
            default_limit: DEFAULT_LIMIT,
            soft_delete_field: None,
            default_filters: Vec::new(),
            default_ordering: Vec::new(),
        }
    }
}

impl RepoConfig {
    pub fn with_default_limit(mut self, default_limit: u64) -> Self {
        self.default_limit = default_limit;
        self
    }

    pub fn with_soft_delete(mut self, field: impl Into<String>) -> Self {
        self.soft_delete_field = Some(field.into());
        self
    }

    pub fn with_default_filters(mut self, filters: impl IntoIterator<Item = Filter>) -> Self {
        self.default_filters.extend(filters);
        self
    }

    pub fn with_default_ordering(mut self, ordering: impl IntoIterator<Item = OrderBy>) -> Self {
        self.default_ordering.extend(ordering);
        self
    }
}

/// Repository for entity `E`. Holds no per-call state.
pub struct Repository<E> {
    config: RepoConfig,
    registry: FieldRegistry,
    _entity: PhantomData<fn() -> E>,
}

impl<E> std::fmt::Debug for Repository<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Repository")
            .field("entity", &self.registry.entity())
            .field("config", &self.config)
            .finish()
    }
}

impl<E> Clone for Repository<E> {
    fn clone(&self) -> Self {
        Self {
            config: self.config.clone(),
            registry: self.registry,
            _entity: PhantomData,
        }
    }
}

impl<E: Entity> Repository<E> {
    /// Validates `E`'s registry and `config` once.
    pub fn new(config: RepoConfig) -> RepoResult<Self> {
        let registry = E::registry();
        registry.validate(E::PRIMARY_KEY)?;
        sql_int("default_limit", config.default_limit)?;
        validate_expressions::<E>(&config.default_filters, &config.default_ordering)?;

        if let Some(field) = config.soft_delete_field.as_deref() {
            let def = registry.require(field)?;
            if def.ty != FieldType::Timestamp {
                return Err(ParamError::InvalidRegistry {
                    entity: E::NAME,
                    reason: format!("soft-delete field `{field}` must be a timestamp"),
                }
                .into());
            }
        }

        Ok(Self {
            config,
            registry,
            _entity: PhantomData,
        })
    }

    pub fn config(&self) -> &RepoConfig {
        &self.config
    }

    pub fn registry(&self) -> &FieldRegistry {
        &self.registry
    }

    /// Checks that the bound table and every registered column exist.
    pub fn verify_schema(&self, conn: &Connection) -> RepoResult<()> {
        if !table_exists(conn, E::TABLE)? {
            return Err(RepoError::MissingTable(E::TABLE.to_string()));
        }

        let columns = table_columns(conn, E::TABLE)?;
        for field in self.registry.fields() {
            if !columns.iter().any(|column| column == field.name) {
                return Err(RepoError::MissingColumn {
                    table: E::TABLE.to_string(),
                    column: field.name.to_string(),
                });
            }
        }
        Ok(())
    }

    /// Lists rows; `limit = None` explicitly requests every matching row.
    pub fn list_raw(
        &self,
        conn: &Connection,
        limit: Option<u64>,
        filters: &[Filter],
        ordering: &[OrderBy],
    ) -> RepoResult<Vec<E>> {
        let started_at = Instant::now();
        let result = validate_expressions::<E>(filters, ordering)
            .map_err(RepoError::from)
            .and_then(|()| {
                let limit = limit.map(|value| sql_int("limit", value)).transpose()?;
                self.select(conn, filters, ordering, limit, 0, false)
            });
        log_outcome(E::NAME, "list", started_at, result.as_ref().map(Vec::len));
        result
    }

    /// Lists rows for validated parameters, applying `default_limit` when the
    /// parameters leave the limit unspecified.
    pub fn list_raw_params(&self, conn: &Connection, params: &QueryParams<E>) -> RepoResult<Vec<E>> {
        let started_at = Instant::now();
        let result = self.resolve_limit(params.limit()).and_then(|limit| {
            self.select(
                conn,
                params.filters(),
                params.ordering(),
                limit,
                0,
                params.include_deleted(),
            )
        });
        log_outcome(E::NAME, "list", started_at, result.as_ref().map(Vec::len));
        result
    }

    /// Counts rows matching `filters`, ignoring any window.
    pub fn count(
        &self,
        conn: &Connection,
        filters: &[Filter],
        include_deleted: bool,
    ) -> RepoResult<u64> {
        validate_expressions::<E>(filters, &[])?;
        self.count_matching(conn, filters, include_deleted)
    }

    /// Loads one row by primary key.
    pub fn get(
        &self,
        conn: &Connection,
        id: impl Into<Value>,
        include_deleted: bool,
    ) -> RepoResult<Option<E>> {
        let filters = [Filter::eq(E::PRIMARY_KEY, id)];
        validate_expressions::<E>(&filters, &[])?;
        let mut rows = self.select(conn, &filters, &[], Some(1), 0, include_deleted)?;
        Ok(rows.pop())
    }

    /// Loads the first row matching `filters` under `ordering`.
    pub fn retrieve_one_by(
        &self,
        conn: &Connection,
        filters: &[Filter],
        ordering: &[OrderBy],
        include_deleted: bool,
    ) -> RepoResult<Option<E>> {
        validate_expressions::<E>(filters, ordering)?;
        let mut rows = self.select(conn, filters, ordering, Some(1), 0, include_deleted)?;
        Ok(rows.pop())
    }

    /// Inserts one row and returns it as stored.
    pub fn create(&self, conn: &Connection, payload: &Payload) -> RepoResult<E> {
        let started_at = Instant::now();
        let result = self.insert_row(conn, payload);
        log_outcome(E::NAME, "create", started_at, result.as_ref().map(|_| 1));
        result
    }

    /// Updates one live row by primary key.
    pub fn update(&self, conn: &Connection, id: impl Into<Value>, payload: &Payload) -> RepoResult<E> {
        let started_at = Instant::now();
        let id = id.into();
        let result = self
            .update_rows(conn, &[Filter::eq(E::PRIMARY_KEY, id.clone())], payload)
            .and_then(|rows| self.single(rows, &id));
        log_outcome(E::NAME, "update", started_at, result.as_ref().map(|_| 1));
        result
    }

    /// Updates every live row matching `filters`.
    pub fn update_by(
        &self,
        conn: &Connection,
        filters: &[Filter],
        payload: &Payload,
    ) -> RepoResult<Vec<E>> {
        let started_at = Instant::now();
        let result = self.update_rows(conn, filters, payload);
        log_outcome(E::NAME, "update_by", started_at, result.as_ref().map(Vec::len));
        result
    }

    /// Hard-deletes one row by primary key.
    pub fn delete(&self, conn: &Connection, id: impl Into<Value>) -> RepoResult<()> {
        let id = id.into();
        let changed = self.delete_by(conn, &[Filter::eq(E::PRIMARY_KEY, id.clone())])?;
        if changed == 0 {
            return Err(self.not_found(&id));
        }
        Ok(())
    }

    /// Hard-deletes every row matching `filters`; returns the affected count.
    pub fn delete_by(&self, conn: &Connection, filters: &[Filter]) -> RepoResult<usize> {
        let started_at = Instant::now();
        let result = validate_expressions::<E>(filters, &[])
            .map_err(RepoError::from)
            .and_then(|()| {
                let mut stmt = Statement::new(format!("DELETE FROM {}", quote_ident(E::TABLE)));
                stmt.push_where(&self.config.default_filters, filters, None);
                conn.execute(&stmt.sql, params_from_iter(stmt.binds))
                    .map_err(|err| RepoError::from_write(E::NAME, err))
            });
        log_outcome(E::NAME, "delete", started_at, result.as_ref().copied());
        result
    }

    /// Tombstones one row by primary key. Already tombstoned rows keep their
    /// original stamp.
    pub fn soft_delete(&self, conn: &Connection, id: impl Into<Value>) -> RepoResult<E> {
        let id = id.into();
        let rows = self.soft_delete_by(conn, &[Filter::eq(E::PRIMARY_KEY, id.clone())])?;
        self.single(rows, &id)
    }

    /// Tombstones every row matching `filters`.
    pub fn soft_delete_by(&self, conn: &Connection, filters: &[Filter]) -> RepoResult<Vec<E>> {
        let started_at = Instant::now();
        let result = self.tombstone_rows(conn, filters);
        log_outcome(E::NAME, "soft_delete", started_at, result.as_ref().map(Vec::len));
        result
    }

    /// Returns whether a row with primary key `id` exists, tombstoned or not.
    pub fn exists(&self, conn: &Connection, id: &Value) -> RepoResult<bool> {
        let sql = format!(
            "SELECT EXISTS(SELECT 1 FROM {} WHERE {} = ?1);",
            quote_ident(E::TABLE),
            quote_ident(E::PRIMARY_KEY)
        );
        let exists: i64 = conn.query_row(&sql, [id], |row| row.get(0))?;
        Ok(exists == 1)
    }

    pub(crate) fn resolve_limit(&self, limit: Limit) -> RepoResult<Option<i64>> {
        let resolved = match limit {
            Limit::Default => Some(sql_int("default_limit", self.config.default_limit)?),
            Limit::Bounded(value) => Some(sql_int("limit", value)?),
            Limit::Unbounded => None,
        };
        Ok(resolved)
    }

    /// Runs the windowed `SELECT`. Expressions must already be validated.
    pub(crate) fn select(
        &self,
        conn: &Connection,
        filters: &[Filter],
        ordering: &[OrderBy],
        limit: Option<i64>,
        offset: i64,
        include_deleted: bool,
    ) -> RepoResult<Vec<E>> {
        let mut stmt = Statement::new(format!(
            "SELECT {} FROM {}",
            self.registry.column_list(),
            quote_ident(E::TABLE)
        ));
        stmt.push_where(&self.config.default_filters, filters, self.live_only(include_deleted));
        stmt.push_order(&self.config.default_ordering, ordering, E::PRIMARY_KEY);
        stmt.push_window(limit, offset);
        self.fetch(conn, stmt)
    }

    /// Runs the `COUNT(*)` twin of `select`. Expressions must already be validated.
    pub(crate) fn count_matching(
        &self,
        conn: &Connection,
        filters: &[Filter],
        include_deleted: bool,
    ) -> RepoResult<u64> {
        let mut stmt = Statement::new(format!("SELECT COUNT(*) FROM {}", quote_ident(E::TABLE)));
        stmt.push_where(&self.config.default_filters, filters, self.live_only(include_deleted));
        let total: i64 = conn.query_row(&stmt.sql, params_from_iter(stmt.binds), |row| row.get(0))?;
        u64::try_from(total).map_err(|_| RepoError::InvalidData(format!("negative count {total}")))
    }

    pub(crate) fn not_found(&self, id: &Value) -> RepoError {
        RepoError::NotFound {
            entity: E::NAME,
            id: display_value(id),
        }
    }

    fn insert_row(&self, conn: &Connection, payload: &Payload) -> RepoResult<E> {
        payload.validate_columns::<E>()?;

        let mut stmt = if payload.values().is_empty() {
            Statement::new(format!("INSERT INTO {} DEFAULT VALUES", quote_ident(E::TABLE)))
        } else {
            let columns = payload
                .values()
                .iter()
                .map(|(field, _)| quote_ident(field))
                .collect::<Vec<_>>();
            let placeholders = vec!["?"; columns.len()].join(", ");
            Statement::new(format!(
                "INSERT INTO {} ({}) VALUES ({placeholders})",
                quote_ident(E::TABLE),
                columns.join(", ")
            ))
        };
        stmt.binds
            .extend(payload.values().iter().map(|(_, value)| value.clone()));
        stmt.sql.push_str(&self.returning());

        let mut rows = self.fetch(conn, stmt)?;
        rows.pop()
            .ok_or_else(|| RepoError::InvalidData(format!("{} insert returned no row", E::NAME)))
    }

    fn update_rows(&self, conn: &Connection, filters: &[Filter], payload: &Payload) -> RepoResult<Vec<E>> {
        validate_expressions::<E>(filters, &[])?;
        payload.validate_columns::<E>()?;
        if payload.values().is_empty() {
            return Err(ParamError::EmptyPayload(E::NAME).into());
        }

        let assignments = payload
            .values()
            .iter()
            .map(|(field, _)| format!("{} = ?", quote_ident(field)))
            .collect::<Vec<_>>();
        let mut stmt = Statement::new(format!(
            "UPDATE {} SET {}",
            quote_ident(E::TABLE),
            assignments.join(", ")
        ));
        stmt.binds
            .extend(payload.values().iter().map(|(_, value)| value.clone()));
        stmt.push_where(&self.config.default_filters, filters, self.live_only(false));
        stmt.sql.push_str(&self.returning());
        self.fetch(conn, stmt)
    }

    fn tombstone_rows(&self, conn: &Connection, filters: &[Filter]) -> RepoResult<Vec<E>> {
        let field = self
            .config
            .soft_delete_field
            .as_deref()
            .ok_or(ParamError::SoftDeleteUnavailable(E::NAME))?;
        validate_expressions::<E>(filters, &[])?;

        let column = quote_ident(field);
        let mut stmt = Statement::new(format!(
            "UPDATE {} SET {column} = COALESCE({column}, {SOFT_DELETE_STAMP_SQL})",
            quote_ident(E::TABLE)
        ));
        stmt.push_where(&self.config.default_filters, filters, None);
        stmt.sql.push_str(&self.returning());
        self.fetch(conn, stmt)
    }

    pub(crate) fn fetch(&self, conn: &Connection, stmt: Statement) -> RepoResult<Vec<E>> {
        let execution = |err: rusqlite::Error| RepoError::from_write(E::NAME, err);
        let mut prepared = conn.prepare(&stmt.sql).map_err(execution)?;
        let mut rows = prepared
            .query(params_from_iter(stmt.binds))
            .map_err(execution)?;

        let mut items = Vec::new();
        while let Some(row) = rows.next().map_err(execution)? {
            let entity = E::from_row(row)
                .map_err(|err| RepoError::InvalidData(format!("{} row: {err}", E::NAME)))?;
            items.push(entity);
        }
        Ok(items)
    }

    fn single(&self, mut rows: Vec<E>, id: &Value) -> RepoResult<E> {
        rows.pop().ok_or_else(|| self.not_found(id))
    }

    pub(crate) fn returning(&self) -> String {
        format!(" RETURNING {}", self.registry.column_list())
    }

    fn live_only(&self, include_deleted: bool) -> Option<&str> {
        if include_deleted {
            None
        } else {
            self.config.soft_delete_field.as_deref()
        }
    }
}

fn table_exists(conn: &Connection, table: &str) -> RepoResult<bool> {
    let exists: i64 = conn.query_row(
        "SELECT EXISTS(
            SELECT 1
            FROM sqlite_master
            WHERE type = 'table' AND name = ?1
        );",
        [table],
        |row| row.get(0),
    )?;
    Ok(exists == 1)
}

fn table_columns(conn: &Connection, table: &str) -> RepoResult<Vec<String>> {
    let mut stmt = conn.prepare(&format!("PRAGMA table_info({});", quote_ident(table)))?;
    let mut rows = stmt.query([])?;
    let mut columns = Vec::new();
    while let Some(row) = rows.next()? {
        columns.push(row.get(1)?);
    }
    Ok(columns)
}
