//! SQL text assembly for listing, counting and writes.
//!
//! # Invariants
//! - Identifiers come from static registries and are always quoted.
//! - Every caller-provided value is bound as a parameter, never inlined.
//! - Ordering always ends with the primary key, so windows are reproducible.

use crate::error::ParamError;
use crate::model::field::quote_ident;
use crate::model::query::{Direction, Filter, FilterOp, Operand, OrderBy};
use rusqlite::types::Value;

/// SQL text plus its positional bind values.
#[derive(Debug, Default)]
pub(crate) struct Statement {
    pub sql: String,
    pub binds: Vec<Value>,
}

impl Statement {
    pub(crate) fn new(sql: impl Into<String>) -> Self {
        Self {
            sql: sql.into(),
            binds: Vec::new(),
        }
    }

    /// Appends ` WHERE ...` for `defaults` then `filters`, ANDed with the
    /// soft-delete guard.
    pub(crate) fn push_where(
        &mut self,
        defaults: &[Filter],
        filters: &[Filter],
        live_only: Option<&str>,
    ) {
        let mut clauses = Vec::with_capacity(defaults.len() + filters.len() + 1);
        if let Some(field) = live_only {
            clauses.push(format!("{} IS NULL", quote_ident(field)));
        }
        for filter in defaults.iter().chain(filters) {
            clauses.push(compile_filter(filter, &mut self.binds));
        }

        if !clauses.is_empty() {
            self.sql.push_str(" WHERE ");
            self.sql.push_str(&clauses.join(" AND "));
        }
    }

    /// Appends ` ORDER BY ...` for `defaults` then `ordering`, adding
    /// `primary_key ASC` as the tiebreak.
    pub(crate) fn push_order(
        &mut self,
        defaults: &[OrderBy],
        ordering: &[OrderBy],
        primary_key: &str,
    ) {
        let ordering = defaults.iter().chain(ordering).collect::<Vec<_>>();
        let mut keys = ordering
            .iter()
            .map(|order| format!("{} {}", quote_ident(&order.field), order.direction.as_sql()))
            .collect::<Vec<_>>();
        if !ordering.iter().any(|order| order.field == primary_key) {
            keys.push(format!(
                "{} {}",
                quote_ident(primary_key),
                Direction::Asc.as_sql()
            ));
        }

        self.sql.push_str(" ORDER BY ");
        self.sql.push_str(&keys.join(", "));
    }

    /// Appends ` LIMIT ? OFFSET ?`; `None` means no cap.
    pub(crate) fn push_window(&mut self, limit: Option<i64>, offset: i64) {
        match limit {
            Some(limit) => {
                self.sql.push_str(" LIMIT ?");
                self.binds.push(Value::Integer(limit));
                if offset > 0 {
                    self.sql.push_str(" OFFSET ?");
                    self.binds.push(Value::Integer(offset));
                }
            }
            None if offset > 0 => {
                self.sql.push_str(" LIMIT -1 OFFSET ?");
                self.binds.push(Value::Integer(offset));
            }
            None => {}
        }
    }
}

/// Converts a window bound to SQLite's signed integer range.
pub(crate) fn sql_int(name: &'static str, value: u64) -> Result<i64, ParamError> {
    i64::try_from(value).map_err(|_| ParamError::OutOfRange { name, value })
}

fn compile_filter(filter: &Filter, binds: &mut Vec<Value>) -> String {
    match filter {
        Filter::Any(members) => compile_group(members, " OR ", "0 = 1", binds),
        Filter::All(members) => compile_group(members, " AND ", "1 = 1", binds),
        Filter::Condition { field, op, operand } => {
            let column = quote_ident(field);
            match (op, operand) {
                (FilterOp::IsNull | FilterOp::IsNotNull, _) => {
                    format!("{column} {}", op.as_sql())
                }
                (FilterOp::In, Operand::List(values)) if values.is_empty() => "0 = 1".to_string(),
                (FilterOp::NotIn, Operand::List(values)) if values.is_empty() => {
                    "1 = 1".to_string()
                }
                (_, Operand::List(values)) => {
                    binds.extend(values.iter().cloned());
                    let placeholders = vec!["?"; values.len()].join(", ");
                    format!("{column} {} ({placeholders})", op.as_sql())
                }
                (_, Operand::Value(value)) => {
                    binds.push(value.clone());
                    format!("{column} {} ?", op.as_sql())
                }
                (_, Operand::None) => format!("{column} IS NULL"),
            }
        }
    }
}

fn compile_group(
    members: &[Filter],
    joiner: &str,
    empty: &str,
    binds: &mut Vec<Value>,
) -> String {
    if members.is_empty() {
        return empty.to_string();
    }
    let parts = members
        .iter()
        .map(|member| compile_filter(member, binds))
        .collect::<Vec<_>>();
    format!("({})", parts.join(joiner))
}

#[cfg(test)]
mod tests {
    use super::{sql_int, Statement};
    use crate::error::ParamError;
    use crate::model::query::{Filter, OrderBy};
    use rusqlite::types::Value;

    #[test]
    fn where_clause_binds_values_in_order() {
        let mut stmt = Statement::new("SELECT 1 FROM t");
        stmt.push_where(
            &[Filter::gt("score", 10_i64)],
            &[
                Filter::any([
                    Filter::is_in("kind", ["a".to_string(), "b".to_string()]),
                    Filter::is_null("kind"),
                ]),
            ],
            Some("deleted_at"),
        );
        assert_eq!(
            stmt.sql,
            r#"SELECT 1 FROM t WHERE "deleted_at" IS NULL AND "score" > ? AND ("kind" IN (?, ?) OR "kind" IS NULL)"#
        );
        assert_eq!(
            stmt.binds,
            vec![
                Value::Integer(10),
                Value::Text("a".to_string()),
                Value::Text("b".to_string())
            ]
        );
    }

    #[test]
    fn empty_groups_and_lists_have_fixed_truth_values() {
        let mut stmt = Statement::new("SELECT 1 FROM t");
        stmt.push_where(
            &[],
            &[
                Filter::any([]),
                Filter::all([]),
                Filter::is_in("id", Vec::<i64>::new()),
                Filter::not_in("id", Vec::<i64>::new()),
            ],
            None,
        );
        assert_eq!(
            stmt.sql,
            "SELECT 1 FROM t WHERE 0 = 1 AND 1 = 1 AND 0 = 1 AND 1 = 1"
        );
        assert!(stmt.binds.is_empty());
    }

    #[test]
    fn ordering_appends_primary_key_tiebreak_once() {
        let mut stmt = Statement::new("");
        stmt.push_order(&[OrderBy::desc("score")], &[OrderBy::asc("title")], "id");
        assert_eq!(stmt.sql, r#" ORDER BY "score" DESC, "title" ASC, "id" ASC"#);

        let mut explicit = Statement::new("");
        explicit.push_order(&[], &[OrderBy::desc("id")], "id");
        assert_eq!(explicit.sql, r#" ORDER BY "id" DESC"#);
    }

    #[test]
    fn unbounded_window_with_offset_uses_negative_limit() {
        let mut stmt = Statement::new("");
        stmt.push_window(None, 5);
        assert_eq!(stmt.sql, " LIMIT -1 OFFSET ?");
        assert_eq!(stmt.binds, vec![Value::Integer(5)]);
    }

    #[test]
    fn window_bounds_must_fit_sqlite_integers() {
        assert_eq!(sql_int("limit", 7).unwrap(), 7);
        assert!(matches!(
            sql_int("limit", u64::MAX),
            Err(ParamError::OutOfRange { name: "limit", .. })
        ));
    }
}
