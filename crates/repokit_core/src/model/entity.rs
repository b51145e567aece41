//! Entity contract consumed by repositories.

use crate::model::field::{FieldDef, FieldRegistry};
use rusqlite::types::Value;
use rusqlite::Row;

/// A row type mapped onto one table.
///
/// Implementors declare their columns once in `FIELDS`; repositories and
/// parameter builders validate field names and operators against it.
///
/// ```ignore
/// impl Entity for Article {
///     const NAME: &'static str = "article";
///     const TABLE: &'static str = "articles";
///     const PRIMARY_KEY: &'static str = "id";
///     const FIELDS: &'static [FieldDef] = &[
///         FieldDef::new("id", FieldType::Integer),
///         FieldDef::new("title", FieldType::Text),
///     ];
///     // ...
/// }
/// ```
pub trait Entity: Sized {
    /// Human-readable name used in errors and log lines.
    const NAME: &'static str;
    const TABLE: &'static str;
    /// Unique column used for lookups and as the ordering tiebreak.
    const PRIMARY_KEY: &'static str;
    const FIELDS: &'static [FieldDef];

    /// Builds an entity from a row selected with every column in `FIELDS`.
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self>;

    fn primary_key(&self) -> Value;

    fn registry() -> FieldRegistry {
        FieldRegistry::new(Self::NAME, Self::FIELDS)
    }
}

/// Renders a key value for error messages.
pub(crate) fn display_value(value: &Value) -> String {
    match value {
        Value::Null => "NULL".to_string(),
        Value::Integer(number) => number.to_string(),
        Value::Real(number) => number.to_string(),
        Value::Text(text) => text.clone(),
        Value::Blob(bytes) => format!("<{} bytes>", bytes.len()),
    }
}
