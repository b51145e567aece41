//! Static field registry for entity types.
//!
//! # Invariants
//! - A registry is a `'static` slice declared next to the entity type.
//! - Lookups are by exact column name.

use crate::error::ParamError;
use crate::model::query::FilterOp;
use rusqlite::types::Value;
use std::collections::HashSet;
use std::fmt::{Display, Formatter};

/// Declared storage type of one entity field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldType {
    Integer,
    Real,
    Text,
    /// Stored as integer `0`/`1`.
    Boolean,
    /// Unix epoch milliseconds stored as integer.
    Timestamp,
    Blob,
}

impl FieldType {
    /// Returns whether `op` may be applied to a field of this type.
    pub fn supports(self, op: FilterOp) -> bool {
        match op {
            FilterOp::IsNull | FilterOp::IsNotNull => true,
            FilterOp::Eq | FilterOp::Ne => true,
            FilterOp::In | FilterOp::NotIn => self != Self::Blob,
            FilterOp::Lt | FilterOp::Le | FilterOp::Gt | FilterOp::Ge => matches!(
                self,
                Self::Integer | Self::Real | Self::Text | Self::Timestamp
            ),
            FilterOp::Like => self == Self::Text,
        }
    }

    /// Returns whether `value` can be stored in / compared with this type.
    pub fn accepts(self, value: &Value) -> bool {
        match (self, value) {
            (Self::Integer | Self::Timestamp, Value::Integer(_)) => true,
            (Self::Boolean, Value::Integer(flag)) => *flag == 0 || *flag == 1,
            (Self::Real, Value::Real(_) | Value::Integer(_)) => true,
            (Self::Text, Value::Text(_)) => true,
            (Self::Blob, Value::Blob(_)) => true,
            _ => false,
        }
    }
}

impl Display for FieldType {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Integer => "integer",
            Self::Real => "real",
            Self::Text => "text",
            Self::Boolean => "boolean",
            Self::Timestamp => "timestamp",
            Self::Blob => "blob",
        };
        f.write_str(name)
    }
}

/// One declared column of an entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldDef {
    pub name: &'static str,
    pub ty: FieldType,
}

impl FieldDef {
    pub const fn new(name: &'static str, ty: FieldType) -> Self {
        Self { name, ty }
    }
}

/// Read-only view over an entity's declared fields.
#[derive(Debug, Clone, Copy)]
pub struct FieldRegistry {
    entity: &'static str,
    fields: &'static [FieldDef],
}

impl FieldRegistry {
    pub const fn new(entity: &'static str, fields: &'static [FieldDef]) -> Self {
        Self { entity, fields }
    }

    pub fn entity(&self) -> &'static str {
        self.entity
    }

    pub fn fields(&self) -> &'static [FieldDef] {
        self.fields
    }

    pub fn get(&self, name: &str) -> Option<&'static FieldDef> {
        self.fields.iter().find(|field| field.name == name)
    }

    /// Resolves `name` or fails with `UnknownField`.
    pub fn require(&self, name: &str) -> Result<&'static FieldDef, ParamError> {
        self.get(name).ok_or_else(|| ParamError::UnknownField {
            entity: self.entity,
            field: name.to_string(),
        })
    }

    /// Comma-separated quoted column list in declaration order.
    pub fn column_list(&self) -> String {
        self.fields
            .iter()
            .map(|field| quote_ident(field.name))
            .collect::<Vec<_>>()
            .join(", ")
    }

    /// Checks the registry is usable for `primary_key`.
    pub fn validate(&self, primary_key: &str) -> Result<(), ParamError> {
        if self.fields.is_empty() {
            return Err(self.invalid("no fields declared"));
        }

        let mut seen = HashSet::new();
        for field in self.fields {
            if field.name.is_empty() {
                return Err(self.invalid("empty field name"));
            }
            if !seen.insert(field.name) {
                return Err(self.invalid(format!("duplicate field `{}`", field.name)));
            }
        }

        if self.get(primary_key).is_none() {
            return Err(self.invalid(format!("primary key `{primary_key}` is not declared")));
        }
        Ok(())
    }

    fn invalid(&self, reason: impl Into<String>) -> ParamError {
        ParamError::InvalidRegistry {
            entity: self.entity,
            reason: reason.into(),
        }
    }
}

/// Quotes a SQL identifier. Only registry names ever reach this.
pub(crate) fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}
