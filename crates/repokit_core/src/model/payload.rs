//! Write payloads for create/update operations.
//!
//! # Invariants
//! - Column values are kept in insertion order; setting a field twice keeps
//!   the last value.
//! - Relation updates travel with the payload but are never written by a bare
//!   repository; a service splits them off first.

use crate::error::ParamError;
use crate::model::entity::Entity;
use rusqlite::types::Value;

/// Column values plus optional many-to-many membership updates.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Payload {
    values: Vec<(String, Value)>,
    relations: Vec<(String, Vec<Value>)>,
}

impl Payload {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets one column value.
    pub fn set(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        let field = field.into();
        let value = value.into();
        match self.values.iter_mut().find(|(name, _)| *name == field) {
            Some(slot) => slot.1 = value,
            None => self.values.push((field, value)),
        }
        self
    }

    /// Sets the membership of `relation` to `targets` (per the service's sync mode).
    pub fn relate<V: Into<Value>>(
        mut self,
        relation: impl Into<String>,
        targets: impl IntoIterator<Item = V>,
    ) -> Self {
        let relation = relation.into();
        let targets = targets.into_iter().map(Into::into).collect::<Vec<_>>();
        match self.relations.iter_mut().find(|(name, _)| *name == relation) {
            Some(slot) => slot.1 = targets,
            None => self.relations.push((relation, targets)),
        }
        self
    }

    pub fn values(&self) -> &[(String, Value)] {
        &self.values
    }

    pub fn relations(&self) -> &[(String, Vec<Value>)] {
        &self.relations
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty() && self.relations.is_empty()
    }

    /// Separates column values from relation updates.
    pub fn split_relations(self) -> (Payload, Vec<(String, Vec<Value>)>) {
        let columns = Payload {
            values: self.values,
            relations: Vec::new(),
        };
        (columns, self.relations)
    }

    /// Validates column names and value types against `E`.
    ///
    /// `NULL` is accepted for any declared field; the database enforces
    /// `NOT NULL` constraints.
    pub(crate) fn validate_columns<E: Entity>(&self) -> Result<(), ParamError> {
        if !self.relations.is_empty() {
            return Err(ParamError::UnexpectedRelations(E::NAME));
        }

        let registry = E::registry();
        for (field, value) in &self.values {
            let def = registry.require(field)?;
            if !matches!(value, Value::Null) && !def.ty.accepts(value) {
                return Err(ParamError::TypeMismatch {
                    field: field.clone(),
                    expected: def.ty,
                });
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::Payload;
    use rusqlite::types::Value;

    #[test]
    fn set_overwrites_existing_value() {
        let payload = Payload::new()
            .set("title", "draft".to_string())
            .set("title", "final".to_string());
        assert_eq!(
            payload.values(),
            &[("title".to_string(), Value::Text("final".to_string()))]
        );
    }

    #[test]
    fn split_relations_moves_membership_out() {
        let payload = Payload::new()
            .set("title", "x".to_string())
            .relate("tags", [1_i64, 2]);
        let (columns, relations) = payload.split_relations();
        assert!(columns.relations().is_empty());
        assert_eq!(columns.values().len(), 1);
        assert_eq!(relations[0].0, "tags");
        assert_eq!(relations[0].1, vec![Value::Integer(1), Value::Integer(2)]);
    }
}
