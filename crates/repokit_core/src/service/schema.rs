//! Output shaping descriptors.

use crate::error::RepoResult;
use serde::Serialize;

/// Turns one entity into its response representation.
pub trait Schema<E> {
    type Output;

    fn render(&self, entity: E) -> RepoResult<Self::Output>;
}

/// Returns entities unchanged.
#[derive(Debug, Clone, Copy, Default)]
pub struct Raw;

impl<E> Schema<E> for Raw {
    type Output = E;

    fn render(&self, entity: E) -> RepoResult<E> {
        Ok(entity)
    }
}

/// Serializes entities into `serde_json::Value`.
#[derive(Debug, Clone, Copy, Default)]
pub struct Json;

impl<E: Serialize> Schema<E> for Json {
    type Output = serde_json::Value;

    fn render(&self, entity: E) -> RepoResult<serde_json::Value> {
        Ok(serde_json::to_value(&entity)?)
    }
}

/// Adapts an infallible function into a schema.
///
/// ```ignore
/// let summary = FnSchema(|article: Article| article.title);
/// ```
#[derive(Clone, Copy)]
pub struct FnSchema<F>(pub F);

impl<F> std::fmt::Debug for FnSchema<F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("FnSchema")
    }
}

impl<E, O, F> Schema<E> for FnSchema<F>
where
    F: Fn(E) -> O,
{
    type Output = O;

    fn render(&self, entity: E) -> RepoResult<O> {
        Ok((self.0)(entity))
    }
}

#[cfg(test)]
mod tests {
    use super::{FnSchema, Json, Raw, Schema};
    use serde::Serialize;

    #[derive(Debug, PartialEq, Serialize)]
    struct Item {
        id: i64,
        name: &'static str,
    }

    #[test]
    fn raw_is_identity() {
        let item = Item { id: 1, name: "a" };
        assert_eq!(Raw.render(item).unwrap(), Item { id: 1, name: "a" });
    }

    #[test]
    fn json_serializes_fields() {
        let value = Json.render(Item { id: 7, name: "x" }).unwrap();
        assert_eq!(value["id"], 7);
        assert_eq!(value["name"], "x");
    }

    #[test]
    fn fn_schema_applies_projection() {
        let schema = FnSchema(|item: Item| item.name.len());
        assert_eq!(schema.render(Item { id: 1, name: "abc" }).unwrap(), 3);
    }
}
