//! Query parameter model and entity contracts.
//!
//! # Responsibility
//! - Describe entity types through a statically declared field registry.
//! - Provide immutable, validated parameter objects for listing and paging.
//!
//! # Invariants
//! - Parameter objects are validated once, at construction.
//! - Validation consults only static registries, never the live database.

pub mod entity;
pub mod field;
pub mod payload;
pub mod query;
