//! Service layer over repositories.
//!
//! # Responsibility
//! - Shape rows into detail or list representations.
//! - Keep many-to-many association tables in sync with write payloads.
//!
//! # Invariants
//! - Schema choice depends only on call cardinality, never on row contents.
//! - Every multi-statement write runs inside one savepoint.

pub mod m2m;
pub mod repository_service;
pub mod schema;
