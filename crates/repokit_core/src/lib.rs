//! Generic repositories and services over SQLite.
//!
//! Entities declare a static field registry; repositories turn validated
//! filter/ordering/window parameters into bounded statements, pagination adds
//! totals, and services shape output and keep many-to-many tables in sync.

pub mod db;
pub mod error;
pub mod factory;
pub mod logging;
pub mod model;
pub mod repo;
pub mod service;

pub use db::{open_db, open_db_in_memory, DbError, DbResult, Migration};
pub use error::{ParamError, RepoError, RepoResult};
pub use factory::{build_repository, build_service};
pub use logging::{default_log_level, init_logging, logging_status, LoggingError, LoggingStatus};
pub use model::entity::Entity;
pub use model::field::{FieldDef, FieldRegistry, FieldType};
pub use model::payload::Payload;
pub use model::query::{
    Direction, Filter, FilterOp, Limit, Operand, OrderBy, PaginationParams,
    PaginationParamsBuilder, QueryParams, QueryParamsBuilder, DEFAULT_PAGE_SIZE,
};
pub use repo::insert::{ConflictTarget, UpdateColumns};
pub use repo::pagination::{Page, PageMeta};
pub use repo::repository::{RepoConfig, Repository, DEFAULT_LIMIT};
pub use service::m2m::{ManyToManyRelation, SyncMode, SyncReport};
pub use service::repository_service::{RepositoryService, ServiceConfig};
pub use service::schema::{FnSchema, Json, Raw, Schema};

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
