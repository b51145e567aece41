//! Shaped CRUD and relation sync over one repository.
//!
//! # Responsibility
//! - Delegate reads and writes to `Repository<E>`.
//! - Render single rows with the detail schema and collections with the list
//!   schema.
//! - Apply relation updates carried by write payloads.
//!
//! # Invariants
//! - A write and all of its relation updates share one savepoint; either
//!   every change lands or none does.
//! - Relation names and target types are checked before any statement runs.
//! - Relation updates attach to the key a write returns, not the key the
//!   caller passed in.

use crate::db::SavepointScope;
use crate::error::{ParamError, RepoResult};
use crate::model::entity::Entity;
use crate::model::payload::Payload;
use crate::model::query::{Filter, OrderBy, PaginationParams, QueryParams};
use crate::repo::insert::{ConflictTarget, UpdateColumns};
use crate::repo::pagination::Page;
use crate::repo::repository::Repository;
use crate::service::m2m::{self, ManyToManyRelation, SyncMode, SyncReport};
use crate::service::schema::Schema;
use rusqlite::types::Value;
use rusqlite::Connection;

const WRITE_SAVEPOINT: &str = "repokit_write";
const SYNC_SAVEPOINT: &str = "repokit_sync";

/// Output schemas and relation policy of a service.
#[derive(Debug, Clone)]
pub struct ServiceConfig<D, L> {
    pub detail_schema: D,
    pub list_schema: L,
    /// Mode used for relation updates carried by payloads.
    pub m2m_sync_mode: SyncMode,
}

impl<D: Clone> ServiceConfig<D, D> {
    /// Uses `detail_schema` for lists as well.
    pub fn new(detail_schema: D) -> Self {
        Self {
            list_schema: detail_schema.clone(),
            detail_schema,
            m2m_sync_mode: SyncMode::default(),
        }
    }
}

impl<D, L> ServiceConfig<D, L> {
    pub fn with_list_schema<L2>(self, list_schema: L2) -> ServiceConfig<D, L2> {
        ServiceConfig {
            detail_schema: self.detail_schema,
            list_schema,
            m2m_sync_mode: self.m2m_sync_mode,
        }
    }

    pub fn with_sync_mode(mut self, mode: SyncMode) -> Self {
        self.m2m_sync_mode = mode;
        self
    }
}

/// Repository plus output shaping and many-to-many sync.
pub struct RepositoryService<E, D, L> {
    repo: Repository<E>,
    config: ServiceConfig<D, L>,
    relations: Vec<ManyToManyRelation>,
}

impl<E, D, L> RepositoryService<E, D, L>
where
    E: Entity,
    D: Schema<E>,
    L: Schema<E>,
{
    /// Validates relation declarations; names must be unique and non-empty.
    pub fn new(
        repo: Repository<E>,
        config: ServiceConfig<D, L>,
        relations: impl IntoIterator<Item = ManyToManyRelation>,
    ) -> RepoResult<Self> {
        let relations = relations.into_iter().collect::<Vec<_>>();
        for (index, relation) in relations.iter().enumerate() {
            let reason = if relation.name.is_empty() {
                Some("relation name cannot be empty".to_string())
            } else if relations[..index].iter().any(|seen| seen.name == relation.name) {
                Some(format!("duplicate relation `{}`", relation.name))
            } else {
                None
            };
            if let Some(reason) = reason {
                return Err(ParamError::InvalidRegistry {
                    entity: E::NAME,
                    reason,
                }
                .into());
            }
        }

        Ok(Self {
            repo,
            config,
            relations,
        })
    }

    pub fn repository(&self) -> &Repository<E> {
        &self.repo
    }

    pub fn config(&self) -> &ServiceConfig<D, L> {
        &self.config
    }

    pub fn relations(&self) -> &[ManyToManyRelation] {
        &self.relations
    }

    /// `Repository::list_raw` rendered with the list schema.
    pub fn list_raw(
        &self,
        conn: &Connection,
        limit: Option<u64>,
        filters: &[Filter],
        ordering: &[OrderBy],
    ) -> RepoResult<Vec<L::Output>> {
        let rows = self.repo.list_raw(conn, limit, filters, ordering)?;
        self.render_list(rows)
    }

    pub fn list_raw_params(
        &self,
        conn: &Connection,
        params: &QueryParams<E>,
    ) -> RepoResult<Vec<L::Output>> {
        let rows = self.repo.list_raw_params(conn, params)?;
        self.render_list(rows)
    }

    pub fn paginate_params(
        &self,
        conn: &Connection,
        params: &PaginationParams<E>,
    ) -> RepoResult<Page<L::Output>> {
        let page = self.repo.paginate_params(conn, params)?;
        page.try_map(|row| self.config.list_schema.render(row))
    }

    /// Loads one live row by primary key; `NotFound` when absent.
    pub fn retrieve(&self, conn: &Connection, id: impl Into<Value>) -> RepoResult<D::Output> {
        let id = id.into();
        let row = self
            .repo
            .get(conn, id.clone(), false)?
            .ok_or_else(|| self.repo.not_found(&id))?;
        self.config.detail_schema.render(row)
    }

    pub fn retrieve_one_by(
        &self,
        conn: &Connection,
        filters: &[Filter],
        ordering: &[OrderBy],
    ) -> RepoResult<Option<D::Output>> {
        self.repo
            .retrieve_one_by(conn, filters, ordering, false)?
            .map(|row| self.config.detail_schema.render(row))
            .transpose()
    }

    /// Every live row matching `filters`, unbounded and unrendered.
    pub fn retrieve_all_raw_by(
        &self,
        conn: &Connection,
        filters: &[Filter],
        ordering: &[OrderBy],
    ) -> RepoResult<Vec<E>> {
        self.repo.list_raw(conn, None, filters, ordering)
    }

    /// Inserts a row and applies any relation updates in the payload.
    pub fn create(&self, conn: &Connection, payload: Payload) -> RepoResult<D::Output> {
        let (columns, relations) = self.split(payload)?;

        let scope = SavepointScope::begin(conn, WRITE_SAVEPOINT)?;
        let created = self.repo.create(conn, &columns)?;
        let owner = created.primary_key();
        self.apply_relations(conn, &owner, &relations)?;
        scope.release()?;

        self.config.detail_schema.render(created)
    }

    /// Updates a live row; a payload carrying only relation updates leaves
    /// the row's columns untouched.
    pub fn update(
        &self,
        conn: &Connection,
        id: impl Into<Value>,
        payload: Payload,
    ) -> RepoResult<D::Output> {
        let id = id.into();
        let (columns, relations) = self.split(payload)?;

        let scope = SavepointScope::begin(conn, WRITE_SAVEPOINT)?;
        let updated = if columns.values().is_empty() && !relations.is_empty() {
            self.repo
                .get(conn, id.clone(), false)?
                .ok_or_else(|| self.repo.not_found(&id))?
        } else {
            self.repo.update(conn, id.clone(), &columns)?
        };
        self.apply_relations(conn, &updated.primary_key(), &relations)?;
        scope.release()?;

        self.config.detail_schema.render(updated)
    }

    /// Updates every live row matching `filters`; relation updates apply to
    /// each of them.
    pub fn update_by(
        &self,
        conn: &Connection,
        filters: &[Filter],
        payload: Payload,
    ) -> RepoResult<Vec<L::Output>> {
        let (columns, relations) = self.split(payload)?;

        let scope = SavepointScope::begin(conn, WRITE_SAVEPOINT)?;
        let updated = if columns.values().is_empty() && !relations.is_empty() {
            self.repo.list_raw(conn, None, filters, &[])?
        } else {
            self.repo.update_by(conn, filters, &columns)?
        };
        for row in &updated {
            self.apply_relations(conn, &row.primary_key(), &relations)?;
        }
        scope.release()?;

        self.render_list(updated)
    }

    /// Inserts a row unless it collides with `target`; relation updates
    /// apply only to an inserted row.
    pub fn create_or_skip(
        &self,
        conn: &Connection,
        payload: Payload,
        target: &ConflictTarget,
    ) -> RepoResult<Option<D::Output>> {
        let (columns, relations) = self.split(payload)?;

        let scope = SavepointScope::begin(conn, WRITE_SAVEPOINT)?;
        let created = self.repo.create_or_skip(conn, &columns, target)?;
        if let Some(row) = &created {
            self.apply_relations(conn, &row.primary_key(), &relations)?;
        }
        scope.release()?;

        created
            .map(|row| self.config.detail_schema.render(row))
            .transpose()
    }

    /// Inserts or overwrites a row, then applies relation updates to the
    /// stored row's key.
    pub fn upsert(
        &self,
        conn: &Connection,
        payload: Payload,
        target: &ConflictTarget,
        update: &UpdateColumns,
    ) -> RepoResult<D::Output> {
        let (columns, relations) = self.split(payload)?;

        let scope = SavepointScope::begin(conn, WRITE_SAVEPOINT)?;
        let stored = self.repo.upsert(conn, &columns, target, update)?;
        self.apply_relations(conn, &stored.primary_key(), &relations)?;
        scope.release()?;

        self.config.detail_schema.render(stored)
    }

    pub fn delete(&self, conn: &Connection, id: impl Into<Value>) -> RepoResult<()> {
        self.repo.delete(conn, id)
    }

    /// Hard-deletes every row matching `filters`; returns the affected count.
    pub fn delete_by(&self, conn: &Connection, filters: &[Filter]) -> RepoResult<usize> {
        self.repo.delete_by(conn, filters)
    }

    pub fn soft_delete(&self, conn: &Connection, id: impl Into<Value>) -> RepoResult<D::Output> {
        let row = self.repo.soft_delete(conn, id)?;
        self.config.detail_schema.render(row)
    }

    pub fn soft_delete_by(
        &self,
        conn: &Connection,
        filters: &[Filter],
    ) -> RepoResult<Vec<L::Output>> {
        let rows = self.repo.soft_delete_by(conn, filters)?;
        self.render_list(rows)
    }

    /// Applies `targets` to one relation of a live owner.
    pub fn sync_relation<V: Into<Value>>(
        &self,
        conn: &Connection,
        owner_id: impl Into<Value>,
        relation: &str,
        targets: impl IntoIterator<Item = V>,
        mode: SyncMode,
    ) -> RepoResult<SyncReport> {
        let relation = self.relation(relation)?;
        let owner = owner_id.into();
        let targets = targets.into_iter().map(Into::into).collect::<Vec<_>>();
        let targets = m2m::check_targets(relation, &targets)?;

        let scope = SavepointScope::begin(conn, SYNC_SAVEPOINT)?;
        self.require_owner(conn, &owner)?;
        let report = m2m::sync(conn, relation, &owner, &targets, mode)?;
        scope.release()?;
        Ok(report)
    }

    /// Current targets of one relation, in ascending key order.
    pub fn related_ids(
        &self,
        conn: &Connection,
        owner_id: impl Into<Value>,
        relation: &str,
    ) -> RepoResult<Vec<Value>> {
        let relation = self.relation(relation)?;
        let owner = owner_id.into();
        self.require_owner(conn, &owner)?;
        m2m::related_ids(conn, relation, &owner)
    }

    fn relation(&self, name: &str) -> Result<&ManyToManyRelation, ParamError> {
        self.relations
            .iter()
            .find(|relation| relation.name == name)
            .ok_or_else(|| ParamError::UnknownRelation {
                entity: E::NAME,
                relation: name.to_string(),
            })
    }

    fn split(
        &self,
        payload: Payload,
    ) -> Result<(Payload, Vec<(&ManyToManyRelation, Vec<Value>)>), ParamError> {
        let (columns, updates) = payload.split_relations();
        let resolved = updates
            .into_iter()
            .map(|(name, targets)| {
                let relation = self.relation(&name)?;
                Ok((relation, m2m::check_targets(relation, &targets)?))
            })
            .collect::<Result<Vec<_>, ParamError>>()?;
        Ok((columns, resolved))
    }

    fn apply_relations(
        &self,
        conn: &Connection,
        owner: &Value,
        relations: &[(&ManyToManyRelation, Vec<Value>)],
    ) -> RepoResult<()> {
        for (relation, targets) in relations {
            m2m::sync(conn, relation, owner, targets, self.config.m2m_sync_mode)?;
        }
        Ok(())
    }

    fn require_owner(&self, conn: &Connection, owner: &Value) -> RepoResult<()> {
        match self.repo.get(conn, owner.clone(), false)? {
            Some(_) => Ok(()),
            None => Err(self.repo.not_found(owner)),
        }
    }

    fn render_list(&self, rows: Vec<E>) -> RepoResult<Vec<L::Output>> {
        rows.into_iter()
            .map(|row| self.config.list_schema.render(row))
            .collect()
    }
}

impl<E, D, L> std::fmt::Debug for RepositoryService<E, D, L> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let relations = self
            .relations
            .iter()
            .map(|relation| relation.name)
            .collect::<Vec<_>>();
        f.debug_struct("RepositoryService")
            .field("repo", &self.repo)
            .field("m2m_sync_mode", &self.config.m2m_sync_mode)
            .field("relations", &relations)
            .finish()
    }
}
