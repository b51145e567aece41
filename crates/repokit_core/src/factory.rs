//! Construction helpers for application wiring.

use crate::error::RepoResult;
use crate::model::entity::Entity;
use crate::repo::repository::{RepoConfig, Repository};
use crate::service::m2m::ManyToManyRelation;
use crate::service::repository_service::{RepositoryService, ServiceConfig};
use crate::service::schema::Schema;

/// Builds a repository for `E`, validating its field registry and `config`.
pub fn build_repository<E: Entity>(config: RepoConfig) -> RepoResult<Repository<E>> {
    Repository::new(config)
}

/// Wraps `repo` in a service with the given schemas and relations.
pub fn build_service<E, D, L>(
    repo: Repository<E>,
    config: ServiceConfig<D, L>,
    relations: impl IntoIterator<Item = ManyToManyRelation>,
) -> RepoResult<RepositoryService<E, D, L>>
where
    E: Entity,
    D: Schema<E>,
    L: Schema<E>,
{
    let service = RepositoryService::new(repo, config, relations)?;
    log::info!(
        "event=service_built module=factory status=ok entity={} relations={}",
        E::NAME,
        service.relations().len()
    );
    Ok(service)
}
