mod common;

use common::{articles, insert_articles, open, soft_articles, Comment};
use repokit_core::{
    build_repository, ConflictTarget, Filter, OrderBy, ParamError, Payload, QueryParams,
    RepoConfig, RepoError, Repository, UpdateColumns,
};

#[test]
fn create_update_and_delete_round_trip() {
    let conn = open();
    let repo = articles();

    let created = repo
        .create(
            &conn,
            &Payload::new()
                .set("title", "draft".to_string())
                .set("score", 3_i64),
        )
        .unwrap();
    assert_eq!(created.title, "draft");
    assert!(!created.published);

    let updated = repo
        .update(&conn, created.id, &Payload::new().set("published", true))
        .unwrap();
    assert!(updated.published);
    assert_eq!(updated.score, 3);

    repo.delete(&conn, created.id).unwrap();
    assert!(repo.get(&conn, created.id, true).unwrap().is_none());

    let err = repo.delete(&conn, created.id).unwrap_err();
    assert!(matches!(err, RepoError::NotFound { entity: "article", .. }));
}

#[test]
fn bulk_update_and_delete_by_filters() {
    let conn = open();
    insert_articles(&conn, &[("a", 1), ("b", 2), ("c", 3), ("d", 4)]);
    let repo = articles();

    let bumped = repo
        .update_by(
            &conn,
            &[Filter::le("score", 2_i64)],
            &Payload::new().set("score", 100_i64),
        )
        .unwrap();
    assert_eq!(bumped.len(), 2);
    assert!(bumped.iter().all(|article| article.score == 100));

    let removed = repo.delete_by(&conn, &[Filter::eq("score", 100_i64)]).unwrap();
    assert_eq!(removed, 2);
    assert_eq!(repo.count(&conn, &[], false).unwrap(), 2);
}

#[test]
fn payload_is_validated_against_registry() {
    let conn = open();
    let repo = articles();

    let err = repo
        .create(&conn, &Payload::new().set("author", "x".to_string()))
        .unwrap_err();
    assert!(matches!(
        err,
        RepoError::InvalidParameter(ParamError::UnknownField { .. })
    ));

    let err = repo
        .create(&conn, &Payload::new().set("score", "high".to_string()))
        .unwrap_err();
    assert!(matches!(
        err,
        RepoError::InvalidParameter(ParamError::TypeMismatch { .. })
    ));

    let err = repo.update(&conn, 1_i64, &Payload::new()).unwrap_err();
    assert!(matches!(
        err,
        RepoError::InvalidParameter(ParamError::EmptyPayload("article"))
    ));

    let err = repo
        .create(&conn, &Payload::new().relate("tags", [1_i64]))
        .unwrap_err();
    assert!(matches!(
        err,
        RepoError::InvalidParameter(ParamError::UnexpectedRelations("article"))
    ));
}

#[test]
fn constraint_failures_are_translated() {
    let conn = open();
    let rows = insert_articles(&conn, &[("unique", 1)]);
    let repo = articles();

    let err = repo
        .create(&conn, &Payload::new().set("title", "unique".to_string()))
        .unwrap_err();
    assert!(matches!(err, RepoError::AlreadyExists { entity: "article", .. }));

    let comments: Repository<Comment> = build_repository(RepoConfig::default()).unwrap();
    let err = comments
        .create(
            &conn,
            &Payload::new()
                .set("article_id", 404_i64)
                .set("body", "orphan".to_string()),
        )
        .unwrap_err();
    assert!(matches!(err, RepoError::RelatedNotFound { entity: "comment", .. }));

    let comment = comments
        .create(
            &conn,
            &Payload::new()
                .set("article_id", rows[0].id)
                .set("body", "kept".to_string()),
        )
        .unwrap();
    assert_eq!(comment.article_id, rows[0].id);
}

#[test]
fn update_of_missing_row_is_not_found() {
    let conn = open();
    let err = articles()
        .update(&conn, 77_i64, &Payload::new().set("score", 1_i64))
        .unwrap_err();
    assert!(matches!(err, RepoError::NotFound { ref id, .. } if id == "77"));
}

#[test]
fn soft_deleted_rows_are_hidden_unless_requested() {
    let conn = open();
    let rows = insert_articles(&conn, &[("a", 1), ("b", 2), ("c", 3)]);
    let repo = soft_articles();

    let tombstoned = repo.soft_delete(&conn, rows[1].id).unwrap();
    let stamp = tombstoned.deleted_at.unwrap();
    assert!(stamp > 0);

    assert_eq!(repo.count(&conn, &[], false).unwrap(), 2);
    assert!(repo.get(&conn, rows[1].id, false).unwrap().is_none());
    assert!(repo.get(&conn, rows[1].id, true).unwrap().is_some());

    let with_deleted = QueryParams::<common::Article>::builder().include_deleted(true).build().unwrap();
    assert_eq!(repo.list_raw_params(&conn, &with_deleted).unwrap().len(), 3);

    let err = repo
        .update(&conn, rows[1].id, &Payload::new().set("score", 9_i64))
        .unwrap_err();
    assert!(matches!(err, RepoError::NotFound { .. }));

    let again = repo.soft_delete(&conn, rows[1].id).unwrap();
    assert_eq!(again.deleted_at, Some(stamp));
}

#[test]
fn soft_delete_requires_configured_field() {
    let conn = open();
    let rows = insert_articles(&conn, &[("a", 1)]);
    let err = articles().soft_delete(&conn, rows[0].id).unwrap_err();
    assert!(matches!(
        err,
        RepoError::InvalidParameter(ParamError::SoftDeleteUnavailable("article"))
    ));
}

#[test]
fn bulk_create_inserts_every_row_in_one_call() {
    let conn = open();
    let repo = articles();

    let mut created = repo
        .bulk_create(
            &conn,
            &[
                Payload::new().set("title", "a".to_string()).set("score", 1_i64),
                Payload::new().set("score", 2_i64).set("title", "b".to_string()),
            ],
        )
        .unwrap();
    created.sort_by_key(|article| article.id);
    let titles = created.iter().map(|a| (a.title.as_str(), a.score)).collect::<Vec<_>>();
    assert_eq!(titles, vec![("a", 1), ("b", 2)]);
    assert!(repo.bulk_create(&conn, &[]).unwrap().is_empty());

    let err = repo
        .bulk_create(
            &conn,
            &[
                Payload::new().set("title", "c".to_string()),
                Payload::new().set("score", 3_i64),
            ],
        )
        .unwrap_err();
    assert!(matches!(
        err,
        RepoError::InvalidParameter(ParamError::MismatchedBatch { index: 1, .. })
    ));

    let err = repo
        .bulk_create(
            &conn,
            &[
                Payload::new().set("title", "d".to_string()),
                Payload::new().set("title", "a".to_string()),
            ],
        )
        .unwrap_err();
    assert!(matches!(err, RepoError::AlreadyExists { .. }));
    assert_eq!(repo.count(&conn, &[], false).unwrap(), 2);
}

#[test]
fn upsert_inserts_then_overwrites_selected_columns() {
    let conn = open();
    let repo = articles();
    let by_title = ConflictTarget::columns(["title"]);

    let inserted = repo
        .upsert(
            &conn,
            &Payload::new().set("title", "a".to_string()).set("score", 1_i64),
            &by_title,
            &UpdateColumns::All,
        )
        .unwrap();

    let overwritten = repo
        .upsert(
            &conn,
            &Payload::new()
                .set("title", "a".to_string())
                .set("score", 9_i64)
                .set("published", true),
            &by_title,
            &UpdateColumns::only(["score"]),
        )
        .unwrap();
    assert_eq!(overwritten.id, inserted.id);
    assert_eq!(overwritten.score, 9);
    assert!(!overwritten.published);

    let by_key = repo
        .upsert(
            &conn,
            &Payload::new()
                .set("id", inserted.id)
                .set("title", "renamed".to_string())
                .set("score", 4_i64),
            &ConflictTarget::primary_key(),
            &UpdateColumns::except(["title"]),
        )
        .unwrap();
    assert_eq!((by_key.title.as_str(), by_key.score), ("a", 4));
    assert_eq!(repo.count(&conn, &[], false).unwrap(), 1);

    let err = repo
        .upsert(
            &conn,
            &Payload::new().set("title", "a".to_string()),
            &by_title,
            &UpdateColumns::except(["title"]),
        )
        .unwrap_err();
    assert!(matches!(
        err,
        RepoError::InvalidParameter(ParamError::EmptyUpdateSet("article"))
    ));

    let err = repo
        .upsert(
            &conn,
            &Payload::new().set("title", "a".to_string()),
            &ConflictTarget::columns(["slug"]),
            &UpdateColumns::All,
        )
        .unwrap_err();
    assert!(matches!(
        err,
        RepoError::InvalidParameter(ParamError::UnknownField { ref field, .. }) if field == "slug"
    ));
}

#[test]
fn create_or_skip_returns_none_on_conflict() {
    let conn = open();
    let rows = insert_articles(&conn, &[("taken", 1)]);
    let repo = soft_articles();
    let by_title = ConflictTarget::columns(["title"]);

    let fresh = repo
        .create_or_skip(&conn, &Payload::new().set("title", "fresh".to_string()), &by_title)
        .unwrap();
    assert_eq!(fresh.map(|a| a.title), Some("fresh".to_string()));

    repo.soft_delete(&conn, rows[0].id).unwrap();
    let skipped = repo
        .create_or_skip(
            &conn,
            &Payload::new().set("title", "taken".to_string()).set("score", 5_i64),
            &by_title,
        )
        .unwrap();
    assert!(skipped.is_none());
    assert_eq!(repo.count(&conn, &[], true).unwrap(), 2);
}

#[test]
fn tombstoned_rows_are_counted_and_found_on_request() {
    let conn = open();
    let rows = insert_articles(&conn, &[("a", 1), ("b", 2)]);
    let repo = soft_articles();
    repo.soft_delete(&conn, rows[0].id).unwrap();

    assert_eq!(repo.count(&conn, &[], false).unwrap(), 1);
    assert_eq!(repo.count(&conn, &[], true).unwrap(), 2);

    let by_title = [Filter::eq("title", "a".to_string())];
    assert!(repo.retrieve_one_by(&conn, &by_title, &[], false).unwrap().is_none());
    let found = repo.retrieve_one_by(&conn, &by_title, &[], true).unwrap().unwrap();
    assert_eq!(found.id, rows[0].id);
    assert!(found.deleted_at.is_some());
}

#[test]
fn default_filters_scope_every_statement() {
    let conn = open();
    let rows = insert_articles(&conn, &[("a", 1), ("b", 2), ("c", 3), ("d", 4)]);
    let repo: Repository<common::Article> = build_repository(
        RepoConfig::default()
            .with_default_filters([Filter::eq("published", true)])
            .with_default_ordering([OrderBy::desc("score")]),
    )
    .unwrap();

    let listed = repo.list_raw(&conn, None, &[], &[]).unwrap();
    assert_eq!(common::ids(&listed), vec![rows[3].id, rows[1].id]);
    assert_eq!(repo.count(&conn, &[], false).unwrap(), 2);
    assert!(repo.get(&conn, rows[0].id, false).unwrap().is_none());

    let bumped = repo
        .update_by(&conn, &[Filter::ge("score", 2_i64)], &Payload::new().set("score", 50_i64))
        .unwrap();
    assert_eq!(bumped.len(), 2);
    assert_eq!(repo.delete_by(&conn, &[]).unwrap(), 2);

    let remaining = articles().list_raw(&conn, None, &[], &[]).unwrap();
    assert_eq!(common::ids(&remaining), vec![rows[0].id, rows[2].id]);
    assert_eq!(remaining[1].score, 3);
}

#[test]
fn invalid_default_filters_are_rejected_at_build() {
    let err = build_repository::<common::Article>(
        RepoConfig::default().with_default_filters([Filter::eq("author", 1_i64)]),
    )
    .unwrap_err();
    assert!(matches!(
        err,
        RepoError::InvalidParameter(ParamError::UnknownField { .. })
    ));
}
