mod common;

use common::{articles, ids, insert_articles, open, Article};
use repokit_core::{
    build_repository, Filter, OrderBy, ParamError, QueryParams, RepoConfig, RepoError, Repository,
};

#[test]
fn list_raw_without_limit_ignores_default_limit() {
    let conn = open();
    insert_articles(&conn, &[("a", 1), ("b", 2), ("c", 3), ("d", 4)]);
    let repo: Repository<Article> =
        build_repository(RepoConfig::default().with_default_limit(2)).unwrap();

    let all = repo.list_raw(&conn, None, &[], &[]).unwrap();
    assert_eq!(all.len(), 4);

    let capped = repo.list_raw(&conn, Some(3), &[], &[]).unwrap();
    assert_eq!(capped.len(), 3);
}

#[test]
fn list_raw_params_applies_default_limit_only_when_unset() {
    let conn = open();
    insert_articles(&conn, &[("a", 1), ("b", 2), ("c", 3), ("d", 4)]);
    let repo: Repository<Article> =
        build_repository(RepoConfig::default().with_default_limit(2)).unwrap();

    let default = QueryParams::<Article>::builder().build().unwrap();
    assert_eq!(repo.list_raw_params(&conn, &default).unwrap().len(), 2);

    let bounded = QueryParams::<Article>::builder().limit(3).build().unwrap();
    assert_eq!(repo.list_raw_params(&conn, &bounded).unwrap().len(), 3);

    let zero = QueryParams::<Article>::builder().limit(0).build().unwrap();
    assert!(repo.list_raw_params(&conn, &zero).unwrap().is_empty());

    let unbounded = QueryParams::<Article>::builder().unbounded().build().unwrap();
    assert_eq!(repo.list_raw_params(&conn, &unbounded).unwrap().len(), 4);
}

#[test]
fn ordering_uses_primary_key_as_tiebreak() {
    let conn = open();
    let rows = insert_articles(&conn, &[("a", 5), ("b", 9), ("c", 5), ("d", 9), ("e", 1)]);

    let listed = articles()
        .list_raw(&conn, None, &[], &[OrderBy::desc("score")])
        .unwrap();
    assert_eq!(
        ids(&listed),
        vec![rows[1].id, rows[3].id, rows[0].id, rows[2].id, rows[4].id]
    );

    let by_id_desc = articles()
        .list_raw(&conn, None, &[], &[OrderBy::desc("id")])
        .unwrap();
    assert_eq!(by_id_desc.first().map(|article| article.id), Some(rows[4].id));
}

#[test]
fn filters_combine_conjunctively_with_explicit_groups() {
    let conn = open();
    insert_articles(
        &conn,
        &[("alpha", 10), ("beta", 20), ("gamma", 30), ("delta", 40)],
    );
    let repo = articles();

    let both = repo
        .list_raw(
            &conn,
            None,
            &[Filter::ge("score", 20_i64), Filter::like("title", "%a")],
            &[],
        )
        .unwrap();
    let titles = both.iter().map(|a| a.title.as_str()).collect::<Vec<_>>();
    assert_eq!(titles, vec!["beta", "gamma", "delta"]);

    let either = repo
        .list_raw(
            &conn,
            None,
            &[Filter::any([
                Filter::eq("title", "alpha".to_string()),
                Filter::gt("score", 35_i64),
            ])],
            &[OrderBy::asc("title")],
        )
        .unwrap();
    let titles = either.iter().map(|a| a.title.as_str()).collect::<Vec<_>>();
    assert_eq!(titles, vec!["alpha", "delta"]);

    let none = repo
        .list_raw(&conn, None, &[Filter::is_in("id", Vec::<i64>::new())], &[])
        .unwrap();
    assert!(none.is_empty());
}

#[test]
fn unknown_filter_field_fails_before_execution() {
    let conn = open();
    conn.execute_batch("DROP TABLE article_tags; DROP TABLE comments; DROP TABLE articles;")
        .unwrap();

    let err = articles()
        .list_raw(&conn, None, &[Filter::eq("author", 1_i64)], &[])
        .unwrap_err();
    assert!(matches!(
        err,
        RepoError::InvalidParameter(ParamError::UnknownField { .. })
    ));

    let err = articles().list_raw(&conn, None, &[], &[]).unwrap_err();
    assert!(matches!(err, RepoError::QueryExecution(_)));
}

#[test]
fn count_and_lookups() {
    let conn = open();
    let rows = insert_articles(&conn, &[("a", 10), ("b", 20), ("c", 30)]);
    let repo = articles();

    assert_eq!(repo.count(&conn, &[], false).unwrap(), 3);
    assert_eq!(repo.count(&conn, &[Filter::gt("score", 15_i64)], false).unwrap(), 2);

    let found = repo.get(&conn, rows[1].id, false).unwrap();
    assert_eq!(found.as_ref().map(|a| a.title.as_str()), Some("b"));
    assert!(repo.get(&conn, 999_i64, false).unwrap().is_none());

    let top = repo
        .retrieve_one_by(&conn, &[], &[OrderBy::desc("score")], false)
        .unwrap()
        .unwrap();
    assert_eq!(top.id, rows[2].id);
}

#[test]
fn verify_schema_reports_missing_column() {
    let conn = open();
    articles().verify_schema(&conn).unwrap();

    conn.execute_batch("ALTER TABLE articles DROP COLUMN deleted_at;")
        .unwrap();
    let err = articles().verify_schema(&conn).unwrap_err();
    assert!(matches!(
        err,
        RepoError::MissingColumn { ref column, .. } if column == "deleted_at"
    ));
}

#[test]
fn registry_must_declare_soft_delete_timestamp() {
    let err = build_repository::<Article>(RepoConfig::default().with_soft_delete("title"))
        .unwrap_err();
    assert!(matches!(
        err,
        RepoError::InvalidParameter(ParamError::InvalidRegistry { .. })
    ));
}

#[test]
fn default_ordering_precedes_caller_ordering() {
    let conn = open();
    let rows = insert_articles(&conn, &[("a", 2), ("b", 1), ("c", 2), ("d", 1)]);
    let config: RepoConfig = serde_json::from_str(
        r#"{ "default_limit": 10, "default_ordering": [{ "field": "score", "direction": "desc" }] }"#,
    )
    .unwrap();
    assert_eq!(config.default_ordering, vec![OrderBy::desc("score")]);
    let repo: Repository<Article> = build_repository(config).unwrap();

    let listed = repo
        .list_raw(&conn, None, &[], &[OrderBy::desc("title")])
        .unwrap();
    assert_eq!(
        ids(&listed),
        vec![rows[2].id, rows[0].id, rows[3].id, rows[1].id]
    );
}
