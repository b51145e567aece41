#![allow(dead_code)]

use repokit_core::{
    build_repository, open_db_in_memory, Entity, FieldDef, FieldType, ManyToManyRelation,
    Migration, Payload, RepoConfig, Repository,
};
use rusqlite::types::Value;
use rusqlite::{Connection, Row};
use serde::Serialize;

pub const MIGRATIONS: &[Migration] = &[
    Migration::new(
        1,
        "CREATE TABLE articles (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            title TEXT NOT NULL UNIQUE,
            score INTEGER NOT NULL DEFAULT 0,
            published INTEGER NOT NULL DEFAULT 0,
            deleted_at INTEGER NULL
        );
        CREATE TABLE tags (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL UNIQUE
        );",
    ),
    Migration::new(
        2,
        "CREATE TABLE article_tags (
            article_id INTEGER NOT NULL REFERENCES articles(id) ON DELETE CASCADE,
            tag_id INTEGER NOT NULL REFERENCES tags(id) ON DELETE CASCADE,
            PRIMARY KEY (article_id, tag_id)
        );
        CREATE TABLE comments (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            article_id INTEGER NOT NULL REFERENCES articles(id),
            body TEXT NOT NULL
        );",
    ),
];

pub const ARTICLE_TAGS: ManyToManyRelation =
    ManyToManyRelation::new("tags", "article_tags", "article_id", "tag_id", "tags", "id");

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Article {
    pub id: i64,
    pub title: String,
    pub score: i64,
    pub published: bool,
    pub deleted_at: Option<i64>,
}

impl Entity for Article {
    const NAME: &'static str = "article";
    const TABLE: &'static str = "articles";
    const PRIMARY_KEY: &'static str = "id";
    const FIELDS: &'static [FieldDef] = &[
        FieldDef::new("id", FieldType::Integer),
        FieldDef::new("title", FieldType::Text),
        FieldDef::new("score", FieldType::Integer),
        FieldDef::new("published", FieldType::Boolean),
        FieldDef::new("deleted_at", FieldType::Timestamp),
    ];

    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            title: row.get(1)?,
            score: row.get(2)?,
            published: row.get(3)?,
            deleted_at: row.get(4)?,
        })
    }

    fn primary_key(&self) -> Value {
        Value::Integer(self.id)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Tag {
    pub id: i64,
    pub name: String,
}

impl Entity for Tag {
    const NAME: &'static str = "tag";
    const TABLE: &'static str = "tags";
    const PRIMARY_KEY: &'static str = "id";
    const FIELDS: &'static [FieldDef] = &[
        FieldDef::new("id", FieldType::Integer),
        FieldDef::new("name", FieldType::Text),
    ];

    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            name: row.get(1)?,
        })
    }

    fn primary_key(&self) -> Value {
        Value::Integer(self.id)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Comment {
    pub id: i64,
    pub article_id: i64,
    pub body: String,
}

impl Entity for Comment {
    const NAME: &'static str = "comment";
    const TABLE: &'static str = "comments";
    const PRIMARY_KEY: &'static str = "id";
    const FIELDS: &'static [FieldDef] = &[
        FieldDef::new("id", FieldType::Integer),
        FieldDef::new("article_id", FieldType::Integer),
        FieldDef::new("body", FieldType::Text),
    ];

    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            article_id: row.get(1)?,
            body: row.get(2)?,
        })
    }

    fn primary_key(&self) -> Value {
        Value::Integer(self.id)
    }
}

pub fn open() -> Connection {
    open_db_in_memory(MIGRATIONS).unwrap()
}

pub fn articles() -> Repository<Article> {
    build_repository(RepoConfig::default()).unwrap()
}

pub fn soft_articles() -> Repository<Article> {
    build_repository(RepoConfig::default().with_soft_delete("deleted_at")).unwrap()
}

pub fn tags() -> Repository<Tag> {
    build_repository(RepoConfig::default()).unwrap()
}

/// Inserts `(title, score)` rows in order; ids follow insertion order from 1.
pub fn insert_articles(conn: &Connection, rows: &[(&str, i64)]) -> Vec<Article> {
    let repo = articles();
    rows.iter()
        .map(|(title, score)| {
            let payload = Payload::new()
                .set("title", title.to_string())
                .set("score", *score)
                .set("published", *score % 2 == 0);
            repo.create(conn, &payload).unwrap()
        })
        .collect()
}

pub fn insert_tags(conn: &Connection, names: &[&str]) -> Vec<Tag> {
    let repo = tags();
    names
        .iter()
        .map(|name| repo.create(conn, &Payload::new().set("name", name.to_string())).unwrap())
        .collect()
}

pub fn ids(articles: &[Article]) -> Vec<i64> {
    articles.iter().map(|article| article.id).collect()
}

pub fn values(ids: &[i64]) -> Vec<Value> {
    ids.iter().copied().map(Value::Integer).collect()
}
