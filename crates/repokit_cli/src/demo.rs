//! Demo schema: articles with many-to-many tags.

use repokit_core::{Entity, FieldDef, FieldType, ManyToManyRelation, Migration};
use rusqlite::types::Value;
use rusqlite::Row;
use serde::Serialize;

pub const MIGRATIONS: &[Migration] = &[Migration::new(
    1,
    "CREATE TABLE articles (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        title TEXT NOT NULL UNIQUE,
        score INTEGER NOT NULL DEFAULT 0,
        published INTEGER NOT NULL DEFAULT 0 CHECK (published IN (0, 1)),
        deleted_at INTEGER NULL
    );
    CREATE TABLE tags (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        name TEXT NOT NULL UNIQUE
    );
    CREATE TABLE article_tags (
        article_id INTEGER NOT NULL REFERENCES articles(id) ON DELETE CASCADE,
        tag_id INTEGER NOT NULL REFERENCES tags(id) ON DELETE CASCADE,
        PRIMARY KEY (article_id, tag_id)
    );
    CREATE INDEX idx_articles_score ON articles(score);",
)];

pub const ARTICLE_TAGS: ManyToManyRelation =
    ManyToManyRelation::new("tags", "article_tags", "article_id", "tag_id", "tags", "id");

#[derive(Debug, Clone, Serialize)]
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

/// List projection printed by `list` and `page`.
#[derive(Debug, Clone, Serialize)]
pub struct ArticleSummary {
    pub id: i64,
    pub title: String,
}

impl From<Article> for ArticleSummary {
    fn from(article: Article) -> Self {
        Self {
            id: article.id,
            title: article.title,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
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
