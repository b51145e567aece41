//! `repokit_cli` demo entry point.
//!
//! Wires an article/tag schema through `repokit_core` and prints results as
//! JSON. Sub-commands:
//! - `seed`  : insert demo tags and articles.
//! - `list`  : list articles with filters and ordering.
//! - `page`  : one page of articles plus navigation metadata.
//! - `show`  : one article by id.
//! - `tag`   : add or replace an article's tags.
//! - `delete`: hard or soft delete an article.

mod demo;

use clap::{Parser, Subcommand, ValueEnum};
use demo::{Article, ArticleSummary, Tag, ARTICLE_TAGS, MIGRATIONS};
use log::info;
use repokit_core::{
    build_repository, build_service, default_log_level, init_logging, open_db, ConflictTarget,
    Filter, FnSchema, Json, OrderBy, PaginationParams, Payload, QueryParams, RepoConfig, RepositoryService,
    ServiceConfig, SyncMode,
};
use rusqlite::Connection;
use serde::Serialize;
use std::error::Error;
use std::path::PathBuf;
use std::process::ExitCode;

type ArticleService =
    RepositoryService<Article, Json, FnSchema<fn(Article) -> ArticleSummary>>;

const SEED_TAGS: &[&str] = &["rust", "sql", "web"];

#[derive(Parser)]
#[command(name = "repokit_cli", about = "Demo of repokit repositories over SQLite", version)]
struct Cli {
    /// SQLite database file; created and migrated on first use.
    #[arg(long, default_value = "repokit-demo.sqlite3")]
    db: PathBuf,
    /// Absolute directory for rotated log files. Logging stays off when omitted.
    #[arg(long)]
    log_dir: Option<String>,
    #[arg(long)]
    log_level: Option<String>,
    #[command(subcommand)]
    command: Command,
}

#[derive(clap::Args)]
struct FilterArgs {
    /// Only articles with at least this score.
    #[arg(long)]
    min_score: Option<i64>,
    #[arg(long)]
    published: Option<bool>,
    /// SQL LIKE pattern on the title.
    #[arg(long)]
    title_like: Option<String>,
    /// Ordering keys; prefix with `-` for descending, e.g. `-score`.
    #[arg(long = "order", value_delimiter = ',', allow_hyphen_values = true)]
    order: Vec<String>,
    /// Include soft-deleted articles.
    #[arg(long)]
    include_deleted: bool,
}

impl FilterArgs {
    fn filters(&self) -> Vec<Filter> {
        let mut filters = Vec::new();
        if let Some(score) = self.min_score {
            filters.push(Filter::ge("score", score));
        }
        if let Some(published) = self.published {
            filters.push(Filter::eq("published", published));
        }
        if let Some(pattern) = &self.title_like {
            filters.push(Filter::like("title", pattern.as_str()));
        }
        filters
    }

    fn ordering(&self) -> Vec<OrderBy> {
        self.order
            .iter()
            .map(|key| match key.strip_prefix('-') {
                Some(field) => OrderBy::desc(field),
                None => OrderBy::asc(key.as_str()),
            })
            .collect()
    }
}

#[derive(Clone, Copy, ValueEnum)]
enum ModeArg {
    Add,
    Replace,
}

impl From<ModeArg> for SyncMode {
    fn from(mode: ModeArg) -> Self {
        match mode {
            ModeArg::Add => SyncMode::Add,
            ModeArg::Replace => SyncMode::Replace,
        }
    }
}

#[derive(Subcommand)]
enum Command {
    /// Insert demo tags and `count` articles.
    Seed {
        #[arg(long, default_value_t = 12)]
        count: u32,
    },
    /// List articles.
    List {
        /// Row cap; the repository default applies when omitted.
        #[arg(long, allow_hyphen_values = true)]
        limit: Option<i64>,
        /// Return every matching row.
        #[arg(long, conflicts_with = "limit")]
        all: bool,
        #[command(flatten)]
        filter: FilterArgs,
    },
    /// Print one page with metadata.
    Page {
        #[arg(long, default_value_t = 5, allow_hyphen_values = true)]
        limit: i64,
        #[arg(long, default_value_t = 0, allow_hyphen_values = true)]
        offset: i64,
        #[command(flatten)]
        filter: FilterArgs,
    },
    /// Print one article and its tag ids.
    Show { id: i64 },
    /// Sync an article's tags.
    Tag {
        id: i64,
        /// Tag ids.
        tags: Vec<i64>,
        #[arg(long, value_enum, default_value = "replace")]
        mode: ModeArg,
    },
    /// Delete an article.
    Delete {
        id: i64,
        /// Stamp `deleted_at` instead of removing the row.
        #[arg(long)]
        soft: bool,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {err}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<(), Box<dyn Error>> {
    if let Some(log_dir) = cli.log_dir.as_deref() {
        let level = cli.log_level.as_deref().unwrap_or(default_log_level());
        init_logging(level, log_dir)?;
    }

    let conn = open_db(&cli.db, MIGRATIONS)?;
    let articles = article_service()?;
    articles.repository().verify_schema(&conn)?;

    match cli.command {
        Command::Seed { count } => seed(&conn, &articles, count),
        Command::List { limit, all, filter } => {
            let mut builder = QueryParams::<Article>::builder()
                .filters(filter.filters())
                .ordering(filter.ordering())
                .include_deleted(filter.include_deleted);
            if all {
                builder = builder.unbounded();
            } else if let Some(limit) = limit {
                builder = builder.limit(limit);
            }
            let params = builder.build()?;
            print_json(&articles.list_raw_params(&conn, &params)?)
        }
        Command::Page {
            limit,
            offset,
            filter,
        } => {
            let params = PaginationParams::<Article>::builder()
                .filters(filter.filters())
                .ordering(filter.ordering())
                .include_deleted(filter.include_deleted)
                .limit(limit)
                .offset(offset)
                .build()?;
            print_json(&articles.paginate_params(&conn, &params)?)
        }
        Command::Show { id } => {
            let article = articles.retrieve(&conn, id)?;
            let tags = articles.related_ids(&conn, id, ARTICLE_TAGS.name)?;
            print_json(&serde_json::json!({ "article": article, "tags": tags_json(&tags) }))
        }
        Command::Tag { id, tags, mode } => {
            let report = articles.sync_relation(&conn, id, ARTICLE_TAGS.name, tags, mode.into())?;
            info!(
                "event=cli_tag module=cli status=ok added={} removed={}",
                report.added, report.removed
            );
            let current = articles.related_ids(&conn, id, ARTICLE_TAGS.name)?;
            print_json(&tags_json(&current))
        }
        Command::Delete { id, soft } => {
            if soft {
                print_json(&articles.soft_delete(&conn, id)?)
            } else {
                articles.delete(&conn, id)?;
                print_json(&serde_json::json!({ "deleted": id }))
            }
        }
    }
}

fn article_service() -> Result<ArticleService, Box<dyn Error>> {
    let repo = build_repository::<Article>(RepoConfig::default().with_soft_delete("deleted_at"))?;
    let summarize: fn(Article) -> ArticleSummary = ArticleSummary::from;
    let config = ServiceConfig::new(Json).with_list_schema(FnSchema(summarize));
    Ok(build_service(repo, config, [ARTICLE_TAGS])?)
}

fn seed(conn: &Connection, articles: &ArticleService, count: u32) -> Result<(), Box<dyn Error>> {
    let tags = build_repository::<Tag>(RepoConfig::default())?;
    let mut tag_ids = Vec::with_capacity(SEED_TAGS.len());
    for name in SEED_TAGS {
        let by_name = [Filter::eq("name", name.to_string())];
        let existing = tags.retrieve_one_by(conn, &by_name, &[], false)?;
        let tag = match existing {
            Some(tag) => tag,
            None => tags.create(conn, &Payload::new().set("name", name.to_string()))?,
        };
        tag_ids.push(tag.id);
    }

    // Titles are unique across live and soft-deleted rows alike.
    let by_title = ConflictTarget::columns(["title"]);
    let tx = conn.unchecked_transaction()?;
    let mut created = 0;
    for n in 1..=i64::from(count) {
        let title = format!("Article {n:03}");
        let related = tag_ids
            .iter()
            .copied()
            .filter(|id| (n + id) % 2 == 0)
            .collect::<Vec<_>>();
        let payload = Payload::new()
            .set("title", title)
            .set("score", (n * 37) % 100)
            .set("published", n % 3 != 0)
            .relate(ARTICLE_TAGS.name, related);
        if articles.create_or_skip(&tx, payload, &by_title)?.is_some() {
            created += 1;
        }
    }
    tx.commit()?;

    print_json(&serde_json::json!({ "created": created, "tags": tag_ids }))
}

fn tags_json(ids: &[rusqlite::types::Value]) -> Vec<i64> {
    ids.iter()
        .filter_map(|value| match value {
            rusqlite::types::Value::Integer(id) => Some(*id),
            _ => None,
        })
        .collect()
}

fn print_json<T: Serialize>(value: &T) -> Result<(), Box<dyn Error>> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
