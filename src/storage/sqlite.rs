// src/storage/sqlite.rs

//! SQLite article store.
//!
//! One table, `articles`, keyed by the platform article id. Databases written
//! by older versions are upgraded in place by adding missing columns; nothing
//! is ever dropped or rewritten.

use std::path::Path;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDateTime, SecondsFormat, Utc};
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::{FromRow, SqlitePool};

use super::ArticleStore;
use crate::error::Result;
use crate::models::ArticleRecord;

const MAX_CONNECTIONS: u32 = 4;

/// Columns added after the first release, with the type used to add them.
const OPTIONAL_COLUMNS: [(&str, &str); 7] = [
    ("publish_time", "TEXT"),
    ("author", "TEXT"),
    ("summary", "TEXT"),
    ("read_count", "INTEGER DEFAULT 0"),
    ("comment_count", "INTEGER DEFAULT 0"),
    ("created_at", "TEXT"),
    ("notified", "INTEGER DEFAULT 0"),
];

const SELECT_COLUMNS: &str = "id, article_id, title, url, publish_time, author, summary, \
     read_count, comment_count, created_at, notified";

#[derive(Debug, FromRow)]
struct ArticleRow {
    #[allow(dead_code)]
    id: i64,
    article_id: String,
    title: String,
    url: String,
    publish_time: Option<String>,
    author: Option<String>,
    summary: Option<String>,
    read_count: Option<i64>,
    comment_count: Option<i64>,
    created_at: Option<String>,
    notified: Option<bool>,
}

impl From<ArticleRow> for ArticleRecord {
    fn from(row: ArticleRow) -> Self {
        Self {
            article_id: row.article_id,
            title: row.title,
            url: row.url,
            publish_time: row.publish_time,
            author: row.author,
            summary: row.summary,
            read_count: to_count(row.read_count),
            comment_count: to_count(row.comment_count),
            notified: row.notified.unwrap_or(false),
            created_at: row.created_at.as_deref().and_then(parse_created_at),
        }
    }
}

/// SQLite-backed [`ArticleStore`].
#[derive(Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    /// Open (creating if needed) the database at `path` and bring its schema
    /// up to date.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }

        let url = format!("sqlite:{}?mode=rwc", path.display());
        let pool = SqlitePoolOptions::new()
            .max_connections(MAX_CONNECTIONS)
            .connect(&url)
            .await?;

        let store = Self { pool };
        store.migrate().await?;
        log::debug!("Opened article store at {}", path.display());
        Ok(store)
    }

    async fn migrate(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS articles (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                article_id TEXT UNIQUE NOT NULL,
                title TEXT NOT NULL,
                url TEXT NOT NULL
            )
        "#,
        )
        .execute(&self.pool)
        .await?;

        let existing: Vec<(String,)> =
            sqlx::query_as("SELECT name FROM pragma_table_info('articles')")
                .fetch_all(&self.pool)
                .await?;

        for (column, definition) in OPTIONAL_COLUMNS {
            if existing.iter().any(|(name,)| name == column) {
                continue;
            }
            log::info!("Adding column articles.{column}");
            sqlx::query(&format!("ALTER TABLE articles ADD COLUMN {column} {definition}"))
                .execute(&self.pool)
                .await?;
        }

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_articles_notified ON articles(notified)")
            .execute(&self.pool)
            .await?;
        sqlx::query("CREATE INDEX IF NOT EXISTS idx_articles_created ON articles(created_at)")
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    /// Close the connection pool.
    pub async fn close(&self) {
        self.pool.close().await;
    }
}

#[async_trait]
impl ArticleStore for SqliteStore {
    async fn exists(&self, article_id: &str) -> Result<bool> {
        let row: Option<(i64,)> = sqlx::query_as("SELECT 1 FROM articles WHERE article_id = ?")
            .bind(article_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.is_some())
    }

    async fn insert_if_absent(&self, article: &ArticleRecord) -> Result<bool> {
        let created_at = Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true);
        let result = sqlx::query(
            r#"
            INSERT INTO articles (article_id, title, url, publish_time, author, summary,
                                  read_count, comment_count, created_at, notified)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, 0)
            ON CONFLICT(article_id) DO NOTHING
        "#,
        )
        .bind(&article.article_id)
        .bind(&article.title)
        .bind(&article.url)
        .bind(&article.publish_time)
        .bind(&article.author)
        .bind(&article.summary)
        .bind(to_sql_count(article.read_count))
        .bind(to_sql_count(article.comment_count))
        .bind(created_at)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn mark_notified(&self, article_id: &str) -> Result<bool> {
        let result = sqlx::query("UPDATE articles SET notified = 1 WHERE article_id = ?")
            .bind(article_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn list_latest(&self, limit: usize) -> Result<Vec<ArticleRecord>> {
        let rows = sqlx::query_as::<_, ArticleRow>(&format!(
            "SELECT {SELECT_COLUMNS} FROM articles ORDER BY created_at DESC, id DESC LIMIT ?"
        ))
        .bind(i64::try_from(limit).unwrap_or(i64::MAX))
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(ArticleRecord::from).collect())
    }

    async fn list_unnotified(&self) -> Result<Vec<ArticleRecord>> {
        let rows = sqlx::query_as::<_, ArticleRow>(&format!(
            "SELECT {SELECT_COLUMNS} FROM articles \
             WHERE notified = 0 OR notified IS NULL \
             ORDER BY created_at DESC, id DESC"
        ))
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(ArticleRecord::from).collect())
    }
}

fn to_sql_count(count: u64) -> i64 {
    i64::try_from(count).unwrap_or(i64::MAX)
}

fn to_count(value: Option<i64>) -> u64 {
    value.and_then(|v| u64::try_from(v).ok()).unwrap_or(0)
}

/// RFC 3339 as written by this store, or SQLite's `CURRENT_TIMESTAMP` layout
/// found in older databases.
fn parse_created_at(text: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(text)
        .map(|dt| dt.with_timezone(&Utc))
        .ok()
        .or_else(|| {
            NaiveDateTime::parse_from_str(text, "%Y-%m-%d %H:%M:%S%.f")
                .ok()
                .map(|naive| naive.and_utc())
        })
}
