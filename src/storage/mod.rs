//! Article persistence and change detection.
//!
//! The store is the single source of truth for "have we seen this article"
//! and "have we announced it". Novelty is decided by
//! [`ArticleStore::insert_if_absent`] alone, so a record is new exactly once
//! no matter how often it is extracted.

pub mod sqlite;

use async_trait::async_trait;

use crate::error::Result;
use crate::models::ArticleRecord;

pub use sqlite::SqliteStore;

/// Trait for article storage backends.
#[async_trait]
pub trait ArticleStore: Send + Sync {
    /// Whether an article id has been persisted.
    async fn exists(&self, article_id: &str) -> Result<bool>;

    /// Persist an article unless its id is already known.
    ///
    /// Returns `true` only for the call that inserted the row. An existing
    /// row is never modified.
    async fn insert_if_absent(&self, article: &ArticleRecord) -> Result<bool>;

    /// Flag an article as announced. Returns `false` for unknown ids.
    async fn mark_notified(&self, article_id: &str) -> Result<bool>;

    /// Most recently persisted articles, newest first.
    async fn list_latest(&self, limit: usize) -> Result<Vec<ArticleRecord>>;

    /// Persisted articles still waiting for a notification, newest first.
    async fn list_unnotified(&self) -> Result<Vec<ArticleRecord>>;
}
