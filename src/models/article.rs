//! Article data structures.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One article discovered on the publisher's profile page.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ArticleRecord {
    /// Platform-unique article identifier
    pub article_id: String,

    /// Article title (at least 5 characters)
    pub title: String,

    /// Absolute URL of the article
    pub url: String,

    /// Canonical `YYYY-MM-DD HH:MM:SS`, or the verbatim relative phrase
    #[serde(default)]
    pub publish_time: Option<String>,

    #[serde(default)]
    pub author: Option<String>,

    #[serde(default)]
    pub summary: Option<String>,

    #[serde(default)]
    pub read_count: u64,

    #[serde(default)]
    pub comment_count: u64,

    /// Whether a notification has been delivered for this article
    #[serde(default)]
    pub notified: bool,

    /// Time of first persistence; `None` until the store has seen it
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

impl ArticleRecord {
    /// Create a bare record as produced by listing extraction.
    pub fn new(
        article_id: impl Into<String>,
        title: impl Into<String>,
        url: impl Into<String>,
    ) -> Self {
        Self {
            article_id: article_id.into(),
            title: title.into(),
            url: url.into(),
            publish_time: None,
            author: None,
            summary: None,
            read_count: 0,
            comment_count: 0,
            notified: false,
            created_at: None,
        }
    }

    /// Fill unresolved fields from a detail lookup.
    ///
    /// Values already present on the record are kept.
    pub fn apply_detail(&mut self, detail: ArticleDetail) {
        if let Some(time) = detail.publish_time {
            self.publish_time = Some(time);
        }
        if self.author.is_none() {
            self.author = detail.author;
        }
        if self.summary.is_none() {
            self.summary = detail.summary;
        }
    }
}

/// Fields resolved from an article's own detail page.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ArticleDetail {
    pub publish_time: Option<String>,
    pub author: Option<String>,
    pub summary: Option<String>,
}

impl ArticleDetail {
    /// True when no field could be resolved.
    pub fn is_empty(&self) -> bool {
        self.publish_time.is_none() && self.author.is_none() && self.summary.is_none()
    }

    /// True when every field is resolved.
    pub fn is_complete(&self) -> bool {
        self.publish_time.is_some() && self.author.is_some() && self.summary.is_some()
    }

    /// Fill gaps from a lower-priority source; populated fields are never replaced.
    pub fn fill_from(&mut self, other: ArticleDetail) {
        if self.publish_time.is_none() {
            self.publish_time = other.publish_time;
        }
        if self.author.is_none() {
            self.author = other.author;
        }
        if self.summary.is_none() {
            self.summary = other.summary;
        }
    }
}

/// Treat empty or whitespace-only text as unknown.
pub fn non_empty(value: impl AsRef<str>) -> Option<String> {
    let trimmed = value.as_ref().trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}
