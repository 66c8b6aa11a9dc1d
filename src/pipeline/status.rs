// src/pipeline/status.rs

//! Status reporting and the component self-test.

use std::fmt;

use chrono::{DateTime, Local, Utc};

use crate::error::Result;
use crate::models::ArticleRecord;
use crate::services::WebhookNotifier;
use crate::storage::ArticleStore;

use super::cycle::Monitor;

/// Articles fetched by the self-test; enough to prove the listing renders.
const SELF_TEST_ARTICLES: usize = 3;

/// Snapshot of what the store knows.
#[derive(Debug, Clone)]
pub struct MonitorStatus {
    pub blogger_url: String,
    pub latest: Vec<ArticleRecord>,
    pub unnotified_count: usize,
    pub checked_at: DateTime<Utc>,
}

impl MonitorStatus {
    pub fn latest_count(&self) -> usize {
        self.latest.len()
    }
}

/// Read the current status from the store.
pub async fn collect_status(
    store: &dyn ArticleStore,
    blogger_url: &str,
    limit: usize,
) -> Result<MonitorStatus> {
    Ok(MonitorStatus {
        blogger_url: blogger_url.to_string(),
        latest: store.list_latest(limit).await?,
        unnotified_count: store.list_unnotified().await?.len(),
        checked_at: Utc::now(),
    })
}

impl fmt::Display for MonitorStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Blogger:      {}", self.blogger_url)?;
        writeln!(f, "Latest:       {}", self.latest_count())?;
        writeln!(f, "Unnotified:   {}", self.unnotified_count)?;
        writeln!(
            f,
            "Checked at:   {}",
            self.checked_at.with_timezone(&Local).format("%Y-%m-%d %H:%M:%S")
        )?;

        for article in &self.latest {
            let marker = if article.notified { "✓" } else { "…" };
            writeln!(
                f,
                "  {marker} [{}] {} ({})",
                article.publish_time.as_deref().unwrap_or("-"),
                article.title,
                article.url
            )?;
        }
        Ok(())
    }
}

/// Outcome of the component self-test.
#[derive(Debug, Clone, Default)]
pub struct SelfTestReport {
    pub articles_found: usize,
    /// First listed article with its details resolved, when resolution works.
    pub sample: Option<ArticleRecord>,
    pub store_ok: bool,
    /// `None` when the notification check was skipped.
    pub notification_ok: Option<bool>,
    pub errors: Vec<String>,
}

impl SelfTestReport {
    pub fn passed(&self) -> bool {
        self.articles_found > 0 && self.store_ok && self.notification_ok != Some(false)
    }
}

/// Check that the listing yields articles, the store answers, and (when a
/// notifier is given) the webhook accepts a test message.
///
/// Nothing is written to the store.
pub async fn self_test(
    monitor: &mut Monitor,
    notifier: Option<&WebhookNotifier>,
) -> SelfTestReport {
    let mut report = SelfTestReport::default();

    log::info!("Testing listing access");
    match monitor.sample_listing(SELF_TEST_ARTICLES).await {
        Ok(extraction) => {
            let articles = extraction.articles;
            report.articles_found = articles.len();
            match articles.into_iter().next() {
                Some(mut first) if monitor.settings().resolve_details => {
                    match monitor.resolve_details(&first.article_id).await {
                        Ok(detail) if detail.publish_time.is_some() => {
                            first.apply_detail(detail);
                            report.sample = Some(first);
                        }
                        Ok(_) => report.errors.push("could not resolve article details".into()),
                        Err(e) => report.errors.push(format!("detail resolution failed: {e}")),
                    }
                }
                Some(first) => report.sample = Some(first),
                None => report.errors.push("no articles found on listing page".into()),
            }
        }
        Err(e) => report.errors.push(format!("listing fetch failed: {e}")),
    }

    log::info!("Testing article store");
    match monitor.store().list_latest(1).await {
        Ok(_) => report.store_ok = true,
        Err(e) => report.errors.push(format!("store query failed: {e}")),
    }

    match notifier {
        Some(notifier) => {
            log::info!("Sending test notification");
            let delivered = notifier.test_connection().await;
            if !delivered {
                report.errors.push("test notification was not delivered".into());
            }
            report.notification_ok = Some(delivered);
        }
        None => log::info!("Skipping notification test"),
    }

    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::SqliteStore;

    #[tokio::test]
    async fn test_collect_status() {
        let dir = tempfile::tempdir().unwrap();
        let store = SqliteStore::open(dir.path().join("articles.db")).await.unwrap();
        for id in ["1", "2", "3"] {
            let article = ArticleRecord::new(id, "Some title", format!("https://x/article/{id}/"));
            store.insert_if_absent(&article).await.unwrap();
        }
        store.mark_notified("1").await.unwrap();

        let status = collect_status(&store, "https://www.toutiao.com/c/user/token/abc/", 2)
            .await
            .unwrap();
        assert_eq!(status.latest_count(), 2);
        assert_eq!(status.unnotified_count, 2);
        assert!(status.to_string().contains("Unnotified:   2"));
    }

    #[test]
    fn test_self_test_report_passed() {
        let mut report = SelfTestReport {
            articles_found: 1,
            store_ok: true,
            ..Default::default()
        };
        assert!(report.passed());

        report.notification_ok = Some(false);
        assert!(!report.passed());

        report.notification_ok = Some(true);
        report.articles_found = 0;
        assert!(!report.passed());
    }
}
