//! Page source: where listing and detail markup come from.
//!
//! The orchestrator owns exactly one [`PageSource`] for the lifetime of the
//! process and is the only caller of it. Sources report their own health so a
//! dead session can be re-established between cycles.

use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use reqwest::Client;

use crate::error::{AppError, Result};
use crate::models::{CrawlerConfig, SourceConfig};
use crate::utils::http::{create_async_client, fetch_text};
use crate::utils::{article_url, profile_listing_url};

/// Consecutive transport failures after which a session counts as dead.
const MAX_CONSECUTIVE_FAILURES: usize = 3;

/// Source of rendered page markup.
#[async_trait]
pub trait PageSource: Send + Sync {
    /// Rendered markup of the publisher's article listing.
    async fn fetch_listing(&self, profile_url: &str) -> Result<String>;

    /// Rendered markup of one article's detail page.
    async fn fetch_detail(&self, article_id: &str) -> Result<String>;

    /// Whether the underlying session is still usable.
    async fn is_alive(&self) -> bool;

    /// Tear down and re-create the underlying session.
    async fn reconnect(&mut self) -> Result<()>;
}

/// Plain HTTP page source.
pub struct HttpPageSource {
    client: Client,
    crawler: CrawlerConfig,
    base_url: String,
    failures: AtomicUsize,
}

impl HttpPageSource {
    /// Create a source from the crawler and source settings.
    pub fn new(crawler: &CrawlerConfig, source: &SourceConfig) -> Result<Self> {
        Ok(Self {
            client: create_async_client(crawler)?,
            crawler: crawler.clone(),
            base_url: source.base_url.clone(),
            failures: AtomicUsize::new(0),
        })
    }

    async fn fetch(&self, url: &str) -> Result<String> {
        if self.failures.load(Ordering::Relaxed) >= MAX_CONSECUTIVE_FAILURES {
            return Err(AppError::session_lost(format!(
                "{MAX_CONSECUTIVE_FAILURES} consecutive transport failures"
            )));
        }

        match fetch_text(&self.client, url).await {
            Ok(body) => {
                self.failures.store(0, Ordering::Relaxed);
                Ok(body)
            }
            Err(AppError::Http(e)) if e.is_connect() || e.is_timeout() => {
                let failures = self.failures.fetch_add(1, Ordering::Relaxed) + 1;
                log::warn!("Transport failure {failures} for {url}: {e}");
                Err(AppError::fetch(url, e))
            }
            Err(e) => Err(e),
        }
    }
}

#[async_trait]
impl PageSource for HttpPageSource {
    async fn fetch_listing(&self, profile_url: &str) -> Result<String> {
        let url = profile_listing_url(profile_url)?;
        log::info!("Fetching listing {url}");
        self.fetch(&url).await
    }

    async fn fetch_detail(&self, article_id: &str) -> Result<String> {
        let url = article_url(&self.base_url, article_id);
        log::debug!("Fetching detail {url}");
        self.fetch(&url).await
    }

    async fn is_alive(&self) -> bool {
        self.failures.load(Ordering::Relaxed) < MAX_CONSECUTIVE_FAILURES
    }

    async fn reconnect(&mut self) -> Result<()> {
        self.client = create_async_client(&self.crawler)?;
        self.failures.store(0, Ordering::Relaxed);
        log::info!("Page source session re-established");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn source_for(server: &MockServer) -> HttpPageSource {
        let source = SourceConfig {
            base_url: server.uri(),
            ..SourceConfig::default()
        };
        HttpPageSource::new(&CrawlerConfig::default(), &source).unwrap()
    }

    #[tokio::test]
    async fn test_fetch_listing_adds_profile_params() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/c/user/token/abc/"))
            .and(query_param("source", "profile"))
            .and(query_param("tab", "article"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>listing</html>"))
            .mount(&server)
            .await;

        let source = source_for(&server);
        let body = source
            .fetch_listing(&format!("{}/c/user/token/abc/", server.uri()))
            .await
            .unwrap();
        assert_eq!(body, "<html>listing</html>");
    }

    #[tokio::test]
    async fn test_fetch_detail_uses_article_path() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/article/42/"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>detail</html>"))
            .mount(&server)
            .await;

        let source = source_for(&server);
        assert_eq!(source.fetch_detail("42").await.unwrap(), "<html>detail</html>");
    }

    #[tokio::test]
    async fn test_error_status_is_fetch_failure() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let source = source_for(&server);
        let err = source.fetch_detail("1").await.unwrap_err();
        assert!(matches!(err, AppError::Fetch { .. }));
        assert!(source.is_alive().await);
    }

    #[tokio::test]
    async fn test_reconnect_restores_dead_session() {
        let server = MockServer::start().await;
        let mut source = source_for(&server);
        source
            .failures
            .store(MAX_CONSECUTIVE_FAILURES, Ordering::Relaxed);

        assert!(!source.is_alive().await);
        assert!(source.fetch_detail("1").await.unwrap_err().is_session_lost());

        source.reconnect().await.unwrap();
        assert!(source.is_alive().await);
    }
}
