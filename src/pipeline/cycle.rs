// src/pipeline/cycle.rs

//! One monitoring cycle.
//!
//! A cycle first re-sends whatever an earlier cycle failed to deliver, then
//! fetches the listing, extracts and optionally enriches articles, persists
//! them, and notifies only the ones the store had never seen. Per-article
//! failures are logged and counted but never stop the other articles.

use std::fmt;
use std::time::Duration;

use chrono::{DateTime, Utc};
use rand::Rng;
use tokio::sync::watch;

use crate::error::Result;
use crate::models::{ArticleDetail, ArticleRecord, Config};
use crate::pipeline::schedule::wait_for_stop;
use crate::services::extract::{Extraction, ListingExtractor, Strategy};
use crate::services::normalize::newest_first;
use crate::services::{DetailResolver, Notifier, PageSource};
use crate::storage::ArticleStore;

/// Stage a cycle is in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CyclePhase {
    Backlog,
    Fetching,
    Extracting,
    Resolving,
    Diffing,
    Persisting,
    Notifying,
    Done,
}

impl fmt::Display for CyclePhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            CyclePhase::Backlog => "backlog",
            CyclePhase::Fetching => "fetching",
            CyclePhase::Extracting => "extracting",
            CyclePhase::Resolving => "resolving",
            CyclePhase::Diffing => "diffing",
            CyclePhase::Persisting => "persisting",
            CyclePhase::Notifying => "notifying",
            CyclePhase::Done => "done",
        };
        f.write_str(name)
    }
}

/// How a cycle ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CycleOutcome {
    /// Every stage ran.
    Completed,
    /// The listing yielded no articles.
    NoArticles,
    /// A stop was requested while the cycle was running.
    Cancelled,
    /// An error ended the cycle early in `phase`.
    Aborted { phase: CyclePhase, reason: String },
}

/// Summary of a finished cycle.
#[derive(Debug, Clone)]
pub struct CycleReport {
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub phase: CyclePhase,
    pub outcome: CycleOutcome,
    pub strategy: Option<Strategy>,
    pub extracted: usize,
    pub new_articles: Vec<String>,
    pub notified: usize,
    pub failed: usize,
    /// Delivered, but the store could not record it; resent next cycle.
    pub unmarked: usize,
    pub backlog_retried: usize,
    pub backlog_notified: usize,
}

impl CycleReport {
    fn new() -> Self {
        Self {
            started_at: Utc::now(),
            finished_at: None,
            phase: CyclePhase::Backlog,
            outcome: CycleOutcome::Completed,
            strategy: None,
            extracted: 0,
            new_articles: Vec::new(),
            notified: 0,
            failed: 0,
            unmarked: 0,
            backlog_retried: 0,
            backlog_notified: 0,
        }
    }

    fn finish(mut self, outcome: CycleOutcome) -> Self {
        self.outcome = outcome;
        self.phase = CyclePhase::Done;
        self.finished_at = Some(Utc::now());
        self
    }

    pub fn is_success(&self) -> bool {
        matches!(self.outcome, CycleOutcome::Completed | CycleOutcome::NoArticles)
    }
}

impl fmt::Display for CycleReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "extracted {}, new {}, notified {}, failed {}, unmarked {}, backlog {}/{}",
            self.extracted,
            self.new_articles.len(),
            self.notified,
            self.failed,
            self.unmarked,
            self.backlog_notified,
            self.backlog_retried,
        )
    }
}

#[derive(Debug, Default)]
struct Delivery {
    attempted: usize,
    notified: usize,
    unmarked: usize,
    cancelled: bool,
}

/// Cycle settings derived from [`Config`].
#[derive(Debug, Clone)]
pub struct MonitorSettings {
    pub profile_url: String,
    pub max_articles: usize,
    pub resolve_details: bool,
    pub detail_delay_ms: (u64, u64),
    pub listing_settle: Duration,
    pub send_interval: Duration,
}

impl MonitorSettings {
    pub fn from_config(config: &Config) -> Self {
        let min = config.source.detail_delay_min_ms;
        let max = config.source.detail_delay_max_ms.max(min);
        Self {
            profile_url: config.source.blogger_url.clone(),
            max_articles: config.source.max_articles,
            resolve_details: config.source.resolve_details,
            detail_delay_ms: (min, max),
            listing_settle: Duration::from_millis(config.source.listing_settle_ms),
            send_interval: Duration::from_millis(config.notifier.send_interval_ms),
        }
    }
}

/// The orchestrator: owns the page source, store and notifier.
pub struct Monitor {
    settings: MonitorSettings,
    source: Box<dyn PageSource>,
    store: Box<dyn ArticleStore>,
    notifier: Box<dyn Notifier>,
    extractor: ListingExtractor,
    resolver: DetailResolver,
    stop: watch::Receiver<bool>,
}

impl Monitor {
    pub fn new(
        config: &Config,
        source: Box<dyn PageSource>,
        store: Box<dyn ArticleStore>,
        notifier: Box<dyn Notifier>,
        stop: watch::Receiver<bool>,
    ) -> Result<Self> {
        Ok(Self {
            settings: MonitorSettings::from_config(config),
            source,
            store,
            notifier,
            extractor: ListingExtractor::new(&config.source.base_url)?,
            resolver: DetailResolver::new()?,
            stop,
        })
    }

    pub fn settings(&self) -> &MonitorSettings {
        &self.settings
    }

    pub fn store(&self) -> &dyn ArticleStore {
        self.store.as_ref()
    }

    /// Fetch and extract up to `max_count` listing articles without
    /// persisting or notifying anything.
    pub async fn sample_listing(&mut self, max_count: usize) -> Result<Extraction> {
        self.ensure_session().await?;
        let html = self.source.fetch_listing(&self.settings.profile_url).await?;
        Ok(self.extractor.extract(&html, max_count))
    }

    /// Resolve one article's details through the owned page source.
    pub async fn resolve_details(&self, article_id: &str) -> Result<ArticleDetail> {
        self.resolver.resolve(self.source.as_ref(), article_id).await
    }

    /// Run one cycle to completion, absorbing errors into the report.
    pub async fn run_cycle(&mut self) -> CycleReport {
        let mut report = CycleReport::new();
        log::info!("Starting check of {}", self.settings.profile_url);

        let outcome = match self.execute(&mut report).await {
            Ok(outcome) => outcome,
            Err(e) => {
                log::error!("Cycle aborted while {}: {e}", report.phase);
                if e.is_session_lost() {
                    self.recover_session().await;
                }
                CycleOutcome::Aborted {
                    phase: report.phase,
                    reason: e.to_string(),
                }
            }
        };

        let report = report.finish(outcome);
        match &report.outcome {
            CycleOutcome::Completed => log::info!("Check complete: {report}"),
            CycleOutcome::NoArticles => log::warn!("No articles found on listing page"),
            CycleOutcome::Cancelled => log::info!("Check cancelled: {report}"),
            CycleOutcome::Aborted { .. } => {}
        }
        report
    }

    async fn execute(&mut self, report: &mut CycleReport) -> Result<CycleOutcome> {
        report.phase = CyclePhase::Backlog;
        let backlog = self.retry_backlog().await?;
        report.backlog_retried = backlog.attempted;
        report.backlog_notified = backlog.notified;
        report.unmarked += backlog.unmarked;
        if backlog.cancelled || self.stop_requested() {
            return Ok(CycleOutcome::Cancelled);
        }

        report.phase = CyclePhase::Fetching;
        self.ensure_session().await?;
        let html = self.source.fetch_listing(&self.settings.profile_url).await?;
        if self.pause(self.settings.listing_settle).await {
            return Ok(CycleOutcome::Cancelled);
        }

        report.phase = CyclePhase::Extracting;
        let extraction = self.extractor.extract(&html, self.settings.max_articles);
        report.strategy = Some(extraction.strategy);
        report.extracted = extraction.articles.len();
        let mut articles = extraction.articles;
        if articles.is_empty() {
            return Ok(CycleOutcome::NoArticles);
        }
        log::info!(
            "Extracted {} articles ({:?} strategy)",
            articles.len(),
            extraction.strategy
        );

        if self.settings.resolve_details {
            report.phase = CyclePhase::Resolving;
            if !self.enrich(&mut articles).await? {
                return Ok(CycleOutcome::Cancelled);
            }
        }

        report.phase = CyclePhase::Diffing;
        articles.sort_by(|a, b| newest_first(a.publish_time.as_deref(), b.publish_time.as_deref()));

        report.phase = CyclePhase::Persisting;
        let mut fresh = Vec::new();
        for article in articles {
            if self.store.insert_if_absent(&article).await? {
                log::info!("New article {}: {}", article.article_id, article.title);
                report.new_articles.push(article.article_id.clone());
                fresh.push(article);
            }
        }
        if fresh.is_empty() {
            log::info!("No new articles");
            return Ok(CycleOutcome::Completed);
        }

        report.phase = CyclePhase::Notifying;
        let delivery = self.deliver(&fresh).await;
        report.notified = delivery.notified;
        report.unmarked += delivery.unmarked;
        report.failed = delivery.attempted - delivery.notified - delivery.unmarked;
        if delivery.cancelled {
            return Ok(CycleOutcome::Cancelled);
        }

        Ok(CycleOutcome::Completed)
    }

    /// Re-send persisted articles that were never announced, oldest first.
    async fn retry_backlog(&self) -> Result<Delivery> {
        let mut pending = self.store.list_unnotified().await?;
        if pending.is_empty() {
            return Ok(Delivery::default());
        }

        pending.reverse();
        log::info!("Retrying {} unnotified articles", pending.len());
        Ok(self.deliver(&pending).await)
    }

    /// Send each article and mark it notified right after a confirmed send.
    ///
    /// A store error while marking is logged and leaves the article in the
    /// backlog; the remaining articles are still sent.
    async fn deliver(&self, articles: &[ArticleRecord]) -> Delivery {
        let mut delivery = Delivery::default();
        let mut pause_before_next = false;

        for article in articles {
            if self.stop_requested() {
                delivery.cancelled = true;
                break;
            }
            if pause_before_next && self.pause(self.settings.send_interval).await {
                delivery.cancelled = true;
                break;
            }

            delivery.attempted += 1;
            pause_before_next = self.notifier.send(article).await;
            if pause_before_next {
                match self.store.mark_notified(&article.article_id).await {
                    Ok(_) => delivery.notified += 1,
                    Err(e) => {
                        log::error!(
                            "Article {} was sent but could not be marked notified: {e}",
                            article.article_id
                        );
                        delivery.unmarked += 1;
                    }
                }
            } else {
                log::warn!(
                    "Notification failed for article {}; will retry next cycle",
                    article.article_id
                );
            }
        }
        delivery
    }

    /// Resolve details for each article in turn. Returns `false` if stopped.
    async fn enrich(&self, articles: &mut [ArticleRecord]) -> Result<bool> {
        let total = articles.len();
        for (i, article) in articles.iter_mut().enumerate() {
            if self.stop_requested() {
                return Ok(false);
            }
            if i > 0 && self.pause(self.detail_delay()).await {
                return Ok(false);
            }

            log::debug!("Resolving details {}/{total}: {}", i + 1, article.article_id);
            let detail = self.resolve_details(&article.article_id).await?;
            article.apply_detail(detail);
        }
        Ok(true)
    }

    async fn ensure_session(&mut self) -> Result<()> {
        if !self.source.is_alive().await {
            log::warn!("Page source session is not alive, reconnecting");
            self.source.reconnect().await?;
        }
        Ok(())
    }

    async fn recover_session(&mut self) {
        if let Err(e) = self.source.reconnect().await {
            log::error!("Failed to re-establish page source session: {e}");
        }
    }

    fn detail_delay(&self) -> Duration {
        let (min, max) = self.settings.detail_delay_ms;
        Duration::from_millis(rand::thread_rng().gen_range(min..=max))
    }

    fn stop_requested(&self) -> bool {
        *self.stop.borrow()
    }

    /// Sleep for `duration` unless a stop arrives first. Returns whether a
    /// stop was requested.
    async fn pause(&self, duration: Duration) -> bool {
        if !duration.is_zero() {
            tokio::select! {
                _ = tokio::time::sleep(duration) => {}
                _ = wait_for_stop(self.stop.clone()) => {}
            }
        }
        self.stop_requested()
    }
}
