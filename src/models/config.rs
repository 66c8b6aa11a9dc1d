//! Application configuration structures.

use std::fs;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};

/// Placeholder shipped in sample configs; never a usable endpoint.
const WEBHOOK_PLACEHOLDER: &str = "YOUR_FEISHU_WEBHOOK_URL_HERE";

/// Root application configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// Publisher profile and cycle settings
    #[serde(default)]
    pub source: SourceConfig,

    /// HTTP client settings
    #[serde(default)]
    pub crawler: CrawlerConfig,

    /// Webhook delivery settings
    #[serde(default)]
    pub notifier: NotifierConfig,

    /// Article store settings
    #[serde(default)]
    pub storage: StorageConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Ok(toml::from_str(&content)?)
    }

    /// Load configuration or return default if loading fails.
    pub fn load_or_default(path: impl AsRef<Path>) -> Self {
        Self::load(&path).unwrap_or_else(|e| {
            log::warn!(
                "Config load failed from {:?}: {}. Using defaults.",
                path.as_ref(),
                e
            );
            Self::default()
        })
    }

    /// Validate configuration values for basic sanity.
    pub fn validate(&self) -> Result<()> {
        let blogger_url = self.source.blogger_url.trim();
        if blogger_url.is_empty() {
            return Err(AppError::validation("source.blogger_url is empty"));
        }
        url::Url::parse(blogger_url)
            .map_err(|e| AppError::validation(format!("source.blogger_url: {e}")))?;
        url::Url::parse(&self.source.base_url)
            .map_err(|e| AppError::validation(format!("source.base_url: {e}")))?;
        if self.source.max_articles == 0 {
            return Err(AppError::validation("source.max_articles must be > 0"));
        }
        if self.source.check_interval_minutes == 0 {
            return Err(AppError::validation(
                "source.check_interval_minutes must be > 0",
            ));
        }
        if self.source.detail_delay_min_ms > self.source.detail_delay_max_ms {
            return Err(AppError::validation(
                "source.detail_delay_min_ms must not exceed detail_delay_max_ms",
            ));
        }

        if self.crawler.user_agent.trim().is_empty() {
            return Err(AppError::validation("crawler.user_agent is empty"));
        }
        if self.crawler.timeout_secs == 0 {
            return Err(AppError::validation("crawler.timeout_secs must be > 0"));
        }

        let webhook = self.notifier.webhook_url.trim();
        if webhook.is_empty() || webhook == WEBHOOK_PLACEHOLDER {
            return Err(AppError::validation("notifier.webhook_url is not set"));
        }
        url::Url::parse(webhook)
            .map_err(|e| AppError::validation(format!("notifier.webhook_url: {e}")))?;
        if self.notifier.timeout_secs == 0 {
            return Err(AppError::validation("notifier.timeout_secs must be > 0"));
        }

        if self.storage.path.trim().is_empty() {
            return Err(AppError::validation("storage.path is empty"));
        }
        Ok(())
    }
}

/// Publisher profile and check-cycle settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceConfig {
    /// Profile URL of the publisher to watch
    #[serde(default)]
    pub blogger_url: String,

    /// Platform origin used to absolutize article links
    #[serde(default = "defaults::base_url")]
    pub base_url: String,

    /// Maximum number of articles taken from the listing per cycle
    #[serde(default = "defaults::max_articles")]
    pub max_articles: usize,

    #[serde(default = "defaults::check_interval_minutes")]
    pub check_interval_minutes: u64,

    /// Fetch each article's detail page for time/author/summary
    #[serde(default = "defaults::resolve_details")]
    pub resolve_details: bool,

    /// Stop-aware pause after the listing fetch, before any detail request
    #[serde(default = "defaults::listing_settle_ms")]
    pub listing_settle_ms: u64,

    #[serde(default = "defaults::detail_delay_min_ms")]
    pub detail_delay_min_ms: u64,

    #[serde(default = "defaults::detail_delay_max_ms")]
    pub detail_delay_max_ms: u64,
}

impl SourceConfig {
    pub fn check_interval(&self) -> Duration {
        Duration::from_secs(self.check_interval_minutes * 60)
    }
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            blogger_url: String::new(),
            base_url: defaults::base_url(),
            max_articles: defaults::max_articles(),
            check_interval_minutes: defaults::check_interval_minutes(),
            resolve_details: defaults::resolve_details(),
            listing_settle_ms: defaults::listing_settle_ms(),
            detail_delay_min_ms: defaults::detail_delay_min_ms(),
            detail_delay_max_ms: defaults::detail_delay_max_ms(),
        }
    }
}

/// HTTP client settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrawlerConfig {
    /// User-Agent header for HTTP requests
    #[serde(default = "defaults::user_agent")]
    pub user_agent: String,

    /// Request timeout in seconds
    #[serde(default = "defaults::timeout")]
    pub timeout_secs: u64,
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        Self {
            user_agent: defaults::user_agent(),
            timeout_secs: defaults::timeout(),
        }
    }
}

/// Message layout sent to the webhook.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum MessageFormat {
    /// Plain `text` message
    #[default]
    Text,
    /// Rich-text `post` message
    Post,
}

/// Webhook delivery settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotifierConfig {
    #[serde(default)]
    pub webhook_url: String,

    /// Shared signing secret; unsigned requests when absent
    #[serde(default)]
    pub secret: Option<String>,

    #[serde(default = "defaults::notifier_timeout")]
    pub timeout_secs: u64,

    #[serde(default)]
    pub format: MessageFormat,

    /// Pause after each delivered notification
    #[serde(default = "defaults::send_interval_ms")]
    pub send_interval_ms: u64,
}

impl Default for NotifierConfig {
    fn default() -> Self {
        Self {
            webhook_url: String::new(),
            secret: None,
            timeout_secs: defaults::notifier_timeout(),
            format: MessageFormat::default(),
            send_interval_ms: defaults::send_interval_ms(),
        }
    }
}

/// Article store settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// SQLite database file
    #[serde(default = "defaults::storage_path")]
    pub path: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            path: defaults::storage_path(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "defaults::log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: defaults::log_level(),
        }
    }
}

mod defaults {
    // Source defaults
    pub fn base_url() -> String {
        "https://www.toutiao.com".into()
    }
    pub fn max_articles() -> usize {
        10
    }
    pub fn check_interval_minutes() -> u64 {
        10
    }
    pub fn resolve_details() -> bool {
        true
    }
    pub fn listing_settle_ms() -> u64 {
        2000
    }
    pub fn detail_delay_min_ms() -> u64 {
        1000
    }
    pub fn detail_delay_max_ms() -> u64 {
        3000
    }

    // Crawler defaults
    pub fn user_agent() -> String {
        "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
         (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36"
            .into()
    }
    pub fn timeout() -> u64 {
        30
    }

    // Notifier defaults
    pub fn notifier_timeout() -> u64 {
        10
    }
    pub fn send_interval_ms() -> u64 {
        1000
    }

    pub fn storage_path() -> String {
        "data/articles.db".into()
    }

    pub fn log_level() -> String {
        "info".into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_config() -> Config {
        let mut config = Config::default();
        config.source.blogger_url = "https://www.toutiao.com/c/user/token/MS4wLjAB/".into();
        config.notifier.webhook_url =
            "https://open.feishu.cn/open-apis/bot/v2/hook/abc".into();
        config
    }

    #[test]
    fn test_validate_default_config_needs_urls() {
        assert!(Config::default().validate().is_err());
        assert!(valid_config().validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_placeholder_webhook() {
        let mut config = valid_config();
        config.notifier.webhook_url = WEBHOOK_PLACEHOLDER.into();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_inverted_delay_range() {
        let mut config = valid_config();
        config.source.detail_delay_min_ms = 5000;
        config.source.detail_delay_max_ms = 1000;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_zero_max_articles() {
        let mut config = valid_config();
        config.source.max_articles = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_parse_partial_toml_fills_defaults() {
        let config: Config = toml::from_str(
            r#"
            [source]
            blogger_url = "https://www.toutiao.com/c/user/token/abc/"
            max_articles = 5

            [notifier]
            webhook_url = "https://open.feishu.cn/open-apis/bot/v2/hook/abc"
            secret = "s3cr3t"
            format = "post"
            "#,
        )
        .unwrap();

        assert_eq!(config.source.max_articles, 5);
        assert_eq!(config.source.base_url, "https://www.toutiao.com");
        assert_eq!(config.notifier.secret.as_deref(), Some("s3cr3t"));
        assert_eq!(config.notifier.format, MessageFormat::Post);
        assert_eq!(config.storage.path, "data/articles.db");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_load_reads_file_and_falls_back_when_missing() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "[source]\ncheck_interval_minutes = 3\n").unwrap();

        let config = Config::load(&path).unwrap();
        assert_eq!(config.source.check_interval(), Duration::from_secs(180));

        let fallback = Config::load_or_default(dir.path().join("missing.toml"));
        assert_eq!(fallback.source.check_interval_minutes, 10);
    }
}
