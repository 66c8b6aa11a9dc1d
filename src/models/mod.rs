// src/models/mod.rs

//! Domain models for the feed watcher.
//!
//! This module contains the article records flowing through a check cycle
//! and the configuration structures that drive it.

mod article;
pub mod config;

// Re-export all public types
pub use article::{ArticleDetail, ArticleRecord, non_empty};
pub use config::{
    Config, CrawlerConfig, LoggingConfig, MessageFormat, NotifierConfig, SourceConfig,
    StorageConfig,
};
