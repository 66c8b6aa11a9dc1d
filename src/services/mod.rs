//! Service layer for the feed watcher.
//!
//! This module contains the business logic for:
//! - Text normalization (`normalize`)
//! - Listing extraction (`ListingExtractor`)
//! - Detail resolution (`DetailResolver`)
//! - Page fetching (`PageSource`, `HttpPageSource`)
//! - Webhook notifications (`Notifier`, `WebhookNotifier`)

pub mod detail;
pub mod extract;
pub mod normalize;
pub mod notifier;
pub mod source;

pub use detail::DetailResolver;
pub use extract::{Extraction, ListingExtractor, Strategy, extract_articles};
pub use notifier::{Notifier, WebhookNotifier};
pub use source::{HttpPageSource, PageSource};
