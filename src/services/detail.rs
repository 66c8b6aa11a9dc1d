// src/services/detail.rs

//! Article detail resolution.
//!
//! The listing only carries relative times and no author or summary. The
//! detail page embeds the same facts in several places of varying
//! reliability, so each place is read by its own tier function and the
//! tiers are composed in priority order: the first populated value per field
//! wins, later tiers only fill gaps.

use std::sync::OnceLock;

use percent_encoding::percent_decode_str;
use regex::Regex;
use scraper::{Html, Selector};
use serde_json::Value;

use crate::error::Result;
use crate::models::{ArticleDetail, non_empty};
use crate::services::extract::{element_text, parse_selector};
use crate::services::normalize::{canonicalize_time, validate_time_token};
use crate::services::source::PageSource;

const LINKED_DATA_SELECTOR: &str = r#"script[type="application/ld+json"]"#;
const RENDER_DATA_SELECTOR: &str = "script#RENDER_DATA";
const SCRIPT_SELECTOR: &str = "script";

const AUTHOR_SELECTORS: [&str; 7] = [
    r#"meta[name="author"]"#,
    r#"meta[property="article:author"]"#,
    ".article-author",
    ".author-name",
    "[data-author]",
    ".byline-author",
    ".source",
];

const SUMMARY_SELECTORS: [&str; 4] = [
    r#"meta[name="description"]"#,
    r#"meta[property="og:description"]"#,
    ".article-summary",
    ".article-abstract",
];

/// Scripts shorter than this are loaders and config stubs.
const MIN_SCRIPT_CHARS: usize = 50;

/// Script keys that may carry a publish time, highest priority first.
const SCRIPT_TIME_KEYS: [&str; 6] = [
    "datePublished",
    "publishTime",
    "publish_time",
    "time",
    "created_at",
    "date",
];

fn script_time_regexes() -> &'static [Regex] {
    static RES: OnceLock<Vec<Regex>> = OnceLock::new();
    RES.get_or_init(|| {
        SCRIPT_TIME_KEYS
            .iter()
            .map(|key| {
                Regex::new(&format!(r#""{key}"\s*:\s*"([^"]+)""#))
                    .expect("valid script time regex")
            })
            .collect()
    })
}

type Tier = fn(&DetailResolver, &Html) -> ArticleDetail;

/// Resolver for an article's publish time, author and summary.
pub struct DetailResolver {
    linked_data: Selector,
    render_data: Selector,
    script: Selector,
    authors: Vec<Selector>,
    summaries: Vec<Selector>,
}

impl DetailResolver {
    /// Create a resolver with its selectors compiled.
    pub fn new() -> Result<Self> {
        Ok(Self {
            linked_data: parse_selector(LINKED_DATA_SELECTOR)?,
            render_data: parse_selector(RENDER_DATA_SELECTOR)?,
            script: parse_selector(SCRIPT_SELECTOR)?,
            authors: AUTHOR_SELECTORS
                .iter()
                .map(|s| parse_selector(s))
                .collect::<Result<_>>()?,
            summaries: SUMMARY_SELECTORS
                .iter()
                .map(|s| parse_selector(s))
                .collect::<Result<_>>()?,
        })
    }

    /// Fetch one article's detail page and resolve what it can.
    ///
    /// A failed fetch yields an empty detail so the article still goes
    /// through with its listing data. Only a lost session is returned as an
    /// error, since nothing after it can succeed either.
    pub async fn resolve(&self, source: &dyn PageSource, article_id: &str) -> Result<ArticleDetail> {
        match source.fetch_detail(article_id).await {
            Ok(html) => {
                let detail = self.parse(&html);
                if detail.is_empty() {
                    log::debug!("No details found for article {article_id}");
                }
                Ok(detail)
            }
            Err(e) if e.is_session_lost() => Err(e),
            Err(e) => {
                log::warn!("Failed to fetch details for article {article_id}: {e}");
                Ok(ArticleDetail::default())
            }
        }
    }

    /// Resolve details from detail page markup.
    pub fn parse(&self, html: &str) -> ArticleDetail {
        let document = Html::parse_document(html);
        let tiers: [Tier; 5] = [
            Self::from_linked_data,
            Self::from_render_data,
            Self::time_from_scripts,
            Self::author_from_markup,
            Self::summary_from_markup,
        ];

        let mut detail = ArticleDetail::default();
        for tier in tiers {
            if detail.is_complete() {
                break;
            }
            detail.fill_from(tier(self, &document));
        }

        detail.publish_time = detail.publish_time.map(|time| canonicalize_time(&time));
        detail
    }

    fn from_linked_data(&self, document: &Html) -> ArticleDetail {
        let mut detail = ArticleDetail::default();

        for script in document.select(&self.linked_data) {
            let raw = script.text().collect::<String>();
            let value: Value = match serde_json::from_str(&raw) {
                Ok(value) => value,
                Err(e) => {
                    log::debug!("Skipping malformed linked data: {e}");
                    continue;
                }
            };

            for object in linked_data_objects(&value) {
                detail.fill_from(ArticleDetail {
                    publish_time: string_field(object, "datePublished"),
                    author: object.get("author").and_then(author_name),
                    summary: string_field(object, "description"),
                });
            }
        }
        detail
    }

    fn from_render_data(&self, document: &Html) -> ArticleDetail {
        let Some(script) = document.select(&self.render_data).next() else {
            return ArticleDetail::default();
        };

        let raw = script.text().collect::<String>();
        let decoded = match percent_decode_str(raw.trim()).decode_utf8() {
            Ok(decoded) => decoded,
            Err(e) => {
                log::debug!("RENDER_DATA is not valid UTF-8 after decoding: {e}");
                return ArticleDetail::default();
            }
        };
        let value: Value = match serde_json::from_str(&decoded) {
            Ok(value) => value,
            Err(e) => {
                log::warn!("Failed to parse RENDER_DATA: {e}");
                return ArticleDetail::default();
            }
        };

        let Some(data) = value.get("data") else {
            return ArticleDetail::default();
        };
        ArticleDetail {
            publish_time: string_field(data, "publishTime"),
            author: string_field(data, "source"),
            summary: string_field(data, "abstract"),
        }
    }

    fn time_from_scripts(&self, document: &Html) -> ArticleDetail {
        let publish_time = document
            .select(&self.script)
            .map(|script| script.text().collect::<String>())
            .filter(|text| text.chars().count() > MIN_SCRIPT_CHARS)
            .find_map(|text| {
                script_time_regexes().iter().find_map(|re| {
                    re.captures(&text)
                        .and_then(|caps| caps.get(1))
                        .map(|m| m.as_str())
                        .filter(|value| validate_time_token(value))
                        .map(str::to_string)
                })
            });

        ArticleDetail {
            publish_time,
            ..Default::default()
        }
    }

    fn author_from_markup(&self, document: &Html) -> ArticleDetail {
        let author = self.authors.iter().find_map(|selector| {
            document
                .select(selector)
                .next()
                .map(|element| match element.value().name() {
                    "meta" => element
                        .value()
                        .attr("content")
                        .unwrap_or_default()
                        .trim()
                        .to_string(),
                    _ => element_text(element),
                })
                .filter(|text| plausible_author(text))
        });

        ArticleDetail {
            author,
            ..Default::default()
        }
    }

    fn summary_from_markup(&self, document: &Html) -> ArticleDetail {
        let summary = self.summaries.iter().find_map(|selector| {
            document.select(selector).next().and_then(|element| {
                match element.value().name() {
                    "meta" => element.value().attr("content").and_then(non_empty),
                    _ => non_empty(element_text(element)),
                }
            })
        });

        ArticleDetail {
            summary,
            ..Default::default()
        }
    }
}

/// Top-level objects of a linked-data block: the object itself, array items,
/// or `@graph` members.
fn linked_data_objects(value: &Value) -> Vec<&Value> {
    match value {
        Value::Array(items) => items.iter().filter(|item| item.is_object()).collect(),
        Value::Object(map) => match map.get("@graph") {
            Some(Value::Array(items)) => items.iter().filter(|item| item.is_object()).collect(),
            _ => vec![value],
        },
        _ => Vec::new(),
    }
}

fn string_field(value: &Value, key: &str) -> Option<String> {
    value.get(key).and_then(Value::as_str).and_then(non_empty)
}

/// `author` as an object with `name`, the first such object of an array, or
/// a plain string.
fn author_name(author: &Value) -> Option<String> {
    match author {
        Value::String(name) => non_empty(name),
        Value::Object(_) => string_field(author, "name"),
        Value::Array(items) => items.iter().find_map(|item| string_field(item, "name")),
        _ => None,
    }
}

fn plausible_author(text: &str) -> bool {
    let chars = text.chars().count();
    (2..=50).contains(&chars) && !text.chars().all(|c| c.is_ascii_digit())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn resolver() -> DetailResolver {
        DetailResolver::new().unwrap()
    }

    fn page(head: &str, body: &str) -> String {
        format!("<html><head>{head}</head><body>{body}</body></html>")
    }

    #[test]
    fn test_linked_data_wins() {
        let html = page(
            r#"<script type="application/ld+json">
            {"@type":"NewsArticle","datePublished":"2025-07-09T11:39:17+08:00",
             "author":{"@type":"Person","name":"纯侃体育"},"description":"国乒全员晋级"}
            </script>
            <meta name="author" content="Someone Else">"#,
            "",
        );
        let detail = resolver().parse(&html);

        assert_eq!(detail.publish_time.as_deref(), Some("2025-07-09 11:39:17"));
        assert_eq!(detail.author.as_deref(), Some("纯侃体育"));
        assert_eq!(detail.summary.as_deref(), Some("国乒全员晋级"));
    }

    #[test]
    fn test_linked_data_author_array() {
        let html = page(
            r#"<script type="application/ld+json">
            [{"@type":"NewsArticle","author":[{"name":"First"},{"name":"Second"}]}]
            </script>"#,
            "",
        );
        assert_eq!(resolver().parse(&html).author.as_deref(), Some("First"));
    }

    #[test]
    fn test_render_data_fills_gaps() {
        let payload = "%7B%22data%22%3A%7B%22publishTime%22%3A%222025-07-08T08%3A00%3A00%2B08%3A00%22%2C%22source%22%3A%22%E7%BA%AF%E4%BE%83%E4%BD%93%E8%82%B2%22%2C%22abstract%22%3A%22Render%20summary%22%7D%7D";
        let html = page(
            &format!(
                r#"<script type="application/ld+json">{{"description":"Linked summary"}}</script>
                <script id="RENDER_DATA" type="application/json">{payload}</script>"#
            ),
            "",
        );
        let detail = resolver().parse(&html);

        assert_eq!(detail.publish_time.as_deref(), Some("2025-07-08 08:00:00"));
        assert_eq!(detail.author.as_deref(), Some("纯侃体育"));
        assert_eq!(detail.summary.as_deref(), Some("Linked summary"));
    }

    #[test]
    fn test_malformed_json_does_not_stop_resolution() {
        let html = page(
            r#"<script type="application/ld+json">{not json</script>
            <script id="RENDER_DATA">%7Bbroken</script>
            <meta name="author" content="Markup Author">
            <meta name="description" content="Markup summary">"#,
            "",
        );
        let detail = resolver().parse(&html);

        assert!(detail.publish_time.is_none());
        assert_eq!(detail.author.as_deref(), Some("Markup Author"));
        assert_eq!(detail.summary.as_deref(), Some("Markup summary"));
    }

    #[test]
    fn test_script_scan_respects_key_priority_and_validation() {
        let html = page(
            r#"<script>var short = {"time":"2025-01-01 00:00:00"};</script>
            <script>window.__STATE__ = {"date":"2025-07-01 10:00:00","publish_time":"not a time","publishTime":"2025-07-09 11:39:17"};</script>"#,
            "",
        );
        let detail = resolver().parse(&html);
        assert_eq!(detail.publish_time.as_deref(), Some("2025-07-09 11:39:17"));
    }

    #[test]
    fn test_author_selectors_skip_implausible_values() {
        let html = page(
            "",
            r#"<span class="article-author">1234567</span>
            <span class="author-name">X</span>
            <div data-author="x">纯侃体育</div>"#,
        );
        assert_eq!(resolver().parse(&html).author.as_deref(), Some("纯侃体育"));
    }

    #[test]
    fn test_summary_falls_through_empty_meta() {
        let html = page(
            r#"<meta name="description" content="  ">"#,
            r#"<div class="article-abstract">Abstract text</div>"#,
        );
        assert_eq!(resolver().parse(&html).summary.as_deref(), Some("Abstract text"));
    }

    #[test]
    fn test_empty_page_resolves_nothing() {
        assert!(resolver().parse("<html></html>").is_empty());
    }
}
