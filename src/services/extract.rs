// src/services/extract.rs

//! Listing page extraction.
//!
//! Turns the rendered markup of a publisher's profile page into an ordered
//! list of partial [`ArticleRecord`]s. Two independent strategies run in
//! order:
//!
//! 1. **Cards**: one `profile-article-card-wrapper` per article, with title,
//!    read count, comment count, and relative time inside the card.
//! 2. **Link scan**: used only when the page has no cards at all. Every
//!    `/article/<id>/` link in page order, deduplicated by id, without
//!    counts or time.
//!
//! Extraction never fails. A candidate that cannot be parsed is skipped.

use std::collections::HashSet;

use scraper::{ElementRef, Html, Selector};
use url::Url;

use crate::error::{AppError, Result};
use crate::models::ArticleRecord;
use crate::services::normalize::{parse_comment_count, parse_shorthand_count, validate_time_token};
use crate::utils::{extract_article_id, resolve_url};

/// Titles shorter than this are navigation noise, not articles.
pub const MIN_TITLE_CHARS: usize = 5;

/// Link captions that point at articles but are not titles.
const PLACEHOLDER_TITLES: [&str; 3] = ["更多", "查看更多", "详情"];

const CARD_SELECTOR: &str = "div.profile-article-card-wrapper";
const LINK_SELECTOR: &str = "a[href]";
const READ_COUNT_SELECTOR: &str = "div.profile-feed-card-tools-text";
const COMMENT_SELECTOR: &str = r##"a[href*="#comment"]"##;
const TIME_SELECTOR: &str = "div.feed-card-footer-time-cmp";

/// Which strategy produced an extraction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    Cards,
    LinkScan,
}

/// Records extracted from one listing page.
#[derive(Debug, Clone)]
pub struct Extraction {
    pub strategy: Strategy,
    pub articles: Vec<ArticleRecord>,
}

/// Extractor for profile listing pages.
pub struct ListingExtractor {
    base_url: Url,
    card: Selector,
    link: Selector,
    read_count: Selector,
    comment: Selector,
    time: Selector,
}

impl ListingExtractor {
    /// Create an extractor resolving article links against `base_url`.
    pub fn new(base_url: &str) -> Result<Self> {
        Ok(Self {
            base_url: Url::parse(base_url)?,
            card: parse_selector(CARD_SELECTOR)?,
            link: parse_selector(LINK_SELECTOR)?,
            read_count: parse_selector(READ_COUNT_SELECTOR)?,
            comment: parse_selector(COMMENT_SELECTOR)?,
            time: parse_selector(TIME_SELECTOR)?,
        })
    }

    /// Extract up to `max_count` articles from listing markup.
    pub fn extract(&self, html: &str, max_count: usize) -> Extraction {
        let document = Html::parse_document(html);

        if let Some(articles) = self.extract_from_cards(&document, max_count) {
            log::debug!("Card strategy produced {} article(s)", articles.len());
            return Extraction {
                strategy: Strategy::Cards,
                articles,
            };
        }

        log::warn!("No article cards found, falling back to link scan");
        let articles = self.extract_from_links(&document, max_count);
        log::debug!("Link scan produced {} article(s)", articles.len());
        Extraction {
            strategy: Strategy::LinkScan,
            articles,
        }
    }

    /// Card strategy. `None` when the page has no cards at all.
    fn extract_from_cards(&self, document: &Html, max_count: usize) -> Option<Vec<ArticleRecord>> {
        let cards: Vec<ElementRef> = document.select(&self.card).collect();
        if cards.is_empty() {
            return None;
        }
        log::debug!("Found {} article card(s)", cards.len());

        Some(
            cards
                .into_iter()
                .take(max_count)
                .filter_map(|card| self.parse_card(card))
                .collect(),
        )
    }

    fn parse_card(&self, card: ElementRef<'_>) -> Option<ArticleRecord> {
        let (link, href, article_id) = card.select(&self.link).find_map(|a| {
            let href = a.value().attr("href")?;
            let id = extract_article_id(href)?;
            Some((a, href, id))
        })?;

        let title = link_title(link);
        if title.chars().count() < MIN_TITLE_CHARS {
            log::debug!("Skipping card {article_id}: title too short ({title:?})");
            return None;
        }

        let mut record = ArticleRecord::new(article_id, title, resolve_url(&self.base_url, href));

        record.read_count = card
            .select(&self.read_count)
            .map(element_text)
            .find(|text| text.contains("阅读"))
            .map(|text| parse_shorthand_count(&text))
            .unwrap_or(0);

        record.comment_count = card
            .select(&self.comment)
            .next()
            .map(|el| parse_comment_count(&element_text(el)))
            .unwrap_or(0);

        record.publish_time = card
            .select(&self.time)
            .next()
            .map(element_text)
            .filter(|text| validate_time_token(text));

        log::debug!(
            "Parsed card {} (reads: {}, comments: {}): {}",
            record.article_id,
            record.read_count,
            record.comment_count,
            record.title
        );
        Some(record)
    }

    /// Link-scan strategy over the whole page.
    fn extract_from_links(&self, document: &Html, max_count: usize) -> Vec<ArticleRecord> {
        let mut seen = HashSet::new();
        let mut articles = Vec::new();

        for link in document.select(&self.link) {
            if articles.len() >= max_count {
                break;
            }
            let Some(href) = link.value().attr("href") else {
                continue;
            };
            let Some(article_id) = extract_article_id(href) else {
                continue;
            };
            // First link per id decides, even when its title is unusable.
            if !seen.insert(article_id.clone()) {
                continue;
            }

            let title = link_title(link);
            if title.chars().count() < MIN_TITLE_CHARS
                || PLACEHOLDER_TITLES.contains(&title.as_str())
            {
                continue;
            }

            articles.push(ArticleRecord::new(
                article_id,
                title,
                resolve_url(&self.base_url, href),
            ));
        }

        articles
    }
}

/// Extract articles with a throwaway extractor.
///
/// Returns an empty list when `base_url` is not a valid URL.
pub fn extract_articles(html: &str, max_count: usize, base_url: &str) -> Vec<ArticleRecord> {
    match ListingExtractor::new(base_url) {
        Ok(extractor) => extractor.extract(html, max_count).articles,
        Err(e) => {
            log::error!("Cannot build listing extractor: {e}");
            Vec::new()
        }
    }
}

/// Title of an article link: `title` attribute, then `aria-label`, then text.
fn link_title(link: ElementRef<'_>) -> String {
    ["title", "aria-label"]
        .iter()
        .filter_map(|attr| link.value().attr(attr))
        .map(str::trim)
        .find(|value| !value.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| element_text(link))
}

/// Visible text with every fragment trimmed and concatenated.
pub(crate) fn element_text(element: ElementRef<'_>) -> String {
    element
        .text()
        .map(str::trim)
        .filter(|fragment| !fragment.is_empty())
        .collect()
}

pub(crate) fn parse_selector(s: &str) -> Result<Selector> {
    Selector::parse(s).map_err(|e| AppError::selector(s, format!("{e:?}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    const BASE: &str = "https://www.toutiao.com";

    fn card(id: &str, title: &str, reads: &str, comments: &str, time: &str) -> String {
        format!(
            r##"<div class="profile-article-card-wrapper">
                 <div class="feed-card-article-l">
                   <a href="/article/{id}/" target="_blank" rel="noopener" title="{title}" aria-hidden="false">{title}</a>
                 </div>
                 <div class="feed-card-footer-cmp">
                   <div class="profile-feed-card-tools-text">{reads}</div>
                   <a href="/article/{id}/#comment" class="comment">{comments}</a>
                   <div class="feed-card-footer-time-cmp">{time}</div>
                 </div>
               </div>"##
        )
    }

    fn page(body: &str) -> String {
        format!("<html><body><div class=\"profile-tab-feed\">{body}</div></body></html>")
    }

    fn extractor() -> ListingExtractor {
        ListingExtractor::new(BASE).unwrap()
    }

    #[test]
    fn test_card_strategy_parses_all_fields() {
        let html = page(&card(
            "7524937913248006694",
            "WTT美国大满贯：国乒全员晋级",
            "5.9万阅读",
            "3862评论",
            "9小时前",
        ));
        let extraction = extractor().extract(&html, 10);

        assert_eq!(extraction.strategy, Strategy::Cards);
        assert_eq!(extraction.articles.len(), 1);
        let article = &extraction.articles[0];
        assert_eq!(article.article_id, "7524937913248006694");
        assert_eq!(article.title, "WTT美国大满贯：国乒全员晋级");
        assert_eq!(
            article.url,
            "https://www.toutiao.com/article/7524937913248006694/"
        );
        assert_eq!(article.read_count, 59_000);
        assert_eq!(article.comment_count, 3862);
        assert_eq!(article.publish_time.as_deref(), Some("9小时前"));
        assert!(article.author.is_none());
        assert!(!article.notified);
    }

    #[test]
    fn test_card_title_length_boundary() {
        let html = page(&format!(
            "{}{}",
            card("1", "四个字符", "1阅读", "", ""),
            card("2", "五个字符啊", "1阅读", "", "")
        ));
        let articles = extractor().extract(&html, 10).articles;

        assert_eq!(articles.len(), 1);
        assert_eq!(articles[0].article_id, "2");
    }

    #[test]
    fn test_card_title_falls_back_to_aria_label_and_text() {
        let html = page(
            r#"<div class="profile-article-card-wrapper">
                 <a href="/article/11/" aria-label="Label title here">ignored text</a>
               </div>
               <div class="profile-article-card-wrapper">
                 <a href="/article/12/" title="  "><span>Visible</span> <span>text title</span></a>
               </div>"#,
        );
        let articles = extractor().extract(&html, 10).articles;

        assert_eq!(articles.len(), 2);
        assert_eq!(articles[0].title, "Label title here");
        assert_eq!(articles[1].title, "Visibletext title");
    }

    #[test]
    fn test_card_without_article_link_is_skipped() {
        let html = page(
            r#"<div class="profile-article-card-wrapper"><a href="/video/1/" title="A video title">v</a></div>
               <div class="profile-article-card-wrapper"><a href="/article/2/" title="An article title">a</a></div>"#,
        );
        let articles = extractor().extract(&html, 10).articles;

        assert_eq!(articles.len(), 1);
        assert_eq!(articles[0].article_id, "2");
    }

    #[test]
    fn test_card_time_must_look_like_time() {
        let html = page(&card("3", "A proper title", "", "", "置顶"));
        let articles = extractor().extract(&html, 10).articles;
        assert!(articles[0].publish_time.is_none());
        assert_eq!(articles[0].read_count, 0);
        assert_eq!(articles[0].comment_count, 0);
    }

    #[test]
    fn test_card_limit_applies_to_containers() {
        let body: String = (1..=5)
            .map(|i| card(&i.to_string(), &format!("Article number {i}"), "", "", ""))
            .collect();
        let articles = extractor().extract(&page(&body), 3).articles;

        let ids: Vec<_> = articles.iter().map(|a| a.article_id.as_str()).collect();
        assert_eq!(ids, vec!["1", "2", "3"]);
    }

    #[test]
    fn test_fallback_deduplicates_ids() {
        let html = page(
            r#"<a href="/article/100/" title="First article title">x</a>
               <a href="/article/100/" title="First article title again">x</a>
               <a href="https://www.toutiao.com/article/200/">Second article title</a>
               <a href="/article/300/">更多</a>
               <a href="/article/400/">短</a>
               <a href="/user/1/">Not an article link</a>"#,
        );
        let extraction = extractor().extract(&html, 10);

        assert_eq!(extraction.strategy, Strategy::LinkScan);
        let ids: Vec<_> = extraction
            .articles
            .iter()
            .map(|a| a.article_id.as_str())
            .collect();
        assert_eq!(ids, vec!["100", "200"]);
        assert_eq!(extraction.articles[0].title, "First article title");
        assert!(extraction.articles.iter().all(|a| a.publish_time.is_none()));
    }

    #[test]
    fn test_fallback_first_link_per_id_decides() {
        let html = page(
            r#"<a href="/article/100/">更多</a>
               <a href="/article/100/" title="Real article title">x</a>
               <a href="/article/200/" title="Another article title">x</a>"#,
        );
        let extraction = extractor().extract(&html, 10);

        let ids: Vec<_> = extraction
            .articles
            .iter()
            .map(|a| a.article_id.as_str())
            .collect();
        assert_eq!(ids, vec!["200"]);
    }

    #[test]
    fn test_fallback_stops_at_max_count() {
        let body: String = (1..=6)
            .map(|i| format!(r#"<a href="/article/{i}/">Linked article {i}</a>"#))
            .collect();
        let articles = extractor().extract(&page(&body), 4).articles;
        assert_eq!(articles.len(), 4);
    }

    #[test]
    fn test_empty_page_yields_nothing() {
        assert!(extract_articles("<html></html>", 10, BASE).is_empty());
        assert!(extract_articles("not even html", 10, BASE).is_empty());
    }

    #[test]
    fn test_invalid_base_url_yields_nothing() {
        let html = page(&card("1", "A proper title", "", "", ""));
        assert!(extract_articles(&html, 10, "not a url").is_empty());
    }
}
