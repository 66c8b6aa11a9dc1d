//! Utility functions and helpers.

pub mod http;

use std::sync::OnceLock;

use regex::Regex;
use url::Url;

/// Query parameters that select the desktop article tab of a profile page.
const PROFILE_TAB_PARAMS: [(&str, &str); 2] = [("source", "profile"), ("tab", "article")];

/// Resolve a potentially relative URL against a base URL.
pub fn resolve_url(base: &Url, href: &str) -> String {
    base.join(href)
        .map(|u| u.to_string())
        .unwrap_or_else(|_| href.to_string())
}

/// Resolve a URL string against a base URL string.
pub fn resolve(base_url: &str, href: &str) -> Option<String> {
    Url::parse(base_url)
        .ok()
        .map(|base| resolve_url(&base, href))
}

fn article_path_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"/article/(\d+)/").expect("valid article path regex"))
}

/// Extract the numeric article ID from an `/article/<id>/` link.
pub fn extract_article_id(href: &str) -> Option<String> {
    article_path_regex()
        .captures(href)
        .and_then(|caps| caps.get(1))
        .map(|id| id.as_str().to_string())
}

/// Build the absolute URL of an article's detail page.
pub fn article_url(base_url: &str, article_id: &str) -> String {
    let href = format!("/article/{article_id}/");
    resolve(base_url, &href).unwrap_or_else(|| format!("{base_url}{href}"))
}

/// Ensure a profile URL carries the parameters that render the article tab.
///
/// Existing query parameters are kept; missing ones are appended.
pub fn profile_listing_url(profile_url: &str) -> crate::error::Result<String> {
    let mut url = Url::parse(profile_url.trim())?;
    let missing: Vec<(&str, &str)> = PROFILE_TAB_PARAMS
        .iter()
        .copied()
        .filter(|(key, value)| {
            !url.query_pairs()
                .any(|(k, v)| k == *key && v == *value)
        })
        .collect();

    if !missing.is_empty() {
        let mut pairs = url.query_pairs_mut();
        for (key, value) in missing {
            pairs.append_pair(key, value);
        }
    }
    Ok(url.to_string())
}
