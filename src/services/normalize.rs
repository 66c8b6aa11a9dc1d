// src/services/normalize.rs

//! Normalization of raw page text into canonical values.
//!
//! Listing and detail pages render counts as locale shorthand ("5.9万阅读")
//! and timestamps in a handful of absolute and relative shapes. Everything
//! here is pure and never fails: unparseable input yields `0`, `false`, or
//! the input itself.

use std::sync::OnceLock;

use chrono::{DateTime, NaiveDateTime};
use regex::Regex;

/// Output layout of canonical timestamps.
pub const CANONICAL_TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

fn shorthand_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(\d+(?:\.\d+)?)\s*([万千]?)\s*(?:阅读|评论|播放|点赞|粉丝|赞)?")
            .expect("valid shorthand regex")
    })
}

fn comment_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(\d+)\s*评论").expect("valid comment regex"))
}

fn time_token_regexes() -> &'static [Regex] {
    static RES: OnceLock<Vec<Regex>> = OnceLock::new();
    RES.get_or_init(|| {
        [
            r"\d{4}-\d{2}-\d{2}T\d{2}:\d{2}:\d{2}",
            r"\d{4}-\d{2}-\d{2} \d{2}:\d{2}:\d{2}",
            r"\d{4}年\d{1,2}月\d{1,2}日",
            r"\d{1,2}小时前",
            r"\d{1,2}分钟前",
            r"\d{1,2}天前",
            r"前天\s*\d{2}:\d{2}",
            r"昨天\s*\d{2}:\d{2}",
        ]
        .iter()
        .map(|pattern| Regex::new(pattern).expect("valid time regex"))
        .collect()
    })
}

/// Parse a shorthand count such as `"5.9万阅读"`, `"3千"` or `"266"`.
///
/// The first decimal magnitude is scaled by its unit (`万` = 10,000,
/// `千` = 1,000) and rounded. Returns 0 when the text has no number.
pub fn parse_shorthand_count(text: &str) -> u64 {
    let Some(caps) = shorthand_regex().captures(text) else {
        return 0;
    };
    let Some(magnitude) = caps.get(1).and_then(|m| m.as_str().parse::<f64>().ok()) else {
        return 0;
    };
    let multiplier = match caps.get(2).map(|m| m.as_str()) {
        Some("万") => 10_000.0,
        Some("千") => 1_000.0,
        _ => 1.0,
    };

    let value = (magnitude * multiplier).round();
    if value.is_finite() && value >= 0.0 {
        value as u64
    } else {
        0
    }
}

/// Parse the integer preceding `评论` (e.g. `"3862评论"` → 3862).
pub fn parse_comment_count(text: &str) -> u64 {
    comment_regex()
        .captures(text)
        .and_then(|caps| caps.get(1))
        .and_then(|m| m.as_str().parse().ok())
        .unwrap_or(0)
}

/// Whether a token looks like a publish time rather than arbitrary digits.
///
/// Accepted shapes: ISO `YYYY-MM-DDTHH:MM:SS`, `YYYY-MM-DD HH:MM:SS`,
/// `YYYY年M月D日`, `N小时前`, `N分钟前`, `N天前`, `前天HH:MM`, `昨天HH:MM`.
pub fn validate_time_token(text: &str) -> bool {
    let text = text.trim();
    !text.is_empty() && time_token_regexes().iter().any(|re| re.is_match(text))
}

/// Re-render a zone-qualified timestamp as `YYYY-MM-DD HH:MM:SS`.
///
/// The wall-clock time is kept and the offset dropped, so
/// `2025-07-09T11:39:17+08:00` becomes `2025-07-09 11:39:17`. Tokens without
/// a zone (relative phrases, localized dates) are returned unchanged.
pub fn canonicalize_time(text: &str) -> String {
    let text = text.trim();
    if !has_zone_suffix(text) {
        return text.to_string();
    }

    if let Ok(parsed) = DateTime::parse_from_rfc3339(text) {
        return parsed.naive_local().format(CANONICAL_TIME_FORMAT).to_string();
    }

    // Offsets without seconds or with odd separators: cut the zone and parse the rest.
    let local_part = strip_zone(text);
    ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%dT%H:%M"]
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(local_part, format).ok())
        .map(|naive| naive.format(CANONICAL_TIME_FORMAT).to_string())
        .unwrap_or_else(|| text.to_string())
}

fn has_zone_suffix(text: &str) -> bool {
    let Some(t_pos) = text.find('T') else {
        return false;
    };
    let time_part = &text[t_pos + 1..];
    time_part.ends_with('Z') || time_part.contains('+') || time_part.contains('-')
}

fn strip_zone(text: &str) -> &str {
    let t_pos = text.find('T').unwrap_or(0);
    let zone_start = text[t_pos..]
        .find(['+', '-', 'Z'])
        .map(|offset| t_pos + offset)
        .unwrap_or(text.len());
    &text[..zone_start]
}

/// Compare two optional times for newest-first ordering.
///
/// Plain string comparison: canonical timestamps order correctly among
/// themselves, relative phrases do not. Records without a time sort last.
pub fn newest_first(a: Option<&str>, b: Option<&str>) -> std::cmp::Ordering {
    match (a, b) {
        (Some(a), Some(b)) => b.cmp(a),
        (Some(_), None) => std::cmp::Ordering::Less,
        (None, Some(_)) => std::cmp::Ordering::Greater,
        (None, None) => std::cmp::Ordering::Equal,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shorthand_units() {
        assert_eq!(parse_shorthand_count("5.9万阅读"), 59_000);
        assert_eq!(parse_shorthand_count("266万阅读"), 2_660_000);
        assert_eq!(parse_shorthand_count("2.66万"), 26_600);
        assert_eq!(parse_shorthand_count("3千"), 3_000);
        assert_eq!(parse_shorthand_count("0.29万"), 2_900);
        assert_eq!(parse_shorthand_count("812阅读"), 812);
    }

    #[test]
    fn test_shorthand_no_number() {
        assert_eq!(parse_shorthand_count("阅读"), 0);
        assert_eq!(parse_shorthand_count(""), 0);
    }

    #[test]
    fn test_shorthand_rounds_decimal_magnitudes() {
        for tenths in 0..100u64 {
            let text = format!("{}.{}万", tenths / 10, tenths % 10);
            assert_eq!(parse_shorthand_count(&text), tenths * 1_000, "{text}");
        }
    }

    #[test]
    fn test_comment_count() {
        assert_eq!(parse_comment_count("3862评论"), 3862);
        assert_eq!(parse_comment_count("33 评论"), 33);
        assert_eq!(parse_comment_count("评论"), 0);
    }

    #[test]
    fn test_validate_time_token_accepts_known_shapes() {
        for token in [
            "2025-07-09T11:39:17+08:00",
            "2025-07-09 11:39:17",
            "2021年09月18日",
            "2021年9月8日",
            "9小时前",
            "25分钟前",
            "3天前",
            "前天16:35",
            "昨天08:05",
        ] {
            assert!(validate_time_token(token), "{token}");
        }
    }

    #[test]
    fn test_validate_time_token_rejects_noise() {
        for token in ["", "12345678", "2025-07-09", "1.2万阅读", "昨天", "undefined"] {
            assert!(!validate_time_token(token), "{token}");
        }
    }

    #[test]
    fn test_canonicalize_zoned_timestamps() {
        assert_eq!(
            canonicalize_time("2025-07-09T11:39:17+08:00"),
            "2025-07-09 11:39:17"
        );
        assert_eq!(
            canonicalize_time("2025-07-09T03:39:17Z"),
            "2025-07-09 03:39:17"
        );
        assert_eq!(
            canonicalize_time("2025-07-09T11:39:17.250+08:00"),
            "2025-07-09 11:39:17"
        );
        assert_eq!(
            canonicalize_time("2025-07-09T11:39+08:00"),
            "2025-07-09 11:39:00"
        );
    }

    #[test]
    fn test_canonicalize_keeps_other_tokens() {
        for token in ["9小时前", "2021年09月18日", "2025-07-09 11:39", "昨天16:35"] {
            assert_eq!(canonicalize_time(token), token);
        }
    }

    #[test]
    fn test_newest_first() {
        let mut times = vec![
            None,
            Some("2025-07-08 10:00:00"),
            Some("2025-07-09 11:39:17"),
        ];
        times.sort_by(|a, b| newest_first(*a, *b));
        assert_eq!(
            times,
            vec![Some("2025-07-09 11:39:17"), Some("2025-07-08 10:00:00"), None]
        );
    }
}
