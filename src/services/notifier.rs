// src/services/notifier.rs

//! Webhook notifications for new articles.
//!
//! Messages go to a Feishu-style group bot webhook as either a plain `text`
//! message or a rich `post` message. When a secret is configured every body
//! is signed with the current unix timestamp.

use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use hmac::{Hmac, Mac};
use serde_json::{Value, json};
use sha2::Sha256;
use unicode_segmentation::UnicodeSegmentation;

use crate::error::{AppError, Result};
use crate::models::{ArticleRecord, MessageFormat, NotifierConfig};
use crate::utils::http::create_webhook_client;

type HmacSha256 = Hmac<Sha256>;

/// Summaries longer than this are cut and suffixed with `...`.
pub const SUMMARY_MAX_CHARS: usize = 150;

const HEADER: &str = "📰 发现新文章！";
const POST_TITLE: &str = "头条博主新文章通知";
const TEST_MESSAGE: &str = "🤖 头条文章监控系统测试消息";

/// Delivery of article notifications.
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Send one article; `true` only when the receiver confirmed delivery.
    async fn send(&self, article: &ArticleRecord) -> bool;
}

/// Notifier posting to a group bot webhook.
pub struct WebhookNotifier {
    client: reqwest::Client,
    webhook_url: String,
    secret: Option<String>,
    format: MessageFormat,
}

impl WebhookNotifier {
    pub fn new(config: &NotifierConfig) -> Result<Self> {
        Ok(Self {
            client: create_webhook_client(config)?,
            webhook_url: config.webhook_url.clone(),
            secret: config.secret.clone().filter(|s| !s.trim().is_empty()),
            format: config.format,
        })
    }

    /// Send an arbitrary text message.
    pub async fn send_text(&self, content: &str) -> bool {
        self.deliver("text", json!({ "text": content })).await
    }

    /// Send the fixed test message used by the self-test.
    pub async fn test_connection(&self) -> bool {
        self.send_text(TEST_MESSAGE).await
    }

    async fn deliver(&self, msg_type: &str, content: Value) -> bool {
        let body = match self.envelope(msg_type, content, chrono::Utc::now().timestamp()) {
            Ok(body) => body,
            Err(e) => {
                log::error!("Failed to build webhook message: {e}");
                return false;
            }
        };

        let response = match self.client.post(&self.webhook_url).json(&body).send().await {
            Ok(response) => response,
            Err(e) => {
                log::error!("Webhook request failed: {e}");
                return false;
            }
        };

        let status = response.status();
        let text = response.text().await.unwrap_or_default();
        if !status.is_success() {
            log::error!("Webhook returned HTTP {status}: {text}");
            return false;
        }

        match serde_json::from_str::<Value>(&text) {
            Ok(result) if result.get("StatusCode").and_then(Value::as_i64) == Some(0) => {
                log::info!("Webhook message delivered");
                true
            }
            Ok(result) => {
                log::error!("Webhook rejected message: {result}");
                false
            }
            Err(e) => {
                log::error!("Webhook returned non-JSON response ({e}): {text}");
                false
            }
        }
    }

    fn envelope(&self, msg_type: &str, content: Value, timestamp: i64) -> Result<Value> {
        let mut body = json!({
            "msg_type": msg_type,
            "content": content,
        });

        if let Some(secret) = &self.secret {
            let timestamp = timestamp.to_string();
            body["sign"] = Value::String(sign(&timestamp, secret)?);
            body["timestamp"] = Value::String(timestamp);
        }
        Ok(body)
    }
}

#[async_trait]
impl Notifier for WebhookNotifier {
    async fn send(&self, article: &ArticleRecord) -> bool {
        log::info!("Notifying article {}: {}", article.article_id, article.title);
        match self.format {
            MessageFormat::Text => self.send_text(&format_message(article)).await,
            MessageFormat::Post => {
                self.deliver("post", post_content(article)).await
            }
        }
    }
}

/// Signature of a webhook body: HMAC-SHA256 keyed by `"{timestamp}\n{secret}"`
/// over an empty message, base64 encoded.
pub fn sign(timestamp: &str, secret: &str) -> Result<String> {
    let key = format!("{timestamp}\n{secret}");
    let mac = HmacSha256::new_from_slice(key.as_bytes())
        .map_err(|e| AppError::validation(format!("invalid signing key: {e}")))?;
    Ok(STANDARD.encode(mac.finalize().into_bytes()))
}

/// Render an article as a plain text message.
pub fn format_message(article: &ArticleRecord) -> String {
    let mut lines = vec![
        HEADER.to_string(),
        String::new(),
        format!("📄 标题：{}", article.title),
    ];

    if let Some(author) = &article.author {
        lines.push(format!("👤 作者：{author}"));
    }
    if let Some(time) = &article.publish_time {
        lines.push(format!("⏰ 时间：{time}"));
    }
    if let Some(stats) = stats_line(article) {
        lines.push(format!("📊 数据：{stats}"));
    }
    if let Some(summary) = &article.summary {
        lines.push(format!("📝 摘要：{}", truncate_summary(summary)));
    }

    lines.push(String::new());
    lines.push(format!("🔗 链接：{}", article.url));
    lines.join("\n")
}

/// Render an article as rich `post` content.
pub fn post_content(article: &ArticleRecord) -> Value {
    let text_row = |text: String| json!([{ "tag": "text", "text": text }]);

    let mut rows = vec![text_row(HEADER.to_string()), text_row(format!("📄 {}", article.title))];
    if let Some(author) = &article.author {
        rows.push(text_row(format!("👤 {author}")));
    }
    if let Some(time) = &article.publish_time {
        rows.push(text_row(format!("⏰ {time}")));
    }
    if let Some(stats) = stats_line(article) {
        rows.push(text_row(format!("📊 {stats}")));
    }
    if let Some(summary) = &article.summary {
        rows.push(text_row(format!("📝 {}", truncate_summary(summary))));
    }
    rows.push(json!([{ "tag": "a", "text": "🔗 点击查看原文", "href": article.url }]));

    json!({
        "post": {
            "zh_cn": {
                "title": POST_TITLE,
                "content": rows,
            }
        }
    })
}

fn stats_line(article: &ArticleRecord) -> Option<String> {
    let mut parts = Vec::new();
    if article.read_count > 0 {
        parts.push(format!("👀 {}阅读", format_read_count(article.read_count)));
    }
    if article.comment_count > 0 {
        parts.push(format!("💬 {}评论", article.comment_count));
    }
    (!parts.is_empty()).then(|| parts.join(" | "))
}

/// `12345` → `"1.2万"`; counts below ten thousand are printed as is.
fn format_read_count(count: u64) -> String {
    if count >= 10_000 {
        format!("{:.1}万", count as f64 / 10_000.0)
    } else {
        count.to_string()
    }
}

fn truncate_summary(summary: &str) -> String {
    let mut graphemes = summary.graphemes(true);
    let head: String = graphemes.by_ref().take(SUMMARY_MAX_CHARS).collect();
    if graphemes.next().is_some() {
        format!("{head}...")
    } else {
        head
    }
}
