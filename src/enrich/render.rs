// src/enrich/render.rs
//! Tier-2 escalation: a rendering-capable fetch service that executes
//! JavaScript before returning HTML, plus metadata re-extraction for image
//! and publication-date backfill. Upstream 4xx is treated as definitive;
//! 5xx and malformed envelopes are retried within a tight budget.

use std::fmt;
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use scraper::{Html, Selector};
use serde::Deserialize;

use crate::enrich::media;
use crate::retry::{Attempt, RetryPolicy};

const RENDER_API_BASE: &str = "https://api.crawlbase.com";
const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);
const READ_TIMEOUT: Duration = Duration::from_secs(20);
// Most publishers expose OG/Twitter tags without long JS idle time.
const PAGE_WAIT_MS: u32 = 1_000;
const AJAX_WAIT_MS: u32 = 300;

/// Rendered page plus the upstream HTTP status observed by the service.
#[derive(Debug, Clone)]
pub struct RenderedPage {
    pub status: u16,
    pub html: String,
}

/// Rendering-fetch provider boundary.
#[async_trait]
pub trait RenderFetch: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<RenderedPage>;
    fn name(&self) -> &'static str;
}

/// Failure classification carried out of one render attempt.
#[derive(Debug)]
pub enum FetchFailure {
    /// Origin 4xx or equivalent; retrying will not help.
    Permanent(String),
    /// Timeouts, 5xx, malformed envelopes; worth one more try.
    Transient(String),
}

impl fmt::Display for FetchFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FetchFailure::Permanent(m) => write!(f, "permanent: {m}"),
            FetchFailure::Transient(m) => write!(f, "transient: {m}"),
        }
    }
}

impl std::error::Error for FetchFailure {}

/// Metadata recovered from a rendered page.
#[derive(Debug, Default, Clone)]
pub struct PageMetadata {
    pub title: Option<String>,
    pub description: Option<String>,
    pub image: Option<String>,
    pub published_at: Option<DateTime<Utc>>,
}

/// Crawlbase-style client: the service returns a JSON envelope with the
/// rendered body and the origin status.
pub struct CrawlbaseRender {
    http: reqwest::Client,
    token: String,
}

impl CrawlbaseRender {
    pub fn new(token: String) -> Self {
        let http = reqwest::Client::builder()
            .user_agent("country-risk-analyzer/0.1")
            .connect_timeout(CONNECT_TIMEOUT)
            .timeout(READ_TIMEOUT)
            .build()
            .unwrap_or_default();
        Self { http, token }
    }
}

#[derive(Debug, Deserialize)]
struct RenderEnvelope {
    original_status: Option<u16>,
    body: Option<String>,
}

#[async_trait]
impl RenderFetch for CrawlbaseRender {
    async fn fetch(&self, url: &str) -> Result<RenderedPage> {
        let resp = self
            .http
            .get(RENDER_API_BASE)
            .query(&[
                ("token", self.token.as_str()),
                ("url", url),
                ("format", "json"),
                ("device", "desktop"),
                ("page_wait", &PAGE_WAIT_MS.to_string()),
                ("ajax_wait", &AJAX_WAIT_MS.to_string()),
            ])
            .send()
            .await
            .context("render fetch request")?
            .error_for_status()
            .context("render fetch status")?;
        let envelope: RenderEnvelope = resp.json().await.context("render fetch envelope")?;
        Ok(RenderedPage {
            status: envelope.original_status.unwrap_or(0),
            html: envelope.body.unwrap_or_default(),
        })
    }

    fn name(&self) -> &'static str {
        "crawlbase"
    }
}

fn first_meta(doc: &Html, keys: &[&str]) -> Option<String> {
    for key in keys {
        for attr in ["property", "name"] {
            let Ok(sel) = Selector::parse(&format!("meta[{attr}=\"{key}\"]")) else {
                continue;
            };
            if let Some(content) = doc
                .select(&sel)
                .next()
                .and_then(|el| el.value().attr("content"))
            {
                let content = content.trim();
                if !content.is_empty() {
                    return Some(content.to_string());
                }
            }
        }
    }
    None
}

fn parse_published(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    // Date-only fallback, midnight UTC.
    chrono::NaiveDate::parse_from_str(raw.get(..10).unwrap_or(raw), "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|ndt| ndt.and_utc())
}

fn json_ld_published(doc: &Html) -> Option<String> {
    let sel = Selector::parse("script[type=\"application/ld+json\"]").ok()?;
    for script in doc.select(&sel) {
        let raw = script.text().collect::<String>();
        let Ok(data) = serde_json::from_str::<serde_json::Value>(&raw) else {
            continue;
        };
        let nodes: Vec<&serde_json::Value> = match &data {
            serde_json::Value::Array(items) => items.iter().collect(),
            other => vec![other],
        };
        for obj in nodes {
            let Some(map) = obj.as_object() else { continue };
            let ty = map.get("@type").and_then(|t| t.as_str()).unwrap_or("");
            if ty == "Article"
                || ty == "NewsArticle"
                || map.contains_key("headline")
                || map.contains_key("datePublished")
            {
                if let Some(d) = map
                    .get("datePublished")
                    .or_else(|| map.get("dateCreated"))
                    .and_then(|v| v.as_str())
                {
                    return Some(d.to_string());
                }
            }
        }
    }
    None
}

/// Re-run metadata extraction over rendered HTML: OG/Twitter tags first,
/// JSON-LD as fallback, plus a `<time datetime>` nudge for publishers that
/// expose dates only there.
pub fn extract_metadata(html: &str, url: &str) -> PageMetadata {
    let doc = Html::parse_document(html);

    let title = first_meta(&doc, &["og:title", "twitter:title"]);
    let description = first_meta(&doc, &["og:description", "twitter:description"]);
    let image = media::extract_thumbnail(&doc, url);
    let mut published_raw = first_meta(
        &doc,
        &["article:published_time", "og:pubdate", "publish_date", "date"],
    );

    if published_raw.is_none() {
        published_raw = json_ld_published(&doc);
    }
    if published_raw.is_none() {
        if let Ok(sel) = Selector::parse("time[datetime]") {
            published_raw = doc
                .select(&sel)
                .next()
                .and_then(|el| el.value().attr("datetime"))
                .map(|s| s.trim().to_string());
        }
    }

    PageMetadata {
        title,
        description,
        image,
        published_at: published_raw.as_deref().and_then(parse_published),
    }
}

/// Render one URL with the bounded retry policy and extract its metadata.
/// Origin 4xx fails permanently; 5xx and empty bodies are retried.
pub async fn render_and_extract(render: &dyn RenderFetch, url: &str) -> Result<PageMetadata, FetchFailure> {
    let policy = RetryPolicy::render_fetch();
    let page = policy
        .run(
            || async {
                let page = render
                    .fetch(url)
                    .await
                    .map_err(|e| FetchFailure::Transient(e.to_string()))?;
                match page.status {
                    // 429 is rate limiting, not a verdict on the page.
                    s if (400..500).contains(&s) && s != 429 => {
                        Err(FetchFailure::Permanent(format!("origin_{s}")))
                    }
                    s if s >= 500 || s == 0 || page.html.is_empty() => Err(
                        FetchFailure::Transient(format!("status {s}, bytes {}", page.html.len())),
                    ),
                    _ => Ok(page),
                }
            },
            |e| match e {
                FetchFailure::Permanent(_) => Attempt::Permanent,
                FetchFailure::Transient(_) => Attempt::Transient,
            },
        )
        .await?;

    Ok(extract_metadata(&page.html, url))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    struct SeqRender {
        pages: Vec<Result<RenderedPage, String>>,
        calls: AtomicU32,
    }

    #[async_trait]
    impl RenderFetch for SeqRender {
        async fn fetch(&self, _url: &str) -> Result<RenderedPage> {
            let i = self.calls.fetch_add(1, Ordering::SeqCst) as usize;
            match self.pages.get(i.min(self.pages.len() - 1)).unwrap() {
                Ok(p) => Ok(p.clone()),
                Err(m) => anyhow::bail!("{m}"),
            }
        }
        fn name(&self) -> &'static str {
            "seq"
        }
    }

    const PAGE: &str = r#"<html><head>
        <meta property="og:image" content="https://cdn.example/lead.jpg">
        <meta property="article:published_time" content="2025-06-28T10:00:00Z">
    </head><body></body></html>"#;

    #[test]
    fn metadata_extraction_reads_og_and_date() {
        let meta = extract_metadata(PAGE, "https://pub.example/a");
        assert_eq!(meta.image.as_deref(), Some("https://cdn.example/lead.jpg"));
        assert_eq!(
            meta.published_at.unwrap().to_rfc3339(),
            "2025-06-28T10:00:00+00:00"
        );
    }

    #[test]
    fn time_tag_is_a_fallback_for_dates() {
        let html = r#"<article><time datetime="2025-05-01T08:00:00Z">May 1</time></article>"#;
        let meta = extract_metadata(html, "https://pub.example/a");
        assert_eq!(
            meta.published_at.unwrap().to_rfc3339(),
            "2025-05-01T08:00:00+00:00"
        );
    }

    #[tokio::test]
    async fn origin_4xx_is_not_retried() {
        let render = SeqRender {
            pages: vec![Ok(RenderedPage {
                status: 404,
                html: "x".into(),
            })],
            calls: AtomicU32::new(0),
        };
        let out = render_and_extract(&render, "https://pub.example/a").await;
        assert!(matches!(out, Err(FetchFailure::Permanent(_))));
        assert_eq!(render.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn transient_5xx_retries_then_succeeds() {
        let render = SeqRender {
            pages: vec![
                Ok(RenderedPage {
                    status: 503,
                    html: String::new(),
                }),
                Ok(RenderedPage {
                    status: 200,
                    html: PAGE.into(),
                }),
            ],
            calls: AtomicU32::new(0),
        };
        let meta = render_and_extract(&render, "https://pub.example/a")
            .await
            .unwrap();
        assert!(meta.image.is_some());
        assert_eq!(render.calls.load(Ordering::SeqCst), 2);
    }
}
