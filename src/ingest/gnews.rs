// src/ingest/gnews.rs
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use once_cell::sync::OnceCell;
use quick_xml::de::from_str;
use serde::Deserialize;

use crate::article::ArticleItem;

const FEED_BASE: &str = "https://news.google.com/rss/search";

/// News-search provider boundary. One call returns up to `max_results`
/// retrieval items for a single query; failures are the caller's to absorb.
#[async_trait]
pub trait NewsSearch: Send + Sync {
    async fn search(&self, query: &str, max_results: usize) -> Result<Vec<ArticleItem>>;
    fn name(&self) -> &'static str;
}

#[derive(Debug, Deserialize)]
struct Rss {
    channel: Channel,
}

#[derive(Debug, Deserialize)]
struct Channel {
    #[serde(rename = "item", default)]
    item: Vec<Item>,
}

#[derive(Debug, Deserialize)]
struct Item {
    title: Option<String>,
    link: Option<String>,
    #[serde(rename = "pubDate")]
    pub_date: Option<String>,
    description: Option<String>,
    source: Option<SourceTag>,
}

#[derive(Debug, Deserialize)]
struct SourceTag {
    #[serde(rename = "$text")]
    name: Option<String>,
}

fn parse_rfc2822_to_utc(ts: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc2822(ts)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

/// Remove all HTML (anchors first, then remaining tags), unescape entities,
/// collapse whitespace. Feed descriptions arrive as markup.
pub fn strip_html(s: &str) -> String {
    static RE_ANCHORS: OnceCell<regex::Regex> = OnceCell::new();
    static RE_TAGS: OnceCell<regex::Regex> = OnceCell::new();
    static RE_WS: OnceCell<regex::Regex> = OnceCell::new();

    let re_anchors = RE_ANCHORS.get_or_init(|| regex::Regex::new(r"(?is)<a[^>]*>.*?</a>").unwrap());
    let re_tags = RE_TAGS.get_or_init(|| regex::Regex::new(r"(?is)</?[^>]+>").unwrap());
    let re_ws = RE_WS.get_or_init(|| regex::Regex::new(r"\s+").unwrap());

    let out = re_anchors.replace_all(s, "");
    let out = re_tags.replace_all(&out, "");
    let out = html_escape::decode_html_entities(&out).to_string();
    re_ws.replace_all(&out, " ").trim().to_string()
}

/// Parse a search feed document into retrieval items. Items without a link
/// are dropped; `relevance_score` stays unset.
pub fn parse_feed(xml: &str, max_results: usize) -> Result<Vec<ArticleItem>> {
    let rss: Rss = from_str(xml).context("parsing news search rss xml")?;
    let mut out = Vec::with_capacity(rss.channel.item.len().min(max_results));

    for it in rss.channel.item.into_iter().take(max_results) {
        let link = it.link.unwrap_or_default();
        if link.is_empty() {
            continue;
        }
        let mut article = ArticleItem::new(
            link,
            strip_html(&it.title.unwrap_or_default()),
            it.source.and_then(|s| s.name).unwrap_or_default().trim().to_string(),
        );
        article.published_at = it.pub_date.as_deref().and_then(parse_rfc2822_to_utc);
        article.summary = strip_html(&it.description.unwrap_or_default());
        out.push(article);
    }
    Ok(out)
}

/// Build the encoded search-feed URL for one query.
pub fn feed_url(query: &str, lang: &str, country: &str) -> String {
    let hl = format!("{lang}-{country}");
    let ceid = format!("{country}:{lang}");
    format!(
        "{FEED_BASE}?q={}&hl={}&gl={}&ceid={}",
        urlencoding::encode(query),
        urlencoding::encode(&hl),
        urlencoding::encode(country),
        urlencoding::encode(&ceid),
    )
}

/// Live search provider backed by the aggregator's RSS search feeds.
pub struct GoogleNewsSearch {
    http: reqwest::Client,
    lang: String,
    country: String,
}

impl GoogleNewsSearch {
    pub fn new(http: reqwest::Client) -> Self {
        Self {
            http,
            lang: "en".to_string(),
            country: "US".to_string(),
        }
    }
}

#[async_trait]
impl NewsSearch for GoogleNewsSearch {
    async fn search(&self, query: &str, max_results: usize) -> Result<Vec<ArticleItem>> {
        let url = feed_url(query, &self.lang, &self.country);
        let xml = self
            .http
            .get(&url)
            .send()
            .await
            .context("news search request")?
            .error_for_status()
            .context("news search status")?
            .text()
            .await
            .context("news search body")?;
        parse_feed(&xml, max_results)
    }

    fn name(&self) -> &'static str {
        "google-news-rss"
    }
}

/// Fixture-backed provider for tests: returns canned items per query prefix,
/// errors for queries marked as failing.
pub struct FixtureSearch {
    pub items: Vec<ArticleItem>,
    pub fail: bool,
}

#[async_trait]
impl NewsSearch for FixtureSearch {
    async fn search(&self, _query: &str, max_results: usize) -> Result<Vec<ArticleItem>> {
        if self.fail {
            anyhow::bail!("fixture provider configured to fail");
        }
        Ok(self.items.iter().take(max_results).cloned().collect())
    }

    fn name(&self) -> &'static str {
        "fixture"
    }
}
