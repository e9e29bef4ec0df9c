// src/enrich/mod.rs
pub mod media;
pub mod render;
pub mod text;

use futures::stream::{self, StreamExt};
use scraper::Html;
use tracing::{debug, warn};

use crate::article::ArticleItem;
use crate::resolve::UrlResolver;

/// Concurrent in-flight article fetches during tier-1 enrichment.
const ENRICH_CONCURRENCY: usize = 8;
/// A summary shorter than this many words is considered low-quality and gets
/// replaced by an extracted lead.
const MIN_SUMMARY_WORDS: usize = 8;

/// Assets pulled from one article page with a single GET.
#[derive(Debug, Default, Clone)]
pub struct ArticleAssets {
    pub thumbnail: Option<String>,
    pub summary: String,
    pub full_text: String,
}

/// Fetch the URL exactly once and extract thumbnail, lead summary, and full
/// text. Every failure degrades to empty assets.
pub async fn fetch_article_assets(
    http: &reqwest::Client,
    url: &str,
    max_words: usize,
) -> ArticleAssets {
    let resp = match http.get(url).send().await.and_then(|r| r.error_for_status()) {
        Ok(r) => r,
        Err(e) => {
            debug!(url, error = %e, "tier-1 fetch failed");
            return ArticleAssets::default();
        }
    };
    // Base URL after redirects, so relative image paths resolve correctly.
    let base = resp.url().to_string();
    let html = match resp.text().await {
        Ok(t) => t,
        Err(e) => {
            debug!(url, error = %e, "tier-1 body read failed");
            return ArticleAssets::default();
        }
    };

    let doc = Html::parse_document(&html);
    let thumbnail = media::extract_thumbnail(&doc, &base);
    let full_text = text::extract_main_text(&html);
    let summary = if full_text.is_empty() {
        String::new()
    } else {
        text::summarize_lead(&full_text, max_words)
    };

    ArticleAssets {
        thumbnail,
        summary,
        full_text,
    }
}

/// True when the item's current summary is clearly low-quality: absent, too
/// short, or just echoing the source name.
pub fn needs_summary(item: &ArticleItem) -> bool {
    let cur = item.summary.trim();
    cur.is_empty()
        || cur.split_whitespace().count() < MIN_SUMMARY_WORDS
        || cur.eq_ignore_ascii_case(item.source.trim())
}

/// Tier-1 enrichment over the retained pool: resolve aggregator links, then
/// fill summary/content/image with one GET per article. Pool order is
/// preserved; per-article failures leave that article unenriched.
pub async fn enrich_pool(
    http: &reqwest::Client,
    resolver: &UrlResolver,
    pool: Vec<ArticleItem>,
    summary_words: usize,
) -> Vec<ArticleItem> {
    stream::iter(pool)
        .map(|mut item| async move {
            let resolved = resolver.resolve(&item.link).await;
            if resolved != item.link {
                item.resolved_link = Some(resolved);
            }

            let url = item.best_url().to_string();
            if !url.starts_with("http") {
                return item;
            }
            let need_summary = needs_summary(&item);
            let need_image = item.image.is_none();
            if !(need_summary || need_image) {
                return item;
            }

            let assets = fetch_article_assets(http, &url, summary_words).await;
            if need_summary && !assets.summary.is_empty() {
                item.summary = assets.summary;
            }
            if !assets.full_text.is_empty() {
                item.set_content(assets.full_text);
            }
            if need_image {
                if let Some(thumb) = assets.thumbnail {
                    item.image = Some(thumb);
                }
            }
            item
        })
        .buffered(ENRICH_CONCURRENCY)
        .collect()
        .await
}

/// Tier-2 backfill for the selected top articles: only those still missing an
/// image are escalated to the rendering fetch, subject to robots policy.
pub async fn backfill_top_articles(
    render: &dyn render::RenderFetch,
    robots: &crate::robots::RobotsCache,
    items: &mut [ArticleItem],
) {
    for item in items.iter_mut() {
        if item.image.is_some() {
            continue;
        }
        let url = item.best_url().to_string();
        if !url.starts_with("http") {
            continue;
        }
        if !robots.allowed(&url).await {
            debug!(url, "tier-2 skipped by robots policy");
            continue;
        }
        match render::render_and_extract(render, &url).await {
            Ok(meta) => {
                if let Some(img) = meta.image {
                    item.image = Some(img);
                }
                if item.published_at.is_none() {
                    item.published_at = meta.published_at;
                }
            }
            Err(e) => warn!(url, error = %e, "tier-2 fetch failed"),
        }
    }
}
