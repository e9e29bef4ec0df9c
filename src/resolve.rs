// src/resolve.rs
//! Canonical-link resolution for aggregator wrapper URLs. Wrapped links
//! (news.google.com/rss/articles/...) are unwrapped to the publisher's raw
//! article URL; anything else passes through untouched.
//!
//! Resolution never errors: every internal failure degrades to returning the
//! original link.

use scraper::{Html, Selector};
use tracing::debug;
use url::Url;

const AGGREGATOR_HOST: &str = "news.google.com";
const BATCHEXECUTE_URL: &str = "https://news.google.com/_/DotsSplashUi/data/batchexecute";

// Some endpoints return different HTML for non-browser agents.
const BROWSER_UA: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) \
AppleWebKit/537.36 (KHTML, like Gecko) Chrome/132.0.0.0 Safari/537.36";

pub struct UrlResolver {
    http: reqwest::Client,
}

impl UrlResolver {
    pub fn new(http: reqwest::Client) -> Self {
        Self { http }
    }

    /// Resolve an aggregator link to the publisher URL. Strategies, in order:
    /// an embedded `url=` query parameter, the aggregator's internal
    /// redirect-resolution RPC, a `<meta http-equiv="refresh">` tag, and the
    /// first outbound anchor. Returns the input unchanged when none applies.
    pub async fn resolve(&self, link: &str) -> String {
        let Ok(parsed) = Url::parse(link) else {
            return link.to_string();
        };
        let is_aggregator = parsed
            .host_str()
            .map(|h| h.contains(AGGREGATOR_HOST))
            .unwrap_or(false);
        if !is_aggregator {
            // Already a raw publisher URL.
            return link.to_string();
        }

        // Sometimes the direct URL rides along as a query param.
        if let Some((_, direct)) = parsed.query_pairs().find(|(k, _)| k == "url") {
            if direct.starts_with("http") {
                return direct.into_owned();
            }
        }

        match self.resolve_via_page(link).await {
            Some(resolved) => resolved,
            None => {
                debug!(link, "aggregator link resolution failed; keeping original");
                link.to_string()
            }
        }
    }

    async fn resolve_via_page(&self, link: &str) -> Option<String> {
        let page = self
            .http
            .get(link)
            .header(reqwest::header::USER_AGENT, BROWSER_UA)
            .send()
            .await
            .ok()?
            .error_for_status()
            .ok()?
            .text()
            .await
            .ok()?;

        // The redirect RPC needs the page's hidden payload; fall back to
        // plain HTML markers when it is absent or the call fails.
        if let Some(data_p) = extract_data_p(&page) {
            if let Some(resolved) = self.call_redirect_rpc(&data_p).await {
                return Some(resolved);
            }
        }
        meta_refresh_target(&page).or_else(|| first_external_anchor(&page))
    }

    /// POST the aggregator's batchexecute RPC and dig the final URL out of
    /// the nested JSON envelope.
    async fn call_redirect_rpc(&self, data_p: &str) -> Option<String> {
        let normalized = data_p.replace("%.@.", "[\"garturlreq\",");
        let obj: Vec<serde_json::Value> = serde_json::from_str(&normalized).ok()?;
        if obj.len() < 6 {
            return None;
        }
        // The RPC wants the payload minus its 6-element tail, re-suffixed
        // with the last two elements.
        let mut req_obj: Vec<serde_json::Value> = obj[..obj.len() - 6].to_vec();
        req_obj.extend_from_slice(&obj[obj.len() - 2..]);

        let inner = serde_json::to_string(&req_obj).ok()?;
        let envelope = serde_json::json!([[["Fbv4je", inner, "null", "generic"]]]);
        let f_req = serde_json::to_string(&envelope).ok()?;

        let body = self
            .http
            .post(BATCHEXECUTE_URL)
            .header(reqwest::header::USER_AGENT, BROWSER_UA)
            .form(&[("f.req", f_req)])
            .send()
            .await
            .ok()?
            .text()
            .await
            .ok()?;

        parse_rpc_response(&body)
    }
}

/// Pull the hidden `data-p` payload off the splash page.
fn extract_data_p(html: &str) -> Option<String> {
    let doc = Html::parse_document(html);
    let sel = Selector::parse("c-wiz[data-p]").ok()?;
    doc.select(&sel)
        .next()
        .and_then(|el| el.value().attr("data-p"))
        .map(str::to_string)
}

/// The response starts with an anti-JSON prefix; the final URL sits at
/// `[0][2]` as a JSON string whose second element is the link.
fn parse_rpc_response(body: &str) -> Option<String> {
    let trimmed = body.trim_start_matches(")]}'").trim_start();
    let outer: serde_json::Value = serde_json::from_str(trimmed).ok()?;
    let array_string = outer.get(0)?.get(2)?.as_str()?;
    let inner: serde_json::Value = serde_json::from_str(array_string).ok()?;
    let final_url = inner.get(1)?.as_str()?;
    if final_url.starts_with("http") {
        Some(final_url.to_string())
    } else {
        None
    }
}

fn meta_refresh_target(html: &str) -> Option<String> {
    let doc = Html::parse_document(html);
    let sel = Selector::parse("meta[http-equiv=\"refresh\" i]").ok()?;
    let content = doc
        .select(&sel)
        .next()
        .and_then(|el| el.value().attr("content"))?;
    let (_, target) = content.split_once("url=")?;
    let target = target.trim();
    if target.starts_with("http") {
        Some(target.to_string())
    } else {
        None
    }
}

fn first_external_anchor(html: &str) -> Option<String> {
    let doc = Html::parse_document(html);
    let sel = Selector::parse("a[href]").ok()?;
    for el in doc.select(&sel) {
        if let Some(href) = el.value().attr("href") {
            if href.starts_with("http") && !href.contains(AGGREGATOR_HOST) {
                return Some(href.to_string());
            }
        }
    }
    None
}
