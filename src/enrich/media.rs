// src/enrich/media.rs
//! Best-effort thumbnail extraction from article HTML. Candidate order:
//! OG/Twitter/itemprop meta tags, `<link rel="image_src">`, JSON-LD
//! (including `@graph` containers), then the largest candidate from the
//! first meaningful `<img>` inside a content container.

use scraper::{ElementRef, Html, Selector};
use url::Url;

// Publisher-agnostic image meta keys, in preference order.
const META_IMAGE_KEYS: &[(&str, &str)] = &[
    ("property", "og:image"),
    ("property", "og:image:secure_url"),
    ("property", "og:image:url"),
    ("name", "twitter:image"),
    ("name", "twitter:image:src"),
    ("itemprop", "image"),
    ("name", "parsely-image"),
];

const IMG_ATTR_CANDIDATES: &[&str] = &[
    "src",
    "data-src",
    "data-original",
    "data-lazy-src",
    "data-image",
    "data-thumb",
];

/// Make a candidate absolute against the page URL; only http(s) results
/// survive.
fn absolutize(candidate: &str, base: &str) -> Option<String> {
    if candidate.is_empty() {
        return None;
    }
    let joined = match Url::parse(base) {
        Ok(base_url) => base_url.join(candidate).ok()?,
        Err(_) => Url::parse(candidate).ok()?,
    };
    match joined.scheme() {
        "http" | "https" => Some(joined.to_string()),
        _ => None,
    }
}

/// Pick the widest candidate out of an HTML `srcset` string.
fn best_from_srcset(srcset: &str, base: &str) -> Option<String> {
    let mut scored: Vec<(u32, String)> = Vec::new();
    for part in srcset.split(',') {
        let mut bits = part.split_whitespace();
        let Some(candidate) = bits.next() else {
            continue;
        };
        let Some(url) = absolutize(candidate, base) else {
            continue;
        };
        let width = bits
            .next()
            .and_then(|w| w.strip_suffix('w'))
            .and_then(|w| w.parse::<u32>().ok())
            .unwrap_or(0);
        scored.push((width, url));
    }
    scored.sort_by(|a, b| b.0.cmp(&a.0));
    scored.into_iter().next().map(|(_, url)| url)
}

fn push_json_ld_image(value: &serde_json::Value, base: &str, out: &mut Vec<String>) {
    match value {
        serde_json::Value::String(s) => {
            if let Some(u) = absolutize(s, base) {
                out.push(u);
            }
        }
        serde_json::Value::Object(obj) => {
            let nested = obj
                .get("url")
                .or_else(|| obj.get("contentUrl"))
                .or_else(|| obj.get("thumbnailUrl"))
                .and_then(|v| v.as_str())
                .unwrap_or("");
            if let Some(u) = absolutize(nested, base) {
                out.push(u);
            }
        }
        serde_json::Value::Array(items) => {
            for v in items {
                push_json_ld_image(v, base, out);
            }
        }
        _ => {}
    }
}

/// Collect meta-tag, link-rel, and JSON-LD image candidates in order,
/// de-duplicated.
fn collect_meta_images(doc: &Html, base: &str) -> Vec<String> {
    let mut out = Vec::new();

    for (attr, key) in META_IMAGE_KEYS {
        let Ok(sel) = Selector::parse(&format!("meta[{attr}=\"{key}\"]")) else {
            continue;
        };
        for tag in doc.select(&sel) {
            if let Some(content) = tag.value().attr("content") {
                if let Some(u) = absolutize(content.trim(), base) {
                    out.push(u);
                }
            }
        }
    }

    if let Ok(sel) = Selector::parse("link[rel~=\"image_src\"]") {
        for link in doc.select(&sel) {
            if let Some(href) = link.value().attr("href") {
                if let Some(u) = absolutize(href.trim(), base) {
                    out.push(u);
                }
            }
        }
    }

    // JSON-LD: Article-like nodes or anything carrying image/thumbnailUrl;
    // @graph containers are walked too.
    if let Ok(sel) = Selector::parse("script[type=\"application/ld+json\"]") {
        for script in doc.select(&sel) {
            let raw = script.text().collect::<String>();
            if raw.trim().is_empty() {
                continue;
            }
            let Ok(data) = serde_json::from_str::<serde_json::Value>(&raw) else {
                continue;
            };
            let mut nodes: Vec<serde_json::Value> = match data {
                serde_json::Value::Array(items) => items,
                other => vec![other],
            };
            let mut i = 0;
            while i < nodes.len() {
                let node = nodes[i].clone();
                i += 1;
                let Some(obj) = node.as_object() else {
                    continue;
                };
                if let Some(graph) = obj.get("@graph").and_then(|g| g.as_array()) {
                    nodes.extend(graph.iter().filter(|n| n.is_object()).cloned());
                }
                let is_article = obj
                    .get("@type")
                    .and_then(|t| t.as_str())
                    .map(|t| t == "Article" || t == "NewsArticle")
                    .unwrap_or(false);
                if is_article || obj.contains_key("image") || obj.contains_key("thumbnailUrl") {
                    if let Some(img) = obj.get("image").or_else(|| obj.get("thumbnailUrl")) {
                        push_json_ld_image(img, base, &mut out);
                    }
                }
            }
        }
    }

    let mut seen = std::collections::HashSet::new();
    out.retain(|u| seen.insert(u.clone()));
    out
}

/// Fallback: walk likely content containers and pick a meaningful `<img>`,
/// preferring srcset width-ranked candidates, skipping tracking pixels.
fn first_content_image(doc: &Html, base: &str) -> Option<String> {
    let container_selectors = ["article img", "main img", "[role=\"main\"] img", "img"];
    for css in container_selectors {
        let Ok(sel) = Selector::parse(css) else {
            continue;
        };
        for img in doc.select(&sel) {
            if let Some(u) = image_candidate(&img, base) {
                return Some(u);
            }
        }
    }
    None
}

fn image_candidate(img: &ElementRef, base: &str) -> Option<String> {
    if let Some(srcset) = img.value().attr("srcset") {
        if let Some(u) = best_from_srcset(srcset, base) {
            return Some(u);
        }
    }
    for attr in IMG_ATTR_CANDIDATES {
        let Some(val) = img.value().attr(attr) else {
            continue;
        };
        let val = val.trim();
        if val.is_empty() {
            continue;
        }
        if let Some(u) = absolutize(val, base) {
            let lower = u.to_lowercase();
            if !["/pixel", "1x1", "spacer.gif"].iter().any(|t| lower.contains(t)) {
                return Some(u);
            }
        }
    }
    None
}

/// Best thumbnail URL for a parsed page, or `None`.
pub fn extract_thumbnail(doc: &Html, base: &str) -> Option<String> {
    let metas = collect_meta_images(doc, base);
    if let Some(first) = metas.into_iter().next() {
        return Some(first);
    }
    first_content_image(doc, base)
}

/// Convenience wrapper over raw HTML.
pub fn extract_thumbnail_from_html(html: &str, base: &str) -> Option<String> {
    let doc = Html::parse_document(html);
    extract_thumbnail(&doc, base)
}

#[cfg(test)]
mod tests {
    use super::*;

    const BASE: &str = "https://pub.example/story/1";

    #[test]
    fn og_image_wins_over_content_images() {
        let html = r#"<html><head>
            <meta property="og:image" content="/img/lead.jpg">
        </head><body><article><img src="/img/other.jpg"></article></body></html>"#;
        assert_eq!(
            extract_thumbnail_from_html(html, BASE).as_deref(),
            Some("https://pub.example/img/lead.jpg")
        );
    }

    #[test]
    fn json_ld_graph_container_is_walked() {
        let html = r#"<html><head><script type="application/ld+json">
            {"@graph": [{"@type": "NewsArticle", "image": {"url": "https://cdn.example/a.jpg"}}]}
        </script></head><body></body></html>"#;
        assert_eq!(
            extract_thumbnail_from_html(html, BASE).as_deref(),
            Some("https://cdn.example/a.jpg")
        );
    }

    #[test]
    fn srcset_prefers_widest_candidate() {
        let html = r#"<body><article>
            <img srcset="/s.jpg 320w, /l.jpg 1280w, /m.jpg 640w">
        </article></body>"#;
        assert_eq!(
            extract_thumbnail_from_html(html, BASE).as_deref(),
            Some("https://pub.example/l.jpg")
        );
    }

    #[test]
    fn tracking_pixels_are_skipped() {
        let html = r#"<body><article>
            <img src="https://t.example/pixel.gif?1x1">
            <img data-lazy-src="/img/real.jpg">
        </article></body>"#;
        assert_eq!(
            extract_thumbnail_from_html(html, BASE).as_deref(),
            Some("https://pub.example/img/real.jpg")
        );
    }

    #[test]
    fn no_candidates_yields_none() {
        assert_eq!(extract_thumbnail_from_html("<body><p>text</p></body>", BASE), None);
    }
}
