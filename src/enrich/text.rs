// src/enrich/text.rs
//! Main-text extraction and lead summarization. Lightweight heuristics: pick
//! the DOM container with the greatest cumulative paragraph length, keep
//! paragraphs long enough to be prose, then accumulate sentences up to a
//! word budget.

use once_cell::sync::OnceCell;
use scraper::{ElementRef, Html, Selector};

/// Paragraphs at or below this length are treated as junk (captions, bylines,
/// cookie banners).
const MIN_PARAGRAPH_CHARS: usize = 40;
/// Hard character cap on a lead summary.
const SUMMARY_CAP_CHARS: usize = 2_000;
/// Default word budget for a lead summary.
pub const DEFAULT_SUMMARY_WORDS: usize = 160;

// Non-content tags whose descendants never count as article text.
const REMOVALS: &[&str] = &[
    "script", "style", "noscript", "iframe", "svg", "footer", "header", "nav", "aside", "form",
];

// Class/id tokens hinting at a content container.
const CONTAINER_HINTS: &[&str] = &[
    "article", "content", "story", "post", "entry", "body", "read", "main", "text",
];

fn clean(text: &str) -> String {
    static RE_WS: OnceCell<regex::Regex> = OnceCell::new();
    let re = RE_WS.get_or_init(|| regex::Regex::new(r"\s+").unwrap());
    re.replace_all(text, " ").trim().to_string()
}

fn inside_removed(el: &ElementRef) -> bool {
    el.ancestors()
        .filter_map(ElementRef::wrap)
        .any(|a| REMOVALS.contains(&a.value().name()))
}

/// Cleaned text of the content paragraphs under `root`, in document order.
fn paragraphs_under(root: &ElementRef) -> Vec<String> {
    let sel = Selector::parse("p").expect("p selector");
    root.select(&sel)
        .filter(|p| !inside_removed(p))
        .map(|p| clean(&p.text().collect::<Vec<_>>().join(" ")))
        .filter(|t| !t.is_empty())
        .collect()
}

fn container_score(root: &ElementRef) -> usize {
    paragraphs_under(root).iter().map(String::len).sum()
}

fn hinted_containers<'a>(doc: &'a Html) -> Vec<ElementRef<'a>> {
    let mut candidates = Vec::new();

    for css in ["article", "[role=\"main\"]", "main"] {
        if let Ok(sel) = Selector::parse(css) {
            candidates.extend(doc.select(&sel));
        }
    }
    if let Ok(sel) = Selector::parse("[class], [id]") {
        for el in doc.select(&sel) {
            let v = el.value();
            let mut haystack = v.attr("class").unwrap_or("").to_lowercase();
            haystack.push(' ');
            haystack.push_str(&v.attr("id").unwrap_or("").to_lowercase());
            if CONTAINER_HINTS.iter().any(|h| haystack.contains(h)) {
                candidates.push(el);
            }
        }
    }
    candidates
}

/// Extract the main article text: choose the candidate container with the
/// greatest cumulative paragraph length (falling back to the whole document),
/// then keep paragraphs longer than [`MIN_PARAGRAPH_CHARS`].
pub fn extract_main_text(html: &str) -> String {
    let doc = Html::parse_document(html);

    let candidates = hinted_containers(&doc);
    let container = candidates
        .into_iter()
        .max_by_key(container_score)
        .unwrap_or_else(|| doc.root_element());
    let paragraphs: Vec<String> = paragraphs_under(&container)
        .into_iter()
        .filter(|p| p.len() > MIN_PARAGRAPH_CHARS)
        .collect();
    clean(&paragraphs.join(" "))
}

fn split_sentences(text: &str) -> Vec<&str> {
    let mut out = Vec::new();
    let mut start = 0;
    let bytes = text.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        if matches!(bytes[i], b'.' | b'!' | b'?') {
            let next_ws = bytes.get(i + 1).map(|b| b.is_ascii_whitespace()).unwrap_or(true);
            if next_ws {
                let sentence = text[start..=i].trim();
                if !sentence.is_empty() {
                    out.push(sentence);
                }
                start = i + 1;
            }
        }
        i += 1;
    }
    let tail = text[start..].trim();
    if !tail.is_empty() {
        out.push(tail);
    }
    out
}

/// Greedy lead summary: accumulate sentences until the word budget is hit,
/// never exceeding the hard character cap.
pub fn summarize_lead(text: &str, max_words: usize) -> String {
    if text.is_empty() || max_words == 0 {
        return String::new();
    }
    let mut out: Vec<&str> = Vec::new();
    let mut words = 0usize;
    for sentence in split_sentences(text) {
        let w = sentence.split_whitespace().count();
        if w == 0 {
            continue;
        }
        if words + w > max_words && !out.is_empty() {
            break;
        }
        out.push(sentence);
        words += w;
        if words >= max_words {
            break;
        }
    }
    let joined = clean(&out.join(" "));
    joined.chars().take(SUMMARY_CAP_CHARS).collect()
}
