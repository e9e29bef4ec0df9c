// src/relevance.rs
//! Relevance scoring for retrieved articles: keyword-weighted heuristic that
//! rates how much a title+summary pair is about investor risk in the target
//! country, plus the pool selection policy layered on top.
//!
//! `score_article` is pure and deterministic; it is the core testable unit of
//! the retrieval stage.

use chrono::{DateTime, Utc};

use crate::article::ArticleItem;

/// Articles scoring below this are dropped from the pool (unless the pool
/// would fall under [`MIN_POOL`]).
pub const DEFAULT_RELEVANCE_THRESHOLD: f32 = 0.30;
/// Minimum number of articles the selection policy guarantees when the merged
/// set allows it.
pub const MIN_POOL: usize = 3;
/// Upper bound on the retained pool.
pub const DEFAULT_POOL_CAP: usize = 20;

// Governance/economy/security terms that mark an article as squarely about
// country risk.
const HIGH_KEYWORDS: &[&str] = &[
    "government",
    "ministry",
    "parliament",
    "president",
    "prime minister",
    "central bank",
    "interest rate",
    "monetary policy",
    "inflation",
    "gdp",
    "election",
    "cabinet",
    "policy",
    "budget",
    "fiscal",
    "trade",
    "military",
    "defense",
    "conflict",
    "sanctions",
    "war",
    "coup",
    "security",
];

const MEDIUM_KEYWORDS: &[&str] = &[
    "economy",
    "economic",
    "finance",
    "currency",
    "debt",
    "growth",
    "minister",
    "official",
    "regulation",
    "law",
    "reform",
];

// Entertainment/sports terms that usually mean the country mention is
// incidental.
const NOISE_KEYWORDS: &[&str] = &[
    "sport",
    "football",
    "soccer",
    "basketball",
    "tennis",
    "cricket",
    "music",
    "entertainment",
    "celebrity",
    "festival",
    "award",
    "movie",
    "film",
    "actor",
    "singer",
    "concert",
];

/// Score an article's relevance to `country_name` from its title and summary
/// alone. Deterministic, side-effect free, result clamped to [0,1].
///
/// Base 0.1 when the country is not mentioned, else 0.3; up to +0.5 from
/// high-relevance keywords (0.15 each), up to +0.2 from medium ones (0.08
/// each), -0.2 per noise keyword, +0.15 when a high-relevance keyword appears
/// in the title itself.
pub fn score_article(title: &str, summary: &str, country_name: &str) -> f32 {
    let title = title.to_lowercase();
    let summary = summary.to_lowercase();
    let text = format!("{title} {summary}");
    let country = country_name.to_lowercase();

    if country.is_empty() || !text.contains(&country) {
        return 0.1;
    }

    let mut score = 0.3f32;

    let high_count = HIGH_KEYWORDS.iter().filter(|kw| text.contains(*kw)).count();
    let medium_count = MEDIUM_KEYWORDS.iter().filter(|kw| text.contains(*kw)).count();
    let noise_count = NOISE_KEYWORDS.iter().filter(|kw| text.contains(*kw)).count();

    score += (high_count as f32 * 0.15).min(0.5);
    score += (medium_count as f32 * 0.08).min(0.2);
    score -= noise_count as f32 * 0.2;

    // Title mentions weigh more than body mentions.
    if HIGH_KEYWORDS.iter().any(|kw| title.contains(*kw)) {
        score += 0.15;
    }

    score.clamp(0.0, 1.0)
}

/// Convenience wrapper scoring an [`ArticleItem`] in place.
pub fn score_item(item: &mut ArticleItem, country_name: &str) {
    item.relevance_score = score_article(&item.title, &item.summary, country_name);
}

fn recency_key(published: Option<DateTime<Utc>>) -> i64 {
    published.map(|dt| dt.timestamp()).unwrap_or(0)
}

/// Apply the selection policy to a scored pool: keep items at or above
/// `threshold`, sorted by `(score desc, recency desc)`. If fewer than
/// [`MIN_POOL`] survive, backfill from the globally highest-scoring items
/// until the minimum is reached. The result is capped at `cap`.
pub fn select_pool(mut items: Vec<ArticleItem>, threshold: f32, cap: usize) -> Vec<ArticleItem> {
    items.sort_by(|a, b| {
        b.relevance_score
            .partial_cmp(&a.relevance_score)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| recency_key(b.published_at).cmp(&recency_key(a.published_at)))
    });

    let surviving = items
        .iter()
        .filter(|it| it.relevance_score >= threshold)
        .count();
    let take = surviving.max(MIN_POOL.min(items.len())).min(cap);
    items.truncate(take);
    items
}
