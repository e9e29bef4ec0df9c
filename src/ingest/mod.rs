// src/ingest/mod.rs
pub mod gnews;

use std::collections::HashSet;

use futures::stream::{self, StreamExt};
use tracing::{debug, info, warn};

use crate::article::ArticleItem;
use crate::ingest::gnews::NewsSearch;
use crate::relevance;

/// Results requested per query.
pub const RESULTS_PER_QUERY: usize = 15;
/// Concurrent in-flight search requests.
const QUERY_CONCURRENCY: usize = 4;

/// Short anonymized token for a link, for log lines that should not carry
/// raw URLs.
pub(crate) fn anon_hash(text: &str) -> String {
    use sha2::{Digest, Sha256};
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    let digest = hasher.finalize();
    let mut out = String::with_capacity(12);
    for b in digest.iter().take(6) {
        use std::fmt::Write as _;
        let _ = write!(&mut out, "{:02x}", b);
    }
    out
}

/// The four topical queries fanned out per country: broad catch-all,
/// political, economic, and security themed.
pub fn country_queries(country_name: &str) -> Vec<String> {
    vec![
        format!("\"{country_name}\" news"),
        format!(
            "\"{country_name}\" (government OR president OR prime minister OR parliament OR election OR cabinet OR coup OR protest)"
        ),
        format!(
            "\"{country_name}\" (central bank OR interest rate OR inflation OR GDP OR currency OR monetary policy OR IMF OR World Bank)"
        ),
        format!(
            "\"{country_name}\" (military OR defense OR conflict OR war OR attack OR sanctions OR security OR terrorism)"
        ),
    ]
}

/// Merge query results, dropping later items whose retrieval link was
/// already seen. Exact string match; canonicalization happens later in the
/// resolver.
pub fn dedup_by_link(batches: Vec<Vec<ArticleItem>>) -> Vec<ArticleItem> {
    let mut seen: HashSet<String> = HashSet::new();
    let mut merged = Vec::new();
    let mut dropped = 0usize;
    for batch in batches {
        for it in batch {
            if it.link.is_empty() {
                continue;
            }
            if seen.insert(it.link.clone()) {
                merged.push(it);
            } else {
                dropped += 1;
                debug!(link = %anon_hash(&it.link), "duplicate link dropped");
            }
        }
    }
    if dropped > 0 {
        debug!(dropped, kept = merged.len(), "link de-duplication");
    }
    merged
}

/// Fan out the per-country queries, merge and de-duplicate the results,
/// score relevance, and apply the selection policy. A failed query
/// contributes zero items and never aborts the others.
pub async fn retrieve_pool(
    search: &dyn NewsSearch,
    country_name: &str,
    threshold: f32,
    pool_cap: usize,
) -> Vec<ArticleItem> {
    let queries = country_queries(country_name);

    let batches: Vec<Vec<ArticleItem>> = stream::iter(queries)
        .map(|query| async move {
            match search.search(&query, RESULTS_PER_QUERY).await {
                Ok(items) => {
                    debug!(provider = search.name(), count = items.len(), "query done");
                    items
                }
                Err(e) => {
                    warn!(provider = search.name(), error = ?e, "query failed");
                    Vec::new()
                }
            }
        })
        .buffer_unordered(QUERY_CONCURRENCY)
        .collect()
        .await;

    let mut merged = dedup_by_link(batches);
    for it in &mut merged {
        relevance::score_item(it, country_name);
    }

    let pool = relevance::select_pool(merged, threshold, pool_cap);
    if !pool.is_empty() {
        let avg =
            pool.iter().map(|it| it.relevance_score).sum::<f32>() / pool.len() as f32;
        info!(
            country = country_name,
            count = pool.len(),
            avg_relevance = format!("{avg:.2}"),
            "retrieval pool selected"
        );
    }
    pool
}
