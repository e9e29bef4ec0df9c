// src/cluster.rs
//! Topic clustering and Top-K evidence selection. Topic labels come from the
//! oracle and are authoritative; this module only groups, ranks, and
//! diversifies. The selection always yields exactly `min(k, pool)` articles.

use std::collections::HashMap;

use chrono::{DateTime, Utc};

use crate::article::{ArticleItem, TopArticle};
use crate::oracle::ArticleScore;

/// Articles surfaced to end users per country.
pub const TOP_K: usize = 3;

/// Copy oracle-assigned impact and topic labels onto the pool, matched by
/// assembly id. Unknown ids are ignored.
pub fn apply_scores(pool: &mut [ArticleItem], scores: &[ArticleScore]) {
    let by_id: HashMap<&str, &ArticleScore> =
        scores.iter().map(|s| (s.id.as_str(), s)).collect();
    for item in pool.iter_mut() {
        let Some(id) = item.id.as_deref() else { continue };
        if let Some(s) = by_id.get(id) {
            item.impact = Some(s.impact);
            item.topic_group = Some(s.topic_group.clone());
        }
    }
}

fn recency(published: Option<DateTime<Utc>>) -> i64 {
    published.map(|dt| dt.timestamp()).unwrap_or(0)
}

fn by_impact_then_recency(pool: &[ArticleItem], a: usize, b: usize) -> std::cmp::Ordering {
    let ia = pool[a].impact.unwrap_or(0.0);
    let ib = pool[b].impact.unwrap_or(0.0);
    ib.partial_cmp(&ia)
        .unwrap_or(std::cmp::Ordering::Equal)
        .then_with(|| recency(pool[b].published_at).cmp(&recency(pool[a].published_at)))
}

fn by_relevance_then_recency(pool: &[ArticleItem], a: usize, b: usize) -> std::cmp::Ordering {
    let ra = pool[a].relevance_score;
    let rb = pool[b].relevance_score;
    rb.partial_cmp(&ra)
        .unwrap_or(std::cmp::Ordering::Equal)
        .then_with(|| recency(pool[b].published_at).cmp(&recency(pool[a].published_at)))
}

/// Select up to `k` pool indices: one representative per topic group ranked
/// by impact, backfilled from the remaining articles when fewer groups exist,
/// falling back to `(relevance, recency)` ranking when the oracle returned no
/// usable labels.
pub fn select_top(pool: &[ArticleItem], k: usize) -> Vec<usize> {
    let k = k.min(pool.len());
    if k == 0 {
        return Vec::new();
    }

    let labeled: Vec<usize> = (0..pool.len())
        .filter(|&i| pool[i].impact.is_some() && pool[i].topic_group.is_some())
        .collect();

    if labeled.is_empty() {
        // No usable oracle data: rank the whole pool heuristically.
        let mut all: Vec<usize> = (0..pool.len()).collect();
        all.sort_by(|&a, &b| by_relevance_then_recency(pool, a, b));
        all.truncate(k);
        return all;
    }

    // One representative per topic: highest impact, ties to the most recent.
    let mut groups: HashMap<&str, Vec<usize>> = HashMap::new();
    for &i in &labeled {
        groups
            .entry(pool[i].topic_group.as_deref().unwrap_or_default())
            .or_default()
            .push(i);
    }

    let mut representatives: Vec<usize> = groups
        .values()
        .map(|members| {
            let mut sorted = members.clone();
            sorted.sort_by(|&a, &b| by_impact_then_recency(pool, a, b));
            sorted[0]
        })
        .collect();
    representatives.sort_by(|&a, &b| by_impact_then_recency(pool, a, b));

    let mut selected: Vec<usize> = representatives.into_iter().take(k).collect();

    // Fewer topics than slots: fill from the best remaining articles.
    if selected.len() < k {
        let mut rest: Vec<usize> = (0..pool.len())
            .filter(|i| !selected.contains(i))
            .collect();
        rest.sort_by(|&a, &b| by_impact_then_recency(pool, a, b));
        for i in rest {
            if selected.len() >= k {
                break;
            }
            selected.push(i);
        }
    }
    selected
}

/// Project the selected indices into ranked [`TopArticle`] entries.
pub fn to_top_articles(pool: &[ArticleItem], selected: &[usize]) -> Vec<TopArticle> {
    selected
        .iter()
        .enumerate()
        .map(|(rank, &i)| {
            let it = &pool[i];
            TopArticle {
                rank: (rank + 1) as u8,
                url: it.best_url().to_string(),
                title: it.title.clone(),
                source: it.source.clone(),
                published_at: it.published_at,
                impact: it.impact,
                summary: it.summary.clone(),
                image: it.image.clone(),
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn item(idx: usize, topic: Option<&str>, impact: Option<f32>, ts: i64) -> ArticleItem {
        let mut it = ArticleItem::new(format!("https://x/{idx}"), format!("t{idx}"), "s");
        it.id = Some(format!("a{}", idx + 1));
        it.topic_group = topic.map(str::to_string);
        it.impact = impact;
        it.published_at = Some(Utc.timestamp_opt(ts, 0).unwrap());
        it.relevance_score = 0.5;
        it
    }

    #[test]
    fn three_plus_groups_take_top_representatives() {
        let pool = vec![
            item(0, Some("A"), Some(0.9), 10),
            item(1, Some("B"), Some(0.8), 10),
            item(2, Some("C"), Some(0.7), 10),
            item(3, Some("D"), Some(0.6), 10),
        ];
        let sel = select_top(&pool, TOP_K);
        assert_eq!(sel, vec![0, 1, 2]);
    }

    #[test]
    fn group_representative_is_highest_impact_then_most_recent() {
        let pool = vec![
            item(0, Some("A"), Some(0.5), 10),
            item(1, Some("A"), Some(0.9), 10),
            item(2, Some("A"), Some(0.9), 99), // same impact, newer
        ];
        let sel = select_top(&pool, 1);
        assert_eq!(sel, vec![2]);
    }

    #[test]
    fn two_groups_backfill_one_from_remaining_pool() {
        // 3 articles in A, 2 in B, A's best > B's best, only two groups.
        let pool = vec![
            item(0, Some("A"), Some(0.9), 10),
            item(1, Some("A"), Some(0.8), 10),
            item(2, Some("A"), Some(0.2), 10),
            item(3, Some("B"), Some(0.7), 10),
            item(4, Some("B"), Some(0.1), 10),
        ];
        let sel = select_top(&pool, TOP_K);
        assert_eq!(sel.len(), 3);
        // both representatives present, ranked by impact
        assert_eq!(sel[0], 0);
        assert_eq!(sel[1], 3);
        // backfill is the best remaining non-representative
        assert_eq!(sel[2], 1);
    }

    #[test]
    fn no_oracle_labels_falls_back_to_relevance_ranking() {
        let mut pool = vec![
            item(0, None, None, 10),
            item(1, None, None, 50),
            item(2, None, None, 30),
            item(3, None, None, 40),
        ];
        pool[2].relevance_score = 0.9;
        let sel = select_top(&pool, TOP_K);
        assert_eq!(sel.len(), 3);
        assert_eq!(sel[0], 2); // highest relevance first
        assert_eq!(sel[1], 1); // then recency among equals
    }

    #[test]
    fn selection_never_exceeds_pool_size() {
        let pool = vec![item(0, Some("A"), Some(0.9), 10)];
        assert_eq!(select_top(&pool, TOP_K).len(), 1);
        assert!(select_top(&[], TOP_K).is_empty());
    }

    #[test]
    fn ranks_are_contiguous_from_one() {
        let pool = vec![
            item(0, Some("A"), Some(0.9), 10),
            item(1, Some("B"), Some(0.8), 10),
        ];
        let top = to_top_articles(&pool, &select_top(&pool, TOP_K));
        let ranks: Vec<u8> = top.iter().map(|t| t.rank).collect();
        assert_eq!(ranks, vec![1, 2]);
    }

    #[test]
    fn applied_scores_land_on_matching_ids() {
        let mut pool = vec![item(0, None, None, 10), item(1, None, None, 10)];
        let scores = vec![ArticleScore {
            id: "a2".into(),
            impact: 0.77,
            topic_group: "elections".into(),
        }];
        apply_scores(&mut pool, &scores);
        assert_eq!(pool[0].impact, None);
        assert_eq!(pool[1].impact, Some(0.77));
        assert_eq!(pool[1].topic_group.as_deref(), Some("elections"));
    }
}
