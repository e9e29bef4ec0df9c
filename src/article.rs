// src/article.rs
//! Core record types for the per-country pipeline: retrieved news items,
//! the validated macro payload, and the final snapshot record.

use anyhow::{anyhow, Result};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// Hard cap on extracted article body text.
pub const CONTENT_CAP_CHARS: usize = 24_000;
/// Hard cap on the bullet summary carried by a snapshot.
pub const BULLET_SUMMARY_CAP_CHARS: usize = 800;

/// One retrieved news item. Created during fan-out retrieval, mutated through
/// de-duplication, resolution, enrichment, and scoring; read-only once the
/// evidence set is assembled.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ArticleItem {
    /// Stable short token ("a1", "a2", ...) assigned at assembly time, unique
    /// within one country run. `None` until assembly fixes the pool order.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// Original retrieval URL. Retained for display/audit even after
    /// resolution.
    pub link: String,
    /// Canonical publisher URL. Once set it is used for all downstream
    /// fetches.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resolved_link: Option<String>,
    pub title: String,
    pub source: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub published_at: Option<DateTime<Utc>>,
    /// Plain-text summary, at most ~240 words.
    pub summary: String,
    /// Longer extracted body, capped at [`CONTENT_CAP_CHARS`].
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    /// Absolute thumbnail URL if one was found.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    /// Heuristic relevance in [0,1], computed deterministically from
    /// title+summary only.
    pub relevance_score: f32,
    /// Oracle-assigned topic label, set after the oracle call.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub topic_group: Option<String>,
    /// Oracle-assigned impact in [0,1], set after the oracle call.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub impact: Option<f32>,
}

impl ArticleItem {
    pub fn new(link: impl Into<String>, title: impl Into<String>, source: impl Into<String>) -> Self {
        Self {
            id: None,
            link: link.into(),
            resolved_link: None,
            title: title.into(),
            source: source.into(),
            published_at: None,
            summary: String::new(),
            content: None,
            image: None,
            relevance_score: 0.0,
            topic_group: None,
            impact: None,
        }
    }

    /// URL to use for downstream fetches: the resolved publisher link when
    /// available, else the retrieval link.
    pub fn best_url(&self) -> &str {
        self.resolved_link.as_deref().unwrap_or(&self.link)
    }

    /// Cap and store extracted body text.
    pub fn set_content(&mut self, text: String) {
        if text.is_empty() {
            return;
        }
        let capped: String = text.chars().take(CONTENT_CAP_CHARS).collect();
        self.content = Some(capped);
    }

    /// Publication date only (YYYY-MM-DD), as embedded into the oracle prompt.
    pub fn published_date(&self) -> Option<NaiveDate> {
        self.published_at.map(|dt| dt.date_naive())
    }
}

/// The five fixed diagnostic sub-factors returned by the oracle.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Subscores {
    pub conflict_war: Option<f32>,
    pub political_stability: Option<f32>,
    pub governance_corruption: Option<f32>,
    pub macroeconomic_volatility: Option<f32>,
    pub regulatory_uncertainty: Option<f32>,
}

impl Subscores {
    /// True when every sub-factor value present is inside [0,1].
    pub fn in_range(&self) -> bool {
        [
            self.conflict_war,
            self.political_stability,
            self.governance_corruption,
            self.macroeconomic_volatility,
            self.regulatory_uncertainty,
        ]
        .iter()
        .flatten()
        .all(|v| (0.0..=1.0).contains(v))
    }
}

/// Projection of one selected article into the snapshot, rank 1..=3.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TopArticle {
    pub rank: u8,
    pub url: String,
    pub title: String,
    pub source: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub published_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub impact: Option<f32>,
    pub summary: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
}

/// The per-country, per-run output. Immutable after hand-off to persistence;
/// a later run for the same `(country_code, as_of)` supersedes it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CountryRiskRecord {
    pub country_code: String,
    pub as_of: NaiveDate,
    pub macro_evidence: MacroEvidence,
    pub subscores: Subscores,
    /// Calibrated investor-risk score; `None` on oracle/configuration
    /// failure, `1.0` when the legal gate fires.
    pub score: Option<f32>,
    /// Recency-weighted diagnostic over per-article impacts. Never a
    /// substitute for `score`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub news_flow: Option<f32>,
    pub bullet_summary: String,
    pub top_articles: Vec<TopArticle>,
}

impl CountryRiskRecord {
    /// Sentinel-shaped record for a country whose oracle call failed: null
    /// score, empty summary, no articles. Still well-formed for persistence.
    pub fn null_score(country_code: &str, as_of: NaiveDate, macro_evidence: MacroEvidence) -> Self {
        Self {
            country_code: country_code.to_string(),
            as_of,
            macro_evidence,
            subscores: Subscores::default(),
            score: None,
            news_flow: None,
            bullet_summary: String::new(),
            top_articles: Vec::new(),
        }
    }
}

/// Macro-evidence payload from the external provider. Opaque to the pipeline
/// except for boundary validation and the `as_of` derivation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(transparent)]
pub struct MacroEvidence(serde_json::Value);

impl MacroEvidence {
    /// Validate the provider response at the boundary: it must be a JSON
    /// object carrying a non-empty `indicators` object. Everything else is
    /// passed through untouched.
    pub fn from_value(value: serde_json::Value) -> Result<Self> {
        let obj = value
            .as_object()
            .ok_or_else(|| anyhow!("macro payload must be a JSON object"))?;
        let indicators = obj
            .get("indicators")
            .and_then(|v| v.as_object())
            .ok_or_else(|| anyhow!("macro payload missing `indicators` object"))?;
        if indicators.is_empty() {
            return Err(anyhow!("macro payload `indicators` is empty"));
        }
        Ok(Self(value))
    }

    pub fn as_value(&self) -> &serde_json::Value {
        &self.0
    }

    /// Snapshot date derived from `_meta.generated_at` when present and
    /// parseable, else today (UTC).
    pub fn as_of(&self) -> NaiveDate {
        self.0
            .get("_meta")
            .and_then(|m| m.get("generated_at"))
            .and_then(|v| v.as_str())
            .and_then(|s| NaiveDate::parse_from_str(s.get(..10).unwrap_or(s), "%Y-%m-%d").ok())
            .unwrap_or_else(|| Utc::now().date_naive())
    }
}
