// src/oracle/mod.rs
//! Oracle invocation and validation: provider abstraction, the OpenAI
//! structured-output provider, strict response validation, the null-score
//! sentinel for every expected failure mode, and the recency-weighted
//! `news_flow` diagnostic.

pub mod prompt;

use std::collections::HashMap;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use chrono::NaiveDate;
use serde::Deserialize;
use tracing::{info, warn};

use crate::article::{ArticleItem, MacroEvidence, Subscores, BULLET_SUMMARY_CAP_CHARS};

/// Evidence entries embedded into the prompt, at most this many.
pub const EVIDENCE_CAP: usize = 10;

const DEFAULT_MODEL: &str = "gpt-4o-2024-08-06";
const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);
const READ_TIMEOUT: Duration = Duration::from_secs(60);

/// One validated per-article judgment.
#[derive(Debug, Clone, PartialEq)]
pub struct ArticleScore {
    pub id: String,
    pub impact: f32,
    pub topic_group: String,
}

/// Validated oracle result for one country, before the legal gate is applied.
#[derive(Debug, Clone, PartialEq)]
pub struct RiskAssessment {
    /// `None` only for the sentinel (failed/skipped call).
    pub score: Option<f32>,
    pub bullet_summary: String,
    pub subscores: Subscores,
    pub article_scores: Vec<ArticleScore>,
    /// Diagnostic only; never substituted for `score`.
    pub news_flow: Option<f32>,
}

impl RiskAssessment {
    /// Null-score sentinel: returned without any network call on missing
    /// credentials, and after any oracle/schema failure.
    pub fn sentinel() -> Self {
        Self {
            score: None,
            bullet_summary: String::new(),
            subscores: Subscores::default(),
            article_scores: Vec::new(),
            news_flow: None,
        }
    }
}

/// Oracle provider boundary: one schema-constrained call.
#[async_trait]
pub trait Oracle: Send + Sync {
    async fn invoke(&self, prompt: &str, schema: &serde_json::Value) -> Result<serde_json::Value>;
    fn name(&self) -> &'static str;
    /// False when credentials are missing; the pipeline then short-circuits
    /// to the sentinel without attempting a call.
    fn is_configured(&self) -> bool {
        true
    }
}

/// OpenAI chat-completions provider using strict structured outputs.
/// Requires `OPENAI_API_KEY`.
pub struct OpenAiOracle {
    http: reqwest::Client,
    api_key: String,
    model: String,
}

impl OpenAiOracle {
    pub fn new(api_key: String, model_override: Option<&str>) -> Self {
        let http = reqwest::Client::builder()
            .user_agent("country-risk-analyzer/0.1")
            .connect_timeout(CONNECT_TIMEOUT)
            .timeout(READ_TIMEOUT)
            .build()
            .unwrap_or_default();
        Self {
            http,
            api_key,
            model: model_override.unwrap_or(DEFAULT_MODEL).to_string(),
        }
    }

    pub fn from_env() -> Self {
        Self::new(std::env::var("OPENAI_API_KEY").unwrap_or_default(), None)
    }
}

#[async_trait]
impl Oracle for OpenAiOracle {
    async fn invoke(&self, prompt: &str, schema: &serde_json::Value) -> Result<serde_json::Value> {
        #[derive(Deserialize)]
        struct Resp {
            choices: Vec<Choice>,
        }
        #[derive(Deserialize)]
        struct Choice {
            message: ChoiceMsg,
        }
        #[derive(Deserialize)]
        struct ChoiceMsg {
            content: String,
        }

        let req = serde_json::json!({
            "model": self.model,
            "messages": [{"role": "system", "content": prompt}],
            "temperature": 0.0,
            "seed": 42,
            "response_format": {
                "type": "json_schema",
                "json_schema": {
                    "name": "country_risk_assessment",
                    "strict": true,
                    "schema": schema
                }
            }
        });

        let resp = self
            .http
            .post("https://api.openai.com/v1/chat/completions")
            .bearer_auth(&self.api_key)
            .json(&req)
            .send()
            .await
            .context("oracle request")?
            .error_for_status()
            .context("oracle status")?;
        let body: Resp = resp.json().await.context("oracle response body")?;
        let content = body
            .choices
            .first()
            .map(|c| c.message.content.as_str())
            .unwrap_or("");
        serde_json::from_str(content).context("oracle content is not valid JSON")
    }

    fn name(&self) -> &'static str {
        "openai"
    }

    fn is_configured(&self) -> bool {
        !self.api_key.is_empty()
    }
}

/// Fixed-response provider for tests and local runs.
pub struct MockOracle {
    pub fixed: serde_json::Value,
}

#[async_trait]
impl Oracle for MockOracle {
    async fn invoke(&self, _prompt: &str, _schema: &serde_json::Value) -> Result<serde_json::Value> {
        Ok(self.fixed.clone())
    }
    fn name(&self) -> &'static str {
        "mock"
    }
}

// ------------------------------------------------------------
// Payload shaping & validation
// ------------------------------------------------------------

/// Project the assembled evidence set into the prompt payload: id, source,
/// date-only publication, title, summary. Ordering matches id assignment.
pub fn evidence_payload(articles: &[ArticleItem]) -> serde_json::Value {
    let entries: Vec<serde_json::Value> = articles
        .iter()
        .take(EVIDENCE_CAP)
        .filter_map(|it| {
            let id = it.id.as_deref()?;
            Some(serde_json::json!({
                "id": id,
                "source": it.source.trim(),
                "published_at": it
                    .published_date()
                    .map(|d| d.format("%Y-%m-%d").to_string())
                    .unwrap_or_default(),
                "title": it.title.trim(),
                "summary": it.summary.trim(),
            }))
        })
        .collect();
    serde_json::Value::Array(entries)
}

#[derive(Debug, Deserialize)]
struct RawArticleScore {
    id: String,
    impact: f32,
    topic_group: String,
}

#[derive(Debug, Deserialize)]
struct RawAssessment {
    subscores: Subscores,
    news_article_scores: Vec<RawArticleScore>,
    score: f32,
    bullet_summary: String,
}

fn in_unit_range(v: f32) -> bool {
    (0.0..=1.0).contains(&v)
}

/// Strictly validate a raw oracle response: required keys present, every
/// numeric value inside [0,1].
pub fn validate_response(raw: serde_json::Value) -> Result<RiskAssessment> {
    let parsed: RawAssessment =
        serde_json::from_value(raw).context("oracle response missing required keys")?;

    if !in_unit_range(parsed.score) {
        return Err(anyhow!("score {} out of range", parsed.score));
    }
    if !parsed.subscores.in_range() {
        return Err(anyhow!("subscore out of range"));
    }
    for entry in &parsed.news_article_scores {
        if !in_unit_range(entry.impact) {
            return Err(anyhow!("impact {} out of range for {}", entry.impact, entry.id));
        }
    }

    let mut bullet = parsed.bullet_summary.trim().to_string();
    if bullet.chars().count() > BULLET_SUMMARY_CAP_CHARS {
        bullet = bullet.chars().take(BULLET_SUMMARY_CAP_CHARS).collect();
    }

    Ok(RiskAssessment {
        score: Some(parsed.score),
        bullet_summary: bullet,
        subscores: parsed.subscores,
        article_scores: parsed
            .news_article_scores
            .into_iter()
            .map(|e| ArticleScore {
                id: e.id,
                impact: e.impact,
                topic_group: e.topic_group,
            })
            .collect(),
        news_flow: None,
    })
}

// ------------------------------------------------------------
// news_flow diagnostic
// ------------------------------------------------------------

fn recency_weight(days_old: i64) -> f32 {
    if days_old <= 14 {
        1.0
    } else if days_old <= 60 {
        0.6
    } else {
        0.3
    }
}

/// Recency-weighted mean of per-article impacts with a small corroboration
/// boost when at least two severe (>= 0.85) events landed within 30 days.
/// Clamped to [0.05, 0.95]. Purely diagnostic.
pub fn compute_news_flow(
    articles: &[ArticleItem],
    impacts: &HashMap<String, f32>,
    today: NaiveDate,
) -> f32 {
    let mut num = 0.0f32;
    let mut den = 0.0f32;
    let mut severe_recent = 0usize;

    for it in articles.iter().take(EVIDENCE_CAP) {
        let Some(id) = it.id.as_deref() else { continue };
        let Some(&imp) = impacts.get(id) else { continue };
        let age = it
            .published_date()
            .map(|d| (today - d).num_days())
            .unwrap_or(9_999);
        let w = recency_weight(age);
        num += w * imp;
        den += w;
        if imp >= 0.85 && age <= 30 {
            severe_recent += 1;
        }
    }

    let mut news = if den > 0.0 { num / den } else { 0.10 };
    if severe_recent >= 2 {
        news = (news * 1.10).min(1.0);
    }
    news.clamp(0.05, 0.95)
}

/// Run the full oracle exchange for one country: payload shaping, the
/// schema-constrained call, strict validation, and the diagnostic. Every
/// expected failure mode collapses to the sentinel.
pub async fn assess_country(
    oracle: &dyn Oracle,
    country_name: &str,
    macro_evidence: &MacroEvidence,
    articles: &[ArticleItem],
    today: NaiveDate,
) -> RiskAssessment {
    if !oracle.is_configured() {
        warn!(country = country_name, "oracle credentials missing; returning null-score sentinel");
        return RiskAssessment::sentinel();
    }

    let evidence_json = macro_evidence.as_value().to_string();
    let articles_json = evidence_payload(articles).to_string();
    let prompt = prompt::build_prompt(country_name, &evidence_json, &articles_json);
    let schema = prompt::risk_response_schema();

    let raw = match oracle.invoke(&prompt, &schema).await {
        Ok(v) => v,
        Err(e) => {
            warn!(country = country_name, provider = oracle.name(), error = ?e, "oracle call failed");
            return RiskAssessment::sentinel();
        }
    };

    let mut assessment = match validate_response(raw) {
        Ok(a) => a,
        Err(e) => {
            warn!(country = country_name, provider = oracle.name(), error = ?e, "oracle response rejected");
            return RiskAssessment::sentinel();
        }
    };

    let impacts: HashMap<String, f32> = assessment
        .article_scores
        .iter()
        .map(|e| (e.id.clone(), e.impact))
        .collect();
    assessment.news_flow = Some(compute_news_flow(articles, &impacts, today));

    info!(
        country = country_name,
        provider = oracle.name(),
        score = ?assessment.score,
        articles = assessment.article_scores.len(),
        "oracle assessment complete"
    );
    assessment
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use serde_json::json;

    fn valid_response() -> serde_json::Value {
        json!({
            "subscores": {
                "conflict_war": 0.2,
                "political_stability": 0.4,
                "governance_corruption": null,
                "macroeconomic_volatility": 0.5,
                "regulatory_uncertainty": 0.3
            },
            "news_article_scores": [
                {"id": "a1", "impact": 0.7, "topic_group": "monetary policy"}
            ],
            "score": 0.42,
            "bullet_summary": "Moderate risk driven by inflation."
        })
    }

    #[test]
    fn valid_response_passes_validation() {
        let a = validate_response(valid_response()).unwrap();
        assert_eq!(a.score, Some(0.42));
        assert_eq!(a.article_scores[0].topic_group, "monetary policy");
        assert_eq!(a.subscores.governance_corruption, None);
    }

    #[test]
    fn missing_keys_are_rejected() {
        let raw = json!({"score": 0.4});
        assert!(validate_response(raw).is_err());
    }

    #[test]
    fn out_of_range_values_are_rejected() {
        let mut raw = valid_response();
        raw["score"] = json!(1.4);
        assert!(validate_response(raw).is_err());

        let mut raw = valid_response();
        raw["news_article_scores"][0]["impact"] = json!(-0.1);
        assert!(validate_response(raw).is_err());
    }

    #[test]
    fn overlong_summary_is_capped() {
        let mut raw = valid_response();
        raw["bullet_summary"] = json!("x".repeat(2_000));
        let a = validate_response(raw).unwrap();
        assert_eq!(a.bullet_summary.chars().count(), BULLET_SUMMARY_CAP_CHARS);
    }

    fn dated_item(id: &str, days_ago: i64, today: NaiveDate) -> ArticleItem {
        let mut it = ArticleItem::new(format!("https://x/{id}"), "t", "s");
        it.id = Some(id.to_string());
        let date = today - chrono::Duration::days(days_ago);
        it.published_at = Some(Utc.from_utc_datetime(&date.and_hms_opt(12, 0, 0).unwrap()));
        it
    }

    #[test]
    fn news_flow_weights_recency_and_boosts_corroborated_severe_events() {
        let today = NaiveDate::from_ymd_opt(2025, 6, 30).unwrap();
        let articles = vec![
            dated_item("a1", 5, today),
            dated_item("a2", 10, today),
            dated_item("a3", 90, today),
        ];
        let impacts: HashMap<String, f32> = [
            ("a1".to_string(), 0.9),
            ("a2".to_string(), 0.9),
            ("a3".to_string(), 0.2),
        ]
        .into_iter()
        .collect();

        let flow = compute_news_flow(&articles, &impacts, today);
        // weighted mean (1.0*0.9 + 1.0*0.9 + 0.3*0.2) / 2.3 = 0.808..., boosted by 1.10
        assert!(flow > 0.85 && flow <= 0.95, "got {flow}");
    }

    #[test]
    fn news_flow_defaults_and_clamps_with_no_impacts() {
        let today = NaiveDate::from_ymd_opt(2025, 6, 30).unwrap();
        let flow = compute_news_flow(&[], &HashMap::new(), today);
        assert_eq!(flow, 0.10);
    }

    #[tokio::test]
    async fn unconfigured_oracle_short_circuits_to_sentinel() {
        let oracle = OpenAiOracle::new(String::new(), None);
        let ev = MacroEvidence::from_value(json!({"indicators": {"GDP": {"latest": 1.0}}})).unwrap();
        let out = assess_country(
            &oracle,
            "Brazil",
            &ev,
            &[],
            NaiveDate::from_ymd_opt(2025, 6, 30).unwrap(),
        )
        .await;
        assert_eq!(out, RiskAssessment::sentinel());
    }

    #[tokio::test]
    async fn mock_oracle_round_trip_sets_news_flow() {
        let oracle = MockOracle {
            fixed: valid_response(),
        };
        let ev = MacroEvidence::from_value(json!({"indicators": {"GDP": {"latest": 1.0}}})).unwrap();
        let today = NaiveDate::from_ymd_opt(2025, 6, 30).unwrap();
        let mut a1 = ArticleItem::new("https://x/1", "t", "s");
        a1.id = Some("a1".into());
        let out = assess_country(&oracle, "Brazil", &ev, &[a1], today).await;
        assert_eq!(out.score, Some(0.42));
        assert!(out.news_flow.is_some());
    }
}
