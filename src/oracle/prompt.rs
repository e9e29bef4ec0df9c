// src/oracle/prompt.rs
//! Prompt template and strict response schema for the risk oracle. The model
//! decides the final score; no code-side reweighting happens afterwards.

use serde_json::json;

const PROMPT_TEMPLATE: &str = r#"You are a senior geopolitical risk analyst. Rate investor risk for {country} over the next 12 months using ONLY the evidence provided.

EVIDENCE_JSON
{evidence_json}

ARTICLES_JSON
# exactly these items only
# [{"id":"a1","source":"...","published_at":"YYYY-MM-DD","title":"...","summary":"..."}]
{articles_json}

Scoring bands (guidance; use full 0-1 range):
  - 0.05-0.20 = Low   - 0.20-0.40 = Low-Moderate   - 0.40-0.75 = Moderate
  - 0.75-0.90 = High  - 0.90-0.98 = Extreme (active war / nationwide shutdowns)

Sub-factors to score (diagnostic only):
  conflict_war, political_stability, governance_corruption, macroeconomic_volatility, regulatory_uncertainty.

# --- Localization & Materiality ---
Do NOT raise risk due to indirect foreign tensions or rhetoric. Elevate risk ONLY for {country} when evidence shows kinetic activity on its territory, imminent hostilities, or economically binding policy affecting {country}. Indirect disputes, UN votes, or rhetoric without domestic transmission = low impact.

# --- Hard Rules the model must apply (no post-processing will alter your score) ---
- War Reality: If a sustained interstate war or regular long-range strikes hit {country}'s cities/critical infrastructure -> set conflict_war >= 0.90 AND overall score >= 0.90.
- Internal Conflict:
   - Level A (Severe): recurring mass-casualty attacks (>=20 killed) or mass kidnappings in the last 90 days across >=3 regions -> conflict_war >= 0.80 AND overall score >= 0.70.
   - Level B (Very severe): Level A + repeated attacks on critical infrastructure (pipelines/power grid) or major-city attacks -> conflict_war >= 0.88 AND overall score >= 0.80.
   - Level C (Extreme): Level B + nationwide emergency effects (large displacement, prolonged curfews, export shut-ins) -> overall score >= 0.90.
- Parliamentary Guardrail: Cabinet resignations, caretaker phases, coalition talks, or scheduled/snap elections remain moderate unless there is unconstitutional dissolution, emergency/martial law, week-long widespread violent unrest disrupting essential services, bank runs, capital controls, or sovereign default. Otherwise political_stability should not exceed 0.45.
- Macro floors (numeric): If CPI inflation >= 25% -> macroeconomic_volatility >= 0.70 AND overall score >= 0.55. If >= 40% -> >= 0.80 AND overall >= 0.65. If >= 80% -> overall >= 0.80.

# --- Per-article labels (for diagnostics; caller won't re-score) ---
Impact in [0,1]:
  - 0.85-1.00 Severe - kinetic activity in/against {country}, mass kidnappings, binding economic measures, or major infrastructure sabotage.
  - 0.60-0.75 Moderate - credible mobilization/preparations, high-probability sanctions.
  - 0.40-0.55 Mixed/unclear - indirect third-country events with uncertain transmission.
  - 0.05-0.25 Low/benign - rhetoric/symbolic acts.
Group the articles into topics: give each article a short topic_group label (2-4 words), identical for articles covering the same underlying story or theme.

Return ONLY valid JSON matching the response schema: subscores, news_article_scores (one entry per article id with impact and topic_group), your single calibrated score AFTER applying the hard rules above, and a bullet_summary of at most 120 words explaining primary drivers and meaningful mitigants."#;

/// Fill the prompt template. The evidence and article payloads arrive
/// pre-serialized.
pub fn build_prompt(country: &str, evidence_json: &str, articles_json: &str) -> String {
    PROMPT_TEMPLATE
        .replace("{country}", country)
        .replace("{evidence_json}", evidence_json)
        .replace("{articles_json}", articles_json)
}

/// Strict JSON schema the oracle response must conform to. Every field is
/// required and no extra properties are accepted.
pub fn risk_response_schema() -> serde_json::Value {
    let bounded = |nullable: bool| {
        json!({
            "type": if nullable { json!(["number", "null"]) } else { json!("number") },
            "minimum": 0,
            "maximum": 1
        })
    };
    json!({
        "title": "CountryRiskAssessment",
        "description": "Subscores, per-article impacts with topic groups, a calibrated score, and a short summary.",
        "type": "object",
        "properties": {
            "subscores": {
                "type": "object",
                "properties": {
                    "conflict_war": bounded(true),
                    "political_stability": bounded(true),
                    "governance_corruption": bounded(true),
                    "macroeconomic_volatility": bounded(true),
                    "regulatory_uncertainty": bounded(true)
                },
                "required": [
                    "conflict_war",
                    "political_stability",
                    "governance_corruption",
                    "macroeconomic_volatility",
                    "regulatory_uncertainty"
                ],
                "additionalProperties": false
            },
            "news_article_scores": {
                "type": "array",
                "items": {
                    "type": "object",
                    "properties": {
                        "id": {"type": "string"},
                        "impact": bounded(false),
                        "topic_group": {"type": "string"}
                    },
                    "required": ["id", "impact", "topic_group"],
                    "additionalProperties": false
                }
            },
            "score": bounded(false),
            "bullet_summary": {"type": "string", "maxLength": 800}
        },
        "required": ["subscores", "news_article_scores", "score", "bullet_summary"],
        "additionalProperties": false
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prompt_embeds_all_three_payloads() {
        let p = build_prompt("Brazil", "{\"indicators\":{}}", "[{\"id\":\"a1\"}]");
        assert!(p.contains("investor risk for Brazil"));
        assert!(p.contains("{\"indicators\":{}}"));
        assert!(p.contains("[{\"id\":\"a1\"}]"));
        assert!(!p.contains("{country}"));
        assert!(!p.contains("{evidence_json}"));
    }

    #[test]
    fn schema_requires_topic_groups() {
        let s = risk_response_schema();
        let item_required = &s["properties"]["news_article_scores"]["items"]["required"];
        let required: Vec<&str> = item_required
            .as_array()
            .unwrap()
            .iter()
            .map(|v| v.as_str().unwrap())
            .collect();
        assert_eq!(required, vec!["id", "impact", "topic_group"]);
    }
}
