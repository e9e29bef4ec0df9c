// src/config.rs
//! Runtime configuration for the pipeline: environment-driven knobs with
//! documented names and defaults, the shared HTTP client, and the country
//! map consumed by the orchestration binary.

use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::Deserialize;

pub const ENV_RELEVANCE_THRESHOLD: &str = "RELEVANCE_THRESHOLD";
pub const ENV_POOL_CAP: &str = "ARTICLE_POOL_CAP";
pub const ENV_ORACLE_MODEL: &str = "ORACLE_MODEL";
pub const ENV_RENDER_TOKEN_JS: &str = "CRAWLBASE_JS_TOKEN";
pub const ENV_RENDER_TOKEN: &str = "CRAWLBASE_TOKEN";
pub const ENV_COUNTRIES_PATH: &str = "COUNTRIES_PATH";
pub const ENV_MACRO_DATA_DIR: &str = "MACRO_DATA_DIR";
pub const ENV_SNAPSHOT_OUT: &str = "SNAPSHOT_OUT";

pub const DEFAULT_COUNTRIES_PATH: &str = "config/countries.toml";
pub const DEFAULT_MACRO_DATA_DIR: &str = "data/macro";
pub const DEFAULT_SNAPSHOT_OUT: &str = "data/snapshots.ndjson";

const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);
const READ_TIMEOUT: Duration = Duration::from_secs(15);

// Some publishers serve different markup to non-browser agents.
const BROWSER_UA: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) \
AppleWebKit/537.36 (KHTML, like Gecko) Chrome/132.0.0.0 Safari/537.36";

/// Knobs for one pipeline instance. Built once at startup and passed into the
/// pipeline context; nothing here lives in module globals.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Articles below this relevance are dropped (minimum-pool backfill still
    /// applies).
    pub relevance_threshold: f32,
    /// Upper bound on the retained article pool.
    pub pool_cap: usize,
    /// Word budget for extracted lead summaries.
    pub summary_words: usize,
    /// Model override for the oracle provider.
    pub oracle_model: Option<String>,
    /// Rendering-fetch service token; tier-2 is skipped entirely when empty.
    pub render_token: String,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            relevance_threshold: crate::relevance::DEFAULT_RELEVANCE_THRESHOLD,
            pool_cap: crate::relevance::DEFAULT_POOL_CAP,
            summary_words: crate::enrich::text::DEFAULT_SUMMARY_WORDS,
            oracle_model: None,
            render_token: String::new(),
        }
    }
}

fn parse_clamped_threshold(raw: Option<String>) -> Option<f32> {
    raw.and_then(|s| s.trim().parse::<f32>().ok())
        .map(|v| v.clamp(0.0, 1.0))
}

impl PipelineConfig {
    /// Build from the environment, falling back to defaults for anything
    /// unset or unparseable.
    pub fn from_env() -> Self {
        let mut cfg = Self::default();
        if let Some(t) = parse_clamped_threshold(std::env::var(ENV_RELEVANCE_THRESHOLD).ok()) {
            cfg.relevance_threshold = t;
        }
        if let Some(cap) = std::env::var(ENV_POOL_CAP)
            .ok()
            .and_then(|s| s.trim().parse::<usize>().ok())
        {
            cfg.pool_cap = cap.max(crate::relevance::MIN_POOL);
        }
        if let Ok(model) = std::env::var(ENV_ORACLE_MODEL) {
            if !model.trim().is_empty() {
                cfg.oracle_model = Some(model.trim().to_string());
            }
        }
        // Prefer the JS-rendering token, then the standard one.
        cfg.render_token = std::env::var(ENV_RENDER_TOKEN_JS)
            .or_else(|_| std::env::var(ENV_RENDER_TOKEN))
            .unwrap_or_default();
        cfg
    }
}

/// Shared HTTP client for retrieval, resolution, and tier-1 enrichment.
pub fn build_http_client() -> reqwest::Client {
    reqwest::Client::builder()
        .user_agent(BROWSER_UA)
        .connect_timeout(CONNECT_TIMEOUT)
        .timeout(READ_TIMEOUT)
        .redirect(reqwest::redirect::Policy::limited(10))
        .build()
        .unwrap_or_default()
}

/// One row of the country map the binary loops over.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct CountryEntry {
    pub name: String,
    pub iso2: String,
}

#[derive(Debug, Deserialize)]
struct CountriesRoot {
    #[serde(default)]
    countries: Vec<CountryEntry>,
}

/// Load the country map from TOML, dropping rows with blank fields.
pub fn load_countries(path: &Path) -> Result<Vec<CountryEntry>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("reading countries from {}", path.display()))?;
    let root: CountriesRoot = toml::from_str(&content).context("parsing countries toml")?;
    Ok(root
        .countries
        .into_iter()
        .filter(|c| !c.name.trim().is_empty() && c.iso2.trim().len() == 2)
        .map(|c| CountryEntry {
            name: c.name.trim().to_string(),
            iso2: c.iso2.trim().to_uppercase(),
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn defaults_are_sane() {
        let cfg = PipelineConfig::default();
        assert_eq!(cfg.relevance_threshold, 0.30);
        assert_eq!(cfg.pool_cap, 20);
        assert!(cfg.render_token.is_empty());
    }

    #[test]
    fn threshold_parsing_clamps() {
        assert_eq!(parse_clamped_threshold(Some("0.5".into())), Some(0.5));
        assert_eq!(parse_clamped_threshold(Some("7".into())), Some(1.0));
        assert_eq!(parse_clamped_threshold(Some("abc".into())), None);
        assert_eq!(parse_clamped_threshold(None), None);
    }

    #[test]
    fn country_map_drops_malformed_rows() {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        write!(
            f,
            r#"
[[countries]]
name = "Brazil"
iso2 = "br"

[[countries]]
name = ""
iso2 = "XX"

[[countries]]
name = "Nowhere"
iso2 = "XYZ"
"#
        )
        .unwrap();
        let countries = load_countries(f.path()).unwrap();
        assert_eq!(
            countries,
            vec![CountryEntry {
                name: "Brazil".into(),
                iso2: "BR".into()
            }]
        );
    }
}
