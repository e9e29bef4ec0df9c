// src/pipeline.rs
//! End-to-end per-country run: retrieval fan-out, enrichment, oracle
//! assessment, legal gate, clustering, tier-2 backfill, and record assembly.
//! One [`Pipeline`] instance carries all configuration and provider handles;
//! country runs share no other state.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;
use tracing::{info, warn};

use crate::article::{CountryRiskRecord, MacroEvidence};
use crate::cluster;
use crate::config::PipelineConfig;
use crate::enrich;
use crate::enrich::render::RenderFetch;
use crate::gate::LegalGate;
use crate::ingest;
use crate::ingest::gnews::NewsSearch;
use crate::oracle::{self, Oracle};
use crate::resolve::UrlResolver;
use crate::robots::RobotsCache;

/// Macro-evidence boundary: the panel-building layer lives outside this
/// crate and hands over an opaque, pre-validated payload.
#[async_trait]
pub trait MacroProvider: Send + Sync {
    async fn fetch(&self, iso2: &str) -> Result<MacroEvidence>;
    fn name(&self) -> &'static str;
}

/// Reads prebuilt per-country payloads from `<dir>/<ISO2>.json`.
pub struct JsonDirMacroProvider {
    dir: PathBuf,
}

impl JsonDirMacroProvider {
    pub fn new(dir: PathBuf) -> Self {
        Self { dir }
    }
}

#[async_trait]
impl MacroProvider for JsonDirMacroProvider {
    async fn fetch(&self, iso2: &str) -> Result<MacroEvidence> {
        let path = self.dir.join(format!("{}.json", iso2.to_uppercase()));
        let content = tokio::fs::read_to_string(&path)
            .await
            .with_context(|| format!("reading macro payload {}", path.display()))?;
        let value: serde_json::Value =
            serde_json::from_str(&content).context("parsing macro payload json")?;
        MacroEvidence::from_value(value)
    }

    fn name(&self) -> &'static str {
        "json-dir"
    }
}

/// All provider handles and configuration for one pipeline instance.
pub struct Pipeline {
    cfg: PipelineConfig,
    http: reqwest::Client,
    resolver: UrlResolver,
    robots: RobotsCache,
    search: Arc<dyn NewsSearch>,
    oracle: Arc<dyn Oracle>,
    render: Option<Arc<dyn RenderFetch>>,
    macro_provider: Arc<dyn MacroProvider>,
    gate: LegalGate,
}

impl Pipeline {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        cfg: PipelineConfig,
        http: reqwest::Client,
        search: Arc<dyn NewsSearch>,
        oracle: Arc<dyn Oracle>,
        render: Option<Arc<dyn RenderFetch>>,
        macro_provider: Arc<dyn MacroProvider>,
        gate: LegalGate,
    ) -> Self {
        Self {
            resolver: UrlResolver::new(http.clone()),
            robots: RobotsCache::new(),
            cfg,
            http,
            search,
            oracle,
            render,
            macro_provider,
            gate,
        }
    }

    /// Run the full pipeline for one country and return its snapshot record.
    /// Expected failures (empty retrieval, oracle errors, scrape misses)
    /// degrade inside their stages; only the macro-evidence boundary can
    /// error out of this function.
    pub async fn run_country(&self, country_name: &str, iso2: &str) -> Result<CountryRiskRecord> {
        let macro_evidence = self.macro_provider.fetch(iso2).await?;
        let as_of = macro_evidence.as_of();

        // Retrieval fan-out, relevance scoring, pool selection.
        let pool = ingest::retrieve_pool(
            self.search.as_ref(),
            country_name,
            self.cfg.relevance_threshold,
            self.cfg.pool_cap,
        )
        .await;

        // Tier-1 enrichment: resolve links, fill summaries/content/images.
        let mut pool = enrich::enrich_pool(
            &self.http,
            &self.resolver,
            pool,
            self.cfg.summary_words,
        )
        .await;

        // Assembly: the pool order is now fixed; ids are what the oracle
        // will reference.
        for (i, item) in pool.iter_mut().enumerate() {
            item.id = Some(format!("a{}", i + 1));
        }

        let assessment = oracle::assess_country(
            self.oracle.as_ref(),
            country_name,
            &macro_evidence,
            &pool,
            as_of,
        )
        .await;

        if assessment.score.is_none() {
            // Oracle failure: still hand persistence a well-formed record.
            return Ok(CountryRiskRecord::null_score(iso2, as_of, macro_evidence));
        }

        let mut score = assessment.score;
        let mut bullet = assessment.bullet_summary.clone();
        if let Some(gate) = self.gate.decision(iso2, as_of) {
            info!(country = iso2, rule = %gate.rule, "legal gate fired");
            bullet = format!("{} {}", gate.rationale(), bullet).trim().to_string();
            score = Some(1.0);
        }

        // Clustering and Top-K selection on the oracle's topic labels.
        cluster::apply_scores(&mut pool, &assessment.article_scores);
        let selected = cluster::select_top(&pool, cluster::TOP_K);
        let mut top_pool: Vec<_> = selected.iter().map(|&i| pool[i].clone()).collect();

        // Tier-2: only the selected few, only when an image is still missing.
        if let Some(render) = &self.render {
            enrich::backfill_top_articles(render.as_ref(), &self.robots, &mut top_pool).await;
        }

        let order: Vec<usize> = (0..top_pool.len()).collect();
        let top_articles = cluster::to_top_articles(&top_pool, &order);

        if top_articles.is_empty() {
            warn!(country = iso2, "no evidence articles selected");
        }

        Ok(CountryRiskRecord {
            country_code: iso2.to_string(),
            as_of,
            macro_evidence,
            subscores: assessment.subscores,
            score,
            news_flow: assessment.news_flow,
            bullet_summary: bullet,
            top_articles,
        })
    }
}
