//! Country Risk Analyzer — Binary Entrypoint
//! Loops the configured countries through the pipeline and hands each
//! snapshot to the sink. One country's failure is logged and skipped; the
//! rest of the run proceeds.

use std::path::PathBuf;
use std::sync::Arc;

use tracing::{error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use country_risk_analyzer::config::{
    self, PipelineConfig, DEFAULT_COUNTRIES_PATH, DEFAULT_MACRO_DATA_DIR, DEFAULT_SNAPSHOT_OUT,
    ENV_COUNTRIES_PATH, ENV_MACRO_DATA_DIR, ENV_SNAPSHOT_OUT,
};
use country_risk_analyzer::enrich::render::{CrawlbaseRender, RenderFetch};
use country_risk_analyzer::gate::LegalGate;
use country_risk_analyzer::ingest::gnews::GoogleNewsSearch;
use country_risk_analyzer::oracle::OpenAiOracle;
use country_risk_analyzer::pipeline::{JsonDirMacroProvider, Pipeline};
use country_risk_analyzer::sink::{NdjsonSink, SnapshotSink};

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("country_risk_analyzer=info,warn"));
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().compact())
        .init();
}

fn env_path(name: &str, default: &str) -> PathBuf {
    std::env::var(name)
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from(default))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env in local/dev; no-op when absent.
    let _ = dotenvy::dotenv();
    init_tracing();

    let cfg = PipelineConfig::from_env();
    let http = config::build_http_client();

    let countries_path = env_path(ENV_COUNTRIES_PATH, DEFAULT_COUNTRIES_PATH);
    let countries = config::load_countries(&countries_path)?;
    info!(count = countries.len(), path = %countries_path.display(), "country map loaded");

    let search = Arc::new(GoogleNewsSearch::new(http.clone()));
    let oracle = Arc::new(OpenAiOracle::new(
        std::env::var("OPENAI_API_KEY").unwrap_or_default(),
        cfg.oracle_model.as_deref(),
    ));
    let render: Option<Arc<dyn RenderFetch>> = if cfg.render_token.is_empty() {
        None
    } else {
        Some(Arc::new(CrawlbaseRender::new(cfg.render_token.clone())))
    };
    let macro_provider = Arc::new(JsonDirMacroProvider::new(env_path(
        ENV_MACRO_DATA_DIR,
        DEFAULT_MACRO_DATA_DIR,
    )));
    let gate = LegalGate::load_default();
    let sink = NdjsonSink::new(env_path(ENV_SNAPSHOT_OUT, DEFAULT_SNAPSHOT_OUT));

    let pipeline = Pipeline::new(cfg, http, search, oracle, render, macro_provider, gate);

    info!("country risk run started");
    let mut failures = 0usize;
    for country in &countries {
        match pipeline.run_country(&country.name, &country.iso2).await {
            Ok(record) => {
                info!(
                    country = %country.iso2,
                    score = ?record.score,
                    articles = record.top_articles.len(),
                    "snapshot ready"
                );
                if let Err(e) = sink.upsert_snapshot(&record).await {
                    error!(country = %country.iso2, error = ?e, "snapshot hand-off failed");
                    failures += 1;
                }
            }
            Err(e) => {
                // Isolated failure: log with the country identifier and move on.
                error!(country = %country.iso2, error = ?e, "country run failed; skipping");
                failures += 1;
            }
        }
    }
    info!(total = countries.len(), failures, "country risk run finished");
    Ok(())
}
