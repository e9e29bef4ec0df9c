// src/sink.rs
//! Snapshot hand-off boundary. The production sink (relational upsert keyed
//! by `(country_code, as_of)`) lives outside this crate; the NDJSON sink
//! here is the development stand-in the binary writes through.

use std::path::PathBuf;

use anyhow::{Context, Result};
use async_trait::async_trait;

use crate::article::CountryRiskRecord;

/// Persistence boundary. Implementations are expected to be idempotent for
/// the same `(country_code, as_of)` key.
#[async_trait]
pub trait SnapshotSink: Send + Sync {
    async fn upsert_snapshot(&self, record: &CountryRiskRecord) -> Result<()>;
    fn name(&self) -> &'static str;
}

/// Appends one JSON line per snapshot to a local file.
pub struct NdjsonSink {
    path: PathBuf,
}

impl NdjsonSink {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }
}

#[async_trait]
impl SnapshotSink for NdjsonSink {
    async fn upsert_snapshot(&self, record: &CountryRiskRecord) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).ok();
        }
        let line = serde_json::to_string(record).context("serializing snapshot")?;
        let mut file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .with_context(|| format!("opening snapshot file {}", self.path.display()))?;
        use std::io::Write as _;
        writeln!(file, "{line}").context("writing snapshot line")?;
        Ok(())
    }

    fn name(&self) -> &'static str {
        "ndjson"
    }
}

// --- Test helper ---
pub struct MockSink {
    pub records: std::sync::Mutex<Vec<CountryRiskRecord>>,
}

impl MockSink {
    pub fn new() -> Self {
        Self {
            records: std::sync::Mutex::new(Vec::new()),
        }
    }
}

impl Default for MockSink {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SnapshotSink for MockSink {
    async fn upsert_snapshot(&self, record: &CountryRiskRecord) -> Result<()> {
        self.records.lock().unwrap().push(record.clone());
        Ok(())
    }

    fn name(&self) -> &'static str {
        "mock"
    }
}
