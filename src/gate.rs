// src/gate.rs
//! Legal-investability gate: per-country rules that force the final score to
//! 1.0 (uninvestable) regardless of oracle output, with the rationale
//! prefixed to the bullet summary. Rules come from a TOML file so sanctions
//! changes never require a code change.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::NaiveDate;
use serde::Deserialize;
use tracing::{info, warn};

pub const DEFAULT_LEGAL_RULES_PATH: &str = "config/legal_restrictions.toml";
pub const ENV_LEGAL_RULES_PATH: &str = "LEGAL_RULES_PATH";

#[derive(Debug, Clone, Deserialize)]
pub struct GateEntry {
    pub iso2: String,
    pub name: String,
    #[serde(default = "default_rule")]
    pub rule: String,
    /// Gate fires only for runs dated on or after this day.
    pub effective_from: Option<NaiveDate>,
    #[serde(default)]
    pub set_score_one: bool,
    #[serde(default)]
    pub sources: Vec<String>,
}

fn default_rule() -> String {
    "Sanctions investability prohibition".to_string()
}

#[derive(Debug, Clone, Default, Deserialize)]
struct GateRoot {
    #[serde(default)]
    entries: Vec<GateEntry>,
}

/// Why the gate fired for a country.
#[derive(Debug, Clone, PartialEq)]
pub struct GateDecision {
    pub name: String,
    pub rule: String,
}

impl GateDecision {
    /// Rationale line prefixed to the snapshot's bullet summary.
    pub fn rationale(&self) -> String {
        format!(
            "Legal-investability gate triggered for {}: {} => score forced to 1.0.",
            self.name, self.rule
        )
    }
}

/// Indexed gate rules. An empty gate never fires.
#[derive(Debug, Clone, Default)]
pub struct LegalGate {
    by_iso2: HashMap<String, GateEntry>,
}

impl LegalGate {
    pub fn from_toml_str(toml_str: &str) -> Result<Self> {
        let root: GateRoot = toml::from_str(toml_str).context("parsing legal restrictions toml")?;
        let mut by_iso2 = HashMap::new();
        for e in root.entries {
            by_iso2.insert(e.iso2.to_uppercase(), e);
        }
        Ok(Self { by_iso2 })
    }

    pub fn from_path(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("reading legal restrictions from {}", path.display()))?;
        Self::from_toml_str(&content)
    }

    /// Load from `$LEGAL_RULES_PATH` or the default location. A missing file
    /// leaves the gate inert rather than failing startup.
    pub fn load_default() -> Self {
        let path = std::env::var(ENV_LEGAL_RULES_PATH)
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from(DEFAULT_LEGAL_RULES_PATH));
        match Self::from_path(&path) {
            Ok(gate) => {
                info!(path = %path.display(), entries = gate.by_iso2.len(), "legal gate loaded");
                gate
            }
            Err(e) => {
                warn!(path = %path.display(), error = ?e, "legal gate unavailable; disabled");
                Self::default()
            }
        }
    }

    /// Decide whether the 1.0 override fires for `(iso2, as_of)`.
    pub fn decision(&self, iso2: &str, as_of: NaiveDate) -> Option<GateDecision> {
        let entry = self.by_iso2.get(&iso2.to_uppercase())?;
        if !entry.set_score_one {
            return None;
        }
        let effective = entry.effective_from.unwrap_or(NaiveDate::MIN);
        if as_of < effective {
            return None;
        }
        Some(GateDecision {
            name: entry.name.clone(),
            rule: entry.rule.clone(),
        })
    }
}
