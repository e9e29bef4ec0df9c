// tests/legal_gate.rs
use std::io::Write;

use chrono::NaiveDate;
use country_risk_analyzer::gate::{LegalGate, ENV_LEGAL_RULES_PATH};

const RULES: &str = r#"
[[entries]]
iso2 = "RU"
name = "Russia"
rule = "New investment prohibited"
effective_from = "2022-04-06"
set_score_one = true
"#;

#[test]
fn gate_respects_effective_date_boundary() {
    let gate = LegalGate::from_toml_str(RULES).unwrap();
    let day_before = NaiveDate::from_ymd_opt(2022, 4, 5).unwrap();
    let day_of = NaiveDate::from_ymd_opt(2022, 4, 6).unwrap();
    assert!(gate.decision("RU", day_before).is_none());
    assert!(gate.decision("RU", day_of).is_some());
}

#[test]
fn rationale_carries_name_and_rule() {
    let gate = LegalGate::from_toml_str(RULES).unwrap();
    let d = gate
        .decision("RU", NaiveDate::from_ymd_opt(2025, 1, 1).unwrap())
        .unwrap();
    let line = d.rationale();
    assert!(line.contains("Russia"));
    assert!(line.contains("New investment prohibited"));
    assert!(line.ends_with("score forced to 1.0."));
}

#[serial_test::serial]
#[test]
fn load_default_honors_env_path_and_degrades_when_missing() {
    let mut f = tempfile::NamedTempFile::new().unwrap();
    write!(f, "{RULES}").unwrap();

    std::env::set_var(ENV_LEGAL_RULES_PATH, f.path());
    let gate = LegalGate::load_default();
    assert!(gate
        .decision("RU", NaiveDate::from_ymd_opt(2025, 1, 1).unwrap())
        .is_some());

    std::env::set_var(ENV_LEGAL_RULES_PATH, "/nonexistent/legal.toml");
    let inert = LegalGate::load_default();
    assert!(inert
        .decision("RU", NaiveDate::from_ymd_opt(2025, 1, 1).unwrap())
        .is_none());

    std::env::remove_var(ENV_LEGAL_RULES_PATH);
}
