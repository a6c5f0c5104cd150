//! Backend selection and executive-layer calibration.

use std::path::Path;

use guardian::capability::select_backend;
use guardian::config::GuardianConfig;
use guardian::decision::DecisionJournal;
use guardian::guard::{AuditTrail, GuardRequest, Guardian, Validation};

fn config_in(dir: &Path) -> GuardianConfig {
    let mut config = GuardianConfig {
        enabled: true,
        ..GuardianConfig::default()
    };
    config.paths.journal = dir.join("journal.jsonl");
    config.paths.last_resort = dir.join("last-resort.jsonl");
    config
}

fn install_executive(dir: &Path, manifest: &str) {
    std::fs::create_dir_all(dir).expect("create executive dir");
    std::fs::write(dir.join("capabilities.toml"), manifest).expect("write manifest");
}

#[test]
fn no_executive_dir_selects_standalone() {
    let tmp = tempfile::tempdir().expect("temp dir");
    let backend = select_backend(&config_in(tmp.path()));
    assert_eq!(backend.name(), "standalone");
    assert_eq!(backend.journal().path(), tmp.path().join("journal.jsonl"));
}

#[test]
fn empty_executive_dir_selects_standalone() {
    let tmp = tempfile::tempdir().expect("temp dir");
    let mut config = config_in(tmp.path());
    config.paths.executive_dir = Some(tmp.path().join("executive"));
    assert_eq!(select_backend(&config).name(), "standalone");
}

#[test]
fn malformed_manifest_falls_back_to_standalone() {
    let tmp = tempfile::tempdir().expect("temp dir");
    let exec_dir = tmp.path().join("executive");
    install_executive(&exec_dir, "contract_version = \"two\"");
    let mut config = config_in(tmp.path());
    config.paths.executive_dir = Some(exec_dir);
    assert_eq!(select_backend(&config).name(), "standalone");
}

#[test]
fn manifest_without_record_fields_selects_standalone() {
    let tmp = tempfile::tempdir().expect("temp dir");
    let exec_dir = tmp.path().join("executive");
    install_executive(
        &exec_dir,
        "contract_version = 1\njournal = \"d.jsonl\"\ncompletion_fields = [\"validation_tier\"]\nsupports_fail = true\n",
    );
    let mut config = config_in(tmp.path());
    config.paths.executive_dir = Some(exec_dir);
    assert_eq!(select_backend(&config).name(), "standalone");
}

#[tokio::test]
async fn record_contract_missing_required_field_keeps_primary_journal() {
    let tmp = tempfile::tempdir().expect("temp dir");
    let exec_dir = tmp.path().join("executive");
    install_executive(
        &exec_dir,
        r#"
contract_version = 1
record_fields = ["task_id", "action_type", "metadata"]
completion_fields = ["validation_tier", "validator_metadata"]
journal = "d.jsonl"
"#,
    );
    let mut config = config_in(tmp.path());
    config.paths.executive_dir = Some(exec_dir.clone());
    let guardian = Guardian::from_config(&config);
    assert_eq!(guardian.backend().name(), "standalone");

    let guarded = guardian
        .exec_with_guard(
            GuardRequest::new("t", "main", "file_write", "x exists", 0.8),
            || async { Ok::<_, String>(()) },
            |_| Ok(Validation::from_check(true)),
        )
        .await;
    assert_eq!(guarded.audit(), &AuditTrail::Journaled);
    assert_eq!(
        DecisionJournal::new(tmp.path().join("journal.jsonl"))
            .entries()
            .expect("entries")
            .len(),
        1
    );
    assert!(!exec_dir.join("d.jsonl").exists());
}

#[tokio::test]
async fn executive_layer_journals_with_its_own_calibration() {
    let tmp = tempfile::tempdir().expect("temp dir");
    let exec_dir = tmp.path().join("executive");
    install_executive(
        &exec_dir,
        r#"
contract_version = 2
record_fields = ["task_id", "action_type", "expected_outcome", "confidence_pre", "metadata"]
completion_fields = ["validation_tier", "validator_metadata"]
supports_fail = true
journal = "logs/decisions.jsonl"
failure_decay = 0.3
"#,
    );
    let mut config = config_in(tmp.path());
    config.paths.executive_dir = Some(exec_dir.clone());
    let guardian = Guardian::from_config(&config);
    assert_eq!(guardian.backend().name(), "executive");

    let guarded = guardian
        .exec_with_guard(
            GuardRequest::new("t", "main", "command_exec", "exit 0", 0.7),
            || async { Err::<(), _>("exit 1".to_owned()) },
            |_| Ok(Validation::from_check(true)),
        )
        .await;
    assert!(guarded.audit().is_recorded());

    let entries = DecisionJournal::new(exec_dir.join("logs/decisions.jsonl"))
        .entries()
        .expect("entries");
    assert_eq!(entries.len(), 1);
    let entry = entries[0].as_object().expect("object");
    assert_eq!(entry["result"], "fail");
    assert!(!entry.contains_key("lane"));
    assert!(!entry.contains_key("policy_check"));
    let post = entry["confidence_post"].as_f64().expect("posterior");
    assert!((post - 0.21).abs() < 1e-9);
    assert!(!tmp.path().join("journal.jsonl").exists());
}
