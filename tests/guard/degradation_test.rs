//! Audit degradation never leaks into the wrapped operation's outcome.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;

use guardian::capability::{ContractSchema, DecisionCapabilities, StandaloneBackend};
use guardian::config::GuardianConfig;
use guardian::decision::{AuditError, DecisionJournal, DecisionRecord};
use guardian::guard::{AuditTrail, GuardRequest, Guardian, Validation};

/// Backend double with configurable contracts, no failure path, and an
/// optionally broken journal.
#[derive(Debug)]
struct ScriptedBackend {
    journal: DecisionJournal,
    record_contract: ContractSchema,
    completion_contract: ContractSchema,
    append_fails: bool,
}

impl ScriptedBackend {
    fn full(journal: &Path) -> Self {
        Self {
            journal: DecisionJournal::new(journal),
            record_contract: ContractSchema::declared([
                "decision_id",
                "task_id",
                "lane",
                "action_type",
                "expected_outcome",
                "confidence_pre",
                "policy_check",
                "metadata",
            ]),
            completion_contract: ContractSchema::declared(["validation_tier", "validator_metadata"]),
            append_fails: false,
        }
    }
}

impl DecisionCapabilities for ScriptedBackend {
    fn name(&self) -> &str {
        "scripted"
    }

    fn record_contract(&self) -> &ContractSchema {
        &self.record_contract
    }

    fn completion_contract(&self) -> &ContractSchema {
        &self.completion_contract
    }

    fn journal(&self) -> &DecisionJournal {
        &self.journal
    }

    fn time_budget(&self) -> Option<Duration> {
        None
    }

    fn append(&self, record: &DecisionRecord) -> Result<(), AuditError> {
        if self.append_fails {
            return Err(AuditError::Io(std::io::Error::other("journal offline")));
        }
        self.journal.log(record)
    }
}

fn config_in(dir: &Path) -> GuardianConfig {
    let mut config = GuardianConfig {
        enabled: true,
        ..GuardianConfig::default()
    };
    config.paths.journal = dir.join("journal.jsonl");
    config.paths.last_resort = dir.join("last-resort.jsonl");
    config
}

fn request() -> GuardRequest {
    GuardRequest::new("task-9", "side", "file_write", "/tmp/x exists", 0.8)
}

fn lines(path: &Path) -> Vec<Value> {
    std::fs::read_to_string(path)
        .expect("read file")
        .lines()
        .map(|line| serde_json::from_str(line).expect("json line"))
        .collect()
}

#[tokio::test]
async fn unwritable_journal_falls_back_to_last_resort() {
    let tmp = tempfile::tempdir().expect("temp dir");
    let blocker = tmp.path().join("blocker");
    std::fs::write(&blocker, "not a directory").expect("write blocker");

    let mut config = config_in(tmp.path());
    config.paths.journal = blocker.join("journal.jsonl");
    let guardian = Guardian::from_config(&config);

    let guarded = guardian
        .exec_with_guard(
            request(),
            || async { Ok::<_, String>("written") },
            |_| Ok(Validation::from_check(true)),
        )
        .await;

    assert!(matches!(guarded.audit(), AuditTrail::LastResort { .. }));
    assert_eq!(guarded.into_result(), Ok("written"));

    let entries = lines(&tmp.path().join("last-resort.jsonl"));
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0]["task_id"], "task-9");
    assert_eq!(entries[0]["lane"], "side");
    assert_eq!(entries[0]["validation_tier"], "success");
    assert!(entries[0]["audit_error"].is_string());
}

#[tokio::test]
async fn both_paths_down_still_returns_outcome() {
    let tmp = tempfile::tempdir().expect("temp dir");
    let blocker = tmp.path().join("blocker");
    std::fs::write(&blocker, "x").expect("write blocker");

    let mut config = config_in(tmp.path());
    config.paths.journal = blocker.join("journal.jsonl");
    config.paths.last_resort = blocker.join("fallback.jsonl");
    let guardian = Guardian::from_config(&config);

    let guarded = guardian
        .exec_with_guard(
            request(),
            || async { Err::<(), _>("write failed".to_owned()) },
            |_| Ok(Validation::from_check(true)),
        )
        .await;

    assert!(matches!(guarded.audit(), AuditTrail::Lost { .. }));
    assert!(!guarded.audit().is_recorded());
    assert_eq!(guarded.into_result(), Err("write failed".to_owned()));
}

#[tokio::test]
async fn failing_append_records_error_in_last_resort() {
    let tmp = tempfile::tempdir().expect("temp dir");
    let mut backend = ScriptedBackend::full(&tmp.path().join("journal.jsonl"));
    backend.append_fails = true;
    let guardian = Guardian::new(&config_in(tmp.path()), Arc::new(backend));

    let guarded = guardian
        .exec_with_guard(
            request(),
            || async { Err::<(), _>("permission denied".to_owned()) },
            |_| Ok(Validation::from_check(true)),
        )
        .await;

    match guarded.audit() {
        AuditTrail::LastResort { reason } => assert!(reason.contains("journal offline")),
        other => panic!("expected last-resort, got {other:?}"),
    }
    assert_eq!(guarded.into_result(), Err("permission denied".to_owned()));

    let entries = lines(&tmp.path().join("last-resort.jsonl"));
    assert_eq!(entries[0]["error"], "permission denied");
    assert!(entries[0].get("validation_tier").is_none());
}

#[tokio::test]
async fn backend_without_fail_path_completes_with_fail_tier() {
    let tmp = tempfile::tempdir().expect("temp dir");
    let journal_path = tmp.path().join("journal.jsonl");
    let guardian = Guardian::new(
        &config_in(tmp.path()),
        Arc::new(ScriptedBackend::full(&journal_path)),
    );

    let guarded = guardian
        .exec_with_guard(
            request(),
            || async { Err::<(), _>("no space left".to_owned()) },
            |_| Ok(Validation::from_check(true)),
        )
        .await;

    assert_eq!(guarded.audit(), &AuditTrail::Journaled);
    assert!(guarded.outcome().is_err());

    let entries = DecisionJournal::new(&journal_path).entries().expect("entries");
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0]["result"], "success");
    assert_eq!(entries[0]["validation_tier"], "fail");
    assert_eq!(entries[0]["metadata"]["error"], "no space left");
}

#[tokio::test]
async fn completion_contract_without_metadata_cannot_hold_error() {
    let tmp = tempfile::tempdir().expect("temp dir");
    let mut backend = ScriptedBackend::full(&tmp.path().join("journal.jsonl"));
    backend.completion_contract = ContractSchema::declared(["validation_tier"]);
    let guardian = Guardian::new(&config_in(tmp.path()), Arc::new(backend));

    let guarded = guardian
        .exec_with_guard(
            request(),
            || async { Err::<(), _>("boom".to_owned()) },
            |_| Ok(Validation::from_check(true)),
        )
        .await;

    assert!(matches!(guarded.audit(), AuditTrail::LastResort { .. }));
    assert!(!tmp.path().join("journal.jsonl").exists());
    let entries = lines(&tmp.path().join("last-resort.jsonl"));
    assert_eq!(entries[0]["error"], "boom");
}

#[tokio::test]
async fn narrow_record_contract_drops_unsupported_fields() {
    let tmp = tempfile::tempdir().expect("temp dir");
    let journal_path = tmp.path().join("journal.jsonl");
    let mut backend = ScriptedBackend::full(&journal_path);
    backend.record_contract = ContractSchema::declared(["task_id", "action_type", "confidence_pre"]);
    let guardian = Guardian::new(&config_in(tmp.path()), Arc::new(backend));

    let guarded = guardian
        .exec_with_guard(
            request().with_metadata("path", "/tmp/x"),
            || async { Ok::<_, String>(()) },
            |_| Ok(Validation::from_check(true)),
        )
        .await;
    assert_eq!(guarded.audit(), &AuditTrail::Journaled);

    let entries = DecisionJournal::new(&journal_path).entries().expect("entries");
    let entry = entries[0].as_object().expect("object");
    assert_eq!(entry["task_id"], "task-9");
    for dropped in ["decision_id", "lane", "expected_outcome", "policy_check"] {
        assert!(!entry.contains_key(dropped), "{dropped} should be absent");
    }
    assert_eq!(entry["validation_tier"], "success");
}

#[tokio::test]
async fn unknown_completion_contract_degrades_without_error() {
    let tmp = tempfile::tempdir().expect("temp dir");
    let mut backend = ScriptedBackend::full(&tmp.path().join("journal.jsonl"));
    backend.completion_contract = ContractSchema::Unknown;
    let guardian = Guardian::new(&config_in(tmp.path()), Arc::new(backend));

    let guarded = guardian
        .exec_with_guard(
            request(),
            || async { Ok::<_, String>(11) },
            |_| Ok(Validation::from_check(true)),
        )
        .await;

    assert!(matches!(guarded.audit(), AuditTrail::LastResort { .. }));
    assert_eq!(guarded.into_result(), Ok(11));
}

#[tokio::test]
async fn unconstructible_record_goes_to_last_resort() {
    let tmp = tempfile::tempdir().expect("temp dir");
    let guardian = Guardian::new(
        &config_in(tmp.path()),
        Arc::new(StandaloneBackend::new(
            DecisionJournal::new(tmp.path().join("journal.jsonl")),
            None,
        )),
    );
    let bad = GuardRequest::new("task-9", "main", "file_write", "x", 1.5);

    let guarded = guardian
        .exec_with_guard(
            bad,
            || async { Ok::<_, String>(()) },
            |_| Ok(Validation::from_check(true)),
        )
        .await;

    match guarded.audit() {
        AuditTrail::LastResort { reason } => assert!(reason.contains("confidence_pre")),
        other => panic!("expected last-resort, got {other:?}"),
    }
    assert!(guarded.outcome().is_ok());
}
