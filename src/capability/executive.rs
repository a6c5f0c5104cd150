//! Backend for an installed executive layer.
//!
//! The layer describes itself in `capabilities.toml` inside its directory:
//!
//! ```toml
//! contract_version = 2
//! record_fields = ["task_id", "action_type", "expected_outcome", "confidence_pre", "metadata"]
//! completion_fields = ["validation_tier", "validator_metadata"]
//! supports_fail = false
//! journal = "logs/decisions.jsonl"
//! failure_decay = 0.3
//! ```
//!
//! Omitting `record_fields` or `completion_fields` marks that contract as
//! unknown, so nothing is forwarded to it. A layer whose record contract
//! cannot take `task_id`, `action_type` and `confidence_pre` is never
//! selected.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use serde_json::{Map, Value};

use crate::decision::{AuditError, DecisionJournal, DecisionRecord};

use super::{completion_parts, ContractSchema, DecisionCapabilities};

/// Manifest file name looked up inside the executive directory.
pub const MANIFEST_FILE: &str = "capabilities.toml";

/// Self-description of an installed executive layer.
#[derive(Debug, Clone, Deserialize)]
pub struct ExecutiveManifest {
    /// Version of the decision contract the layer implements.
    pub contract_version: u32,
    /// Names accepted when constructing a record.
    #[serde(default)]
    pub record_fields: Option<Vec<String>>,
    /// Names accepted when completing a record.
    #[serde(default)]
    pub completion_fields: Option<Vec<String>>,
    /// Whether the layer has a dedicated failure path.
    #[serde(default)]
    pub supports_fail: bool,
    /// Journal location, relative to the executive directory unless absolute.
    pub journal: PathBuf,
    /// The layer's own posterior multiplier for failed outcomes.
    #[serde(default)]
    pub failure_decay: Option<f64>,
    /// Layer-specific time budget in milliseconds; overrides the guardian's.
    /// `0` disables the budget.
    #[serde(default)]
    pub time_budget_ms: Option<u64>,
}

/// Capability backend delegating to an executive layer's declared contract.
#[derive(Debug)]
pub struct ExecutiveBackend {
    manifest: ExecutiveManifest,
    journal: DecisionJournal,
    time_budget: Option<Duration>,
    record_contract: ContractSchema,
    completion_contract: ContractSchema,
}

impl ExecutiveBackend {
    /// Build a backend from a parsed manifest rooted at `dir`.
    pub fn from_manifest(
        dir: &Path,
        manifest: ExecutiveManifest,
        time_budget: Option<Duration>,
    ) -> Self {
        let journal_path = if manifest.journal.is_absolute() {
            manifest.journal.clone()
        } else {
            dir.join(&manifest.journal)
        };
        let time_budget = match manifest.time_budget_ms {
            Some(0) => None,
            Some(ms) => Some(Duration::from_millis(ms)),
            None => time_budget,
        };
        Self {
            record_contract: schema_of(manifest.record_fields.as_deref()),
            completion_contract: schema_of(manifest.completion_fields.as_deref()),
            journal: DecisionJournal::new(journal_path),
            time_budget,
            manifest,
        }
    }

    /// Probe `dir` for a manifest.
    ///
    /// Returns `Ok(None)` when the directory or manifest is absent.
    ///
    /// # Errors
    ///
    /// Returns [`AuditError::Manifest`] when the manifest exists but cannot be
    /// read or parsed.
    pub fn discover(
        dir: &Path,
        time_budget: Option<Duration>,
    ) -> Result<Option<Self>, AuditError> {
        let path = dir.join(MANIFEST_FILE);
        let contents = match std::fs::read_to_string(&path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(AuditError::Manifest(format!(
                    "failed to read {}: {e}",
                    path.display()
                )))
            }
        };
        let manifest: ExecutiveManifest = toml::from_str(&contents).map_err(|e| {
            AuditError::Manifest(format!("failed to parse {}: {e}", path.display()))
        })?;
        Ok(Some(Self::from_manifest(dir, manifest, time_budget)))
    }

    /// Contract version declared by the layer.
    pub fn contract_version(&self) -> u32 {
        self.manifest.contract_version
    }

    /// Apply the layer's own calibration after settlement.
    fn calibrate(&self, record: &mut DecisionRecord, failed: bool) {
        if let Some(decay) = self.manifest.failure_decay {
            let post = if failed {
                record.confidence_pre() * decay
            } else {
                record.confidence_pre()
            };
            record.set_confidence_post(post);
        }
    }
}

fn schema_of(names: Option<&[String]>) -> ContractSchema {
    match names {
        Some(names) => ContractSchema::declared(names.iter().cloned()),
        None => ContractSchema::Unknown,
    }
}

impl DecisionCapabilities for ExecutiveBackend {
    fn name(&self) -> &str {
        "executive"
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
        self.time_budget
    }

    fn complete_record(
        &self,
        record: &mut DecisionRecord,
        params: Map<String, Value>,
    ) -> Result<(), AuditError> {
        let (tier, metadata) = completion_parts(params)?;
        record.complete(tier, metadata)?;
        self.calibrate(record, tier.is_failure());
        Ok(())
    }

    fn fail_record(&self, record: &mut DecisionRecord, error: &str) -> Result<(), AuditError> {
        if !self.manifest.supports_fail {
            return Err(AuditError::Unsupported("fail_record"));
        }
        record.fail(error)?;
        self.calibrate(record, true);
        Ok(())
    }
}
