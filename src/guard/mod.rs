//! The guard membrane.
//!
//! [`Guardian::exec_with_guard`] decides whether an action is gated and, if
//! so, sequences budget → perform → validate → journal. The wrapped
//! operation always runs and its own outcome is always returned unchanged;
//! the only new failure mode is an incomplete audit trail, which is logged
//! and reported through [`AuditTrail`] but never escalated.

use std::collections::BTreeSet;
use std::fmt::Display;
use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;
use serde_json::{json, Map, Value};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::budget::BudgetScope;
use crate::capability::{adapt, select_backend, DecisionCapabilities};
use crate::config::GuardianConfig;
use crate::decision::journal::write_last_resort;
use crate::decision::record::fields;
use crate::decision::{AuditError, DecisionRecord, LastResortEntry, ValidationTier};

mod outcome;

pub use outcome::{AuditTrail, GuardRequest, Guarded, Validation};

/// Gate name written into every record's `policy_check`.
pub const POLICY_GATE: &str = "executive_guardian";

/// How a gated call ended, as far as the audit record is concerned.
#[derive(Debug)]
enum Settlement {
    Completed {
        tier: ValidationTier,
        metadata: Map<String, Value>,
    },
    Failed(String),
}

/// Explicitly constructed membrane configuration.
///
/// Holds the feature flag, the allowlist, and the capability backend chosen
/// at startup. Read-only after construction, so one instance can be shared
/// across tasks.
#[derive(Debug, Clone)]
pub struct Guardian {
    enabled: bool,
    allowlist: BTreeSet<String>,
    backend: Arc<dyn DecisionCapabilities>,
    last_resort: PathBuf,
}

impl Guardian {
    /// Build a membrane around an explicit backend.
    pub fn new(config: &GuardianConfig, backend: Arc<dyn DecisionCapabilities>) -> Self {
        Self {
            enabled: config.enabled,
            allowlist: config.allowlist.iter().cloned().collect(),
            backend,
            last_resort: config.paths.last_resort.clone(),
        }
    }

    /// Build a membrane, selecting the backend from `config`.
    pub fn from_config(config: &GuardianConfig) -> Self {
        Self::new(config, select_backend(config))
    }

    /// Whether `action_type` would be gated.
    pub fn is_gated(&self, action_type: &str) -> bool {
        self.enabled && self.allowlist.contains(action_type)
    }

    /// Installed capability backend.
    pub fn backend(&self) -> &dyn DecisionCapabilities {
        self.backend.as_ref()
    }

    /// Run `perform` under the guard.
    ///
    /// Ungated actions call `perform` directly. Gated actions get a decision
    /// record, a budget context around `perform`, validation of the result,
    /// and exactly one journal append (or one last-resort write).
    /// `validate` runs only when `perform` succeeded; its error is treated
    /// like a failure of the operation itself.
    pub async fn exec_with_guard<T, E, P, Fut, V>(
        &self,
        request: GuardRequest,
        perform: P,
        validate: V,
    ) -> Guarded<T, E>
    where
        P: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        V: FnOnce(&T) -> Result<Validation, E>,
        E: Display,
    {
        if !self.is_gated(&request.action_type) {
            return Guarded {
                outcome: perform().await,
                audit: AuditTrail::Bypassed,
            };
        }

        let backend = self.backend();
        let record = backend.construct_record(adapt(
            backend.record_contract(),
            record_candidates(&request),
        ));
        if let Err(e) = &record {
            warn!(
                task_id = %request.task_id,
                action_type = %request.action_type,
                error = %e,
                "decision record construction failed"
            );
        }

        let budget = backend.enter_budget(BudgetScope::new(
            &request.task_id,
            &request.lane,
            &request.action_type,
        ));
        let performed = perform().await;
        budget.exit();

        let (outcome, settlement) = match performed {
            Ok(value) => match validate(&value) {
                Ok(validation) => (
                    Ok(value),
                    Settlement::Completed {
                        tier: validation.tier,
                        metadata: validation.metadata,
                    },
                ),
                Err(e) => {
                    let message = e.to_string();
                    (Err(e), Settlement::Failed(message))
                }
            },
            Err(e) => {
                let message = e.to_string();
                (Err(e), Settlement::Failed(message))
            }
        };

        let audit = self.record_outcome(record, &request, &settlement);
        Guarded { outcome, audit }
    }

    /// Settle and append the record, falling back to the last-resort path.
    fn record_outcome(
        &self,
        record: Result<DecisionRecord, AuditError>,
        request: &GuardRequest,
        settlement: &Settlement,
    ) -> AuditTrail {
        let primary = record.and_then(|mut record| {
            self.settle(&mut record, settlement)?;
            self.backend.append(&record)
        });
        match primary {
            Ok(()) => {
                debug!(
                    task_id = %request.task_id,
                    action_type = %request.action_type,
                    "gated decision journaled"
                );
                AuditTrail::Journaled
            }
            Err(e) => {
                warn!(
                    task_id = %request.task_id,
                    action_type = %request.action_type,
                    error = %e,
                    "decision journal unavailable, using last-resort path"
                );
                self.write_last_resort(request, settlement, e.to_string())
            }
        }
    }

    /// Move the record to its terminal state through the backend.
    fn settle(
        &self,
        record: &mut DecisionRecord,
        settlement: &Settlement,
    ) -> Result<(), AuditError> {
        match settlement {
            Settlement::Completed { tier, metadata } => {
                self.complete_through_contract(record, *tier, metadata.clone())
            }
            Settlement::Failed(message) => match self.backend.fail_record(record, message) {
                Err(AuditError::Unsupported(_)) => {
                    // Without a failure path the error must ride in validator
                    // metadata; a contract that drops it cannot hold the error.
                    if !self
                        .backend
                        .completion_contract()
                        .accepts(fields::VALIDATOR_METADATA)
                    {
                        return Err(AuditError::Unsupported("error field on completion"));
                    }
                    let mut metadata = Map::new();
                    metadata.insert("error".to_owned(), Value::String(message.clone()));
                    self.complete_through_contract(record, ValidationTier::Fail, metadata)
                }
                other => other,
            },
        }
    }

    fn complete_through_contract(
        &self,
        record: &mut DecisionRecord,
        tier: ValidationTier,
        metadata: Map<String, Value>,
    ) -> Result<(), AuditError> {
        let mut candidates = Map::new();
        candidates.insert(
            fields::VALIDATION_TIER.to_owned(),
            Value::String(tier.as_str().to_owned()),
        );
        candidates.insert(fields::VALIDATOR_METADATA.to_owned(), Value::Object(metadata));
        self.backend.complete_record(
            record,
            adapt(self.backend.completion_contract(), candidates),
        )
    }

    fn write_last_resort(
        &self,
        request: &GuardRequest,
        settlement: &Settlement,
        reason: String,
    ) -> AuditTrail {
        let (validation_tier, error) = match settlement {
            Settlement::Completed { tier, .. } => (Some(*tier), None),
            Settlement::Failed(message) => (None, Some(message.clone())),
        };
        let entry = LastResortEntry {
            task_id: request.task_id.clone(),
            lane: request.lane.clone(),
            action_type: request.action_type.clone(),
            expected_outcome: request.expected_outcome.clone(),
            confidence_pre: request.confidence_pre,
            validation_tier,
            error,
            audit_error: reason.clone(),
            timestamp: Utc::now(),
        };
        if write_last_resort(&self.last_resort, &entry) {
            AuditTrail::LastResort { reason }
        } else {
            AuditTrail::Lost { reason }
        }
    }

    /// Snapshot of the membrane's configuration and journal.
    pub fn status(&self) -> GuardianStatus {
        let journal = self.backend.journal();
        let journal_entries = match journal.count() {
            Ok(count) => Some(count),
            Err(e) => {
                debug!(error = %e, "journal unreadable for status");
                None
            }
        };
        GuardianStatus {
            version: env!("CARGO_PKG_VERSION"),
            enabled: self.enabled,
            backend: self.backend.name().to_owned(),
            allowlist: self.allowlist.iter().cloned().collect(),
            journal_path: journal.path().to_path_buf(),
            last_resort_path: self.last_resort.clone(),
            journal_entries,
        }
    }
}

/// Everything the membrane offers at record construction.
fn record_candidates(request: &GuardRequest) -> Map<String, Value> {
    let mut candidates = Map::new();
    candidates.insert(
        fields::DECISION_ID.to_owned(),
        Value::String(Uuid::new_v4().to_string()),
    );
    candidates.insert(fields::TASK_ID.to_owned(), json!(request.task_id));
    candidates.insert(fields::LANE.to_owned(), json!(request.lane));
    candidates.insert(fields::ACTION_TYPE.to_owned(), json!(request.action_type));
    candidates.insert(
        fields::EXPECTED_OUTCOME.to_owned(),
        json!(request.expected_outcome),
    );
    candidates.insert(fields::CONFIDENCE_PRE.to_owned(), json!(request.confidence_pre));
    let mut policy_check = Map::new();
    policy_check.insert(POLICY_GATE.to_owned(), Value::String("pass".to_owned()));
    candidates.insert(fields::POLICY_CHECK.to_owned(), Value::Object(policy_check));
    candidates.insert(
        fields::METADATA.to_owned(),
        Value::Object(request.metadata.clone()),
    );
    candidates
}

/// Membrane status as reported to front ends.
#[derive(Debug, Clone, Serialize)]
pub struct GuardianStatus {
    /// Crate version.
    pub version: &'static str,
    /// Whether gating is on.
    pub enabled: bool,
    /// Installed backend name.
    pub backend: String,
    /// Gated action types.
    pub allowlist: Vec<String>,
    /// Primary journal location.
    pub journal_path: PathBuf,
    /// Last-resort location.
    pub last_resort_path: PathBuf,
    /// Entries currently in the journal, when readable.
    pub journal_entries: Option<usize>,
}
