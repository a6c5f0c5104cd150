//! Versioned decision-tracking capabilities.
//!
//! The membrane needs five things from a decision-tracking subsystem:
//! construct a record, complete it, fail it, append it to a journal, and
//! bound the execution with a budget. [`DecisionCapabilities`] captures that
//! contract. Two variants exist: the self-contained [`StandaloneBackend`] and
//! the [`ExecutiveBackend`] for an installed executive layer whose schema is
//! declared in a manifest. The variant is chosen once, at startup, by
//! [`select_backend`].

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use serde_json::{Map, Value};
use tracing::{debug, info, warn};

use crate::budget::{BudgetContext, BudgetScope};
use crate::config::GuardianConfig;
use crate::decision::record::fields;
use crate::decision::{AuditError, DecisionJournal, DecisionRecord, ValidationTier};

pub mod adapter;
pub mod executive;
pub mod standalone;

pub use adapter::{adapt, ContractSchema};
pub use executive::{ExecutiveBackend, ExecutiveManifest};
pub use standalone::StandaloneBackend;

/// Contract the membrane consumes from a decision-tracking subsystem.
///
/// Parameter bags handed to [`construct_record`](Self::construct_record) and
/// [`complete_record`](Self::complete_record) have already been filtered
/// through [`adapt`] against the matching contract schema.
pub trait DecisionCapabilities: Send + Sync + fmt::Debug {
    /// Short backend name for status output.
    fn name(&self) -> &str;

    /// Names accepted at record construction.
    fn record_contract(&self) -> &ContractSchema;

    /// Names accepted at record completion.
    fn completion_contract(&self) -> &ContractSchema;

    /// Journal this backend appends to.
    fn journal(&self) -> &DecisionJournal;

    /// Time budget applied to each gated execution.
    fn time_budget(&self) -> Option<Duration>;

    /// Build a pending record.
    ///
    /// # Errors
    ///
    /// Returns an [`AuditError`] when required fields are missing or invalid.
    fn construct_record(&self, params: Map<String, Value>) -> Result<DecisionRecord, AuditError> {
        DecisionRecord::from_fields(params)
    }

    /// Settle a record with the tier and metadata in `params`.
    ///
    /// # Errors
    ///
    /// Returns an [`AuditError`] when the tier is missing or the record is
    /// already settled.
    fn complete_record(
        &self,
        record: &mut DecisionRecord,
        params: Map<String, Value>,
    ) -> Result<(), AuditError> {
        let (tier, metadata) = completion_parts(params)?;
        record.complete(tier, metadata)
    }

    /// Settle a record with an error.
    ///
    /// Backends without a failure path keep the default, which reports
    /// [`AuditError::Unsupported`]; the membrane then completes the record
    /// with a `fail` tier instead.
    ///
    /// # Errors
    ///
    /// Returns an [`AuditError`] when unsupported or already settled.
    fn fail_record(&self, _record: &mut DecisionRecord, _error: &str) -> Result<(), AuditError> {
        Err(AuditError::Unsupported("fail_record"))
    }

    /// Append a settled record to the journal.
    ///
    /// # Errors
    ///
    /// Returns an [`AuditError`] when the journal cannot be written.
    fn append(&self, record: &DecisionRecord) -> Result<(), AuditError> {
        self.journal().log(record)
    }

    /// Enter a budget context for one execution.
    fn enter_budget(&self, scope: BudgetScope) -> BudgetContext {
        BudgetContext::enter(scope, self.time_budget())
    }
}

/// Split a filtered completion bag into tier and validator metadata.
///
/// # Errors
///
/// Returns [`AuditError::MissingField`] when the contract dropped the tier.
pub fn completion_parts(
    mut params: Map<String, Value>,
) -> Result<(ValidationTier, Option<Map<String, Value>>), AuditError> {
    let tier = match params.remove(fields::VALIDATION_TIER) {
        Some(Value::String(label)) => {
            label
                .parse::<ValidationTier>()
                .map_err(|e| AuditError::InvalidField {
                    field: fields::VALIDATION_TIER,
                    reason: e.to_string(),
                })?
        }
        Some(other) => {
            return Err(AuditError::InvalidField {
                field: fields::VALIDATION_TIER,
                reason: format!("expected string, got {other}"),
            })
        }
        None => return Err(AuditError::MissingField(fields::VALIDATION_TIER)),
    };
    let metadata = match params.remove(fields::VALIDATOR_METADATA) {
        Some(Value::Object(map)) => Some(map),
        _ => None,
    };
    Ok((tier, metadata))
}

/// Fields a record cannot be built without.
const REQUIRED_RECORD_FIELDS: [&str; 3] =
    [fields::TASK_ID, fields::ACTION_TYPE, fields::CONFIDENCE_PRE];

/// Whether `contract` lets every required record field through.
fn can_construct(contract: &ContractSchema) -> bool {
    REQUIRED_RECORD_FIELDS
        .iter()
        .all(|name| contract.accepts(name))
}

/// Choose the capability backend once, at startup.
///
/// An executive layer is used when `paths.executive_dir` holds a readable
/// manifest whose record contract accepts the required fields; anything
/// else falls back to the standalone backend.
pub fn select_backend(config: &GuardianConfig) -> Arc<dyn DecisionCapabilities> {
    if let Some(dir) = &config.paths.executive_dir {
        match ExecutiveBackend::discover(dir, config.budget_limit()) {
            Ok(Some(backend)) if !can_construct(backend.record_contract()) => warn!(
                dir = %dir.display(),
                required = ?REQUIRED_RECORD_FIELDS,
                "executive layer cannot accept required record fields, falling back to standalone"
            ),
            Ok(Some(backend)) => {
                info!(
                    dir = %dir.display(),
                    contract_version = backend.contract_version(),
                    "using executive layer"
                );
                return Arc::new(backend);
            }
            Ok(None) => debug!(dir = %dir.display(), "no executive layer installed"),
            Err(e) => warn!(
                dir = %dir.display(),
                error = %e,
                "executive layer unusable, falling back to standalone"
            ),
        }
    }
    Arc::new(StandaloneBackend::new(
        DecisionJournal::new(&config.paths.journal),
        config.budget_limit(),
    ))
}
