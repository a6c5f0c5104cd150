//! Decision record: the unit of audit for one gated execution attempt.

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::{Map, Value};
use uuid::Uuid;

use super::tier::ValidationTier;
use super::AuditError;

/// Multiplier applied to `confidence_pre` when an attempt fails.
pub const FAILURE_DECAY: f64 = 0.5;

/// Field names the membrane offers when constructing a record.
pub mod fields {
    /// Unique id of the decision.
    pub const DECISION_ID: &str = "decision_id";
    /// Caller-assigned task id.
    pub const TASK_ID: &str = "task_id";
    /// Execution lane of the task.
    pub const LANE: &str = "lane";
    /// Action type string.
    pub const ACTION_TYPE: &str = "action_type";
    /// Human-readable expected outcome.
    pub const EXPECTED_OUTCOME: &str = "expected_outcome";
    /// Prior confidence in [0, 1].
    pub const CONFIDENCE_PRE: &str = "confidence_pre";
    /// Which gate approved the action.
    pub const POLICY_CHECK: &str = "policy_check";
    /// Action-specific context.
    pub const METADATA: &str = "metadata";
    /// Completion: validation tier.
    pub const VALIDATION_TIER: &str = "validation_tier";
    /// Completion: validator metadata.
    pub const VALIDATOR_METADATA: &str = "validator_metadata";
}

/// Terminal fields the record owns; callers cannot inject them at construction.
const RESERVED: [&str; 5] = [
    "timestamp",
    "result",
    "validation_tier",
    "error",
    "confidence_post",
];

/// Lifecycle of a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordStatus {
    /// Created, not yet settled.
    Pending,
    /// Settled with a validation tier.
    #[serde(rename = "success")]
    Completed,
    /// Settled with an error.
    #[serde(rename = "fail")]
    Failed,
}

impl RecordStatus {
    fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Completed => "success",
            Self::Failed => "fail",
        }
    }
}

/// One gated execution attempt, from intent to outcome.
///
/// Optional attributes are `None` when the installed contract did not accept
/// them and are then omitted from the serialized form. The record moves from
/// [`RecordStatus::Pending`] to a terminal status exactly once.
#[derive(Debug, Clone, Serialize)]
pub struct DecisionRecord {
    #[serde(skip_serializing_if = "Option::is_none")]
    decision_id: Option<Uuid>,
    task_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    lane: Option<String>,
    action_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    expected_outcome: Option<String>,
    confidence_pre: f64,
    confidence_post: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    policy_check: Option<Map<String, Value>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    metadata: Option<Map<String, Value>>,
    result: RecordStatus,
    validation_tier: Option<ValidationTier>,
    error: Option<String>,
    timestamp: DateTime<Utc>,
    #[serde(flatten)]
    extra: Map<String, Value>,
}

impl DecisionRecord {
    /// Build a record from an already-filtered parameter bag.
    ///
    /// `task_id`, `action_type` and `confidence_pre` are required. Keys the
    /// record does not model are kept verbatim; terminal keys are ignored.
    ///
    /// # Errors
    ///
    /// Returns [`AuditError::MissingField`] or [`AuditError::InvalidField`].
    pub fn from_fields(mut params: Map<String, Value>) -> Result<Self, AuditError> {
        for key in RESERVED {
            params.remove(key);
        }

        let task_id = take_string(&mut params, fields::TASK_ID)?
            .ok_or(AuditError::MissingField(fields::TASK_ID))?;
        let action_type = take_string(&mut params, fields::ACTION_TYPE)?
            .ok_or(AuditError::MissingField(fields::ACTION_TYPE))?;
        let confidence_pre = take_confidence(&mut params)?;

        let decision_id = match take_string(&mut params, fields::DECISION_ID)? {
            Some(raw) => Some(Uuid::parse_str(&raw).map_err(|e| AuditError::InvalidField {
                field: fields::DECISION_ID,
                reason: e.to_string(),
            })?),
            None => None,
        };

        Ok(Self {
            decision_id,
            task_id,
            lane: take_string(&mut params, fields::LANE)?,
            action_type,
            expected_outcome: take_string(&mut params, fields::EXPECTED_OUTCOME)?,
            confidence_pre,
            confidence_post: None,
            policy_check: take_object(&mut params, fields::POLICY_CHECK)?,
            metadata: take_object(&mut params, fields::METADATA)?,
            result: RecordStatus::Pending,
            validation_tier: None,
            error: None,
            timestamp: Utc::now(),
            extra: params,
        })
    }

    /// Settle the record with a validation tier.
    ///
    /// Validator metadata is merged over the construction metadata.
    ///
    /// # Errors
    ///
    /// Returns [`AuditError::AlreadySettled`] when the record is terminal; the
    /// record is left unchanged.
    pub fn complete(
        &mut self,
        tier: ValidationTier,
        validator_metadata: Option<Map<String, Value>>,
    ) -> Result<(), AuditError> {
        self.ensure_pending()?;
        self.result = RecordStatus::Completed;
        self.validation_tier = Some(tier);
        self.confidence_post = Some(if tier.is_failure() {
            self.confidence_pre * FAILURE_DECAY
        } else {
            self.confidence_pre
        });
        if let Some(extra) = validator_metadata {
            self.metadata.get_or_insert_with(Map::new).extend(extra);
        }
        Ok(())
    }

    /// Settle the record with an error message.
    ///
    /// # Errors
    ///
    /// Returns [`AuditError::AlreadySettled`] when the record is terminal.
    pub fn fail(&mut self, error: impl Into<String>) -> Result<(), AuditError> {
        self.ensure_pending()?;
        self.result = RecordStatus::Failed;
        self.error = Some(error.into());
        self.confidence_post = Some(self.confidence_pre * FAILURE_DECAY);
        Ok(())
    }

    /// Replace the calibrated posterior with a backend-computed value.
    ///
    /// Only meaningful after settlement; the value is clamped to [0, 1].
    pub fn set_confidence_post(&mut self, value: f64) {
        if self.result != RecordStatus::Pending {
            self.confidence_post = Some(value.clamp(0.0, 1.0));
        }
    }

    /// Canonical dictionary form, as written to the journal.
    ///
    /// # Errors
    ///
    /// Returns [`AuditError::Serialization`] if a metadata value cannot be encoded.
    pub fn to_value(&self) -> Result<Value, AuditError> {
        Ok(serde_json::to_value(self)?)
    }

    fn ensure_pending(&self) -> Result<(), AuditError> {
        if self.result == RecordStatus::Pending {
            Ok(())
        } else {
            Err(AuditError::AlreadySettled(self.result.as_str()))
        }
    }

    /// Unique id, when the contract accepted one.
    pub fn decision_id(&self) -> Option<Uuid> {
        self.decision_id
    }

    /// Caller-assigned task id.
    pub fn task_id(&self) -> &str {
        &self.task_id
    }

    /// Lane, when the contract accepted one.
    pub fn lane(&self) -> Option<&str> {
        self.lane.as_deref()
    }

    /// Action type string.
    pub fn action_type(&self) -> &str {
        &self.action_type
    }

    /// Expected outcome, when the contract accepted one.
    pub fn expected_outcome(&self) -> Option<&str> {
        self.expected_outcome.as_deref()
    }

    /// Prior confidence fixed at creation.
    pub fn confidence_pre(&self) -> f64 {
        self.confidence_pre
    }

    /// Calibrated posterior, once settled.
    pub fn confidence_post(&self) -> Option<f64> {
        self.confidence_post
    }

    /// Policy check map, when the contract accepted one.
    pub fn policy_check(&self) -> Option<&Map<String, Value>> {
        self.policy_check.as_ref()
    }

    /// Action metadata, when present.
    pub fn metadata(&self) -> Option<&Map<String, Value>> {
        self.metadata.as_ref()
    }

    /// Lifecycle status.
    pub fn status(&self) -> RecordStatus {
        self.result
    }

    /// Validation tier, once completed.
    pub fn validation_tier(&self) -> Option<ValidationTier> {
        self.validation_tier
    }

    /// Error message, once failed.
    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    /// Creation time.
    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    /// Accepted fields the record does not model.
    pub fn extra(&self) -> &Map<String, Value> {
        &self.extra
    }
}

fn take_string(
    params: &mut Map<String, Value>,
    field: &'static str,
) -> Result<Option<String>, AuditError> {
    match params.remove(field) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => Ok(Some(s)),
        Some(other) => Err(AuditError::InvalidField {
            field,
            reason: format!("expected string, got {other}"),
        }),
    }
}

fn take_object(
    params: &mut Map<String, Value>,
    field: &'static str,
) -> Result<Option<Map<String, Value>>, AuditError> {
    match params.remove(field) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Object(map)) => Ok(Some(map)),
        Some(other) => Err(AuditError::InvalidField {
            field,
            reason: format!("expected object, got {other}"),
        }),
    }
}

fn take_confidence(params: &mut Map<String, Value>) -> Result<f64, AuditError> {
    let raw = params
        .remove(fields::CONFIDENCE_PRE)
        .ok_or(AuditError::MissingField(fields::CONFIDENCE_PRE))?;
    let value = raw.as_f64().ok_or_else(|| AuditError::InvalidField {
        field: fields::CONFIDENCE_PRE,
        reason: format!("expected number, got {raw}"),
    })?;
    if !(0.0..=1.0).contains(&value) {
        return Err(AuditError::InvalidField {
            field: fields::CONFIDENCE_PRE,
            reason: format!("{value} is outside [0, 1]"),
        });
    }
    Ok(value)
}
