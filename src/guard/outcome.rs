//! Request and result types crossing the membrane.

use serde::Serialize;
use serde_json::{Map, Value};

use crate::decision::ValidationTier;

/// Everything the membrane needs to know about one action, besides the
/// closures that perform and validate it.
#[derive(Debug, Clone)]
pub struct GuardRequest {
    /// Caller-assigned task id.
    pub task_id: String,
    /// Execution lane.
    pub lane: String,
    /// Action type; compared against the allowlist.
    pub action_type: String,
    /// Human-readable expected outcome for the audit record.
    pub expected_outcome: String,
    /// Caller's prior belief the action succeeds, in [0, 1].
    pub confidence_pre: f64,
    /// Action-specific context recorded with the decision.
    pub metadata: Map<String, Value>,
}

impl GuardRequest {
    /// Build a request without metadata.
    pub fn new(
        task_id: impl Into<String>,
        lane: impl Into<String>,
        action_type: impl Into<String>,
        expected_outcome: impl Into<String>,
        confidence_pre: f64,
    ) -> Self {
        Self {
            task_id: task_id.into(),
            lane: lane.into(),
            action_type: action_type.into(),
            expected_outcome: expected_outcome.into(),
            confidence_pre,
            metadata: Map::new(),
        }
    }

    /// Attach one metadata entry.
    #[must_use]
    pub fn with_metadata(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.metadata.insert(key.to_owned(), value.into());
        self
    }
}

/// Tier plus diagnostic metadata produced by a validator.
#[derive(Debug, Clone, PartialEq)]
pub struct Validation {
    /// Outcome classification.
    pub tier: ValidationTier,
    /// Diagnostic context merged into the record's metadata.
    pub metadata: Map<String, Value>,
}

impl Validation {
    /// A validation with no metadata.
    pub fn new(tier: ValidationTier) -> Self {
        Self {
            tier,
            metadata: Map::new(),
        }
    }

    /// `success` when `ok`, otherwise `fail`.
    pub fn from_check(ok: bool) -> Self {
        Self::new(ValidationTier::from_check(ok))
    }

    /// Attach one metadata entry.
    #[must_use]
    pub fn with(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.metadata.insert(key.to_owned(), value.into());
        self
    }
}

/// What happened to the audit trail of one call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum AuditTrail {
    /// The action was not gated; nothing was recorded.
    Bypassed,
    /// One record reached the primary journal.
    Journaled,
    /// The primary journal was unusable; a minimal entry went to the
    /// last-resort path.
    LastResort {
        /// Why the primary path failed.
        reason: String,
    },
    /// Neither path could be written.
    Lost {
        /// Why the primary path failed.
        reason: String,
    },
}

impl AuditTrail {
    /// Whether some entry reached disk.
    pub fn is_recorded(&self) -> bool {
        matches!(self, Self::Journaled | Self::LastResort { .. })
    }
}

/// Result of a guarded call.
///
/// `outcome` is exactly what the wrapped operation (or its validator)
/// produced. Audit degradation never leaks into it; it is reported only
/// through [`audit`](Self::audit).
#[derive(Debug)]
#[must_use]
pub struct Guarded<T, E> {
    pub(crate) outcome: Result<T, E>,
    pub(crate) audit: AuditTrail,
}

impl<T, E> Guarded<T, E> {
    /// The operation's own outcome.
    pub fn outcome(&self) -> &Result<T, E> {
        &self.outcome
    }

    /// What happened to the audit trail.
    pub fn audit(&self) -> &AuditTrail {
        &self.audit
    }

    /// Drop the audit status and return the operation's outcome.
    ///
    /// # Errors
    ///
    /// Returns the wrapped operation's (or validator's) own error unchanged.
    pub fn into_result(self) -> Result<T, E> {
        self.outcome
    }

    /// Split into outcome and audit status.
    pub fn into_parts(self) -> (Result<T, E>, AuditTrail) {
        (self.outcome, self.audit)
    }
}
