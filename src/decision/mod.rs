//! Decision model: outcome tiers, records, and the append-only journal.

pub mod journal;
pub mod record;
pub mod tier;

pub use journal::{DecisionJournal, LastResortEntry};
pub use record::{DecisionRecord, RecordStatus};
pub use tier::ValidationTier;

/// Errors produced by the audit side of a gated call.
///
/// None of these ever reach the caller of a wrapped operation; the membrane
/// contains them and degrades to the last-resort path.
#[derive(Debug, thiserror::Error)]
pub enum AuditError {
    /// A required record field was not supplied or was filtered out.
    #[error("missing record field: {0}")]
    MissingField(&'static str),

    /// A record field had the wrong shape or range.
    #[error("invalid record field {field}: {reason}")]
    InvalidField {
        /// Field name.
        field: &'static str,
        /// What was wrong with it.
        reason: String,
    },

    /// The record already reached a terminal state.
    #[error("decision record already {0}")]
    AlreadySettled(&'static str),

    /// The installed backend does not offer this capability.
    #[error("capability not supported by backend: {0}")]
    Unsupported(&'static str),

    /// The installed backend's manifest could not be used.
    #[error("capability manifest error: {0}")]
    Manifest(String),

    /// Filesystem failure while journaling.
    #[error("journal I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Record could not be encoded.
    #[error("journal serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
