//! Outcome tiers assigned after a gated action has run.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Closed vocabulary for classifying the real-world effect of an action.
///
/// The tier only affects the audit record. It never changes what the caller
/// gets back from the membrane.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValidationTier {
    /// The expected effect is observable.
    Success,
    /// The effect is partially observable or degraded but tolerable.
    #[serde(alias = "warning")]
    Acceptable,
    /// The expected effect is missing.
    Fail,
}

impl ValidationTier {
    /// Every tier, in severity order.
    pub const ALL: [ValidationTier; 3] = [Self::Success, Self::Acceptable, Self::Fail];

    /// Stable wire label.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Acceptable => "acceptable",
            Self::Fail => "fail",
        }
    }

    /// Whether the tier counts as a failed outcome for calibration.
    pub fn is_failure(self) -> bool {
        matches!(self, Self::Fail)
    }

    /// `Success` when `ok`, otherwise `Fail`.
    pub fn from_check(ok: bool) -> Self {
        if ok {
            Self::Success
        } else {
            Self::Fail
        }
    }
}

impl fmt::Display for ValidationTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error for tier labels outside the vocabulary.
#[derive(Debug, thiserror::Error)]
#[error("unknown validation tier: {0}")]
pub struct UnknownTier(pub String);

impl FromStr for ValidationTier {
    type Err = UnknownTier;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "success" => Ok(Self::Success),
            "acceptable" | "warning" => Ok(Self::Acceptable),
            "fail" => Ok(Self::Fail),
            other => Err(UnknownTier(other.to_owned())),
        }
    }
}
