//! Schema filter between the membrane and an installed contract.

use std::collections::BTreeSet;

use serde_json::{Map, Value};
use tracing::trace;

/// Parameter names a contract declares, or `Unknown` when they could not be
/// determined.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContractSchema {
    /// The contract accepts exactly these names.
    Declared(BTreeSet<String>),
    /// The contract's shape is unknown; nothing is forwarded.
    Unknown,
}

impl ContractSchema {
    /// Build a declared schema from names.
    pub fn declared<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::Declared(names.into_iter().map(Into::into).collect())
    }

    /// Whether `name` is accepted.
    pub fn accepts(&self, name: &str) -> bool {
        match self {
            Self::Declared(names) => names.contains(name),
            Self::Unknown => false,
        }
    }
}

/// Keep only the candidate parameters the contract accepts.
///
/// An unknown contract yields an empty map: under-supplying optional fields
/// is preferred to handing an unknown version something it may reject.
pub fn adapt(contract: &ContractSchema, candidates: Map<String, Value>) -> Map<String, Value> {
    match contract {
        ContractSchema::Unknown => {
            trace!(dropped = candidates.len(), "contract unknown; forwarding nothing");
            Map::new()
        }
        ContractSchema::Declared(names) => candidates
            .into_iter()
            .filter(|(key, _)| {
                let keep = names.contains(key);
                if !keep {
                    trace!(field = %key, "dropping field unsupported by contract");
                }
                keep
            })
            .collect(),
    }
}
