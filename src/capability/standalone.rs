//! Self-contained backend used when no executive layer is installed.

use std::time::Duration;

use crate::decision::record::fields;
use crate::decision::{AuditError, DecisionJournal, DecisionRecord};

use super::{ContractSchema, DecisionCapabilities};

/// Full-schema backend journaling to a local JSONL file.
#[derive(Debug)]
pub struct StandaloneBackend {
    journal: DecisionJournal,
    time_budget: Option<Duration>,
    record_contract: ContractSchema,
    completion_contract: ContractSchema,
}

impl StandaloneBackend {
    /// Create a backend appending to `journal`.
    pub fn new(journal: DecisionJournal, time_budget: Option<Duration>) -> Self {
        Self {
            journal,
            time_budget,
            record_contract: ContractSchema::declared([
                fields::DECISION_ID,
                fields::TASK_ID,
                fields::LANE,
                fields::ACTION_TYPE,
                fields::EXPECTED_OUTCOME,
                fields::CONFIDENCE_PRE,
                fields::POLICY_CHECK,
                fields::METADATA,
            ]),
            completion_contract: ContractSchema::declared([
                fields::VALIDATION_TIER,
                fields::VALIDATOR_METADATA,
            ]),
        }
    }
}

impl DecisionCapabilities for StandaloneBackend {
    fn name(&self) -> &str {
        "standalone"
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

    fn fail_record(&self, record: &mut DecisionRecord, error: &str) -> Result<(), AuditError> {
        record.fail(error)
    }
}
