//! Scoped time budget for one gated execution.
//!
//! A [`BudgetContext`] is entered right before the wrapped operation runs and
//! exited right after, on every path. Elapsed time is only observed at exit
//! and reported as telemetry with graduated warnings; the budget never aborts
//! the operation it bounds.

use std::fmt;
use std::time::{Duration, Instant};

use tracing::{debug, warn};

/// Warning thresholds as percentage of the time budget.
const WARNING_THRESHOLDS: [u8; 3] = [70, 85, 95];

/// Identity of one gated execution.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BudgetScope {
    /// Caller-assigned task id.
    pub task_id: String,
    /// Execution lane.
    pub lane: String,
    /// Action type being bounded.
    pub action_type: String,
}

impl BudgetScope {
    /// Build a scope from borrowed parts.
    pub fn new(task_id: &str, lane: &str, action_type: &str) -> Self {
        Self {
            task_id: task_id.to_owned(),
            lane: lane.to_owned(),
            action_type: action_type.to_owned(),
        }
    }
}

impl fmt::Display for BudgetScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.task_id, self.lane, self.action_type)
    }
}

/// Budget consumption status with graduated warnings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BudgetStatus {
    /// Below all warning thresholds, or no budget configured.
    Ok,
    /// Crossed a warning threshold.
    Warning {
        /// Human-readable warning level description.
        level: &'static str,
        /// Threshold percentage crossed.
        percent: u8,
    },
    /// Ran at or past the full budget.
    Exhausted,
}

/// What the context observed when it was exited.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BudgetReport {
    /// Wall-clock time spent inside the context.
    pub elapsed: Duration,
    /// Status relative to the configured limit.
    pub status: BudgetStatus,
}

/// RAII guard bounding one gated execution.
///
/// Call [`exit`](Self::exit) to obtain the report; dropping an un-exited
/// context (panic or early return) still emits the telemetry.
#[derive(Debug)]
pub struct BudgetContext {
    scope: BudgetScope,
    started: Instant,
    limit: Option<Duration>,
    exited: bool,
}

impl BudgetContext {
    /// Enter a new context for `scope` with an optional time budget.
    pub fn enter(scope: BudgetScope, limit: Option<Duration>) -> Self {
        debug!(scope = %scope, "budget context entered");
        Self {
            scope,
            started: Instant::now(),
            limit,
            exited: false,
        }
    }

    /// Scope this context bounds.
    pub fn scope(&self) -> &BudgetScope {
        &self.scope
    }

    /// Exit the context and report elapsed time.
    pub fn exit(mut self) -> BudgetReport {
        self.finish()
    }

    fn finish(&mut self) -> BudgetReport {
        self.exited = true;
        let elapsed = self.started.elapsed();
        let status = match self.limit {
            Some(limit) => status_for(elapsed, limit),
            None => BudgetStatus::Ok,
        };
        let elapsed_ms = duration_ms(elapsed);
        match &status {
            BudgetStatus::Ok => {
                debug!(scope = %self.scope, elapsed_ms, "budget context exited");
            }
            BudgetStatus::Warning { level, percent } => {
                debug!(
                    scope = %self.scope,
                    elapsed_ms,
                    warning = *level,
                    percent = *percent,
                    "budget threshold crossed"
                );
            }
            BudgetStatus::Exhausted => {
                warn!(
                    scope = %self.scope,
                    elapsed_ms,
                    limit_ms = self.limit.map(duration_ms),
                    "time budget exceeded"
                );
            }
        }
        BudgetReport { elapsed, status }
    }
}

impl Drop for BudgetContext {
    fn drop(&mut self) {
        if !self.exited {
            self.finish();
        }
    }
}

fn duration_ms(d: Duration) -> u64 {
    u64::try_from(d.as_millis()).unwrap_or(u64::MAX)
}

/// Classify elapsed time against a limit.
fn status_for(elapsed: Duration, limit: Duration) -> BudgetStatus {
    let pct = percent_of(duration_ms(elapsed), duration_ms(limit));
    if pct >= 100 {
        return BudgetStatus::Exhausted;
    }
    match highest_warning(pct) {
        Some(threshold) => warning_status(threshold),
        None => BudgetStatus::Ok,
    }
}

/// Compute usage percentage, clamped to 0–100.
fn percent_of(used: u64, limit: u64) -> u8 {
    if limit == 0 {
        return 100;
    }
    #[allow(clippy::cast_possible_truncation, clippy::arithmetic_side_effects)]
    {
        (used.saturating_mul(100) / limit).min(100) as u8
    }
}

/// Return the highest warning threshold that `pct` has crossed, if any.
fn highest_warning(pct: u8) -> Option<u8> {
    WARNING_THRESHOLDS
        .iter()
        .rev()
        .find(|&&threshold| pct >= threshold)
        .copied()
}

/// Build a `BudgetStatus::Warning` from a threshold percentage.
fn warning_status(threshold: u8) -> BudgetStatus {
    let level = match threshold {
        95 => "critical",
        85 => "high",
        70 => "elevated",
        _ => "warning",
    };
    BudgetStatus::Warning {
        level,
        percent: threshold,
    }
}
