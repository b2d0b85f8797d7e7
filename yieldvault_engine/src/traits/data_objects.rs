use serde::{Deserialize, Serialize};

use crate::db_types::{Position, WithdrawalRequest};

/// Outcome of one valuation-scheduler run. Failed items are isolated per position; one bad record
/// never aborts the batch.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RevaluationSummary {
    /// Positions whose current value was advanced this run.
    pub advanced: Vec<i64>,
    /// Positions that reached maturity and were settled.
    pub matured: Vec<i64>,
    /// Fresh positions created by auto-reinvesting matured ones.
    pub reinvested: Vec<i64>,
    /// Position id and error message for items that failed this run.
    pub failed: Vec<(i64, String)>,
}

impl RevaluationSummary {
    pub fn total_processed(&self) -> usize {
        self.advanced.len() + self.failed.len()
    }
}

/// The result of a successful withdrawal request: the position (now `Withdrawn`) and the open
/// request that was created for it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WithdrawalOutcome {
    pub position: Position,
    pub request: WithdrawalRequest,
}
