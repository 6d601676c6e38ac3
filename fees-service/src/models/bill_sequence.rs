//! Bill sequence model for fees-service.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// The bill sequence singleton: prefix plus the last issued counter value.
/// Receipt creation increments `last_bill` atomically and renders the
/// human-facing number from the post-increment state.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct BillSequence {
    pub prefix: String,
    pub last_bill: i64,
}

impl BillSequence {
    /// Human-facing bill number for the current counter value,
    /// e.g. `BILL-0042`.
    pub fn bill_number(&self) -> String {
        format!("{}{:04}", self.prefix, self.last_bill)
    }
}

/// Input for the administrative sequence override.
#[derive(Debug, Clone, Default)]
pub struct SetBillSequence {
    pub prefix: Option<String>,
    pub last_bill: Option<i64>,
}
