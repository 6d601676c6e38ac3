//! Receipt model for fees-service.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Payment receipt. The bill number is assigned at creation from the bill
/// sequence and never reassigned; amount/date/comment may be corrected
/// administratively, the invoice linkage may not.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Receipt {
    pub receipt_id: Uuid,
    pub invoice_id: Uuid,
    pub due_id: Option<Uuid>,
    pub bill_no: String,
    pub amount_paid: i64,
    pub date_paid: NaiveDate,
    pub comment: Option<String>,
    pub received_by: Uuid,
    pub created_utc: DateTime<Utc>,
}

/// Input for recording a payment. `due_id` names the due this payment
/// settles; `next_due_date`/`next_due_amount` schedule a follow-up due and
/// must be supplied together.
#[derive(Debug, Clone)]
pub struct RecordPayment {
    pub invoice_id: Uuid,
    pub amount: i64,
    pub date_paid: NaiveDate,
    pub received_by: Uuid,
    pub comment: Option<String>,
    pub due_id: Option<Uuid>,
    pub next_due_date: Option<NaiveDate>,
    pub next_due_amount: Option<i64>,
}

/// Input for administrative receipt correction.
#[derive(Debug, Clone, Default)]
pub struct UpdateReceipt {
    pub amount_paid: Option<i64>,
    pub date_paid: Option<NaiveDate>,
    pub comment: Option<String>,
}
