//! Invoice and invoice item models for fees-service.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Invoice row. Totals are never stored; they are recomputed from items and
/// receipts on every read (see [`InvoiceTotals`]).
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Invoice {
    pub invoice_id: Uuid,
    pub student_id: Uuid,
    pub created_utc: DateTime<Utc>,
}

/// Line item on an invoice. Amounts are whole currency units.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct InvoiceItem {
    pub item_id: Uuid,
    pub invoice_id: Uuid,
    pub description: String,
    pub amount: i64,
    pub sort_order: i32,
    pub created_utc: DateTime<Utc>,
}

/// Derived invoice totals, recomputed per call.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct InvoiceTotals {
    pub total_amount_payable: i64,
    pub total_amount_paid: i64,
    pub balance: i64,
}

/// Invoice list row with student context and computed totals.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct InvoiceSummary {
    pub invoice_id: Uuid,
    pub student_id: Uuid,
    pub student_name: String,
    pub total_amount_payable: i64,
    pub total_amount_paid: i64,
    pub balance: i64,
    pub created_utc: DateTime<Utc>,
}

/// Input for creating an invoice with its initial items.
#[derive(Debug, Clone)]
pub struct CreateInvoice {
    pub student_id: Uuid,
    pub items: Vec<CreateInvoiceItem>,
}

/// Input for one invoice item.
#[derive(Debug, Clone)]
pub struct CreateInvoiceItem {
    pub description: String,
    pub amount: i64,
}
