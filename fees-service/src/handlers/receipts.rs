//! Receipt handlers for fees-service.
//!
//! Recording a payment is the one compound financial mutation in the
//! system; everything it touches (bill number, receipt, settled due,
//! follow-up due) commits or rolls back together.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::models::{Receipt, RecordPayment, UpdateReceipt};
use crate::startup::AppState;
use service_core::error::AppError;

// ============================================================================
// Request/Response DTOs
// ============================================================================

/// Request to record a payment against an invoice. `due_id` names the due
/// this payment settles; `next_due_date`/`next_due_amount` schedule a
/// follow-up due and must be supplied together.
#[derive(Debug, Deserialize, Validate)]
pub struct RecordPaymentRequest {
    pub invoice_id: Uuid,
    #[validate(range(min = 1, message = "Payment amount must be positive"))]
    pub amount: i64,
    pub date_paid: NaiveDate,
    pub received_by: Uuid,
    pub comment: Option<String>,
    pub due_id: Option<Uuid>,
    pub next_due_date: Option<NaiveDate>,
    #[validate(range(min = 0, message = "Next due amount must not be negative"))]
    pub next_due_amount: Option<i64>,
}

/// Request to correct a receipt. The bill number and invoice linkage are
/// frozen at creation.
#[derive(Debug, Deserialize, Validate)]
pub struct UpdateReceiptRequest {
    #[validate(range(min = 1, message = "Corrected amount must be positive"))]
    pub amount_paid: Option<i64>,
    pub date_paid: Option<NaiveDate>,
    pub comment: Option<String>,
}

/// Receipt response.
#[derive(Debug, Serialize)]
pub struct ReceiptResponse {
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

impl From<Receipt> for ReceiptResponse {
    fn from(receipt: Receipt) -> Self {
        Self {
            receipt_id: receipt.receipt_id,
            invoice_id: receipt.invoice_id,
            due_id: receipt.due_id,
            bill_no: receipt.bill_no,
            amount_paid: receipt.amount_paid,
            date_paid: receipt.date_paid,
            comment: receipt.comment,
            received_by: receipt.received_by,
            created_utc: receipt.created_utc,
        }
    }
}

// ============================================================================
// Handlers
// ============================================================================

/// Record a payment.
///
/// POST /receipts
#[tracing::instrument(skip(state, req))]
pub async fn record_payment(
    State(state): State<AppState>,
    Json(req): Json<RecordPaymentRequest>,
) -> Result<(StatusCode, Json<ReceiptResponse>), AppError> {
    req.validate()?;

    let receipt = state
        .db
        .record_payment(&RecordPayment {
            invoice_id: req.invoice_id,
            amount: req.amount,
            date_paid: req.date_paid,
            received_by: req.received_by,
            comment: req.comment,
            due_id: req.due_id,
            next_due_date: req.next_due_date,
            next_due_amount: req.next_due_amount,
        })
        .await?;

    Ok((StatusCode::CREATED, Json(ReceiptResponse::from(receipt))))
}

/// Look up a receipt.
///
/// GET /receipts/:id
pub async fn get_receipt(
    State(state): State<AppState>,
    Path(receipt_id): Path<Uuid>,
) -> Result<Json<ReceiptResponse>, AppError> {
    let receipt = state
        .db
        .get_receipt(receipt_id)
        .await?
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Receipt not found")))?;

    Ok(Json(ReceiptResponse::from(receipt)))
}

/// Correct a receipt administratively.
///
/// PUT /receipts/:id
#[tracing::instrument(skip(state, req))]
pub async fn update_receipt(
    State(state): State<AppState>,
    Path(receipt_id): Path<Uuid>,
    Json(req): Json<UpdateReceiptRequest>,
) -> Result<Json<ReceiptResponse>, AppError> {
    req.validate()?;

    let receipt = state
        .db
        .update_receipt(
            receipt_id,
            &UpdateReceipt {
                amount_paid: req.amount_paid,
                date_paid: req.date_paid,
                comment: req.comment,
            },
        )
        .await?
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Receipt not found")))?;

    Ok(Json(ReceiptResponse::from(receipt)))
}
