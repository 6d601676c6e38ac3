//! Invoice handlers for fees-service.
//!
//! The ledger surface: invoices, their items, and the dues scheduled
//! against them. Totals are always derived, never accepted from clients.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::models::{
    CreateDue, CreateInvoice, CreateInvoiceItem, Due, Invoice, InvoiceItem, InvoiceSummary,
    Receipt,
};
use crate::startup::AppState;
use service_core::error::AppError;

// ============================================================================
// Request/Response DTOs
// ============================================================================

/// One item of an invoice creation request.
#[derive(Debug, Serialize, Deserialize, Validate)]
pub struct InvoiceItemRequest {
    #[validate(length(min = 1, message = "Item description cannot be empty"))]
    pub description: String,
    #[validate(range(min = 0, message = "Item amount must not be negative"))]
    pub amount: i64,
}

/// Request to create an invoice with its initial items.
#[derive(Debug, Deserialize, Validate)]
pub struct CreateInvoiceRequest {
    pub student_id: Uuid,
    #[validate(length(min = 1, message = "An invoice needs at least one item"), nested)]
    pub items: Vec<InvoiceItemRequest>,
}

/// Request to schedule a due manually against an invoice.
#[derive(Debug, Deserialize, Validate)]
pub struct CreateDueRequest {
    #[validate(range(min = 0, message = "Due amount must not be negative"))]
    pub amount: i64,
    pub due_date: NaiveDate,
}

/// Invoice response.
#[derive(Debug, Serialize)]
pub struct InvoiceResponse {
    pub invoice_id: Uuid,
    pub student_id: Uuid,
    pub created_utc: DateTime<Utc>,
}

impl From<Invoice> for InvoiceResponse {
    fn from(invoice: Invoice) -> Self {
        Self {
            invoice_id: invoice.invoice_id,
            student_id: invoice.student_id,
            created_utc: invoice.created_utc,
        }
    }
}

/// Invoice detail: the invoice with its student, items, receipts and
/// derived totals, as rendered by the invoice screen.
#[derive(Debug, Serialize)]
pub struct InvoiceDetailResponse {
    pub invoice_id: Uuid,
    pub student_id: Uuid,
    pub student_name: String,
    pub items: Vec<InvoiceItem>,
    pub receipts: Vec<Receipt>,
    pub total_amount_payable: i64,
    pub total_amount_paid: i64,
    pub balance: i64,
    pub created_utc: DateTime<Utc>,
}

// ============================================================================
// Handlers
// ============================================================================

/// Create an invoice for a student with its initial items.
///
/// POST /invoices
#[tracing::instrument(skip(state, req))]
pub async fn create_invoice(
    State(state): State<AppState>,
    Json(req): Json<CreateInvoiceRequest>,
) -> Result<(StatusCode, Json<InvoiceResponse>), AppError> {
    req.validate()?;

    let invoice = state
        .db
        .create_invoice(&CreateInvoice {
            student_id: req.student_id,
            items: req
                .items
                .into_iter()
                .map(|item| CreateInvoiceItem {
                    description: item.description,
                    amount: item.amount,
                })
                .collect(),
        })
        .await?;

    Ok((StatusCode::CREATED, Json(InvoiceResponse::from(invoice))))
}

/// List invoices with student context and computed totals.
///
/// GET /invoices
pub async fn list_invoices(
    State(state): State<AppState>,
) -> Result<Json<Vec<InvoiceSummary>>, AppError> {
    let invoices = state.db.list_invoices().await?;

    Ok(Json(invoices))
}

/// Invoice detail with items, receipts and totals.
///
/// GET /invoices/:id
pub async fn get_invoice(
    State(state): State<AppState>,
    Path(invoice_id): Path<Uuid>,
) -> Result<Json<InvoiceDetailResponse>, AppError> {
    let invoice = state
        .db
        .get_invoice(invoice_id)
        .await?
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Invoice not found")))?;

    let student = state
        .db
        .get_student(invoice.student_id)
        .await?
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Student not found")))?;

    let items = state.db.get_invoice_items(invoice_id).await?;
    let receipts = state.db.get_receipts_for_invoice(invoice_id).await?;
    let totals = state.db.invoice_totals(invoice_id).await?;

    Ok(Json(InvoiceDetailResponse {
        invoice_id: invoice.invoice_id,
        student_id: invoice.student_id,
        student_name: student.student_name,
        items,
        receipts,
        total_amount_payable: totals.total_amount_payable,
        total_amount_paid: totals.total_amount_paid,
        balance: totals.balance,
        created_utc: invoice.created_utc,
    }))
}

/// Delete an invoice and everything hanging off it.
///
/// DELETE /invoices/:id
#[tracing::instrument(skip(state))]
pub async fn delete_invoice(
    State(state): State<AppState>,
    Path(invoice_id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    let deleted = state.db.delete_invoice(invoice_id).await?;
    if !deleted {
        return Err(AppError::NotFound(anyhow::anyhow!("Invoice not found")));
    }

    Ok(StatusCode::NO_CONTENT)
}

/// Add an item to an invoice.
///
/// POST /invoices/:id/items
#[tracing::instrument(skip(state, req))]
pub async fn add_invoice_item(
    State(state): State<AppState>,
    Path(invoice_id): Path<Uuid>,
    Json(req): Json<InvoiceItemRequest>,
) -> Result<(StatusCode, Json<InvoiceItem>), AppError> {
    req.validate()?;

    let item = state
        .db
        .add_invoice_item(
            invoice_id,
            &CreateInvoiceItem {
                description: req.description,
                amount: req.amount,
            },
        )
        .await?;

    Ok((StatusCode::CREATED, Json(item)))
}

/// Remove an item from an invoice.
///
/// DELETE /invoices/:id/items/:item_id
#[tracing::instrument(skip(state))]
pub async fn remove_invoice_item(
    State(state): State<AppState>,
    Path((invoice_id, item_id)): Path<(Uuid, Uuid)>,
) -> Result<StatusCode, AppError> {
    let removed = state.db.remove_invoice_item(invoice_id, item_id).await?;
    if !removed {
        return Err(AppError::NotFound(anyhow::anyhow!("Item not found")));
    }

    Ok(StatusCode::NO_CONTENT)
}

/// List the dues scheduled against an invoice, earliest first.
///
/// GET /invoices/:id/dues
pub async fn list_invoice_dues(
    State(state): State<AppState>,
    Path(invoice_id): Path<Uuid>,
) -> Result<Json<Vec<Due>>, AppError> {
    state
        .db
        .get_invoice(invoice_id)
        .await?
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Invoice not found")))?;

    let dues = state.db.list_dues_for_invoice(invoice_id).await?;

    Ok(Json(dues))
}

/// Schedule a due manually against an invoice.
///
/// POST /invoices/:id/dues
#[tracing::instrument(skip(state, req))]
pub async fn create_invoice_due(
    State(state): State<AppState>,
    Path(invoice_id): Path<Uuid>,
    Json(req): Json<CreateDueRequest>,
) -> Result<(StatusCode, Json<Due>), AppError> {
    req.validate()?;

    let due = state
        .db
        .create_due(&CreateDue {
            invoice_id,
            amount: req.amount,
            due_date: req.due_date,
        })
        .await?;

    Ok((StatusCode::CREATED, Json(due)))
}
