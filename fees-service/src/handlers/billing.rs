//! Bill sequence admin handlers for fees-service.
//!
//! The override exists so a fresh deployment can pick up where a paper
//! ledger (or a previous system) left off.

use axum::{extract::State, Json};
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::models::{BillSequence, SetBillSequence};
use crate::startup::AppState;
use service_core::error::AppError;

// ============================================================================
// Request/Response DTOs
// ============================================================================

/// Request to override the bill sequence. Partial: absent fields keep
/// their current value.
#[derive(Debug, Deserialize, Validate)]
pub struct SetBillSequenceRequest {
    #[validate(length(min = 1, message = "Prefix cannot be empty"))]
    pub prefix: Option<String>,
    #[validate(range(min = 0, message = "Sequence counter must not be negative"))]
    pub last_bill: Option<i64>,
}

/// Bill sequence response.
#[derive(Debug, Serialize)]
pub struct BillSequenceResponse {
    pub prefix: String,
    pub last_bill: i64,
    pub next_bill_no: String,
}

impl From<BillSequence> for BillSequenceResponse {
    fn from(sequence: BillSequence) -> Self {
        let next_bill_no = BillSequence {
            prefix: sequence.prefix.clone(),
            last_bill: sequence.last_bill + 1,
        }
        .bill_number();
        Self {
            prefix: sequence.prefix,
            last_bill: sequence.last_bill,
            next_bill_no,
        }
    }
}

// ============================================================================
// Handlers
// ============================================================================

/// Read the bill sequence state.
///
/// GET /billing/sequence
pub async fn get_bill_sequence(
    State(state): State<AppState>,
) -> Result<Json<BillSequenceResponse>, AppError> {
    let sequence = state.db.bill_sequence_state().await?;

    Ok(Json(BillSequenceResponse::from(sequence)))
}

/// Override the bill sequence.
///
/// PUT /billing/sequence
#[tracing::instrument(skip(state, req))]
pub async fn set_bill_sequence(
    State(state): State<AppState>,
    Json(req): Json<SetBillSequenceRequest>,
) -> Result<Json<BillSequenceResponse>, AppError> {
    req.validate()?;

    let sequence = state
        .db
        .set_bill_sequence(&SetBillSequence {
            prefix: req.prefix,
            last_bill: req.last_bill,
        })
        .await?;

    Ok(Json(BillSequenceResponse::from(sequence)))
}
