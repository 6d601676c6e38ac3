//! Staff directory handlers for fees-service.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::models::{CreateStaff, Staff, StaffRole};
use crate::startup::AppState;
use service_core::error::AppError;

// ============================================================================
// Request/Response DTOs
// ============================================================================

/// Request to register a staff member.
#[derive(Debug, Deserialize, Validate)]
pub struct CreateStaffRequest {
    #[validate(length(min = 1, message = "Staff name cannot be empty"))]
    pub staff_name: String,
    pub role: StaffRole,
}

/// Staff response.
#[derive(Debug, Serialize)]
pub struct StaffResponse {
    pub staff_id: Uuid,
    pub staff_name: String,
    pub role: String,
    pub can_receive_payments: bool,
    pub created_utc: DateTime<Utc>,
}

impl From<Staff> for StaffResponse {
    fn from(staff: Staff) -> Self {
        let can_receive_payments = staff.role().can_receive_payments();
        Self {
            staff_id: staff.staff_id,
            staff_name: staff.staff_name,
            role: staff.role,
            can_receive_payments,
            created_utc: staff.created_utc,
        }
    }
}

// ============================================================================
// Handlers
// ============================================================================

/// Register a staff member.
///
/// POST /staff
#[tracing::instrument(skip(state, req))]
pub async fn create_staff(
    State(state): State<AppState>,
    Json(req): Json<CreateStaffRequest>,
) -> Result<(StatusCode, Json<StaffResponse>), AppError> {
    req.validate()?;

    let staff = state
        .db
        .create_staff(&CreateStaff {
            staff_name: req.staff_name,
            role: req.role,
        })
        .await?;

    Ok((StatusCode::CREATED, Json(StaffResponse::from(staff))))
}

/// Look up a staff member.
///
/// GET /staff/:id
pub async fn get_staff(
    State(state): State<AppState>,
    Path(staff_id): Path<Uuid>,
) -> Result<Json<StaffResponse>, AppError> {
    let staff = state
        .db
        .get_staff(staff_id)
        .await?
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Staff not found")))?;

    Ok(Json(StaffResponse::from(staff)))
}
