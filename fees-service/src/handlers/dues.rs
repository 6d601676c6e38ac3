//! Due handlers for fees-service.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use chrono::NaiveDate;
use serde::Deserialize;
use uuid::Uuid;
use validator::Validate;

use crate::models::{Due, DueListEntry, DueStatus, ListDuesFilter, UpdateDue};
use crate::startup::AppState;
use service_core::error::AppError;

// ============================================================================
// Request/Response DTOs
// ============================================================================

/// Query parameters for the dues list screen.
#[derive(Debug, Deserialize)]
pub struct ListDuesParams {
    pub student_name: Option<String>,
}

/// Request to push a due's date forward.
#[derive(Debug, Deserialize)]
pub struct ExtendDueRequest {
    pub new_due_date: NaiveDate,
}

/// Request to edit a due from the admin screen.
#[derive(Debug, Deserialize, Validate)]
pub struct UpdateDueRequest {
    pub status: Option<DueStatus>,
    #[validate(range(min = 0, message = "Due amount must not be negative"))]
    pub amount: Option<i64>,
    pub due_date: Option<NaiveDate>,
}

// ============================================================================
// Handlers
// ============================================================================

/// List dues across invoices, optionally filtered by student name.
///
/// GET /dues?student_name=
pub async fn list_dues(
    State(state): State<AppState>,
    Query(params): Query<ListDuesParams>,
) -> Result<Json<Vec<DueListEntry>>, AppError> {
    let dues = state
        .db
        .list_dues(&ListDuesFilter {
            student_name: params.student_name,
        })
        .await?;

    Ok(Json(dues))
}

/// Extend a due to a later date.
///
/// POST /dues/:id/extend
#[tracing::instrument(skip(state, req))]
pub async fn extend_due(
    State(state): State<AppState>,
    Path(due_id): Path<Uuid>,
    Json(req): Json<ExtendDueRequest>,
) -> Result<Json<Due>, AppError> {
    let due = state.db.extend_due(due_id, req.new_due_date).await?;

    Ok(Json(due))
}

/// Edit a due administratively.
///
/// PUT /dues/:id
#[tracing::instrument(skip(state, req))]
pub async fn update_due(
    State(state): State<AppState>,
    Path(due_id): Path<Uuid>,
    Json(req): Json<UpdateDueRequest>,
) -> Result<Json<Due>, AppError> {
    req.validate()?;

    let due = state
        .db
        .update_due(
            due_id,
            &UpdateDue {
                status: req.status,
                amount: req.amount,
                due_date: req.due_date,
            },
        )
        .await?
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Due not found")))?;

    Ok(Json(due))
}

/// Delete a due.
///
/// DELETE /dues/:id
#[tracing::instrument(skip(state))]
pub async fn delete_due(
    State(state): State<AppState>,
    Path(due_id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    let deleted = state.db.delete_due(due_id).await?;
    if !deleted {
        return Err(AppError::NotFound(anyhow::anyhow!("Due not found")));
    }

    Ok(StatusCode::NO_CONTENT)
}
