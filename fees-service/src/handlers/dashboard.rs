//! Dashboard handler for fees-service.

use axum::{
    extract::{Query, State},
    Json,
};
use chrono::{Datelike, NaiveDate, Utc};
use serde::Deserialize;

use crate::models::DashboardSummary;
use crate::startup::AppState;
use service_core::error::AppError;

/// Query parameters for the dashboard rollup. All optional; the range
/// defaults to the current calendar month and `as_of_date` to today.
#[derive(Debug, Deserialize)]
pub struct DashboardParams {
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub as_of_date: Option<NaiveDate>,
}

/// Collections and admissions rollup for an admission date range.
///
/// GET /dashboard/summary
pub async fn dashboard_summary(
    State(state): State<AppState>,
    Query(params): Query<DashboardParams>,
) -> Result<Json<DashboardSummary>, AppError> {
    let today = Utc::now().date_naive();
    let (month_start, month_end) = month_bounds(today);

    let start_date = params.start_date.unwrap_or(month_start);
    let end_date = params.end_date.unwrap_or(month_end);
    let as_of_date = params.as_of_date.unwrap_or(today);

    let summary = state
        .db
        .dashboard_summary(start_date, end_date, as_of_date)
        .await?;

    Ok(Json(summary))
}

/// First and last day of the month containing `today`.
fn month_bounds(today: NaiveDate) -> (NaiveDate, NaiveDate) {
    let start = today.with_day(1).unwrap_or(today);
    let (next_year, next_month) = if today.month() == 12 {
        (today.year() + 1, 1)
    } else {
        (today.year(), today.month() + 1)
    };
    let end = NaiveDate::from_ymd_opt(next_year, next_month, 1)
        .and_then(|first_of_next| first_of_next.pred_opt())
        .unwrap_or(today);
    (start, end)
}
