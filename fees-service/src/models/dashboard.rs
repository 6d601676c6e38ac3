//! Dashboard summary models for fees-service.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Admissions count for one course within the queried range.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct CourseAdmissions {
    pub course_name: String,
    pub admission_count: i64,
}

/// Attendance completion rollup over active batches.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct BatchCompletion {
    pub total: i64,
    pub completed: i64,
    pub not_completed: i64,
}

/// Read-only dashboard rollup for an admission date range.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DashboardSummary {
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub total_invoices: i64,
    pub total_invoice_amount: i64,
    pub total_collected_amount: i64,
    pub average_per_admission: f64,
    pub collection_rate_percent: f64,
    pub course_breakdown: Vec<CourseAdmissions>,
    pub batch_completion: BatchCompletion,
}
