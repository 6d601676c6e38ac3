//! Due model for fees-service.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Due status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DueStatus {
    Open,
    Extended,
    Closed,
}

impl DueStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            DueStatus::Open => "open",
            DueStatus::Extended => "extended",
            DueStatus::Closed => "closed",
        }
    }

    pub fn from_string(s: &str) -> Self {
        match s {
            "extended" => DueStatus::Extended,
            "closed" => DueStatus::Closed,
            _ => DueStatus::Open,
        }
    }

    /// Open and extended dues are still owed; closed dues are settled.
    pub fn is_resolved(&self) -> bool {
        matches!(self, DueStatus::Closed)
    }
}

/// Scheduled follow-up payment obligation on an invoice.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Due {
    pub due_id: Uuid,
    pub invoice_id: Uuid,
    pub status: String,
    pub amount: i64,
    pub due_date: NaiveDate,
    pub created_utc: DateTime<Utc>,
}

impl Due {
    pub fn status(&self) -> DueStatus {
        DueStatus::from_string(&self.status)
    }
}

/// Due list row joined with its student, for the back-office dues screen.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct DueListEntry {
    pub due_id: Uuid,
    pub invoice_id: Uuid,
    pub status: String,
    pub amount: i64,
    pub due_date: NaiveDate,
    pub student_id: Uuid,
    pub student_name: String,
}

/// One entry of a student's dues payload. When the student has no dues the
/// payload is a single totals-only entry with the per-due fields empty.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StudentDueEntry {
    pub id: Option<Uuid>,
    pub amount: Option<i64>,
    pub due_date: Option<NaiveDate>,
    pub status: Option<String>,
    pub total_amount: i64,
    pub balance: i64,
    pub paid: i64,
}

/// Input for creating a due manually.
#[derive(Debug, Clone)]
pub struct CreateDue {
    pub invoice_id: Uuid,
    pub amount: i64,
    pub due_date: NaiveDate,
}

/// Input for updating a due from the admin screen.
#[derive(Debug, Clone, Default)]
pub struct UpdateDue {
    pub status: Option<DueStatus>,
    pub amount: Option<i64>,
    pub due_date: Option<NaiveDate>,
}

/// Filter parameters for listing dues.
#[derive(Debug, Clone, Default)]
pub struct ListDuesFilter {
    pub student_name: Option<String>,
}
