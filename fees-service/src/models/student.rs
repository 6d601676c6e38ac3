//! Student directory model for fees-service.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Student directory row. Admission date and course drive the dashboard
/// rollups; the full student record lives with the admin screens.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Student {
    pub student_id: Uuid,
    pub student_name: String,
    pub course_name: String,
    pub date_of_admission: NaiveDate,
    pub created_utc: DateTime<Utc>,
}

/// Input for registering a student.
#[derive(Debug, Clone)]
pub struct CreateStudent {
    pub student_name: String,
    pub course_name: String,
    pub date_of_admission: NaiveDate,
}
