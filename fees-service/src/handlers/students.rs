//! Student directory handlers for fees-service.
//!
//! Minimal surface: register and look up students, and serve the dues
//! payload the back-office student screen renders.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::models::{CreateStudent, Student, StudentDueEntry};
use crate::startup::AppState;
use service_core::error::AppError;

// ============================================================================
// Request/Response DTOs
// ============================================================================

/// Request to register a student.
#[derive(Debug, Deserialize, Validate)]
pub struct CreateStudentRequest {
    #[validate(length(min = 1, message = "Student name cannot be empty"))]
    pub student_name: String,
    #[validate(length(min = 1, message = "Course name cannot be empty"))]
    pub course_name: String,
    pub date_of_admission: NaiveDate,
}

/// Student response.
#[derive(Debug, Serialize)]
pub struct StudentResponse {
    pub student_id: Uuid,
    pub student_name: String,
    pub course_name: String,
    pub date_of_admission: NaiveDate,
    pub created_utc: DateTime<Utc>,
}

impl From<Student> for StudentResponse {
    fn from(student: Student) -> Self {
        Self {
            student_id: student.student_id,
            student_name: student.student_name,
            course_name: student.course_name,
            date_of_admission: student.date_of_admission,
            created_utc: student.created_utc,
        }
    }
}

// ============================================================================
// Handlers
// ============================================================================

/// Register a student.
///
/// POST /students
#[tracing::instrument(skip(state, req))]
pub async fn create_student(
    State(state): State<AppState>,
    Json(req): Json<CreateStudentRequest>,
) -> Result<(StatusCode, Json<StudentResponse>), AppError> {
    req.validate()?;

    let student = state
        .db
        .create_student(&CreateStudent {
            student_name: req.student_name,
            course_name: req.course_name,
            date_of_admission: req.date_of_admission,
        })
        .await?;

    Ok((StatusCode::CREATED, Json(StudentResponse::from(student))))
}

/// Look up a student.
///
/// GET /students/:id
pub async fn get_student(
    State(state): State<AppState>,
    Path(student_id): Path<Uuid>,
) -> Result<Json<StudentResponse>, AppError> {
    let student = state
        .db
        .get_student(student_id)
        .await?
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Student not found")))?;

    Ok(Json(StudentResponse::from(student)))
}

/// The student's dues with invoice totals, or a single totals-only entry
/// when the student has no dues.
///
/// GET /students/:id/dues
pub async fn get_student_dues(
    State(state): State<AppState>,
    Path(student_id): Path<Uuid>,
) -> Result<Json<Vec<StudentDueEntry>>, AppError> {
    let entries = state.db.dues_for_student(student_id).await?;

    Ok(Json(entries))
}
