//! Staff directory model for fees-service.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Staff role, resolved once per request and carried as a typed value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StaffRole {
    Admin,
    Office,
    Instructor,
}

impl StaffRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            StaffRole::Admin => "admin",
            StaffRole::Office => "office",
            StaffRole::Instructor => "instructor",
        }
    }

    pub fn from_string(s: &str) -> Self {
        match s {
            "admin" => StaffRole::Admin,
            "instructor" => StaffRole::Instructor,
            _ => StaffRole::Office,
        }
    }

    /// Whether this role may be recorded as the receiver of a payment.
    /// Instructors take classes, not money.
    pub fn can_receive_payments(&self) -> bool {
        matches!(self, StaffRole::Admin | StaffRole::Office)
    }
}

/// Staff directory row.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Staff {
    pub staff_id: Uuid,
    pub staff_name: String,
    pub role: String,
    pub created_utc: DateTime<Utc>,
}

impl Staff {
    pub fn role(&self) -> StaffRole {
        StaffRole::from_string(&self.role)
    }
}

/// Input for registering a staff member.
#[derive(Debug, Clone)]
pub struct CreateStaff {
    pub staff_name: String,
    pub role: StaffRole,
}
