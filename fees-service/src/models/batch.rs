//! Batch directory model for fees-service.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Batch directory row, read by the dashboard's attendance rollup.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Batch {
    pub batch_id: Uuid,
    pub batch_name: String,
    pub active: bool,
    pub created_utc: DateTime<Utc>,
}

/// Input for registering a batch.
#[derive(Debug, Clone)]
pub struct CreateBatch {
    pub batch_name: String,
    pub active: bool,
}
