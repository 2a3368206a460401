use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, sqlx::FromRow, Serialize, Deserialize)]
pub struct ScanLogEntry {
    pub id: String,
    pub payload: String,
    pub submission_id: Option<String>,
    pub outcome: String,
    pub scanned_at: DateTime<Utc>,
}
