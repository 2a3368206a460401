use chrono::Utc;
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::models::ScanLogEntry;

pub async fn record(
    pool: &SqlitePool,
    payload: &str,
    submission_id: Option<&str>,
    outcome: &str,
) -> Result<ScanLogEntry, sqlx::Error> {
    sqlx::query_as::<_, ScanLogEntry>(
        "INSERT INTO scan_log (id, payload, submission_id, outcome, scanned_at)
         VALUES (?1, ?2, ?3, ?4, ?5)
         RETURNING id, payload, submission_id, outcome, scanned_at",
    )
    .bind(Uuid::now_v7().to_string())
    .bind(payload)
    .bind(submission_id)
    .bind(outcome)
    .bind(Utc::now())
    .fetch_one(pool)
    .await
}

pub async fn list_recent(pool: &SqlitePool, limit: i64) -> Result<Vec<ScanLogEntry>, sqlx::Error> {
    sqlx::query_as::<_, ScanLogEntry>(
        "SELECT id, payload, submission_id, outcome, scanned_at FROM scan_log
         ORDER BY seq DESC LIMIT ?1",
    )
    .bind(limit)
    .fetch_all(pool)
    .await
}

pub async fn list_for_submission(
    pool: &SqlitePool,
    submission_id: &str,
) -> Result<Vec<ScanLogEntry>, sqlx::Error> {
    sqlx::query_as::<_, ScanLogEntry>(
        "SELECT id, payload, submission_id, outcome, scanned_at FROM scan_log
         WHERE submission_id = ?1
         ORDER BY seq DESC",
    )
    .bind(submission_id)
    .fetch_all(pool)
    .await
}
