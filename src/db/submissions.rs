use chrono::Utc;
use sqlx::SqlitePool;
use sqlx::types::Json;

use crate::error::TicketError;
use crate::models::{NewSubmission, Submission};

const COLUMNS: &str = "id, name, email, fields, ticket_generated, ticket_sent, sent_at, \
                       redeemed, redeemed_at, created_at";

/// Durable registry of submissions keyed by identifier, listed in sheet order.
///
/// Rows are never deleted. Lifecycle flags only move forward, and only through
/// the `mark_*` methods; re-reading the sheet never touches them.
#[derive(Clone)]
pub struct SubmissionStore {
    pool: SqlitePool,
}

impl SubmissionStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Insert a NEW submission unless one with the same identifier exists.
    /// Returns `true` when a row was created.
    pub async fn insert_if_absent(&self, new: &NewSubmission) -> Result<bool, TicketError> {
        let result = sqlx::query(
            "INSERT INTO submissions (id, name, email, fields, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5)
             ON CONFLICT (id) DO NOTHING",
        )
        .bind(&new.id)
        .bind(&new.name)
        .bind(&new.email)
        .bind(Json(&new.fields))
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    /// Insert or refresh the registrant data of a submission. Ticket state is preserved.
    pub async fn upsert(&self, new: &NewSubmission) -> Result<Submission, TicketError> {
        let submission = sqlx::query_as::<_, Submission>(&format!(
            "INSERT INTO submissions (id, name, email, fields, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5)
             ON CONFLICT (id) DO UPDATE SET
                name = excluded.name,
                email = excluded.email,
                fields = excluded.fields
             RETURNING {COLUMNS}"
        ))
        .bind(&new.id)
        .bind(&new.name)
        .bind(&new.email)
        .bind(Json(&new.fields))
        .bind(Utc::now())
        .fetch_one(&self.pool)
        .await?;

        Ok(submission)
    }

    pub async fn get(&self, id: &str) -> Result<Option<Submission>, TicketError> {
        let submission = sqlx::query_as::<_, Submission>(&format!(
            "SELECT {COLUMNS} FROM submissions WHERE id = ?1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(submission)
    }

    pub async fn list(&self) -> Result<Vec<Submission>, TicketError> {
        let submissions = sqlx::query_as::<_, Submission>(&format!(
            "SELECT {COLUMNS} FROM submissions ORDER BY seq ASC"
        ))
        .fetch_all(&self.pool)
        .await?;

        Ok(submissions)
    }

    pub async fn mark_ticket_generated(&self, id: &str) -> Result<Submission, TicketError> {
        sqlx::query_as::<_, Submission>(&format!(
            "UPDATE submissions SET ticket_generated = 1 WHERE id = ?1 RETURNING {COLUMNS}"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| TicketError::NotFound(id.to_string()))
    }

    /// Record a delivered ticket. The first delivery timestamp is kept.
    pub async fn mark_sent(&self, id: &str) -> Result<Submission, TicketError> {
        sqlx::query_as::<_, Submission>(&format!(
            "UPDATE submissions
             SET ticket_generated = 1, ticket_sent = 1, sent_at = COALESCE(sent_at, ?2)
             WHERE id = ?1
             RETURNING {COLUMNS}"
        ))
        .bind(id)
        .bind(Utc::now())
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| TicketError::NotFound(id.to_string()))
    }

    /// Redeem a ticket exactly once.
    ///
    /// The check and the write are a single conditional UPDATE, so of two
    /// concurrent redemptions of the same identifier only one can match.
    pub async fn mark_redeemed(&self, id: &str) -> Result<Submission, TicketError> {
        let redeemed = sqlx::query_as::<_, Submission>(&format!(
            "UPDATE submissions SET redeemed = 1, redeemed_at = ?2
             WHERE id = ?1 AND redeemed = 0
             RETURNING {COLUMNS}"
        ))
        .bind(id)
        .bind(Utc::now())
        .fetch_optional(&self.pool)
        .await?;

        if let Some(submission) = redeemed {
            return Ok(submission);
        }

        match self.get(id).await? {
            Some(existing) => Err(already_redeemed(existing)),
            None => Err(TicketError::NotFound(id.to_string())),
        }
    }
}

/// Error for a submission that is already redeemed. `redeemed` and
/// `redeemed_at` are written together; a row with only one of them is reported
/// as a storage fault rather than given a made-up redemption time.
pub fn already_redeemed(submission: Submission) -> TicketError {
    match submission.redeemed_at {
        Some(redeemed_at) => TicketError::AlreadyRedeemed {
            id: submission.id,
            redeemed_at,
        },
        None => TicketError::Storage(sqlx::Error::Protocol(format!(
            "submission {} is marked redeemed without a redemption time",
            submission.id
        ))),
    }
}
