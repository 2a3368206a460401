pub mod locks;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::Serialize;

use crate::db::{self, SubmissionStore};
use crate::error::TicketError;
use crate::models::{ScanLogEntry, Submission, TicketState};
use crate::notify::{MessageTemplate, Notifier};
use crate::sheet::SheetSource;
use crate::ticket::{self, TicketArtifact, TicketCodec};

use locks::KeyedLocks;

const MAX_LOGGED_PAYLOAD: usize = 512;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SyncReport {
    pub fetched: usize,
    pub inserted: usize,
    pub existing: usize,
}

#[derive(Debug, Clone)]
pub enum SendOutcome {
    Sent(Submission),
    /// The ticket had already been delivered; nothing was sent.
    AlreadySent(Submission),
}

impl SendOutcome {
    pub fn submission(&self) -> &Submission {
        match self {
            SendOutcome::Sent(s) | SendOutcome::AlreadySent(s) => s,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct BulkSendReport {
    pub sent: Vec<String>,
    pub failed: Vec<BulkSendFailure>,
}

#[derive(Debug, Clone, Serialize)]
pub struct BulkSendFailure {
    pub id: String,
    pub error: String,
}

/// What a scanner handed in: the text a client-side decoder read, or a photo.
#[derive(Debug, Clone)]
pub enum ScanInput {
    Payload(String),
    Image(Vec<u8>),
}

#[derive(Debug, Clone)]
pub enum ScanOutcome {
    Valid(Submission),
    InvalidCode(String),
    NotFound(String),
    AlreadyRedeemed(Submission),
}

impl ScanOutcome {
    pub fn status(&self) -> &'static str {
        match self {
            ScanOutcome::Valid(_) => "valid",
            ScanOutcome::InvalidCode(_) => "invalid_code",
            ScanOutcome::NotFound(_) => "not_found",
            ScanOutcome::AlreadyRedeemed(_) => "already_redeemed",
        }
    }

    pub fn is_valid(&self) -> bool {
        matches!(self, ScanOutcome::Valid(_))
    }

    pub fn submission(&self) -> Option<&Submission> {
        match self {
            ScanOutcome::Valid(s) | ScanOutcome::AlreadyRedeemed(s) => Some(s),
            _ => None,
        }
    }

    pub fn message(&self) -> String {
        match self {
            ScanOutcome::Valid(s) => format!("Ticket verified. Welcome, {}!", s.name),
            ScanOutcome::InvalidCode(reason) => format!("Invalid QR code: {reason}"),
            ScanOutcome::NotFound(id) => format!("No registration found for ticket {id}"),
            ScanOutcome::AlreadyRedeemed(s) => match s.redeemed_at {
                Some(at) => format!(
                    "Ticket for {} was already used at {}",
                    s.name,
                    at.format("%Y-%m-%d %H:%M:%S UTC")
                ),
                None => format!("Ticket for {} was already used", s.name),
            },
        }
    }
}

/// Drives submissions from the sheet to a delivered ticket and through check-in.
pub struct TicketService {
    store: SubmissionStore,
    sheet: Arc<dyn SheetSource>,
    notifier: Arc<dyn Notifier>,
    codec: TicketCodec,
    template: MessageTemplate,
    ticket_dir: PathBuf,
    locks: KeyedLocks,
}

impl TicketService {
    pub fn new(
        store: SubmissionStore,
        sheet: Arc<dyn SheetSource>,
        notifier: Arc<dyn Notifier>,
        codec: TicketCodec,
        template: MessageTemplate,
        ticket_dir: PathBuf,
    ) -> Self {
        Self {
            store,
            sheet,
            notifier,
            codec,
            template,
            ticket_dir,
            locks: KeyedLocks::new(),
        }
    }

    pub fn codec(&self) -> &TicketCodec {
        &self.codec
    }

    pub async fn list(&self) -> Result<Vec<Submission>, TicketError> {
        self.store.list().await
    }

    pub async fn get(&self, id: &str) -> Result<Submission, TicketError> {
        self.store
            .get(id)
            .await?
            .ok_or_else(|| TicketError::NotFound(id.to_string()))
    }

    /// Pull the sheet and register rows not seen before as NEW.
    ///
    /// Existing submissions are left alone, so repeated syncs are idempotent.
    pub async fn sync(&self) -> Result<SyncReport, TicketError> {
        let rows = self.sheet.fetch().await?;

        let mut report = SyncReport {
            fetched: rows.len(),
            ..SyncReport::default()
        };

        for row in &rows {
            if self.store.insert_if_absent(row).await? {
                report.inserted += 1;
                tracing::debug!("Registered submission {} ({})", row.id, row.email);
            } else {
                report.existing += 1;
            }
        }

        tracing::info!(
            "Sheet sync: {} rows, {} new, {} already known",
            report.fetched,
            report.inserted,
            report.existing
        );
        Ok(report)
    }

    /// Generate the ticket if needed and email it, at most once per submission.
    ///
    /// On delivery failure the submission is not marked sent and the error is
    /// returned, so the send can be retried.
    pub async fn send_ticket(&self, id: &str) -> Result<SendOutcome, TicketError> {
        let result = self.send_ticket_locked(id).await;
        self.locks.release_idle();
        result
    }

    async fn send_ticket_locked(&self, id: &str) -> Result<SendOutcome, TicketError> {
        let _guard = self.locks.acquire(id).await;

        let submission = self.get(id).await?;
        let state = submission.state();
        if state == TicketState::Redeemed {
            return Err(db::submissions::already_redeemed(submission));
        }
        if !state.can_send() {
            tracing::debug!("Ticket {id} already sent, not sending again");
            return Ok(SendOutcome::AlreadySent(submission));
        }

        let artifact = self.ensure_artifact(&submission).await?;
        let message = self.template.render(&submission);

        if let Err(e) = self.notifier.send(&submission.email, &artifact, &message).await {
            tracing::warn!("Sending ticket {id} to {} failed: {e}", submission.email);
            return Err(e);
        }

        let submission = self.store.mark_sent(id).await?;
        tracing::info!("Ticket {id} sent to {}", submission.email);
        Ok(SendOutcome::Sent(submission))
    }

    /// Send every ticket that is not yet sent. One failure does not stop the rest.
    pub async fn send_pending(&self) -> Result<BulkSendReport, TicketError> {
        let pending: Vec<Submission> = self
            .store
            .list()
            .await?
            .into_iter()
            .filter(|s| s.state().can_send())
            .collect();

        let mut report = BulkSendReport::default();
        for submission in pending {
            match self.send_ticket(&submission.id).await {
                Ok(SendOutcome::Sent(_)) => report.sent.push(submission.id),
                Ok(SendOutcome::AlreadySent(_)) => {}
                Err(e) => report.failed.push(BulkSendFailure {
                    id: submission.id,
                    error: e.to_string(),
                }),
            }
        }

        tracing::info!(
            "Bulk send: {} sent, {} failed",
            report.sent.len(),
            report.failed.len()
        );
        Ok(report)
    }

    /// Check a scanned ticket in. Only the first scan of a ticket is `Valid`.
    pub async fn validate_scan(&self, input: ScanInput) -> Result<ScanOutcome, TicketError> {
        let (logged_payload, decoded) = match input {
            ScanInput::Payload(payload) => {
                let decoded = self.codec.decode_payload(&payload);
                (truncate(&payload, MAX_LOGGED_PAYLOAD), decoded)
            }
            ScanInput::Image(bytes) => {
                let codec = self.codec.clone();
                let decoded = tokio::task::spawn_blocking(move || codec.decode_image(&bytes))
                    .await
                    .unwrap_or_else(|e| {
                        Err(TicketError::DecodeFailure(format!("image decoding aborted: {e}")))
                    });
                ("<image>".to_string(), decoded)
            }
        };

        let outcome = match decoded {
            Ok(id) => {
                let outcome = self.redeem(&id).await;
                self.locks.release_idle();
                outcome?
            }
            Err(TicketError::DecodeFailure(reason)) => ScanOutcome::InvalidCode(reason),
            Err(e) => return Err(e),
        };

        match &outcome {
            ScanOutcome::Valid(s) => tracing::info!("Ticket {} redeemed for {}", s.id, s.name),
            other => tracing::warn!("Scan rejected: {}", other.message()),
        }

        let submission_id = match &outcome {
            ScanOutcome::Valid(s) | ScanOutcome::AlreadyRedeemed(s) => Some(s.id.as_str()),
            ScanOutcome::NotFound(id) => Some(id.as_str()),
            ScanOutcome::InvalidCode(_) => None,
        };
        if let Err(e) = db::scan_log::record(
            self.store.pool(),
            &logged_payload,
            submission_id,
            outcome.status(),
        )
        .await
        {
            tracing::error!("Failed to record scan: {e}");
        }

        Ok(outcome)
    }

    async fn redeem(&self, id: &str) -> Result<ScanOutcome, TicketError> {
        let _guard = self.locks.acquire(id).await;

        match self.store.mark_redeemed(id).await {
            Ok(submission) => Ok(ScanOutcome::Valid(submission)),
            Err(TicketError::AlreadyRedeemed { .. }) => Ok(ScanOutcome::AlreadyRedeemed(self.get(id).await?)),
            Err(TicketError::NotFound(_)) => Ok(ScanOutcome::NotFound(id.to_string())),
            Err(e) => Err(e),
        }
    }

    pub async fn recent_scans(&self, limit: i64) -> Result<Vec<ScanLogEntry>, TicketError> {
        Ok(db::scan_log::list_recent(self.store.pool(), limit).await?)
    }

    pub async fn scans_for(&self, id: &str) -> Result<Vec<ScanLogEntry>, TicketError> {
        Ok(db::scan_log::list_for_submission(self.store.pool(), id).await?)
    }

    /// PNG for a submission's ticket. Uses the cached file when present and
    /// otherwise renders one without touching the submission's state.
    pub async fn ticket_image(&self, id: &str) -> Result<Vec<u8>, TicketError> {
        let submission = self.get(id).await?;
        match read_cached(&self.ticket_path(&submission.id)).await? {
            Some(png) => Ok(png),
            None => Ok(self.codec.encode(&submission.id)?.png),
        }
    }

    pub fn ticket_path(&self, id: &str) -> PathBuf {
        self.ticket_dir.join(ticket::file_name(id))
    }

    async fn ensure_artifact(&self, submission: &Submission) -> Result<TicketArtifact, TicketError> {
        let path = self.ticket_path(&submission.id);

        let artifact = match read_cached(&path).await? {
            Some(png) => TicketArtifact {
                id: submission.id.clone(),
                payload: ticket::encode_payload(&submission.id),
                png,
            },
            None => {
                let artifact = self.codec.encode(&submission.id)?;
                write_atomic(&path, &artifact.png).await?;
                tracing::debug!("Generated ticket {}", path.display());
                artifact
            }
        };

        if !submission.ticket_generated {
            self.store.mark_ticket_generated(&submission.id).await?;
        }

        Ok(artifact)
    }
}

async fn read_cached(path: &Path) -> Result<Option<Vec<u8>>, TicketError> {
    match tokio::fs::read(path).await {
        Ok(png) => Ok(Some(png)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(TicketError::Artifact(format!(
            "cannot read {}: {e}",
            path.display()
        ))),
    }
}

/// Write through a temp file and rename, so readers never see a partial PNG.
async fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), TicketError> {
    let io_err = |e: std::io::Error| TicketError::Artifact(format!("cannot write {}: {e}", path.display()));

    if let Some(dir) = path.parent() {
        tokio::fs::create_dir_all(dir).await.map_err(io_err)?;
    }

    let tmp = path.with_extension("png.tmp");
    tokio::fs::write(&tmp, bytes).await.map_err(io_err)?;
    if let Err(e) = tokio::fs::rename(&tmp, path).await {
        let _ = tokio::fs::remove_file(&tmp).await;
        return Err(io_err(e));
    }
    Ok(())
}

fn truncate(s: &str, max: usize) -> String {
    s.chars().take(max).collect()
}
