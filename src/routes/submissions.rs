use axum::extract::{Path, State};
use axum::Json;
use serde::Serialize;
use serde_json::json;

use crate::error::AppError;
use crate::models::{Submission, TicketState};
use crate::pipeline::{BulkSendReport, SendOutcome, SyncReport};
use crate::state::SharedState;

#[derive(Serialize)]
pub struct SubmissionResponse {
    #[serde(flatten)]
    pub submission: Submission,
    pub state: TicketState,
}

impl From<Submission> for SubmissionResponse {
    fn from(submission: Submission) -> Self {
        let state = submission.state();
        Self { submission, state }
    }
}

pub async fn list(State(state): State<SharedState>) -> Result<Json<serde_json::Value>, AppError> {
    let submissions: Vec<SubmissionResponse> = state
        .service
        .list()
        .await?
        .into_iter()
        .map(SubmissionResponse::from)
        .collect();

    Ok(Json(json!({
        "total": submissions.len(),
        "submissions": submissions,
    })))
}

pub async fn get(
    State(state): State<SharedState>,
    Path(id): Path<String>,
) -> Result<Json<SubmissionResponse>, AppError> {
    let submission = state.service.get(&id).await?;
    Ok(Json(submission.into()))
}

pub async fn sync(State(state): State<SharedState>) -> Result<Json<SyncReport>, AppError> {
    let report = state.service.sync().await?;
    Ok(Json(report))
}

pub async fn send(
    State(state): State<SharedState>,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>, AppError> {
    let (status, submission) = match state.service.send_ticket(&id).await? {
        SendOutcome::Sent(s) => ("sent", s),
        SendOutcome::AlreadySent(s) => ("already_sent", s),
    };

    Ok(Json(json!({
        "status": status,
        "submission": SubmissionResponse::from(submission),
    })))
}

pub async fn send_pending(
    State(state): State<SharedState>,
) -> Result<Json<BulkSendReport>, AppError> {
    let report = state.service.send_pending().await?;
    Ok(Json(report))
}
