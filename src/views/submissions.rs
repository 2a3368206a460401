use askama::Template;
use axum::extract::{Path, Query, State};
use axum::response::{Html, IntoResponse, Redirect};

use super::dashboard::badge_class;
use super::{Flash, redirect_error, redirect_notice};
use crate::error::{AppError, TicketError};
use crate::models::FormField;
use crate::pipeline::SendOutcome;
use crate::state::SharedState;

#[derive(Template)]
#[template(path = "submission.html")]
struct SubmissionTemplate {
    id: String,
    name: String,
    email: String,
    state: String,
    badge: &'static str,
    can_send: bool,
    sent_at: String,
    redeemed_at: String,
    registered_at: String,
    fields: Vec<FormField>,
    scans: Vec<ScanRow>,
    notice: String,
    error: String,
}

struct ScanRow {
    scanned_at: String,
    outcome: String,
}

pub async fn show(
    State(state): State<SharedState>,
    Path(id): Path<String>,
    Query(flash): Query<Flash>,
) -> Result<impl IntoResponse, AppError> {
    let submission = state.service.get(&id).await?;
    let scans = state
        .service
        .scans_for(&id)
        .await?
        .into_iter()
        .map(|scan| ScanRow {
            scanned_at: scan.scanned_at.format("%Y-%m-%d %H:%M:%S").to_string(),
            outcome: scan.outcome,
        })
        .collect();

    let ticket_state = submission.state();
    let format_time = |t: Option<chrono::DateTime<chrono::Utc>>| {
        t.map(|t| t.format("%Y-%m-%d %H:%M:%S UTC").to_string())
            .unwrap_or_default()
    };

    let template = SubmissionTemplate {
        state: ticket_state.to_string(),
        badge: badge_class(ticket_state),
        can_send: ticket_state.can_send(),
        sent_at: format_time(submission.sent_at),
        redeemed_at: format_time(submission.redeemed_at),
        registered_at: submission.created_at.format("%Y-%m-%d %H:%M").to_string(),
        id: submission.id,
        name: submission.name,
        email: submission.email,
        fields: submission.fields,
        scans,
        notice: flash.notice(),
        error: flash.error(),
    };
    Ok(Html(template.render()?))
}

pub async fn send(State(state): State<SharedState>, Path(id): Path<String>) -> Redirect {
    let back = format!("/submissions/{id}");
    match state.service.send_ticket(&id).await {
        Ok(SendOutcome::Sent(s)) => redirect_notice(&back, &format!("Ticket sent to {}", s.email)),
        Ok(SendOutcome::AlreadySent(_)) => redirect_notice(&back, "Ticket was already sent"),
        Err(TicketError::NotFound(_)) => redirect_error("/dashboard", &format!("Submission {id} not found")),
        Err(e) => redirect_error(&back, &e.to_string()),
    }
}
