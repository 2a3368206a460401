use askama::Template;
use axum::extract::{Query, State};
use axum::response::{Html, IntoResponse, Redirect};

use super::{Flash, redirect_error, redirect_notice};
use crate::error::AppError;
use crate::models::{Submission, TicketState};
use crate::state::SharedState;

#[derive(Template)]
#[template(path = "home.html")]
struct HomeTemplate {
    total: usize,
    sent: usize,
    redeemed: usize,
}

#[derive(Template)]
#[template(path = "dashboard.html")]
struct DashboardTemplate {
    rows: Vec<SubmissionRow>,
    pending: usize,
    notice: String,
    error: String,
}

struct SubmissionRow {
    number: usize,
    id: String,
    name: String,
    email: String,
    state: String,
    badge: &'static str,
    can_send: bool,
}

impl SubmissionRow {
    fn new(number: usize, submission: &Submission) -> Self {
        let state = submission.state();
        Self {
            number,
            id: submission.id.clone(),
            name: submission.name.clone(),
            email: submission.email.clone(),
            state: state.to_string(),
            badge: badge_class(state),
            can_send: state.can_send(),
        }
    }
}

pub fn badge_class(state: TicketState) -> &'static str {
    match state {
        TicketState::New => "badge-new",
        TicketState::TicketGenerated => "badge-generated",
        TicketState::Sent => "badge-sent",
        TicketState::Redeemed => "badge-redeemed",
    }
}

pub async fn home(State(state): State<SharedState>) -> Result<impl IntoResponse, AppError> {
    let submissions = state.service.list().await?;

    let template = HomeTemplate {
        total: submissions.len(),
        sent: submissions.iter().filter(|s| s.ticket_sent).count(),
        redeemed: submissions.iter().filter(|s| s.redeemed).count(),
    };
    Ok(Html(template.render()?))
}

/// Listing page. Pulls the sheet first unless that is switched off; a failed
/// pull is reported on the page and the stored list is still shown.
pub async fn index(
    State(state): State<SharedState>,
    Query(flash): Query<Flash>,
) -> Result<impl IntoResponse, AppError> {
    let mut error = flash.error();

    if state.config.sync_on_view {
        if let Err(e) = state.service.sync().await {
            tracing::warn!("Sync on dashboard load failed: {e}");
            if error.is_empty() {
                error = e.to_string();
            }
        }
    }

    let submissions = state.service.list().await?;
    let rows: Vec<SubmissionRow> = submissions
        .iter()
        .enumerate()
        .map(|(i, s)| SubmissionRow::new(i + 1, s))
        .collect();

    let template = DashboardTemplate {
        pending: rows.iter().filter(|r| r.can_send).count(),
        rows,
        notice: flash.notice(),
        error,
    };
    Ok(Html(template.render()?))
}

pub async fn sync(State(state): State<SharedState>) -> Redirect {
    match state.service.sync().await {
        Ok(report) => redirect_notice(
            "/dashboard",
            &format!(
                "Synced {} rows: {} new, {} already known",
                report.fetched, report.inserted, report.existing
            ),
        ),
        Err(e) => redirect_error("/dashboard", &e.to_string()),
    }
}

pub async fn send_pending(State(state): State<SharedState>) -> Redirect {
    match state.service.send_pending().await {
        Ok(report) if report.failed.is_empty() => redirect_notice(
            "/dashboard",
            &format!("Sent {} tickets", report.sent.len()),
        ),
        Ok(report) => {
            let failures: Vec<String> = report
                .failed
                .iter()
                .map(|f| format!("{}: {}", f.id, f.error))
                .collect();
            redirect_error(
                "/dashboard",
                &format!(
                    "Sent {} tickets, {} failed ({})",
                    report.sent.len(),
                    report.failed.len(),
                    failures.join("; ")
                ),
            )
        }
        Err(e) => redirect_error("/dashboard", &e.to_string()),
    }
}
