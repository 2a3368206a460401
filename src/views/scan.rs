use askama::Template;
use axum::extract::State;
use axum::response::{Html, IntoResponse};

use crate::error::AppError;
use crate::state::SharedState;

const RECENT_SCANS: i64 = 20;

#[derive(Template)]
#[template(path = "scan.html")]
struct ScanTemplate {
    scans: Vec<ScanRow>,
}

struct ScanRow {
    scanned_at: String,
    submission_id: String,
    outcome: String,
}

pub async fn page(State(state): State<SharedState>) -> Result<impl IntoResponse, AppError> {
    let scans = state
        .service
        .recent_scans(RECENT_SCANS)
        .await?
        .into_iter()
        .map(|scan| ScanRow {
            scanned_at: scan.scanned_at.format("%H:%M:%S").to_string(),
            submission_id: scan.submission_id.unwrap_or_default(),
            outcome: scan.outcome,
        })
        .collect();

    Ok(Html(ScanTemplate { scans }.render()?))
}
