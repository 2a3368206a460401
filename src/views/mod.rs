pub mod dashboard;
pub mod scan;
pub mod submissions;

use axum::response::Redirect;
use axum::routing::{get, post};
use axum::Router;
use serde::Deserialize;

use crate::state::SharedState;

pub fn view_routes() -> Router<SharedState> {
    Router::new()
        .route("/", get(dashboard::home))
        // Dashboard
        .route("/dashboard", get(dashboard::index))
        .route("/sync", post(dashboard::sync))
        .route("/send-pending", post(dashboard::send_pending))
        // Submissions
        .route("/submissions/{id}", get(submissions::show))
        .route("/submissions/{id}/send", post(submissions::send))
        // Check-in
        .route("/scan", get(scan::page))
}

/// One-shot message carried on a redirect's query string.
#[derive(Deserialize, Default)]
pub struct Flash {
    pub notice: Option<String>,
    pub error: Option<String>,
}

impl Flash {
    pub fn notice(&self) -> String {
        self.notice.clone().unwrap_or_default()
    }

    pub fn error(&self) -> String {
        self.error.clone().unwrap_or_default()
    }
}

pub fn redirect_notice(path: &str, message: &str) -> Redirect {
    redirect_with(path, "notice", message)
}

pub fn redirect_error(path: &str, message: &str) -> Redirect {
    redirect_with(path, "error", message)
}

fn redirect_with(path: &str, key: &str, message: &str) -> Redirect {
    let query = form_urlencoded::Serializer::new(String::new())
        .append_pair(key, message)
        .finish();
    Redirect::to(&format!("{path}?{query}"))
}
