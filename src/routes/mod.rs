pub mod scan;
pub mod submissions;
pub mod tickets;

use axum::routing::{get, post};
use axum::Router;

use crate::state::SharedState;

pub fn api_routes() -> Router<SharedState> {
    Router::new()
        // Submissions
        .route("/api/v1/submissions", get(submissions::list))
        .route("/api/v1/submissions/{id}", get(submissions::get))
        .route("/api/v1/submissions/{id}/send", post(submissions::send))
        .route("/api/v1/sync", post(submissions::sync))
        .route("/api/v1/send-pending", post(submissions::send_pending))
        // Check-in
        .route("/api/v1/scan", post(scan::scan))
        .route("/api/v1/scans", get(scan::list_scans))
        // Ticket images
        .route("/tickets/{file}", get(tickets::image))
}
