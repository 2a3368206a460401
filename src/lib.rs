pub mod config;
pub mod db;
pub mod error;
pub mod models;
pub mod notify;
pub mod pipeline;
pub mod routes;
pub mod sheet;
pub mod state;
pub mod ticket;
pub mod views;

use std::sync::Arc;

use axum::extract::DefaultBodyLimit;
use axum::http::{HeaderName, HeaderValue};
use axum::Router;
use sqlx::SqlitePool;
use tower::ServiceBuilder;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::services::ServeDir;
use tower_http::set_header::SetResponseHeaderLayer;
use tower_http::trace::TraceLayer;

use crate::config::Config;
use crate::db::SubmissionStore;
use crate::error::TicketError;
use crate::notify::{MessageTemplate, Notifier};
use crate::pipeline::TicketService;
use crate::sheet::SheetSource;
use crate::state::{AppState, SharedState};
use crate::ticket::TicketCodec;

pub fn build_app(
    pool: SqlitePool,
    config: Config,
    sheet: Arc<dyn SheetSource>,
    notifier: Arc<dyn Notifier>,
) -> Result<(Router, SharedState), TicketError> {
    let codec = match &config.ticket_template {
        Some(path) => {
            tracing::info!("Composing tickets onto template {}", path.display());
            TicketCodec::with_template(path)?
        }
        None => TicketCodec::new(),
    };

    let service = TicketService::new(
        SubmissionStore::new(pool),
        sheet,
        notifier,
        codec,
        MessageTemplate::from(&config.mail),
        config.ticket_dir.clone(),
    );

    let max_body_size = config.max_body_size;
    let state: SharedState = Arc::new(AppState { config, service });

    let security_headers = ServiceBuilder::new()
        .layer(SetResponseHeaderLayer::overriding(
            HeaderName::from_static("x-content-type-options"),
            HeaderValue::from_static("nosniff"),
        ))
        .layer(SetResponseHeaderLayer::overriding(
            HeaderName::from_static("x-frame-options"),
            HeaderValue::from_static("DENY"),
        ))
        .layer(SetResponseHeaderLayer::overriding(
            HeaderName::from_static("referrer-policy"),
            HeaderValue::from_static("strict-origin-when-cross-origin"),
        ));

    let app = Router::new()
        .merge(routes::api_routes())
        .merge(views::view_routes())
        .nest_service("/static", ServeDir::new("static"))
        .route("/health", axum::routing::get(health))
        .layer(DefaultBodyLimit::disable())
        .layer(RequestBodyLimitLayer::new(max_body_size))
        .layer(TraceLayer::new_for_http())
        .layer(security_headers)
        .with_state(state.clone());

    Ok((app, state))
}

async fn health() -> &'static str {
    "ok"
}
