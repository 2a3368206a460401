use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use chrono::{DateTime, Utc};
use serde_json::json;

/// Failures of the ticket pipeline. None of these are fatal to the process.
#[derive(Debug, thiserror::Error)]
pub enum TicketError {
    #[error("spreadsheet unavailable: {0}")]
    SourceUnavailable(String),

    #[error("unreadable ticket code: {0}")]
    DecodeFailure(String),

    #[error("ticket delivery failed: {reason}")]
    DeliveryFailure { reason: String },

    #[error("ticket {id} was already redeemed at {redeemed_at}")]
    AlreadyRedeemed {
        id: String,
        redeemed_at: DateTime<Utc>,
    },

    #[error("submission not found: {0}")]
    NotFound(String),

    #[error("ticket artifact error: {0}")]
    Artifact(String),

    #[error("storage error: {0}")]
    Storage(#[from] sqlx::Error),
}

impl TicketError {
    pub fn delivery(reason: impl Into<String>) -> Self {
        TicketError::DeliveryFailure {
            reason: reason.into(),
        }
    }
}

#[derive(Debug)]
pub enum AppError {
    NotFound(String),
    BadRequest(String),
    Conflict(String),
    BadGateway(String),
    Internal(String),
}

impl std::fmt::Display for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AppError::NotFound(msg) => write!(f, "Not Found: {msg}"),
            AppError::BadRequest(msg) => write!(f, "Bad Request: {msg}"),
            AppError::Conflict(msg) => write!(f, "Conflict: {msg}"),
            AppError::BadGateway(msg) => write!(f, "Bad Gateway: {msg}"),
            AppError::Internal(msg) => write!(f, "Internal Error: {msg}"),
        }
    }
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::BadGateway(_) => StatusCode::BAD_GATEWAY,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Message safe to show to the user.
    pub fn public_message(&self) -> String {
        match self {
            AppError::NotFound(msg)
            | AppError::BadRequest(msg)
            | AppError::Conflict(msg)
            | AppError::BadGateway(msg) => msg.clone(),
            AppError::Internal(_) => "Internal server error".to_string(),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        if let AppError::Internal(msg) = &self {
            tracing::error!("Internal error: {msg}");
        }

        let body = json!({ "error": self.public_message() });
        (self.status(), axum::Json(body)).into_response()
    }
}

impl From<TicketError> for AppError {
    fn from(err: TicketError) -> Self {
        let message = err.to_string();
        match err {
            TicketError::NotFound(_) => AppError::NotFound(message),
            TicketError::AlreadyRedeemed { .. } => AppError::Conflict(message),
            TicketError::DecodeFailure(_) => AppError::BadRequest(message),
            TicketError::SourceUnavailable(_) | TicketError::DeliveryFailure { .. } => {
                AppError::BadGateway(message)
            }
            TicketError::Artifact(_) | TicketError::Storage(_) => AppError::Internal(message),
        }
    }
}

impl From<askama::Error> for AppError {
    fn from(err: askama::Error) -> Self {
        AppError::Internal(format!("Template error: {err}"))
    }
}
