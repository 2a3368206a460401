use bytes::Bytes;
use axum::extract::{Query, State};
use axum::http::HeaderMap;
use axum::Json;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::AppError;
use crate::models::ScanLogEntry;
use crate::pipeline::{ScanInput, ScanOutcome};
use crate::state::SharedState;

/// Body posted by the browser scanner. Older pages send `qr_data`.
#[derive(Deserialize)]
pub struct ScanRequest {
    #[serde(alias = "qr_data")]
    pub qr_content: String,
}

#[derive(Serialize)]
pub struct ScanResponse {
    pub status: &'static str,
    pub valid: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub redeemed_at: Option<DateTime<Utc>>,
}

impl From<&ScanOutcome> for ScanResponse {
    fn from(outcome: &ScanOutcome) -> Self {
        let submission = outcome.submission();
        let id = match outcome {
            ScanOutcome::NotFound(id) => Some(id.clone()),
            _ => submission.map(|s| s.id.clone()),
        };

        Self {
            status: outcome.status(),
            valid: outcome.is_valid(),
            message: outcome.message(),
            id,
            name: submission.map(|s| s.name.clone()),
            redeemed_at: submission.and_then(|s| s.redeemed_at),
        }
    }
}

/// Every outcome, including rejected codes, is a 200 with a `status` field.
pub async fn scan(
    State(state): State<SharedState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<ScanResponse>, AppError> {
    let content_type = headers
        .get("content-type")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("application/json");

    let input = if content_type.contains("multipart/form-data") {
        parse_multipart(content_type, body).await?
    } else if content_type.contains("application/x-www-form-urlencoded") {
        parse_form(&body)?
    } else if content_type.starts_with("image/") {
        ScanInput::Image(body.to_vec())
    } else {
        let request: ScanRequest = serde_json::from_slice(&body)
            .map_err(|e| AppError::BadRequest(format!("Invalid scan request: {e}")))?;
        ScanInput::Payload(request.qr_content)
    };

    let outcome = state.service.validate_scan(input).await?;
    Ok(Json(ScanResponse::from(&outcome)))
}

#[derive(Deserialize)]
pub struct ScanListParams {
    pub limit: Option<i64>,
}

pub async fn list_scans(
    State(state): State<SharedState>,
    Query(params): Query<ScanListParams>,
) -> Result<Json<Vec<ScanLogEntry>>, AppError> {
    let limit = params.limit.unwrap_or(50).clamp(1, 500);
    let scans = state.service.recent_scans(limit).await?;
    Ok(Json(scans))
}

fn parse_form(body: &[u8]) -> Result<ScanInput, AppError> {
    form_urlencoded::parse(body)
        .find(|(k, _)| k == "qr_content" || k == "qr_data")
        .map(|(_, v)| ScanInput::Payload(v.into_owned()))
        .ok_or_else(|| AppError::BadRequest("Missing qr_content".to_string()))
}

/// Accept an `image` file part, or a `qr_content` text part.
async fn parse_multipart(content_type: &str, body: Bytes) -> Result<ScanInput, AppError> {
    let boundary = multer::parse_boundary(content_type)
        .map_err(|_| AppError::BadRequest("Missing multipart boundary".to_string()))?;

    let stream = futures_util::stream::once(async { Ok::<_, std::io::Error>(body) });
    let mut multipart = multer::Multipart::new(stream, boundary);

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::BadRequest(format!("Multipart error: {e}")))?
    {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "image" => {
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|e| AppError::BadRequest(format!("Field read error: {e}")))?;
                if !bytes.is_empty() {
                    return Ok(ScanInput::Image(bytes.to_vec()));
                }
            }
            "qr_content" | "qr_data" => {
                let text = field
                    .text()
                    .await
                    .map_err(|e| AppError::BadRequest(format!("Field read error: {e}")))?;
                if !text.trim().is_empty() {
                    return Ok(ScanInput::Payload(text));
                }
            }
            _ => {}
        }
    }

    Err(AppError::BadRequest(
        "Upload an 'image' file or send 'qr_content'".to_string(),
    ))
}
