use axum::extract::{Path, State};
use axum::http::header;
use axum::response::IntoResponse;

use crate::error::AppError;
use crate::state::SharedState;

pub async fn image(
    State(state): State<SharedState>,
    Path(file): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let id = file
        .strip_suffix(".png")
        .ok_or_else(|| AppError::NotFound("Ticket not found".to_string()))?;

    let png = state.service.ticket_image(id).await?;

    Ok((
        [
            (header::CONTENT_TYPE, "image/png"),
            (header::CACHE_CONTROL, "no-cache"),
        ],
        png,
    ))
}
