//! Conversion start handler.

use crate::api::AppState;
use crate::error::Error;
use crate::types::{OutputFormat, TaskId, VideoQuality};
use axum::{Json, extract::State, http::StatusCode};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Request body for starting a conversion
#[derive(Debug, Deserialize, ToSchema)]
pub struct ConvertRequest {
    /// Video page URL on an allowed platform
    pub video_url: String,
    /// Target format: "mp3" or "mp4"
    pub format: String,
    /// Video quality: "360p", "720p", or "1080p" (defaults to 720p,
    /// ignored for audio)
    pub quality: Option<String>,
}

/// Response body confirming a started conversion
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ConvertResponse {
    /// Always "started"
    pub status: String,
    /// Identifier for polling progress and locating the output
    pub task_id: TaskId,
}

/// POST /api/convert - Start a background conversion
///
/// Validation happens before any task is created: a rejected request never
/// produces a task id. An unknown quality value falls back to the default
/// rather than failing the request.
#[utoipa::path(
    post,
    path = "/api/convert",
    tag = "videos",
    request_body = ConvertRequest,
    responses(
        (status = 202, description = "Conversion started", body = ConvertResponse),
        (status = 400, description = "Invalid URL, domain, or format", body = crate::error::ApiError),
        (status = 503, description = "Service is shutting down", body = crate::error::ApiError)
    )
)]
pub async fn start_conversion(
    State(state): State<AppState>,
    Json(request): Json<ConvertRequest>,
) -> Result<(StatusCode, Json<ConvertResponse>), Error> {
    let format = OutputFormat::parse(&request.format).ok_or_else(|| Error::InvalidFormat {
        format: request.format.clone(),
    })?;
    let quality = request
        .quality
        .as_deref()
        .and_then(VideoQuality::parse)
        .unwrap_or_default();

    let snapshot = state
        .converter
        .start_conversion(&request.video_url, format, quality)
        .await?;

    Ok((
        StatusCode::ACCEPTED,
        Json(ConvertResponse {
            status: "started".to_string(),
            task_id: snapshot.id,
        }),
    ))
}
