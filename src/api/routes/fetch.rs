//! Metadata fetch handler.

use crate::api::AppState;
use crate::error::Error;
use crate::types::VideoMetadata;
use axum::{Json, extract::State};
use serde::Deserialize;
use utoipa::ToSchema;

/// Request body for the metadata endpoint
#[derive(Debug, Deserialize, ToSchema)]
pub struct FetchRequest {
    /// Video page URL on an allowed platform
    pub video_url: String,
}

/// POST /api/fetch - Probe a URL for metadata
///
/// Returns title, thumbnail, duration, and the formats the source offers.
/// Nothing is downloaded.
#[utoipa::path(
    post,
    path = "/api/fetch",
    tag = "videos",
    request_body = FetchRequest,
    responses(
        (status = 200, description = "Video metadata", body = VideoMetadata),
        (status = 400, description = "Invalid URL or domain not allowed", body = crate::error::ApiError),
        (status = 502, description = "Source probe failed", body = crate::error::ApiError)
    )
)]
pub async fn fetch_metadata(
    State(state): State<AppState>,
    Json(request): Json<FetchRequest>,
) -> Result<Json<VideoMetadata>, Error> {
    let metadata = state.converter.metadata(&request.video_url).await?;
    Ok(Json(metadata))
}
