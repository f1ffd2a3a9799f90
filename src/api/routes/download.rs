//! Direct download handler.

use crate::api::AppState;
use crate::error::Error;
use crate::types::OutputFormat;
use axum::{
    body::Body,
    extract::{Query, State},
    http::{StatusCode, header},
    response::Response,
};
use serde::Deserialize;
use tokio_util::io::ReaderStream;
use utoipa::IntoParams;

/// Query parameters for the direct download endpoint
#[derive(Debug, Deserialize, IntoParams)]
pub struct DownloadQuery {
    /// Video page URL on an allowed platform
    pub url: String,
    /// Target format: "mp3" or "mp4" (defaults to mp4)
    pub format: Option<String>,
}

/// GET /api/download - Fetch a URL and stream the file back
///
/// Synchronous one-shot variant of the conversion pipeline: the request
/// blocks while yt-dlp fetches (and for mp3, extracts) the media, then the
/// file is streamed as an attachment. The size cap applies. The file stays
/// in the output directory afterwards and is removed by the regular cleanup
/// sweep.
#[utoipa::path(
    get,
    path = "/api/download",
    tag = "videos",
    params(DownloadQuery),
    responses(
        (status = 200, description = "Media file attachment", content_type = "application/octet-stream"),
        (status = 400, description = "Invalid URL, domain, or format", body = crate::error::ApiError),
        (status = 413, description = "File exceeds the configured size cap", body = crate::error::ApiError),
        (status = 502, description = "Fetch failed", body = crate::error::ApiError)
    )
)]
pub async fn direct_download(
    State(state): State<AppState>,
    Query(query): Query<DownloadQuery>,
) -> Result<Response, Error> {
    let format = match query.format.as_deref() {
        None => OutputFormat::Mp4,
        Some(raw) => OutputFormat::parse(raw).ok_or_else(|| Error::InvalidFormat {
            format: raw.to_string(),
        })?,
    };

    let fetched = state.converter.fetch_direct(&query.url, format).await?;

    let file_name = fetched
        .path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("download")
        .to_string();
    let disposition = format!(
        "attachment; filename=\"{file_name}\"; filename*=UTF-8''{}",
        urlencoding::encode(&file_name)
    );

    let file = tokio::fs::File::open(&fetched.path)
        .await
        .map_err(Error::Io)?;
    let body = Body::from_stream(ReaderStream::new(file));

    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, format.content_type())
        .header(header::CONTENT_LENGTH, fetched.size_bytes)
        .header(header::CONTENT_DISPOSITION, disposition)
        .body(body)
        .map_err(|e| Error::ApiServerError(e.to_string()))
}
