//! API integration tests using tower's oneshot service calls.


use crate::api::create_router;
use crate::config::Config;
use crate::converter::VideoConverter;
use crate::error::{FetchError, TranscodeError};
use crate::fetcher::MediaFetcher;
use crate::transcoder::Transcoder;
use crate::types::{
    FetchedMedia, FormatCatalog, OutputFormat, TaskId, VideoMetadata, VideoQuality,
};
use async_trait::async_trait;
use axum::Router;
use axum::body::Body;
use axum::http::{Request, Response, header};
use std::path::Path;
use std::sync::Arc;
use tokio::sync::mpsc;
use tower::ServiceExt;

/// Fetcher stub that writes a small source file and succeeds
struct TestFetcher;

#[async_trait]
impl MediaFetcher for TestFetcher {
    async fn metadata(&self, _url: &str) -> Result<VideoMetadata, FetchError> {
        Ok(VideoMetadata {
            title: "Test Video".into(),
            thumbnail: Some("https://example.com/thumb.jpg".into()),
            duration: Some("3:45".into()),
            formats: FormatCatalog {
                mp4: vec!["1080p".into(), "720p".into()],
                audio: vec!["m4a".into()],
            },
        })
    }

    async fn download(
        &self,
        _url: &str,
        output_dir: &Path,
        file_stem: &str,
        format: OutputFormat,
        progress: mpsc::Sender<f32>,
    ) -> Result<FetchedMedia, FetchError> {
        let _ = progress.send(100.0).await;
        let path = output_dir.join(format!("{file_stem}.{}", format.extension()));
        tokio::fs::write(&path, b"test media")
            .await
            .map_err(|e| FetchError::Spawn(e.to_string()))?;
        Ok(FetchedMedia {
            path,
            size_bytes: 10,
        })
    }
}

/// Transcoder stub that writes the output file and succeeds
struct TestTranscoder;

#[async_trait]
impl Transcoder for TestTranscoder {
    async fn transcode(
        &self,
        _input: &Path,
        output: &Path,
        _format: OutputFormat,
        _quality: VideoQuality,
        progress: mpsc::Sender<f32>,
    ) -> Result<(), TranscodeError> {
        let _ = progress.send(100.0).await;
        tokio::fs::write(output, b"transcoded")
            .await
            .map_err(|e| TranscodeError::Spawn(e.to_string()))?;
        Ok(())
    }
}

/// Build a router backed by stub collaborators
async fn create_test_app() -> (Router, tempfile::TempDir) {
    let (app, _converter, temp_dir) = create_test_app_with_converter().await;
    (app, temp_dir)
}

/// Like [`create_test_app`], but hands back the converter too so tests can
/// observe task state directly
async fn create_test_app_with_converter() -> (Router, Arc<VideoConverter>, tempfile::TempDir) {
    let temp_dir = tempfile::tempdir().unwrap();
    let mut config = Config::default();
    config.storage.output_dir = temp_dir.path().to_path_buf();

    let converter =
        VideoConverter::with_collaborators(config, Arc::new(TestFetcher), Arc::new(TestTranscoder))
            .await
            .unwrap();
    let config = converter.config.clone();

    (create_router(converter.clone(), config), converter, temp_dir)
}

async fn send_json(
    app: &Router,
    method: &str,
    uri: &str,
    body: serde_json::Value,
) -> Response<Body> {
    let request = Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap();
    app.clone().oneshot(request).await.unwrap()
}

async fn send_get(app: &Router, uri: &str) -> Response<Body> {
    let request = Request::builder()
        .method("GET")
        .uri(uri)
        .body(Body::empty())
        .unwrap();
    app.clone().oneshot(request).await.unwrap()
}

async fn body_json(response: Response<Body>) -> serde_json::Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}
