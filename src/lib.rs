//! # vidxpress
//!
//! Backend library for a video fetch-and-convert web service.
//!
//! ## Design Philosophy
//!
//! vidxpress is designed to be:
//! - **Library-first** - No CLI or UI, purely a Rust crate for embedding
//! - **Sensible defaults** - Works out of the box with zero configuration
//! - **Self-cleaning** - Converted files and task records expire automatically
//! - **Pluggable** - The yt-dlp fetcher and ffmpeg transcoder sit behind traits
//!
//! ## Quick Start
//!
//! ```no_run
//! use vidxpress::{Config, VideoConverter, run_with_shutdown};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config::from_env();
//!     let converter = VideoConverter::new(config).await?;
//!
//!     // Serve the REST API in the background
//!     converter.spawn_api_server();
//!
//!     // Block until SIGTERM/SIGINT, then shut down gracefully
//!     run_with_shutdown(converter).await;
//!
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]

/// REST API module
pub mod api;
/// Configuration types
pub mod config;
/// Core conversion service
pub mod converter;
/// Error types
pub mod error;
/// Media fetching via yt-dlp
pub mod fetcher;
/// Per-task progress channels
pub mod notifier;
/// In-memory task registry
pub mod registry;
/// Periodic cleanup of expired files and task records
pub mod sweeper;
/// Media transcoding via ffmpeg
pub mod transcoder;
/// Core types
pub mod types;

// Re-export commonly used types
pub use config::Config;
pub use converter::VideoConverter;
pub use error::{ApiError, Error, ErrorDetail, FetchError, Result, ToHttpStatus, TranscodeError};
pub use fetcher::{MediaFetcher, YtDlpFetcher};
pub use notifier::ProgressNotifier;
pub use registry::TaskRegistry;
pub use transcoder::{FfmpegTranscoder, Transcoder};
pub use types::{
    FetchedMedia, FormatCatalog, OutputFormat, TaskId, TaskSnapshot, TaskStatus, VideoMetadata,
    VideoQuality,
};

use std::sync::Arc;

/// Helper function to run the converter with graceful signal handling.
///
/// Waits for a termination signal, then calls [`VideoConverter::shutdown`].
///
/// - **Unix:** listens for SIGTERM and SIGINT, with fallbacks if signal registration fails.
/// - **Windows/other:** listens for Ctrl+C via `tokio::signal::ctrl_c()`.
pub async fn run_with_shutdown(converter: Arc<VideoConverter>) {
    wait_for_signal().await;
    converter.shutdown().await;
}

#[cfg(unix)]
async fn wait_for_signal() {
    use tokio::signal::unix::{SignalKind, signal};

    // Signal registration may fail in restricted environments (containers, tests)
    let sigterm_result = signal(SignalKind::terminate());
    let sigint_result = signal(SignalKind::interrupt());

    match (sigterm_result, sigint_result) {
        (Ok(mut sigterm), Ok(mut sigint)) => {
            tokio::select! {
                _ = sigterm.recv() => {
                    tracing::info!("Received SIGTERM signal");
                }
                _ = sigint.recv() => {
                    tracing::info!("Received SIGINT signal (Ctrl+C)");
                }
            }
        }
        (Err(e), _) => {
            tracing::warn!(error = %e, "Could not register SIGTERM handler, waiting for SIGINT only");
            if let Ok(mut sigint) = signal(SignalKind::interrupt()) {
                sigint.recv().await;
                tracing::info!("Received SIGINT signal (Ctrl+C)");
            } else {
                tracing::error!("Could not register any signal handlers, using ctrl_c fallback");
                tokio::signal::ctrl_c().await.ok();
            }
        }
        (_, Err(e)) => {
            tracing::warn!(error = %e, "Could not register SIGINT handler, waiting for SIGTERM only");
            if let Ok(mut sigterm) = signal(SignalKind::terminate()) {
                sigterm.recv().await;
                tracing::info!("Received SIGTERM signal");
            } else {
                tracing::error!("Could not register any signal handlers, using ctrl_c fallback");
                tokio::signal::ctrl_c().await.ok();
            }
        }
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => {
            tracing::info!("Received Ctrl+C signal");
        }
        Err(e) => {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C signal");
        }
    }
}
