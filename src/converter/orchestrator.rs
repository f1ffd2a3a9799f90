//! Per-task conversion pipeline
//!
//! Drives one task from pending through download and transcode to a terminal
//! state. All registry writes for a task funnel through this single task, so
//! status transitions stay ordered. Source-fetch progress maps to the 0..50
//! half of the lifetime scale and transcode progress to 50..100, keeping the
//! reported percentage monotonic across phases.

use crate::config::Config;
use crate::error::{Error, Result};
use crate::fetcher::MediaFetcher;
use crate::notifier::ProgressNotifier;
use crate::registry::TaskRegistry;
use crate::transcoder::Transcoder;
use crate::types::{FetchedMedia, OutputFormat, TaskId, TaskStatus, VideoQuality};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{error, warn};

/// Everything one conversion task needs to run to completion
pub(crate) struct ConversionContext {
    pub(crate) task_id: TaskId,
    pub(crate) url: String,
    pub(crate) format: OutputFormat,
    pub(crate) quality: VideoQuality,
    pub(crate) config: Arc<Config>,
    pub(crate) registry: Arc<TaskRegistry>,
    pub(crate) notifier: Arc<ProgressNotifier>,
    pub(crate) fetcher: Arc<dyn MediaFetcher>,
    pub(crate) transcoder: Arc<dyn Transcoder>,
}

/// Run a conversion task to its terminal state.
///
/// Never returns an error: any failure is recorded on the task itself and
/// published to subscribers.
pub(crate) async fn run(ctx: ConversionContext) {
    if let Err(error) = drive(&ctx).await {
        fail(&ctx, error).await;
    }
}

async fn drive(ctx: &ConversionContext) -> Result<()> {
    record(ctx, TaskStatus::Downloading, Some(0.0), None, None).await?;

    // The source stem must not collide with the final `<task_id>.<ext>`
    // output name, or the transcode would read and write the same file
    let stem = format!("{}-src", ctx.task_id);
    let fetched = run_download(ctx, &stem).await?;

    let limit = ctx.config.storage.max_file_size_bytes;
    if fetched.size_bytes > limit {
        if let Err(e) = tokio::fs::remove_file(&fetched.path).await {
            warn!(path = %fetched.path.display(), error = %e, "failed to remove oversized source");
        }
        return Err(Error::FileTooLarge {
            size_bytes: fetched.size_bytes,
            limit_bytes: limit,
        });
    }

    record(ctx, TaskStatus::Converting, Some(50.0), None, None).await?;

    let output = ctx
        .config
        .storage
        .output_dir
        .join(format!("{}.{}", ctx.task_id, ctx.format.extension()));
    run_transcode(ctx, &fetched.path, &output).await?;

    if let Err(e) = tokio::fs::remove_file(&fetched.path).await {
        warn!(
            path = %fetched.path.display(),
            error = %e,
            "failed to remove intermediate source file"
        );
    }

    record(ctx, TaskStatus::Completed, Some(100.0), Some(output), None).await?;
    tracing::info!(task_id = %ctx.task_id, "conversion completed");
    Ok(())
}

/// Fetch the source while forwarding progress into the 0..50 range
async fn run_download(ctx: &ConversionContext, stem: &str) -> Result<FetchedMedia> {
    let (tx, mut rx) = mpsc::channel::<f32>(16);
    let fut = ctx.fetcher.download(
        &ctx.url,
        &ctx.config.storage.output_dir,
        stem,
        ctx.format,
        tx,
    );
    tokio::pin!(fut);

    loop {
        tokio::select! {
            result = &mut fut => {
                return Ok(result?);
            }
            Some(pct) = rx.recv() => {
                record(
                    ctx,
                    TaskStatus::Downloading,
                    Some(pct.clamp(0.0, 100.0) * 0.5),
                    None,
                    None,
                )
                .await?;
            }
        }
    }
}

/// Transcode while forwarding progress into the 50..100 range
async fn run_transcode(ctx: &ConversionContext, input: &Path, output: &Path) -> Result<()> {
    let (tx, mut rx) = mpsc::channel::<f32>(16);
    let fut = ctx
        .transcoder
        .transcode(input, output, ctx.format, ctx.quality, tx);
    tokio::pin!(fut);

    loop {
        tokio::select! {
            result = &mut fut => {
                result?;
                return Ok(());
            }
            Some(pct) = rx.recv() => {
                record(
                    ctx,
                    TaskStatus::Converting,
                    Some(50.0 + pct.clamp(0.0, 100.0) * 0.5),
                    None,
                    None,
                )
                .await?;
            }
        }
    }
}

/// Apply a task update and fan it out to subscribers
async fn record(
    ctx: &ConversionContext,
    status: TaskStatus,
    progress: Option<f32>,
    output_path: Option<PathBuf>,
    error_message: Option<String>,
) -> Result<()> {
    let snapshot = ctx
        .registry
        .update(&ctx.task_id, status, progress, output_path, error_message)
        .await?;
    ctx.notifier.publish(&snapshot).await;
    Ok(())
}

/// Mark the task failed and clean up whatever it left on disk
async fn fail(ctx: &ConversionContext, cause: Error) {
    error!(task_id = %ctx.task_id, error = %cause, "conversion task failed");
    remove_task_artifacts(&ctx.config.storage.output_dir, ctx.task_id.as_str()).await;

    match ctx
        .registry
        .update(
            &ctx.task_id,
            TaskStatus::Failed,
            None,
            None,
            Some(cause.to_string()),
        )
        .await
    {
        Ok(snapshot) => ctx.notifier.publish(&snapshot).await,
        Err(e) => {
            error!(task_id = %ctx.task_id, error = %e, "could not record task failure");
        }
    }
}

/// Delete any files a task produced, both the source download and the
/// (possibly partial) transcode output
async fn remove_task_artifacts(dir: &Path, task_id: &str) {
    let Ok(mut entries) = tokio::fs::read_dir(dir).await else {
        return;
    };
    while let Ok(Some(entry)) = entries.next_entry().await {
        let name = entry.file_name();
        let Some(name) = name.to_str() else { continue };
        if !name.starts_with(task_id) {
            continue;
        }
        if let Err(e) = tokio::fs::remove_file(entry.path()).await {
            warn!(path = %entry.path().display(), error = %e, "failed to remove task artifact");
        }
    }
}
