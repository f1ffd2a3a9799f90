//! Core conversion service
//!
//! [`VideoConverter`] owns the task registry, the progress notifier, the
//! fetch/transcode collaborators, and the cleanup sweeper. The API layer is a
//! thin shell over this type; everything stateful happens here.

mod orchestrator;


use crate::config::Config;
use crate::error::{Error, Result};
use crate::fetcher::{MediaFetcher, YtDlpFetcher};
use crate::notifier::ProgressNotifier;
use crate::registry::TaskRegistry;
use crate::sweeper::CleanupSweeper;
use crate::transcoder::{FfmpegTranscoder, Transcoder};
use crate::types::{FetchedMedia, OutputFormat, TaskId, TaskSnapshot, VideoMetadata, VideoQuality};
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::sync::{Mutex, mpsc, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use url::Url;

/// How long shutdown waits for an in-flight conversion before aborting it
const SHUTDOWN_TASK_TIMEOUT: Duration = Duration::from_secs(30);

/// Main conversion service instance
pub struct VideoConverter {
    /// Service configuration
    pub config: Arc<Config>,
    pub(crate) registry: Arc<TaskRegistry>,
    pub(crate) notifier: Arc<ProgressNotifier>,
    pub(crate) fetcher: Arc<dyn MediaFetcher>,
    pub(crate) transcoder: Arc<dyn Transcoder>,
    /// Join handles of running conversion tasks, keyed by task id
    active_tasks: Arc<Mutex<HashMap<TaskId, JoinHandle<()>>>>,
    /// Cleared during shutdown so no new work is admitted
    accepting_new: AtomicBool,
    shutdown: CancellationToken,
    sweeper_handle: Mutex<Option<JoinHandle<()>>>,
}

impl VideoConverter {
    /// Create a converter with the real yt-dlp and ffmpeg collaborators and
    /// start the cleanup sweeper.
    ///
    /// Fails when a required binary cannot be resolved or the output
    /// directory cannot be created.
    pub async fn new(config: Config) -> Result<Arc<Self>> {
        let fetcher = Arc::new(YtDlpFetcher::from_config(&config.fetch)?);
        let transcoder = Arc::new(FfmpegTranscoder::from_config(&config.transcode)?);

        let converter = Self::with_collaborators(config, fetcher, transcoder).await?;
        converter.start_sweeper().await;
        Ok(converter)
    }

    /// Create a converter with injected fetch/transcode implementations.
    ///
    /// The cleanup sweeper is not started; call [`start_sweeper`](Self::start_sweeper)
    /// if periodic cleanup is wanted.
    pub async fn with_collaborators(
        config: Config,
        fetcher: Arc<dyn MediaFetcher>,
        transcoder: Arc<dyn Transcoder>,
    ) -> Result<Arc<Self>> {
        tokio::fs::create_dir_all(&config.storage.output_dir)
            .await
            .map_err(|e| {
                Error::Io(std::io::Error::new(
                    e.kind(),
                    format!(
                        "failed to create output directory '{}': {}",
                        config.storage.output_dir.display(),
                        e
                    ),
                ))
            })?;

        Ok(Arc::new(Self {
            config: Arc::new(config),
            registry: Arc::new(TaskRegistry::new()),
            notifier: Arc::new(ProgressNotifier::new()),
            fetcher,
            transcoder,
            active_tasks: Arc::new(Mutex::new(HashMap::new())),
            accepting_new: AtomicBool::new(true),
            shutdown: CancellationToken::new(),
            sweeper_handle: Mutex::new(None),
        }))
    }

    /// Start the background cleanup sweeper
    pub async fn start_sweeper(self: &Arc<Self>) {
        let sweeper = CleanupSweeper::new(
            self.config.storage.output_dir.clone(),
            self.config.cleanup.interval,
            self.config.cleanup.retention,
            self.registry.clone(),
            self.notifier.clone(),
            self.shutdown.clone(),
        );
        let handle = tokio::spawn(sweeper.run());
        *self.sweeper_handle.lock().await = Some(handle);
    }

    /// Probe a URL for metadata without downloading anything
    pub async fn metadata(&self, url: &str) -> Result<VideoMetadata> {
        self.ensure_accepting()?;
        self.validate_url(url)?;
        Ok(self.fetcher.metadata(url).await?)
    }

    /// Start a background conversion task and return its initial snapshot.
    ///
    /// The URL and format are validated before any task is created; a
    /// rejected request never produces a task id.
    pub async fn start_conversion(
        self: &Arc<Self>,
        url: &str,
        format: OutputFormat,
        quality: VideoQuality,
    ) -> Result<TaskSnapshot> {
        self.ensure_accepting()?;
        self.validate_url(url)?;

        let snapshot = self.registry.create().await;
        self.notifier.register(snapshot.clone()).await;

        let ctx = orchestrator::ConversionContext {
            task_id: snapshot.id.clone(),
            url: url.to_string(),
            format,
            quality,
            config: self.config.clone(),
            registry: self.registry.clone(),
            notifier: self.notifier.clone(),
            fetcher: self.fetcher.clone(),
            transcoder: self.transcoder.clone(),
        };

        let task_id = snapshot.id.clone();
        let active_tasks = self.active_tasks.clone();
        // The lock is held across spawn and insert so the task's own removal
        // cannot run before its handle is in the map
        let mut active = self.active_tasks.lock().await;
        let handle = tokio::spawn(async move {
            let id = ctx.task_id.clone();
            orchestrator::run(ctx).await;
            active_tasks.lock().await.remove(&id);
        });
        active.insert(task_id, handle);
        drop(active);

        tracing::info!(task_id = %snapshot.id, %format, "conversion task started");
        Ok(snapshot)
    }

    /// Look up the current snapshot of a task
    pub async fn get_task(&self, id: &TaskId) -> Result<TaskSnapshot> {
        self.registry
            .get(id)
            .await
            .ok_or_else(|| Error::NotFound(format!("task {id} not found")))
    }

    /// Subscribe to live snapshot updates for a task
    pub async fn subscribe(&self, id: &TaskId) -> Result<watch::Receiver<TaskSnapshot>> {
        self.notifier.subscribe(id).await
    }

    /// Number of tracked tasks, terminal records included
    pub async fn task_count(&self) -> usize {
        self.registry.len().await
    }

    /// Number of conversions currently running
    pub async fn active_task_count(&self) -> usize {
        self.active_tasks.lock().await.len()
    }

    /// Fetch a URL synchronously without transcoding.
    ///
    /// Used by the direct-download endpoint. The size cap applies; an
    /// oversized artifact is deleted before the error is returned.
    pub async fn fetch_direct(&self, url: &str, format: OutputFormat) -> Result<FetchedMedia> {
        self.ensure_accepting()?;
        self.validate_url(url)?;

        let stem = format!("dl-{}", TaskId::generate());
        let (tx, mut rx) = mpsc::channel(16);
        // Nothing consumes direct-download progress; keep the channel drained
        // so the fetcher never blocks on it
        let drain = tokio::spawn(async move { while rx.recv().await.is_some() {} });

        let result = self
            .fetcher
            .download(url, &self.config.storage.output_dir, &stem, format, tx)
            .await;
        let _ = drain.await;
        let fetched = result?;

        let limit = self.config.storage.max_file_size_bytes;
        if fetched.size_bytes > limit {
            if let Err(e) = tokio::fs::remove_file(&fetched.path).await {
                tracing::warn!(
                    path = %fetched.path.display(),
                    error = %e,
                    "failed to remove oversized download"
                );
            }
            return Err(Error::FileTooLarge {
                size_bytes: fetched.size_bytes,
                limit_bytes: limit,
            });
        }
        Ok(fetched)
    }

    /// Gracefully shut down the converter.
    ///
    /// New work is rejected immediately; in-flight conversions get a bounded
    /// grace period before being aborted. The sweeper is stopped first.
    pub async fn shutdown(&self) {
        tracing::info!("initiating graceful shutdown");
        self.accepting_new.store(false, Ordering::SeqCst);
        self.shutdown.cancel();

        if let Some(handle) = self.sweeper_handle.lock().await.take() {
            let _ = handle.await;
        }

        let handles: Vec<(TaskId, JoinHandle<()>)> =
            self.active_tasks.lock().await.drain().collect();
        for (id, handle) in handles {
            let abort = handle.abort_handle();
            match tokio::time::timeout(SHUTDOWN_TASK_TIMEOUT, handle).await {
                Ok(_) => {}
                Err(_) => {
                    tracing::warn!(task_id = %id, "conversion did not finish in time, aborting");
                    abort.abort();
                }
            }
        }

        tracing::info!("graceful shutdown complete");
    }

    /// Spawn the REST API server in a background task
    pub fn spawn_api_server(self: &Arc<Self>) -> JoinHandle<Result<()>> {
        let converter = self.clone();
        let config = self.config.clone();
        tokio::spawn(async move { crate::api::start_api_server(converter, config).await })
    }

    fn ensure_accepting(&self) -> Result<()> {
        if self.accepting_new.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(Error::ShuttingDown)
        }
    }

    /// Check that a URL is well formed and its host is on the allow-list.
    ///
    /// A configured domain matches itself and any subdomain, so
    /// `youtube.com` admits `www.youtube.com` and `music.youtube.com`.
    pub fn validate_url(&self, raw: &str) -> Result<()> {
        let parsed = Url::parse(raw).map_err(|_| Error::InvalidUrl(raw.to_string()))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(Error::InvalidUrl(raw.to_string()));
        }
        let host = parsed
            .host_str()
            .ok_or_else(|| Error::InvalidUrl(raw.to_string()))?
            .to_ascii_lowercase();

        let allowed = self.config.fetch.allowed_domains.iter().any(|domain| {
            let domain = domain.to_ascii_lowercase();
            host == domain || host.ends_with(&format!(".{domain}"))
        });
        if allowed {
            Ok(())
        } else {
            Err(Error::UnsupportedDomain { domain: host })
        }
    }
}
