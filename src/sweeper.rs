//! Periodic cleanup of expired output files and task records
//!
//! Converted files are only meant to live long enough to be collected by the
//! client. The sweeper wakes on a fixed interval, deletes output files whose
//! modification time has fallen outside the retention window, and drops the
//! matching terminal task records (with their progress channels) from memory.

use crate::notifier::ProgressNotifier;
use crate::registry::TaskRegistry;
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, SystemTime};
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Result of a single sweep over the output directory
#[derive(Debug, Default, PartialEq, Eq)]
pub struct SweepStats {
    /// Files removed this pass
    pub files_removed: usize,
    /// Files that could not be removed (logged individually)
    pub failures: usize,
}

/// Delete files in `dir` whose mtime is strictly older than `retention`
/// relative to `now`.
///
/// Subdirectories are left alone. Files that vanish between the scan and the
/// delete are not an error. The clock is a parameter so expiry logic can be
/// tested without manipulating real file ages.
pub fn sweep(dir: &Path, retention: Duration, now: SystemTime) -> SweepStats {
    let mut stats = SweepStats::default();
    let entries = match std::fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) => {
            warn!(dir = %dir.display(), error = %e, "cannot read output directory for cleanup");
            return stats;
        }
    };

    for entry in entries.flatten() {
        let path = entry.path();
        let Ok(metadata) = entry.metadata() else {
            continue;
        };
        if !metadata.is_file() {
            continue;
        }
        let Ok(modified) = metadata.modified() else {
            continue;
        };
        let age = match now.duration_since(modified) {
            Ok(age) => age,
            // mtime in the future, leave it alone
            Err(_) => continue,
        };
        if age <= retention {
            continue;
        }

        match std::fs::remove_file(&path) {
            Ok(()) => {
                debug!(path = %path.display(), age_secs = age.as_secs(), "removed expired file");
                stats.files_removed += 1;
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => {
                warn!(path = %path.display(), error = %e, "failed to remove expired file");
                stats.failures += 1;
            }
        }
    }

    stats
}

/// Background task running [`sweep`] plus registry pruning on an interval
pub struct CleanupSweeper {
    output_dir: std::path::PathBuf,
    interval: Duration,
    retention: Duration,
    registry: Arc<TaskRegistry>,
    notifier: Arc<ProgressNotifier>,
    shutdown: CancellationToken,
}

impl CleanupSweeper {
    /// Create a sweeper over the given output directory
    pub fn new(
        output_dir: std::path::PathBuf,
        interval: Duration,
        retention: Duration,
        registry: Arc<TaskRegistry>,
        notifier: Arc<ProgressNotifier>,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            output_dir,
            interval,
            retention,
            registry,
            notifier,
            shutdown,
        }
    }

    /// Run the sweep loop until the shutdown token fires.
    ///
    /// Each pass removes expired files first, then prunes terminal task
    /// records older than the retention window and tears down their progress
    /// channels.
    pub async fn run(self) {
        info!(
            interval_secs = self.interval.as_secs(),
            retention_secs = self.retention.as_secs(),
            "cleanup sweeper started"
        );

        loop {
            tokio::select! {
                _ = sleep(self.interval) => {}
                _ = self.shutdown.cancelled() => {
                    info!("cleanup sweeper stopped");
                    return;
                }
            }

            self.sweep_once().await;
        }
    }

    async fn sweep_once(&self) {
        let dir = self.output_dir.clone();
        let retention = self.retention;
        let stats = tokio::task::spawn_blocking(move || sweep(&dir, retention, SystemTime::now()))
            .await
            .unwrap_or_default();

        let pruned = self
            .registry
            .prune_terminal_older_than(self.retention, chrono::Utc::now())
            .await;
        for id in &pruned {
            self.notifier.remove(id).await;
        }

        if stats.files_removed > 0 || stats.failures > 0 || !pruned.is_empty() {
            info!(
                files_removed = stats.files_removed,
                failures = stats.failures,
                tasks_pruned = pruned.len(),
                "cleanup sweep finished"
            );
        }
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::TaskStatus;

    #[test]
    fn sweep_removes_only_expired_files() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("old.mp4"), b"old").unwrap();
        std::fs::write(dir.path().join("fresh.mp3"), b"fresh").unwrap();

        // Both files were just written; advance the clock instead of aging
        // the files. Everything is expired two hours from now.
        let future = SystemTime::now() + Duration::from_secs(7200);
        let stats = sweep(dir.path(), Duration::from_secs(3600), future);

        assert_eq!(stats.files_removed, 2);
        assert_eq!(stats.failures, 0);
        assert!(!dir.path().join("old.mp4").exists());
    }

    #[test]
    fn sweep_with_mixed_ages_removes_only_the_older_file() {
        let dir = tempfile::tempdir().unwrap();
        let old = dir.path().join("old.mp4");
        let fresh = dir.path().join("fresh.mp3");
        std::fs::write(&old, b"old").unwrap();
        std::fs::write(&fresh, b"fresh").unwrap();

        // One file aged 90 minutes, the other 30, against a 60 minute window
        let now = SystemTime::now();
        std::fs::File::options()
            .write(true)
            .open(&old)
            .unwrap()
            .set_modified(now - Duration::from_secs(90 * 60))
            .unwrap();
        std::fs::File::options()
            .write(true)
            .open(&fresh)
            .unwrap()
            .set_modified(now - Duration::from_secs(30 * 60))
            .unwrap();

        let stats = sweep(dir.path(), Duration::from_secs(60 * 60), now);

        assert_eq!(stats.files_removed, 1);
        assert!(!old.exists());
        assert!(fresh.exists());
    }

    #[test]
    fn sweep_keeps_files_within_retention() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("keep.mp4"), b"keep").unwrap();

        let stats = sweep(dir.path(), Duration::from_secs(3600), SystemTime::now());
        assert_eq!(stats.files_removed, 0);
        assert!(dir.path().join("keep.mp4").exists());
    }

    #[test]
    fn sweep_skips_subdirectories() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("nested")).unwrap();

        let future = SystemTime::now() + Duration::from_secs(7200);
        let stats = sweep(dir.path(), Duration::from_secs(3600), future);

        assert_eq!(stats.files_removed, 0);
        assert!(dir.path().join("nested").exists());
    }

    #[test]
    fn sweep_of_missing_directory_is_harmless() {
        let stats = sweep(
            Path::new("/nonexistent/vidxpress-test"),
            Duration::from_secs(60),
            SystemTime::now(),
        );
        assert_eq!(stats, SweepStats::default());
    }

    #[tokio::test]
    async fn sweeper_stops_on_shutdown_signal() {
        let dir = tempfile::tempdir().unwrap();
        let shutdown = CancellationToken::new();
        let sweeper = CleanupSweeper::new(
            dir.path().to_path_buf(),
            Duration::from_secs(3600),
            Duration::from_secs(3600),
            Arc::new(TaskRegistry::new()),
            Arc::new(ProgressNotifier::new()),
            shutdown.clone(),
        );

        let handle = tokio::spawn(sweeper.run());
        shutdown.cancel();

        tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .expect("sweeper should exit promptly on shutdown")
            .unwrap();
    }

    #[tokio::test]
    async fn sweep_once_prunes_expired_terminal_tasks() {
        let dir = tempfile::tempdir().unwrap();
        let registry = Arc::new(TaskRegistry::new());
        let notifier = Arc::new(ProgressNotifier::new());

        let task = registry.create().await;
        notifier.register(task.clone()).await;
        registry
            .update(&task.id, TaskStatus::Downloading, None, None, None)
            .await
            .unwrap();
        registry
            .update(&task.id, TaskStatus::Failed, None, None, Some("err".into()))
            .await
            .unwrap();

        let sweeper = CleanupSweeper::new(
            dir.path().to_path_buf(),
            Duration::from_secs(3600),
            // Zero retention expires the record on the next pass
            Duration::from_secs(0),
            registry.clone(),
            notifier.clone(),
            CancellationToken::new(),
        );
        sweeper.sweep_once().await;

        assert!(registry.get(&task.id).await.is_none());
        assert!(notifier.subscribe(&task.id).await.is_err());
    }
}
