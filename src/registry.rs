//! In-memory task registry
//!
//! Holds one [`TaskSnapshot`] per conversion task. All reads and writes go
//! through this registry so the API, the orchestrator, and the sweeper agree
//! on task state. Records live in a `RwLock`-guarded map; nothing is
//! persisted, a restart forgets all tasks.

use crate::error::{Error, Result};
use crate::types::{TaskId, TaskSnapshot, TaskStatus};
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;
use tokio::sync::RwLock;

/// Registry of all known conversion tasks
#[derive(Default)]
pub struct TaskRegistry {
    tasks: RwLock<HashMap<TaskId, TaskSnapshot>>,
}

impl TaskRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a new pending task and return its snapshot.
    ///
    /// Generated identifiers are re-rolled on the (unlikely) collision with a
    /// live task.
    pub async fn create(&self) -> TaskSnapshot {
        let mut tasks = self.tasks.write().await;

        let mut id = TaskId::generate();
        while tasks.contains_key(&id) {
            id = TaskId::generate();
        }

        let snapshot = TaskSnapshot {
            id: id.clone(),
            status: TaskStatus::Pending,
            progress: 0.0,
            output_path: None,
            error_message: None,
            created_at: Utc::now(),
        };
        tasks.insert(id, snapshot.clone());
        snapshot
    }

    /// Look up a task by id
    pub async fn get(&self, id: &TaskId) -> Option<TaskSnapshot> {
        self.tasks.read().await.get(id).cloned()
    }

    /// Number of tracked tasks (terminal records included until pruned)
    pub async fn len(&self) -> usize {
        self.tasks.read().await.len()
    }

    /// Whether the registry holds no tasks
    pub async fn is_empty(&self) -> bool {
        self.tasks.read().await.is_empty()
    }

    /// Apply a state update to a task and return the updated snapshot.
    ///
    /// Status changes must follow the forward-only lifecycle; a repeated
    /// status is accepted as a progress-only update. Progress never moves
    /// backwards: a lower value than the stored one is clamped to the stored
    /// value. Terminal statuses pin progress (100 on completion, frozen on
    /// failure).
    pub async fn update(
        &self,
        id: &TaskId,
        status: TaskStatus,
        progress: Option<f32>,
        output_path: Option<PathBuf>,
        error_message: Option<String>,
    ) -> Result<TaskSnapshot> {
        let mut tasks = self.tasks.write().await;
        let record = tasks
            .get_mut(id)
            .ok_or_else(|| Error::NotFound(format!("task {id} not found")))?;

        if record.status != status && !record.status.can_transition_to(status) {
            return Err(Error::InvalidTransition {
                from: record.status.as_str().to_string(),
                to: status.as_str().to_string(),
            });
        }

        record.status = status;
        match status {
            TaskStatus::Completed => record.progress = 100.0,
            TaskStatus::Failed => {}
            _ => {
                if let Some(value) = progress {
                    let clamped = value.clamp(0.0, 100.0);
                    if clamped > record.progress {
                        record.progress = clamped;
                    }
                }
            }
        }
        if let Some(path) = output_path {
            record.output_path = Some(path);
        }
        if let Some(message) = error_message {
            record.error_message = Some(message);
        }

        Ok(record.clone())
    }

    /// Drop terminal task records older than the retention window.
    ///
    /// Returns the ids that were removed so callers can tear down the
    /// matching progress channels. In-flight tasks are never pruned no matter
    /// their age.
    pub async fn prune_terminal_older_than(
        &self,
        retention: Duration,
        now: DateTime<Utc>,
    ) -> Vec<TaskId> {
        let Ok(retention) = chrono::Duration::from_std(retention) else {
            tracing::debug!("retention window out of range, keeping all task records");
            return Vec::new();
        };
        let Some(cutoff) = now.checked_sub_signed(retention) else {
            tracing::debug!("retention window out of range, keeping all task records");
            return Vec::new();
        };
        let mut tasks = self.tasks.write().await;

        let expired: Vec<TaskId> = tasks
            .iter()
            .filter(|(_, snapshot)| snapshot.status.is_terminal() && snapshot.created_at < cutoff)
            .map(|(id, _)| id.clone())
            .collect();
        for id in &expired {
            tasks.remove(id);
        }
        expired
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn create_returns_pending_snapshot() {
        let registry = TaskRegistry::new();
        let snapshot = registry.create().await;

        assert_eq!(snapshot.status, TaskStatus::Pending);
        assert_eq!(snapshot.progress, 0.0);
        assert!(snapshot.output_path.is_none());
        assert!(snapshot.error_message.is_none());
        assert_eq!(registry.len().await, 1);
    }

    #[tokio::test]
    async fn get_unknown_task_returns_none() {
        let registry = TaskRegistry::new();
        assert!(registry.get(&TaskId::from("nope")).await.is_none());
    }

    #[tokio::test]
    async fn update_unknown_task_is_not_found() {
        let registry = TaskRegistry::new();
        let err = registry
            .update(&TaskId::from("nope"), TaskStatus::Downloading, None, None, None)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
    }

    #[tokio::test]
    async fn forward_transitions_are_accepted() {
        let registry = TaskRegistry::new();
        let task = registry.create().await;

        for status in [
            TaskStatus::Downloading,
            TaskStatus::Converting,
            TaskStatus::Completed,
        ] {
            let snapshot = registry
                .update(&task.id, status, None, None, None)
                .await
                .unwrap();
            assert_eq!(snapshot.status, status);
        }
    }

    #[tokio::test]
    async fn backward_transition_is_rejected() {
        let registry = TaskRegistry::new();
        let task = registry.create().await;
        registry
            .update(&task.id, TaskStatus::Downloading, None, None, None)
            .await
            .unwrap();
        registry
            .update(&task.id, TaskStatus::Converting, None, None, None)
            .await
            .unwrap();

        let err = registry
            .update(&task.id, TaskStatus::Downloading, None, None, None)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::InvalidTransition { .. }));
    }

    #[tokio::test]
    async fn skipped_transition_is_rejected() {
        let registry = TaskRegistry::new();
        let task = registry.create().await;

        let err = registry
            .update(&task.id, TaskStatus::Converting, None, None, None)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::InvalidTransition { .. }));
    }

    #[tokio::test]
    async fn terminal_status_rejects_further_transitions() {
        let registry = TaskRegistry::new();
        let task = registry.create().await;
        registry
            .update(&task.id, TaskStatus::Downloading, None, None, None)
            .await
            .unwrap();
        registry
            .update(
                &task.id,
                TaskStatus::Failed,
                None,
                None,
                Some("boom".into()),
            )
            .await
            .unwrap();

        let err = registry
            .update(&task.id, TaskStatus::Converting, None, None, None)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::InvalidTransition { .. }));
    }

    #[tokio::test]
    async fn progress_never_moves_backwards() {
        let registry = TaskRegistry::new();
        let task = registry.create().await;

        registry
            .update(&task.id, TaskStatus::Downloading, Some(40.0), None, None)
            .await
            .unwrap();
        let snapshot = registry
            .update(&task.id, TaskStatus::Downloading, Some(25.0), None, None)
            .await
            .unwrap();
        assert_eq!(snapshot.progress, 40.0);

        let snapshot = registry
            .update(&task.id, TaskStatus::Downloading, Some(60.0), None, None)
            .await
            .unwrap();
        assert_eq!(snapshot.progress, 60.0);
    }

    #[tokio::test]
    async fn progress_is_clamped_to_valid_range() {
        let registry = TaskRegistry::new();
        let task = registry.create().await;

        let snapshot = registry
            .update(&task.id, TaskStatus::Downloading, Some(250.0), None, None)
            .await
            .unwrap();
        assert_eq!(snapshot.progress, 100.0);
    }

    #[tokio::test]
    async fn completion_pins_progress_at_hundred() {
        let registry = TaskRegistry::new();
        let task = registry.create().await;
        registry
            .update(&task.id, TaskStatus::Downloading, Some(50.0), None, None)
            .await
            .unwrap();
        registry
            .update(&task.id, TaskStatus::Converting, Some(80.0), None, None)
            .await
            .unwrap();

        let snapshot = registry
            .update(
                &task.id,
                TaskStatus::Completed,
                None,
                Some(PathBuf::from("/tmp/out.mp4")),
                None,
            )
            .await
            .unwrap();
        assert_eq!(snapshot.progress, 100.0);
        assert_eq!(snapshot.output_path, Some(PathBuf::from("/tmp/out.mp4")));
    }

    #[tokio::test]
    async fn failure_freezes_progress() {
        let registry = TaskRegistry::new();
        let task = registry.create().await;
        registry
            .update(&task.id, TaskStatus::Downloading, Some(33.0), None, None)
            .await
            .unwrap();

        let snapshot = registry
            .update(
                &task.id,
                TaskStatus::Failed,
                Some(99.0),
                None,
                Some("yt-dlp exited with status 1".into()),
            )
            .await
            .unwrap();
        assert_eq!(snapshot.progress, 33.0);
        assert_eq!(
            snapshot.error_message.as_deref(),
            Some("yt-dlp exited with status 1")
        );
    }

    #[tokio::test]
    async fn prune_removes_only_old_terminal_tasks() {
        let registry = TaskRegistry::new();
        let done = registry.create().await;
        let running = registry.create().await;
        registry
            .update(&done.id, TaskStatus::Downloading, None, None, None)
            .await
            .unwrap();
        registry
            .update(&done.id, TaskStatus::Converting, None, None, None)
            .await
            .unwrap();
        registry
            .update(&done.id, TaskStatus::Completed, None, None, None)
            .await
            .unwrap();
        registry
            .update(&running.id, TaskStatus::Downloading, None, None, None)
            .await
            .unwrap();

        let later = Utc::now() + chrono::Duration::hours(2);
        let removed = registry
            .prune_terminal_older_than(Duration::from_secs(3600), later)
            .await;

        assert_eq!(removed, vec![done.id.clone()]);
        assert!(registry.get(&done.id).await.is_none());
        assert!(registry.get(&running.id).await.is_some());
    }

    #[tokio::test]
    async fn prune_keeps_recent_terminal_tasks() {
        let registry = TaskRegistry::new();
        let done = registry.create().await;
        registry
            .update(&done.id, TaskStatus::Downloading, None, None, None)
            .await
            .unwrap();
        registry
            .update(
                &done.id,
                TaskStatus::Failed,
                None,
                None,
                Some("err".into()),
            )
            .await
            .unwrap();

        let removed = registry
            .prune_terminal_older_than(Duration::from_secs(3600), Utc::now())
            .await;
        assert!(removed.is_empty());
        assert!(registry.get(&done.id).await.is_some());
    }

    #[tokio::test]
    async fn prune_with_out_of_range_retention_keeps_everything() {
        let registry = TaskRegistry::new();
        let done = registry.create().await;
        registry
            .update(&done.id, TaskStatus::Downloading, None, None, None)
            .await
            .unwrap();
        registry
            .update(
                &done.id,
                TaskStatus::Failed,
                None,
                None,
                Some("err".into()),
            )
            .await
            .unwrap();

        // A retention beyond the representable range must not panic or prune
        let removed = registry
            .prune_terminal_older_than(Duration::MAX, Utc::now())
            .await;
        assert!(removed.is_empty());
        assert!(registry.get(&done.id).await.is_some());
    }
}
