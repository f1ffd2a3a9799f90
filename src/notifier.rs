//! Per-task progress channels
//!
//! Each task gets a `tokio::sync::watch` channel carrying its latest
//! [`TaskSnapshot`]. Watch semantics match what progress streaming needs:
//! publishing never blocks, slow subscribers skip straight to the newest
//! value, and a late subscriber immediately sees the current state instead
//! of waiting for the next update.

use crate::error::{Error, Result};
use crate::types::{TaskId, TaskSnapshot};
use std::collections::HashMap;
use tokio::sync::{RwLock, watch};

/// Fan-out point for task progress updates
#[derive(Default)]
pub struct ProgressNotifier {
    channels: RwLock<HashMap<TaskId, watch::Sender<TaskSnapshot>>>,
}

impl ProgressNotifier {
    /// Create a notifier with no channels
    pub fn new() -> Self {
        Self::default()
    }

    /// Open a channel for a newly created task, seeded with its snapshot
    pub async fn register(&self, snapshot: TaskSnapshot) {
        let (tx, _rx) = watch::channel(snapshot.clone());
        self.channels.write().await.insert(snapshot.id, tx);
    }

    /// Publish an updated snapshot to the task's channel.
    ///
    /// Publishing to a task without a channel is a no-op; the update already
    /// landed in the registry, so nothing is lost.
    pub async fn publish(&self, snapshot: &TaskSnapshot) {
        let channels = self.channels.read().await;
        match channels.get(&snapshot.id) {
            Some(tx) => {
                tx.send_replace(snapshot.clone());
            }
            None => {
                tracing::debug!(task_id = %snapshot.id, "no progress channel for task");
            }
        }
    }

    /// Subscribe to a task's progress channel.
    ///
    /// The receiver's current value is the latest published snapshot, so new
    /// subscribers see the task state right away.
    pub async fn subscribe(&self, id: &TaskId) -> Result<watch::Receiver<TaskSnapshot>> {
        let channels = self.channels.read().await;
        channels
            .get(id)
            .map(watch::Sender::subscribe)
            .ok_or_else(|| Error::NotFound(format!("task {id} not found")))
    }

    /// Tear down a task's channel, disconnecting any remaining subscribers
    pub async fn remove(&self, id: &TaskId) {
        self.channels.write().await.remove(id);
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::TaskStatus;
    use chrono::Utc;

    fn snapshot(id: &str, status: TaskStatus, progress: f32) -> TaskSnapshot {
        TaskSnapshot {
            id: TaskId::from(id),
            status,
            progress,
            output_path: None,
            error_message: None,
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn subscriber_sees_seeded_snapshot_immediately() {
        let notifier = ProgressNotifier::new();
        notifier
            .register(snapshot("abc", TaskStatus::Pending, 0.0))
            .await;

        let rx = notifier.subscribe(&TaskId::from("abc")).await.unwrap();
        assert_eq!(rx.borrow().status, TaskStatus::Pending);
    }

    #[tokio::test]
    async fn publish_updates_current_value() {
        let notifier = ProgressNotifier::new();
        notifier
            .register(snapshot("abc", TaskStatus::Pending, 0.0))
            .await;
        let mut rx = notifier.subscribe(&TaskId::from("abc")).await.unwrap();

        notifier
            .publish(&snapshot("abc", TaskStatus::Downloading, 25.0))
            .await;

        rx.changed().await.unwrap();
        let current = rx.borrow_and_update().clone();
        assert_eq!(current.status, TaskStatus::Downloading);
        assert_eq!(current.progress, 25.0);
    }

    #[tokio::test]
    async fn slow_subscriber_only_sees_latest() {
        let notifier = ProgressNotifier::new();
        notifier
            .register(snapshot("abc", TaskStatus::Pending, 0.0))
            .await;
        let mut rx = notifier.subscribe(&TaskId::from("abc")).await.unwrap();

        for progress in [10.0, 20.0, 30.0] {
            notifier
                .publish(&snapshot("abc", TaskStatus::Downloading, progress))
                .await;
        }

        rx.changed().await.unwrap();
        assert_eq!(rx.borrow_and_update().progress, 30.0);
    }

    #[tokio::test]
    async fn publish_without_channel_is_silent() {
        let notifier = ProgressNotifier::new();
        // Must not panic or error
        notifier
            .publish(&snapshot("ghost", TaskStatus::Downloading, 10.0))
            .await;
    }

    #[tokio::test]
    async fn subscribe_unknown_task_is_not_found() {
        let notifier = ProgressNotifier::new();
        let err = notifier.subscribe(&TaskId::from("nope")).await.unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
    }

    #[tokio::test]
    async fn remove_disconnects_subscribers() {
        let notifier = ProgressNotifier::new();
        notifier
            .register(snapshot("abc", TaskStatus::Pending, 0.0))
            .await;
        let mut rx = notifier.subscribe(&TaskId::from("abc")).await.unwrap();

        notifier.remove(&TaskId::from("abc")).await;
        assert!(rx.changed().await.is_err());
    }
}
