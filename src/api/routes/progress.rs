//! Progress streaming handler.

use crate::api::AppState;
use crate::error::Error;
use crate::types::TaskId;
use axum::{
    extract::{Path, State},
    response::sse::{Event as SseEvent, KeepAlive, Sse},
};
use futures::StreamExt;
use std::convert::Infallible;

/// GET /api/progress/{task_id} - Server-sent task progress stream
///
/// Emits the task's current snapshot immediately, then every subsequent
/// update. The stream ends after the terminal snapshot has been delivered;
/// subscribing to an unknown or already-pruned task is a 404.
#[utoipa::path(
    get,
    path = "/api/progress/{task_id}",
    tag = "videos",
    params(
        ("task_id" = String, Path, description = "Task identifier returned by /api/convert")
    ),
    responses(
        (status = 200, description = "Snapshot stream (text/event-stream)", content_type = "text/event-stream"),
        (status = 404, description = "Unknown task", body = crate::error::ApiError)
    )
)]
pub async fn progress_stream(
    State(state): State<AppState>,
    Path(task_id): Path<String>,
) -> Result<Sse<impl futures::Stream<Item = Result<SseEvent, Infallible>>>, Error> {
    let receiver = state.converter.subscribe(&TaskId::from(task_id)).await?;

    // Emit the current snapshot immediately, then every change. A terminal
    // snapshot ends the stream on the spot; waiting for the next change
    // would hang, since a terminal task never publishes again
    let snapshots = futures::stream::unfold(Some((receiver, true)), |state| async move {
        let (mut rx, first) = state?;
        if !first && rx.changed().await.is_err() {
            return None;
        }
        let snapshot = rx.borrow_and_update().clone();
        let next = if snapshot.status.is_terminal() {
            None
        } else {
            Some((rx, false))
        };
        Some((snapshot, next))
    });

    let sse_stream = snapshots.filter_map(|snapshot| {
        let event = match serde_json::to_string(&snapshot) {
            Ok(json) => Some(Ok(SseEvent::default().event("progress").data(json))),
            Err(e) => {
                tracing::warn!(task_id = %snapshot.id, error = %e, "failed to serialize snapshot");
                None
            }
        };
        futures::future::ready(event)
    });

    Ok(Sse::new(sse_stream).keep_alive(KeepAlive::default()))
}
