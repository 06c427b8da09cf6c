//! Live progress over Server-Sent Events.

use std::convert::Infallible;

use axum::extract::{Path, State};
use axum::response::sse::{Event, KeepAlive, Sse};
use futures::Stream;
use tracing::debug;

use crate::api::state::AppState;
use crate::error::{PoscanError, Result};
use crate::models::ProgressEvent;

fn sse_event(event: &ProgressEvent) -> std::result::Result<Event, Infallible> {
    // ProgressEvent has no non-serializable fields; fall back to a bare
    // event rather than killing the stream if that ever changes.
    Ok(Event::default()
        .json_data(event)
        .unwrap_or_else(|_| Event::default()))
}

/// `GET /api/job/{id}/stream`
///
/// Emits a snapshot of the job's current state, then every progress
/// event until the job reaches a terminal status. Disconnecting drops
/// the subscription.
pub async fn job_stream(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Sse<impl Stream<Item = std::result::Result<Event, Infallible>>>> {
    // Subscribe before reading the snapshot so no transition published
    // in between is lost.
    let mut subscription = state.bus.subscribe(&id).await;

    let job = state
        .db
        .get_job(&id)
        .await?
        .ok_or_else(|| PoscanError::NotFound(format!("Job {id} not found")))?;
    let last_message = state
        .db
        .latest_log(&id)
        .await?
        .map(|entry| entry.message)
        .unwrap_or_else(|| "connected".to_string());
    let snapshot = ProgressEvent::new(job.status, last_message);
    let terminal = job.status.is_terminal();

    let stream = async_stream::stream! {
        yield sse_event(&snapshot);
        if terminal {
            return;
        }
        while let Some(event) = subscription.recv().await {
            let done = event.progress_percent >= 100;
            yield sse_event(&event);
            if done {
                break;
            }
        }
        debug!(job_id = %subscription.job_id(), "Progress stream closed");
    };

    Ok(Sse::new(stream).keep_alive(KeepAlive::default()))
}
