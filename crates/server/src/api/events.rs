//! Streaming gateway: per-task SSE event feed and history.
//!
//! On connect the client receives the full historical log in order, then
//! the live feed with no gap and no duplicate (guaranteed by the event
//! bus's append/subscribe atomicity). The stream ends after a terminal
//! `completion` or `error` event, or when a slow client is disconnected
//! for backpressure.

use std::convert::Infallible;
use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::sse::{Event, KeepAlive, Sse},
    Json,
};
use futures::stream::Stream;
use tracing::{debug, warn};

use scrivano_core::{EventBusError, TaskEvent};

use crate::metrics::{
    SSE_BACKPRESSURE_DISCONNECTS, SSE_CONNECTIONS_ACTIVE, SSE_CONNECTIONS_TOTAL, SSE_EVENTS_SENT,
};
use crate::state::AppState;

use super::tasks::{error_response, ErrorResponse};

/// Decrements the active-connection gauge when the stream is dropped,
/// whether it ended normally or the client went away.
struct ConnectionGuard;

impl ConnectionGuard {
    fn new() -> Self {
        SSE_CONNECTIONS_TOTAL.inc();
        SSE_CONNECTIONS_ACTIVE.inc();
        ConnectionGuard
    }
}

impl Drop for ConnectionGuard {
    fn drop(&mut self) {
        SSE_CONNECTIONS_ACTIVE.dec();
    }
}

/// Long-lived SSE subscription to one task's events.
pub async fn stream_events(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, (StatusCode, Json<ErrorResponse>)>
{
    // Unknown task: close immediately with the not-found indication
    // instead of opening an empty stream.
    let subscription = state.orchestrator().subscribe(&id).map_err(error_response)?;

    debug!(task_id = %id, "event stream opened");
    let guard = ConnectionGuard::new();

    let stream = futures::stream::unfold(
        Some((subscription, guard, id)),
        |connection| async move {
            let (mut subscription, guard, task_id) = connection?;

            match subscription.next().await {
                Ok(Some(event)) => {
                    let terminal = event.is_terminal();
                    let sse_event = to_sse_event(&event);

                    // Keep the connection state unless this event closes
                    // the stream.
                    let next_state = if terminal {
                        debug!(task_id = %task_id, "event stream closing after terminal event");
                        None
                    } else {
                        Some((subscription, guard, task_id))
                    };
                    Some((Ok::<_, Infallible>(sse_event), next_state))
                }
                Ok(None) => None,
                Err(EventBusError::Backpressure { skipped }) => {
                    warn!(task_id = %task_id, skipped, "subscriber disconnected for backpressure");
                    SSE_BACKPRESSURE_DISCONNECTS.inc();

                    // One explicit signal, then the stream ends; silently
                    // dropping events is not an option.
                    let sse_event = Event::default()
                        .event("backpressure")
                        .data(format!("{{\"skipped\":{}}}", skipped));
                    Some((Ok(sse_event), None))
                }
                Err(e) => {
                    warn!(task_id = %task_id, error = %e, "event stream error");
                    None
                }
            }
        },
    );

    Ok(Sse::new(stream).keep_alive(KeepAlive::default()))
}

/// Non-streaming historical event log.
pub async fn get_event_history(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<Vec<TaskEvent>>, (StatusCode, Json<ErrorResponse>)> {
    state
        .orchestrator()
        .event_history(&id)
        .map(Json)
        .map_err(error_response)
}

fn to_sse_event(event: &TaskEvent) -> Event {
    SSE_EVENTS_SENT
        .with_label_values(&[event.kind().as_str()])
        .inc();

    Event::default()
        .id(event.sequence.to_string())
        .event(event.kind().as_str())
        .data(serde_json::to_string(event).unwrap_or_else(|_| "{}".to_string()))
}
