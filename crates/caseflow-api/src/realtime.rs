//! Server-side realtime transports: WebSocket, SSE, and the bridge
//! tasks feeding the event bus.
//!
//! Both transports deliver [`EventEnvelope`]s filtered to the caller's
//! organization. System-wide events (queue status) go to everyone.

use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::IntoResponse;
use futures::{SinkExt, StreamExt};
use tokio::sync::broadcast;
use uuid::Uuid;

use caseflow_core::defaults::QUEUE_STATUS_INTERVAL_SECS;
use caseflow_core::{EventBus, EventEnvelope, JobRepository, ServerEvent};
use caseflow_db::Database;
use caseflow_jobs::WorkerEvent;

use crate::auth::RequireAuth;
use crate::state::AppState;

/// WebSocket endpoint. Clients receive JSON-encoded event envelopes for
/// their organization; sending `"refresh"` triggers an immediate queue
/// status event.
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    auth: RequireAuth,
    State(state): State<AppState>,
) -> impl IntoResponse {
    let org_id = auth.org_id();
    ws.on_upgrade(move |socket| handle_ws_connection(socket, state, org_id))
}

async fn handle_ws_connection(socket: WebSocket, state: AppState, org_id: Uuid) {
    let count = state.ws_connections.fetch_add(1, Ordering::Relaxed) + 1;
    tracing::info!(active = count, org_id = %org_id, "WebSocket connection opened");

    let (mut sender, mut receiver) = socket.split();
    let mut event_rx = state.event_bus.subscribe();

    let send_task = tokio::spawn(async move {
        let mut ping_interval = tokio::time::interval(Duration::from_secs(30));
        loop {
            tokio::select! {
                event = event_rx.recv() => {
                    match event {
                        Ok(envelope) => {
                            if !envelope.visible_to(org_id) {
                                continue;
                            }
                            if let Ok(json) = serde_json::to_string(&envelope) {
                                if sender.send(Message::Text(json)).await.is_err() {
                                    break;
                                }
                            }
                        }
                        Err(broadcast::error::RecvError::Lagged(n)) => {
                            tracing::debug!(missed = n, "WebSocket client lagged");
                        }
                        Err(broadcast::error::RecvError::Closed) => break,
                    }
                }
                _ = ping_interval.tick() => {
                    if sender.send(Message::Ping(vec![])).await.is_err() {
                        break;
                    }
                }
            }
        }
    });

    let event_bus = state.event_bus.clone();
    let db = state.db.clone();
    let recv_task = tokio::spawn(async move {
        while let Some(Ok(msg)) = receiver.next().await {
            match msg {
                Message::Text(ref text) if text == "refresh" => {
                    if let Ok(stats) = db.jobs.queue_stats().await {
                        event_bus.emit(ServerEvent::QueueStatus {
                            total_jobs: stats.total,
                            running: stats.running,
                            pending: stats.pending,
                        });
                    }
                }
                Message::Close(_) => break,
                _ => {}
            }
        }
    });

    tokio::select! {
        _ = send_task => {}
        _ = recv_task => {}
    }
    let count = state.ws_connections.fetch_sub(1, Ordering::Relaxed) - 1;
    tracing::info!(active = count, org_id = %org_id, "WebSocket connection closed");
}

/// SSE endpoint. Insight changes are emitted under the short `insight`
/// event name that fallback-transport clients subscribe to; everything
/// else uses its namespaced type.
pub async fn sse_events(
    auth: RequireAuth,
    State(state): State<AppState>,
) -> Sse<impl futures::Stream<Item = Result<Event, std::convert::Infallible>>> {
    let org_id = auth.org_id();
    let rx = state.event_bus.subscribe();

    let stream = tokio_stream::StreamExt::filter_map(
        tokio_stream::wrappers::BroadcastStream::new(rx),
        move |result: Result<EventEnvelope, _>| match result {
            Ok(envelope) if envelope.visible_to(org_id) => {
                let name = envelope.payload.sse_event_name().to_string();
                match serde_json::to_string(&envelope) {
                    Ok(json) => Some(Ok(Event::default().event(name).data(json))),
                    Err(_) => None,
                }
            }
            // Filtered-out, lagged, or closed: skip.
            _ => None,
        },
    );

    Sse::new(stream).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text("keepalive"),
    )
}

/// Forwards worker lifecycle events onto the event bus as server
/// events. Runs until the worker-event channel closes.
pub async fn worker_event_bridge(
    event_bus: Arc<EventBus>,
    mut rx: broadcast::Receiver<WorkerEvent>,
) {
    loop {
        match rx.recv().await {
            Ok(event) => {
                let server_event = match event {
                    WorkerEvent::JobStarted {
                        job_id,
                        org_id,
                        job_type,
                    } => Some(ServerEvent::JobStarted {
                        job_id,
                        org_id,
                        job_type: format!("{:?}", job_type),
                    }),
                    WorkerEvent::JobProgress {
                        job_id,
                        org_id,
                        percent,
                        message,
                    } => Some(ServerEvent::JobProgress {
                        job_id,
                        org_id,
                        progress: percent,
                        message,
                    }),
                    WorkerEvent::JobCompleted {
                        job_id,
                        org_id,
                        job_type,
                    } => Some(ServerEvent::JobCompleted {
                        job_id,
                        org_id,
                        job_type: format!("{:?}", job_type),
                        duration_ms: None,
                    }),
                    WorkerEvent::JobFailed {
                        job_id,
                        org_id,
                        job_type,
                        error,
                    } => Some(ServerEvent::JobFailed {
                        job_id,
                        org_id,
                        job_type: format!("{:?}", job_type),
                        error,
                    }),
                    WorkerEvent::WorkerStarted | WorkerEvent::WorkerStopped => None,
                };

                if let Some(event) = server_event {
                    event_bus.emit(event);
                }
            }
            Err(broadcast::error::RecvError::Lagged(n)) => {
                tracing::warn!(missed = n, "Worker event bridge lagged");
            }
            Err(broadcast::error::RecvError::Closed) => break,
        }
    }
    tracing::debug!("Worker event bridge stopped");
}

/// Emits periodic queue statistics while anyone is listening. Skips the
/// query entirely with no subscribers.
pub async fn queue_status_emitter(event_bus: Arc<EventBus>, db: Database) {
    let mut interval = tokio::time::interval(Duration::from_secs(QUEUE_STATUS_INTERVAL_SECS));
    loop {
        interval.tick().await;
        if event_bus.subscriber_count() == 0 {
            continue;
        }
        match db.jobs.queue_stats().await {
            Ok(stats) => {
                event_bus.emit(ServerEvent::QueueStatus {
                    total_jobs: stats.total,
                    running: stats.running,
                    pending: stats.pending,
                });
            }
            Err(e) => {
                tracing::warn!(error = %e, "Failed to read queue stats");
            }
        }
    }
}
