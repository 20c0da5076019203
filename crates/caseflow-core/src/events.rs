//! Server event types, envelope schema, and event bus for real-time
//! notifications.
//!
//! A unified event system that aggregates events from multiple sources
//! (job worker, insight review, extraction pipeline) into a single
//! broadcast channel. Downstream consumers (WebSocket, SSE) subscribe
//! independently and filter by organization.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::models::AiTaskInsight;

/// Kind of change carried by an insight event.
///
/// Matches the upstream realtime wire values (`INSERT`/`UPDATE`/`DELETE`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ChangeKind {
    Insert,
    Update,
    Delete,
}

/// Versioned event envelope wrapping domain events.
///
/// Carries metadata (event ID, timestamp, organization scope) while the
/// `payload` field contains the domain-specific [`ServerEvent`]. Consumers
/// should ignore unknown fields; breaking payload changes bump
/// `payload_version`.
#[derive(Debug, Clone, Serialize)]
pub struct EventEnvelope {
    /// Unique event identifier (UUIDv7 for temporal ordering).
    pub event_id: Uuid,
    /// Namespaced event type (e.g., `"insight.changed"`, `"job.started"`).
    pub event_type: String,
    /// When the event occurred (UTC).
    pub occurred_at: DateTime<Utc>,
    /// Organization scope. None for system-wide events.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub org_id: Option<Uuid>,
    /// Payload schema version.
    pub payload_version: u32,
    /// Domain-specific event data.
    pub payload: ServerEvent,
}

impl EventEnvelope {
    pub fn new(event: ServerEvent) -> Self {
        let event_type = event.namespaced_event_type().to_string();
        let org_id = event.org_id();
        Self {
            event_id: Uuid::now_v7(),
            event_type,
            occurred_at: Utc::now(),
            org_id,
            payload_version: 1,
            payload: event,
        }
    }

    /// Whether this envelope should be delivered to a subscriber scoped
    /// to `org`. System-wide events (no org) go to everyone.
    pub fn visible_to(&self, org: Uuid) -> bool {
        match self.org_id {
            Some(scope) => scope == org,
            None => true,
        }
    }
}

/// Unified server event type serialized as JSON with a `type` tag field,
/// e.g. `{"type":"JobStarted","job_id":"...","job_type":"insight_extraction"}`.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type")]
pub enum ServerEvent {
    /// An insight row was inserted, updated, or deleted.
    InsightChanged {
        change: ChangeKind,
        insight: AiTaskInsight,
    },
    /// Periodic queue statistics broadcast.
    QueueStatus {
        total_jobs: i64,
        running: i64,
        pending: i64,
    },
    /// A job was added to the queue.
    JobQueued {
        job_id: Uuid,
        org_id: Uuid,
        job_type: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        entity_id: Option<Uuid>,
    },
    /// A job started processing.
    JobStarted {
        job_id: Uuid,
        org_id: Uuid,
        job_type: String,
    },
    /// Job progress update.
    JobProgress {
        job_id: Uuid,
        org_id: Uuid,
        progress: i32,
        #[serde(skip_serializing_if = "Option::is_none")]
        message: Option<String>,
    },
    /// A job completed successfully.
    JobCompleted {
        job_id: Uuid,
        org_id: Uuid,
        job_type: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        duration_ms: Option<i64>,
    },
    /// A job failed.
    JobFailed {
        job_id: Uuid,
        org_id: Uuid,
        job_type: String,
        error: String,
    },
}

impl ServerEvent {
    /// Namespaced event type used for the envelope and SSE event names.
    pub fn namespaced_event_type(&self) -> &'static str {
        match self {
            ServerEvent::InsightChanged { .. } => "insight.changed",
            ServerEvent::QueueStatus { .. } => "queue.status",
            ServerEvent::JobQueued { .. } => "job.queued",
            ServerEvent::JobStarted { .. } => "job.started",
            ServerEvent::JobProgress { .. } => "job.progress",
            ServerEvent::JobCompleted { .. } => "job.completed",
            ServerEvent::JobFailed { .. } => "job.failed",
        }
    }

    /// SSE event name. Insight changes use the short `insight` name that
    /// fallback-transport clients subscribe to.
    pub fn sse_event_name(&self) -> &'static str {
        match self {
            ServerEvent::InsightChanged { .. } => "insight",
            other => other.namespaced_event_type(),
        }
    }

    /// Organization scope of the event, if tenant-bound.
    pub fn org_id(&self) -> Option<Uuid> {
        match self {
            ServerEvent::InsightChanged { insight, .. } => Some(insight.org_id),
            ServerEvent::QueueStatus { .. } => None,
            ServerEvent::JobQueued { org_id, .. }
            | ServerEvent::JobStarted { org_id, .. }
            | ServerEvent::JobProgress { org_id, .. }
            | ServerEvent::JobCompleted { org_id, .. }
            | ServerEvent::JobFailed { org_id, .. } => Some(*org_id),
        }
    }
}

/// Broadcast-based event bus distributing server events to multiple
/// consumers.
///
/// Slow receivers that fall behind receive a `Lagged` error and miss
/// events; freshness matters more than completeness for live streams.
pub struct EventBus {
    tx: broadcast::Sender<EventEnvelope>,
}

impl EventBus {
    /// Create a new event bus with the given buffer capacity.
    ///
    /// Recommended: 256 for production, 32 for tests.
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    /// Emit an event to all subscribers. If there are no active
    /// subscribers, the event is silently dropped.
    pub fn emit(&self, event: ServerEvent) {
        let envelope = EventEnvelope::new(event);
        tracing::debug!(
            event_type = %envelope.event_type,
            event_id = %envelope.event_id,
            subscriber_count = self.tx.receiver_count(),
            "EventBus emit"
        );
        let _ = self.tx.send(envelope);
    }

    /// Subscribe to receive enveloped events. Each subscriber gets its own
    /// independent stream.
    pub fn subscribe(&self) -> broadcast::Receiver<EventEnvelope> {
        self.tx.subscribe()
    }

    /// Returns the number of active subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{InsightSource, InsightStatus};

    fn insight(org_id: Uuid, status: InsightStatus) -> AiTaskInsight {
        AiTaskInsight {
            id: Uuid::now_v7(),
            org_id,
            case_id: None,
            source: InsightSource::Transcript,
            suggested_title: "Draft discovery responses".to_string(),
            confidence: 0.92,
            entities: serde_json::json!({}),
            status,
            created_at: Utc::now(),
            reviewed_at: None,
            reviewed_by: None,
        }
    }

    #[tokio::test]
    async fn test_event_bus_emit_subscribe() {
        let bus = EventBus::new(32);
        let mut rx = bus.subscribe();

        let org = Uuid::new_v4();
        bus.emit(ServerEvent::InsightChanged {
            change: ChangeKind::Insert,
            insight: insight(org, InsightStatus::Pending),
        });

        let envelope = rx.recv().await.unwrap();
        assert_eq!(envelope.event_type, "insight.changed");
        assert_eq!(envelope.org_id, Some(org));
        assert_eq!(envelope.payload_version, 1);
    }

    #[tokio::test]
    async fn test_event_bus_multiple_subscribers() {
        let bus = EventBus::new(32);
        let mut rx1 = bus.subscribe();
        let mut rx2 = bus.subscribe();

        bus.emit(ServerEvent::QueueStatus {
            total_jobs: 5,
            running: 1,
            pending: 4,
        });

        assert!(matches!(
            rx1.recv().await.unwrap().payload,
            ServerEvent::QueueStatus { .. }
        ));
        assert!(matches!(
            rx2.recv().await.unwrap().payload,
            ServerEvent::QueueStatus { .. }
        ));
    }

    #[tokio::test]
    async fn test_event_bus_no_subscribers_ok() {
        let bus = EventBus::new(32);
        bus.emit(ServerEvent::QueueStatus {
            total_jobs: 0,
            running: 0,
            pending: 0,
        });
    }

    #[test]
    fn test_envelope_org_filtering() {
        let org_a = Uuid::new_v4();
        let org_b = Uuid::new_v4();

        let scoped = EventEnvelope::new(ServerEvent::InsightChanged {
            change: ChangeKind::Update,
            insight: insight(org_a, InsightStatus::Accepted),
        });
        assert!(scoped.visible_to(org_a));
        assert!(!scoped.visible_to(org_b));

        let system_wide = EventEnvelope::new(ServerEvent::QueueStatus {
            total_jobs: 1,
            running: 0,
            pending: 1,
        });
        assert!(system_wide.visible_to(org_a));
        assert!(system_wide.visible_to(org_b));
    }

    #[test]
    fn test_change_kind_wire_values() {
        assert_eq!(
            serde_json::to_string(&ChangeKind::Insert).unwrap(),
            r#""INSERT""#
        );
        let parsed: ChangeKind = serde_json::from_str(r#""DELETE""#).unwrap();
        assert_eq!(parsed, ChangeKind::Delete);
    }

    #[test]
    fn test_server_event_json_serialization() {
        let event = ServerEvent::JobStarted {
            job_id: Uuid::nil(),
            org_id: Uuid::nil(),
            job_type: "insight_extraction".to_string(),
        };
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains(r#""type":"JobStarted"#));
        assert!(json.contains(r#""job_type":"insight_extraction"#));
    }

    #[test]
    fn test_sse_event_names() {
        let event = ServerEvent::InsightChanged {
            change: ChangeKind::Insert,
            insight: insight(Uuid::nil(), InsightStatus::Pending),
        };
        assert_eq!(event.sse_event_name(), "insight");
        assert_eq!(event.namespaced_event_type(), "insight.changed");

        let queue = ServerEvent::QueueStatus {
            total_jobs: 0,
            running: 0,
            pending: 0,
        };
        assert_eq!(queue.sse_event_name(), "queue.status");
    }
}
