//! Wire protocol for the insight notification channel.
//!
//! The channel speaks a phoenix-style framing: the client joins a
//! per-organization topic and then receives row-change events for the
//! `ai_task_insights` table.

use serde::Deserialize;
use serde_json::Value as JsonValue;
use uuid::Uuid;

use caseflow_core::{ChangeKind, Error, InsightStatus, Result};

/// Topic for an organization's insight channel.
pub fn insight_topic(org_id: Uuid) -> String {
    format!("realtime:ai_insights:org_id=eq.{}", org_id)
}

/// The join frame sent immediately after the socket opens.
pub fn join_message(org_id: Uuid) -> String {
    serde_json::json!({
        "topic": insight_topic(org_id),
        "event": "phx_join",
        "payload": {},
        "ref": "1"
    })
    .to_string()
}

/// A decoded row change on the insight channel.
#[derive(Debug, Clone, PartialEq)]
pub struct InsightChange {
    pub kind: ChangeKind,
    pub insight_id: Option<Uuid>,
    /// Status of the new row (INSERT/UPDATE).
    pub new_status: Option<InsightStatus>,
    /// Status of the replaced row (UPDATE/DELETE).
    pub old_status: Option<InsightStatus>,
}

#[derive(Debug, Deserialize)]
struct Frame {
    event: String,
    #[serde(default)]
    payload: JsonValue,
}

/// Decode an inbound text frame.
///
/// Returns `Ok(None)` for frames that are valid but not row changes
/// (join replies, heartbeats, presence). Returns an error only for
/// frames that cannot be decoded at all; the caller logs those and
/// keeps the connection.
pub fn parse_frame(text: &str) -> Result<Option<InsightChange>> {
    let frame: Frame = serde_json::from_str(text)
        .map_err(|e| Error::Realtime(format!("Undecodable frame: {}", e)))?;

    let kind = match frame.event.as_str() {
        "INSERT" => ChangeKind::Insert,
        "UPDATE" => ChangeKind::Update,
        "DELETE" => ChangeKind::Delete,
        // Control frames are expected traffic.
        "phx_reply" | "phx_close" | "phx_error" | "presence_state" | "presence_diff"
        | "heartbeat" => return Ok(None),
        other => {
            return Err(Error::Realtime(format!(
                "Unknown channel event '{}'",
                other
            )))
        }
    };

    let record = &frame.payload["record"];
    let old_record = &frame.payload["old_record"];

    Ok(Some(InsightChange {
        kind,
        insight_id: record["id"]
            .as_str()
            .or_else(|| old_record["id"].as_str())
            .and_then(|s| Uuid::parse_str(s).ok()),
        new_status: record["status"].as_str().and_then(InsightStatus::parse),
        old_status: old_record["status"].as_str().and_then(InsightStatus::parse),
    }))
}

/// Decode the `data:` payload of an SSE `insight` event.
///
/// The fallback transport delivers enveloped server events; the old row
/// is not carried, so `old_status` is always `None` and counter drift is
/// repaired by reconciliation.
pub fn parse_sse_data(data: &str) -> Result<Option<InsightChange>> {
    let v: JsonValue = serde_json::from_str(data)
        .map_err(|e| Error::Realtime(format!("Undecodable SSE data: {}", e)))?;

    let payload = &v["payload"];
    if payload["type"] != "InsightChanged" {
        return Ok(None);
    }

    let kind = match payload["change"].as_str() {
        Some("INSERT") => ChangeKind::Insert,
        Some("UPDATE") => ChangeKind::Update,
        Some("DELETE") => ChangeKind::Delete,
        other => {
            return Err(Error::Realtime(format!(
                "Unknown change kind {:?} in SSE data",
                other
            )))
        }
    };

    let insight = &payload["insight"];
    Ok(Some(InsightChange {
        kind,
        insight_id: insight["id"].as_str().and_then(|s| Uuid::parse_str(s).ok()),
        new_status: insight["status"].as_str().and_then(InsightStatus::parse),
        old_status: None,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_join_message_wire_shape() {
        let org = Uuid::parse_str("0189c0ff-0000-7000-8000-000000000001").unwrap();
        let msg = join_message(org);
        let v: JsonValue = serde_json::from_str(&msg).unwrap();

        assert_eq!(
            v["topic"],
            "realtime:ai_insights:org_id=eq.0189c0ff-0000-7000-8000-000000000001"
        );
        assert_eq!(v["event"], "phx_join");
        assert_eq!(v["payload"], serde_json::json!({}));
        assert_eq!(v["ref"], "1");
    }

    #[test]
    fn test_parse_insert_with_pending_status() {
        let id = Uuid::new_v4();
        let text = serde_json::json!({
            "topic": "realtime:ai_insights:org_id=eq.x",
            "event": "INSERT",
            "payload": { "record": { "id": id.to_string(), "status": "pending" } },
            "ref": null
        })
        .to_string();

        let change = parse_frame(&text).unwrap().unwrap();
        assert_eq!(change.kind, ChangeKind::Insert);
        assert_eq!(change.insight_id, Some(id));
        assert_eq!(change.new_status, Some(InsightStatus::Pending));
        assert_eq!(change.old_status, None);
    }

    #[test]
    fn test_parse_update_transition() {
        let text = serde_json::json!({
            "event": "UPDATE",
            "payload": {
                "record": { "id": Uuid::new_v4().to_string(), "status": "accepted" },
                "old_record": { "status": "pending" }
            }
        })
        .to_string();

        let change = parse_frame(&text).unwrap().unwrap();
        assert_eq!(change.kind, ChangeKind::Update);
        assert_eq!(change.new_status, Some(InsightStatus::Accepted));
        assert_eq!(change.old_status, Some(InsightStatus::Pending));
    }

    #[test]
    fn test_control_frames_are_ignored() {
        let reply = serde_json::json!({
            "event": "phx_reply",
            "payload": { "status": "ok" }
        })
        .to_string();
        assert_eq!(parse_frame(&reply).unwrap(), None);
    }

    #[test]
    fn test_malformed_frame_is_an_error() {
        assert!(parse_frame("not json").is_err());
        assert!(parse_frame(r#"{"event":"SOMETHING_ELSE","payload":{}}"#).is_err());
    }

    #[test]
    fn test_parse_sse_insight_event() {
        let id = Uuid::new_v4();
        let data = serde_json::json!({
            "event_id": Uuid::now_v7().to_string(),
            "event_type": "insight.changed",
            "payload_version": 1,
            "payload": {
                "type": "InsightChanged",
                "change": "INSERT",
                "insight": { "id": id.to_string(), "status": "pending" }
            }
        })
        .to_string();

        let change = parse_sse_data(&data).unwrap().unwrap();
        assert_eq!(change.kind, ChangeKind::Insert);
        assert_eq!(change.insight_id, Some(id));
        assert_eq!(change.new_status, Some(InsightStatus::Pending));
        assert_eq!(change.old_status, None);
    }

    #[test]
    fn test_parse_sse_ignores_other_events() {
        let data = serde_json::json!({
            "payload": { "type": "QueueStatus", "pending": 3 }
        })
        .to_string();
        assert_eq!(parse_sse_data(&data).unwrap(), None);
    }

    #[test]
    fn test_unknown_status_is_skipped_not_fatal() {
        let text = serde_json::json!({
            "event": "INSERT",
            "payload": { "record": { "id": Uuid::new_v4().to_string(), "status": "mystery" } }
        })
        .to_string();

        let change = parse_frame(&text).unwrap().unwrap();
        assert_eq!(change.new_status, None);
    }
}
