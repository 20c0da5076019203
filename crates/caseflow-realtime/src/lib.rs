//! # caseflow-realtime
//!
//! Client-side realtime bridge for AI task insights.
//!
//! One bridge instance serves one organization. It connects to the
//! insight WebSocket channel, joins the organization topic, and turns
//! row-change events into sink notifications plus an optimistic counter
//! projection. Connection loss is retried with exponential backoff
//! (capped, bounded attempts); when the WebSocket path is exhausted the
//! coordinator fails over to an SSE fallback with a fixed retry delay.
//!
//! ## Example
//!
//! ```ignore
//! use caseflow_realtime::{spawn_bridge, BridgeConfig};
//!
//! let config = BridgeConfig::new(
//!     org_id,
//!     "wss://api.example.com/api/v1/ws".to_string(),
//!     Some("https://api.example.com/api/v1/events".to_string()),
//! );
//! let handle = spawn_bridge(config, sink, tokens);
//!
//! // ... later
//! handle.shutdown().await;
//! ```

pub mod backoff;
pub mod bridge;
pub mod counters;
pub mod protocol;

pub use backoff::ReconnectPolicy;
pub use bridge::{
    spawn_bridge, ActiveTransport, BridgeConfig, BridgeHandle, BridgeState, BridgeStatus,
    InsightSink, SessionTokenProvider,
};
pub use counters::InsightCounters;
pub use protocol::{insight_topic, join_message, parse_frame, parse_sse_data, InsightChange};
