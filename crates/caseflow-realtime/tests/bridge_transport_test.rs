//! Integration tests for the insight bridge against in-process servers.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use serde_json::json;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::time::{sleep, timeout};
use tokio_tungstenite::tungstenite::Message;
use uuid::Uuid;

use caseflow_core::{Error, Result};
use caseflow_realtime::{
    spawn_bridge, ActiveTransport, BridgeConfig, BridgeState, InsightChange, InsightSink,
    ReconnectPolicy, SessionTokenProvider,
};

struct TestSink {
    invalidations: AtomicUsize,
    pending: Mutex<Vec<InsightChange>>,
}

impl TestSink {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            invalidations: AtomicUsize::new(0),
            pending: Mutex::new(Vec::new()),
        })
    }
}

impl InsightSink for TestSink {
    fn invalidate(&self) {
        self.invalidations.fetch_add(1, Ordering::SeqCst);
    }

    fn notify_pending(&self, change: &InsightChange) {
        self.pending.lock().unwrap().push(change.clone());
    }
}

struct StaticTokens;

#[async_trait]
impl SessionTokenProvider for StaticTokens {
    async fn token(&self) -> Result<String> {
        Ok("session-token".to_string())
    }
}

struct FailingTokens;

#[async_trait]
impl SessionTokenProvider for FailingTokens {
    async fn token(&self) -> Result<String> {
        Err(Error::Unauthorized("no active session".to_string()))
    }
}

fn fast_policy() -> ReconnectPolicy {
    ReconnectPolicy::new(10, 50, 5)
}

fn insert_frame(org_id: Uuid, status: &str) -> String {
    json!({
        "topic": format!("realtime:ai_insights:org_id=eq.{}", org_id),
        "event": "INSERT",
        "payload": { "record": { "id": Uuid::new_v4().to_string(), "status": status } },
        "ref": null
    })
    .to_string()
}

async fn wait_for<F: Fn() -> bool>(condition: F) {
    timeout(Duration::from_secs(5), async {
        while !condition() {
            sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("condition not reached in time");
}

#[tokio::test]
async fn test_bridge_joins_topic_and_applies_insert() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let org_id = Uuid::new_v4();

    let server = tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let mut ws = tokio_tungstenite::accept_async(stream).await.unwrap();

        // First frame must be the join message for the org topic.
        let join = match ws.next().await.unwrap().unwrap() {
            Message::Text(text) => text,
            other => panic!("expected join text frame, got {:?}", other),
        };
        let v: serde_json::Value = serde_json::from_str(&join).unwrap();
        assert_eq!(
            v["topic"],
            format!("realtime:ai_insights:org_id=eq.{}", org_id)
        );
        assert_eq!(v["event"], "phx_join");
        assert_eq!(v["ref"], "1");

        ws.send(Message::Text(insert_frame(org_id, "pending")))
            .await
            .unwrap();

        // Hold the connection open until the client closes it.
        while let Some(Ok(msg)) = ws.next().await {
            if matches!(msg, Message::Close(_)) {
                break;
            }
        }
    });

    let sink = TestSink::new();
    let config = BridgeConfig::new(org_id, format!("ws://{}/", addr), None)
        .with_reconnect(fast_policy());
    let handle = spawn_bridge(config, sink.clone(), Arc::new(StaticTokens));

    wait_for(|| sink.pending.lock().unwrap().len() == 1).await;
    assert!(sink.invalidations.load(Ordering::SeqCst) >= 1);

    let counters = handle.counters();
    assert_eq!(counters.pending, 1);
    assert_eq!(counters.total, 1);
    assert_eq!(handle.status().state, BridgeState::Connected);
    assert_eq!(handle.status().transport, ActiveTransport::Ws);

    handle.shutdown().await;
    server.await.unwrap();
}

#[tokio::test]
async fn test_bridge_reconnects_after_server_close() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let org_id = Uuid::new_v4();

    let connections = Arc::new(AtomicUsize::new(0));
    let connections_server = connections.clone();

    let server = tokio::spawn(async move {
        // First connection: accept the join, then drop.
        let (stream, _) = listener.accept().await.unwrap();
        let mut ws = tokio_tungstenite::accept_async(stream).await.unwrap();
        let _ = ws.next().await;
        connections_server.fetch_add(1, Ordering::SeqCst);
        drop(ws);

        // Second connection proves the reconnect happened.
        let (stream, _) = listener.accept().await.unwrap();
        let mut ws = tokio_tungstenite::accept_async(stream).await.unwrap();
        let _ = ws.next().await;
        connections_server.fetch_add(1, Ordering::SeqCst);

        while let Some(Ok(msg)) = ws.next().await {
            if matches!(msg, Message::Close(_)) {
                break;
            }
        }
    });

    let sink = TestSink::new();
    let config = BridgeConfig::new(org_id, format!("ws://{}/", addr), None)
        .with_reconnect(fast_policy());
    let handle = spawn_bridge(config, sink, Arc::new(StaticTokens));

    wait_for(|| connections.load(Ordering::SeqCst) == 2).await;

    handle.shutdown().await;
    server.await.unwrap();
}

#[tokio::test]
async fn test_token_failure_without_sse_gives_up_silently() {
    let org_id = Uuid::new_v4();
    let sink = TestSink::new();

    let config = BridgeConfig::new(org_id, "ws://127.0.0.1:9/".to_string(), None)
        .with_reconnect(fast_policy());
    let handle = spawn_bridge(config, sink.clone(), Arc::new(FailingTokens));

    let mut status = handle.status_watch();
    timeout(Duration::from_secs(5), async {
        while status.borrow().state != BridgeState::GaveUp {
            status.changed().await.unwrap();
        }
    })
    .await
    .expect("bridge should give up");

    assert_eq!(handle.status().transport, ActiveTransport::None);
    assert_eq!(sink.invalidations.load(Ordering::SeqCst), 0);

    handle.shutdown().await;
}

#[tokio::test]
async fn test_ws_exhaustion_fails_over_to_sse() {
    let org_id = Uuid::new_v4();

    // Reserve a port, then free it so WS connects are refused.
    let dead = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let dead_addr = dead.local_addr().unwrap();
    drop(dead);

    let sse_listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let sse_addr = sse_listener.local_addr().unwrap();

    let sse_server = tokio::spawn(async move {
        let (mut stream, _) = sse_listener.accept().await.unwrap();

        // Read the request head.
        let mut buf = vec![0u8; 4096];
        let mut head = Vec::new();
        loop {
            let n = stream.read(&mut buf).await.unwrap();
            head.extend_from_slice(&buf[..n]);
            if head.windows(4).any(|w| w == b"\r\n\r\n") || n == 0 {
                break;
            }
        }
        let request = String::from_utf8_lossy(&head);
        assert!(request.contains("Authorization: Bearer session-token"));

        let event = json!({
            "event_type": "insight.changed",
            "payload": {
                "type": "InsightChanged",
                "change": "INSERT",
                "insight": { "id": Uuid::new_v4().to_string(), "status": "pending" }
            }
        });
        let body = format!(
            "HTTP/1.1 200 OK\r\nContent-Type: text/event-stream\r\nCache-Control: no-cache\r\n\r\nevent: insight\ndata: {}\n\n",
            event
        );
        stream.write_all(body.as_bytes()).await.unwrap();
        stream.flush().await.unwrap();

        // Keep the stream open so the session stays connected.
        sleep(Duration::from_secs(5)).await;
    });

    let sink = TestSink::new();
    let config = BridgeConfig::new(
        org_id,
        format!("ws://{}/", dead_addr),
        Some(format!("http://{}/events", sse_addr)),
    )
    .with_reconnect(ReconnectPolicy::new(5, 20, 2))
    .with_sse_retry(Duration::from_millis(20));

    let handle = spawn_bridge(config, sink.clone(), Arc::new(StaticTokens));

    wait_for(|| sink.pending.lock().unwrap().len() == 1).await;
    assert_eq!(handle.status().transport, ActiveTransport::Sse);
    assert_eq!(handle.counters().pending, 1);

    handle.shutdown().await;
    sse_server.abort();
}
