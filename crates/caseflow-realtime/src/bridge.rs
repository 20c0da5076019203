//! Insight bridge coordinator.
//!
//! One bridge instance serves one organization. The coordinator owns
//! the active transport: it drives the WebSocket path with exponential
//! backoff, and when that path is exhausted (or a session token cannot
//! be acquired) it fails over to the SSE fallback with a fixed retry
//! delay. Exactly one transport is live at any time.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::sleep;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::header::AUTHORIZATION;
use tokio_tungstenite::tungstenite::http::HeaderValue;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::connect_async;
use tracing::{debug, info, warn};
use uuid::Uuid;

use caseflow_core::{defaults, ChangeKind, InsightStatus, Result};

use crate::backoff::ReconnectPolicy;
use crate::counters::InsightCounters;
use crate::protocol::{join_message, parse_frame, parse_sse_data, InsightChange};

/// Receives insight notifications from the bridge.
pub trait InsightSink: Send + Sync {
    /// A row changed; cached insight lists should be refetched.
    fn invalidate(&self);
    /// A new pending insight arrived.
    fn notify_pending(&self, change: &InsightChange);
}

/// Supplies the session token used to authenticate transports.
#[async_trait]
pub trait SessionTokenProvider: Send + Sync {
    /// May fail when no session is active.
    async fn token(&self) -> Result<String>;
}

/// Connection lifecycle state, observable through the handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BridgeState {
    Disconnected,
    Connecting,
    Connected,
    GaveUp,
}

/// Which transport currently owns the connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActiveTransport {
    Ws,
    Sse,
    None,
}

/// Snapshot of the bridge's observable status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BridgeStatus {
    pub state: BridgeState,
    pub transport: ActiveTransport,
}

/// Bridge configuration.
#[derive(Debug, Clone)]
pub struct BridgeConfig {
    pub org_id: Uuid,
    /// WebSocket endpoint (ws:// or wss://).
    pub ws_url: String,
    /// SSE fallback endpoint. Without one, WS exhaustion gives up
    /// silently.
    pub sse_url: Option<String>,
    /// Reconnect policy template for the WS path.
    pub reconnect: ReconnectPolicy,
    /// Fixed delay between SSE retry attempts.
    pub sse_retry: Duration,
}

impl BridgeConfig {
    pub fn new(org_id: Uuid, ws_url: String, sse_url: Option<String>) -> Self {
        Self {
            org_id,
            ws_url,
            sse_url,
            reconnect: ReconnectPolicy::default(),
            sse_retry: Duration::from_secs(defaults::SSE_RETRY_DELAY_SECS),
        }
    }

    /// Override the reconnect policy (shorter delays in tests).
    pub fn with_reconnect(mut self, policy: ReconnectPolicy) -> Self {
        self.reconnect = policy;
        self
    }

    pub fn with_sse_retry(mut self, delay: Duration) -> Self {
        self.sse_retry = delay;
        self
    }
}

/// Handle to a running bridge.
pub struct BridgeHandle {
    shutdown_tx: watch::Sender<bool>,
    status_rx: watch::Receiver<BridgeStatus>,
    counters: Arc<Mutex<InsightCounters>>,
    task: JoinHandle<()>,
}

impl BridgeHandle {
    /// Current status snapshot.
    pub fn status(&self) -> BridgeStatus {
        *self.status_rx.borrow()
    }

    /// Watch status transitions.
    pub fn status_watch(&self) -> watch::Receiver<BridgeStatus> {
        self.status_rx.clone()
    }

    /// Current counter projection.
    pub fn counters(&self) -> InsightCounters {
        self.counters
            .lock()
            .map(|c| c.clone())
            .unwrap_or_default()
    }

    /// Overwrite the counter projection from authoritative counts.
    pub fn reconcile(&self, counts: &caseflow_core::InsightCounts) {
        if let Ok(mut counters) = self.counters.lock() {
            counters.reconcile(counts);
        }
    }

    /// Tear the bridge down: closes the socket, cancels pending
    /// reconnect timers, and drops all connection state.
    pub async fn shutdown(self) {
        let _ = self.shutdown_tx.send(true);
        let _ = self.task.await;
    }
}

enum SessionEnd {
    /// Shutdown was requested; stop everything.
    Shutdown,
    /// The connection dropped or failed; the coordinator decides what
    /// happens next.
    Dropped,
}

/// Spawn a bridge for one organization.
pub fn spawn_bridge(
    config: BridgeConfig,
    sink: Arc<dyn InsightSink>,
    tokens: Arc<dyn SessionTokenProvider>,
) -> BridgeHandle {
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let (status_tx, status_rx) = watch::channel(BridgeStatus {
        state: BridgeState::Disconnected,
        transport: ActiveTransport::None,
    });
    let counters = Arc::new(Mutex::new(InsightCounters::default()));

    let runner = BridgeRunner {
        config,
        sink,
        tokens,
        counters: counters.clone(),
        status_tx,
        shutdown_rx,
    };

    let task = tokio::spawn(async move {
        runner.run().await;
    });

    BridgeHandle {
        shutdown_tx,
        status_rx,
        counters,
        task,
    }
}

struct BridgeRunner {
    config: BridgeConfig,
    sink: Arc<dyn InsightSink>,
    tokens: Arc<dyn SessionTokenProvider>,
    counters: Arc<Mutex<InsightCounters>>,
    status_tx: watch::Sender<BridgeStatus>,
    shutdown_rx: watch::Receiver<bool>,
}

impl BridgeRunner {
    fn set_status(&self, state: BridgeState, transport: ActiveTransport) {
        let _ = self.status_tx.send(BridgeStatus { state, transport });
    }

    async fn run(mut self) {
        if self.run_ws_path().await {
            return; // shutdown
        }
        self.run_sse_path().await;
    }

    /// Drive the WS transport until shutdown (returns true) or path
    /// exhaustion (returns false).
    async fn run_ws_path(&mut self) -> bool {
        let mut policy = self.config.reconnect.clone();

        loop {
            if *self.shutdown_rx.borrow() {
                self.set_status(BridgeState::Disconnected, ActiveTransport::None);
                return true;
            }

            self.set_status(BridgeState::Connecting, ActiveTransport::Ws);

            let token = match self.tokens.token().await {
                Ok(token) => token,
                Err(e) => {
                    // No session token: the WS path is not viable at
                    // all, so fail over without burning retries.
                    warn!(org_id = %self.config.org_id, error = %e, "Token acquisition failed; abandoning WebSocket path");
                    return false;
                }
            };

            match self.run_ws_session(&token, &mut policy).await {
                SessionEnd::Shutdown => {
                    self.set_status(BridgeState::Disconnected, ActiveTransport::None);
                    return true;
                }
                SessionEnd::Dropped => match policy.next_delay() {
                    Some(delay) => {
                        debug!(
                            org_id = %self.config.org_id,
                            attempt = policy.attempts(),
                            delay_ms = delay.as_millis() as u64,
                            "Scheduling WebSocket reconnect"
                        );
                        self.set_status(BridgeState::Disconnected, ActiveTransport::Ws);
                        if self.interruptible_sleep(delay).await {
                            self.set_status(BridgeState::Disconnected, ActiveTransport::None);
                            return true;
                        }
                    }
                    None => {
                        warn!(org_id = %self.config.org_id, "WebSocket reconnect attempts exhausted");
                        return false;
                    }
                },
            }
        }
    }

    async fn run_ws_session(&mut self, token: &str, policy: &mut ReconnectPolicy) -> SessionEnd {
        let mut request = match self.config.ws_url.as_str().into_client_request() {
            Ok(request) => request,
            Err(e) => {
                warn!(error = %e, "Invalid WebSocket URL");
                return SessionEnd::Dropped;
            }
        };
        match HeaderValue::from_str(&format!("Bearer {}", token)) {
            Ok(value) => {
                request.headers_mut().insert(AUTHORIZATION, value);
            }
            Err(e) => {
                warn!(error = %e, "Token is not a valid header value");
                return SessionEnd::Dropped;
            }
        }

        let (ws_stream, _) = match connect_async(request).await {
            Ok(pair) => pair,
            Err(e) => {
                debug!(error = %e, "WebSocket connect failed");
                return SessionEnd::Dropped;
            }
        };

        let (mut write, mut read) = ws_stream.split();

        if let Err(e) = write
            .send(Message::Text(join_message(self.config.org_id)))
            .await
        {
            debug!(error = %e, "Join send failed");
            return SessionEnd::Dropped;
        }

        info!(org_id = %self.config.org_id, "Insight channel connected");
        policy.record_success();
        self.set_status(BridgeState::Connected, ActiveTransport::Ws);

        loop {
            tokio::select! {
                _ = self.shutdown_rx.changed() => {
                    if *self.shutdown_rx.borrow() {
                        let _ = write.send(Message::Close(None)).await;
                        return SessionEnd::Shutdown;
                    }
                }
                message = read.next() => {
                    match message {
                        Some(Ok(Message::Text(text))) => self.handle_frame(&text),
                        Some(Ok(Message::Ping(data))) => {
                            if write.send(Message::Pong(data)).await.is_err() {
                                return SessionEnd::Dropped;
                            }
                        }
                        Some(Ok(Message::Close(_))) | None => {
                            debug!(org_id = %self.config.org_id, "Insight channel closed");
                            return SessionEnd::Dropped;
                        }
                        Some(Ok(_)) => {}
                        Some(Err(e)) => {
                            debug!(error = %e, "WebSocket read error");
                            return SessionEnd::Dropped;
                        }
                    }
                }
            }
        }
    }

    /// Drive the SSE fallback until shutdown. With no endpoint
    /// configured the bridge gives up silently.
    async fn run_sse_path(&mut self) {
        let Some(sse_url) = self.config.sse_url.clone() else {
            info!(org_id = %self.config.org_id, "No SSE endpoint configured; realtime updates unavailable");
            self.set_status(BridgeState::GaveUp, ActiveTransport::None);
            return;
        };

        // Title-case header names on the wire (`Authorization:` rather
        // than hyper's default `authorization:`) for servers that match
        // header bytes literally.
        let client = reqwest::Client::builder()
            .http1_title_case_headers()
            .build()
            .unwrap_or_default();

        loop {
            if *self.shutdown_rx.borrow() {
                self.set_status(BridgeState::Disconnected, ActiveTransport::None);
                return;
            }

            self.set_status(BridgeState::Connecting, ActiveTransport::Sse);

            match self.run_sse_session(&client, &sse_url).await {
                SessionEnd::Shutdown => {
                    self.set_status(BridgeState::Disconnected, ActiveTransport::None);
                    return;
                }
                SessionEnd::Dropped => {
                    self.set_status(BridgeState::Disconnected, ActiveTransport::Sse);
                    if self.interruptible_sleep(self.config.sse_retry).await {
                        self.set_status(BridgeState::Disconnected, ActiveTransport::None);
                        return;
                    }
                }
            }
        }
    }

    async fn run_sse_session(&mut self, client: &reqwest::Client, url: &str) -> SessionEnd {
        let token = match self.tokens.token().await {
            Ok(token) => token,
            Err(e) => {
                debug!(error = %e, "Token acquisition failed on SSE path");
                return SessionEnd::Dropped;
            }
        };

        let response = match client
            .get(url)
            .bearer_auth(&token)
            .header("Accept", "text/event-stream")
            .send()
            .await
        {
            Ok(response) if response.status().is_success() => response,
            Ok(response) => {
                debug!(status = %response.status(), "SSE endpoint rejected request");
                return SessionEnd::Dropped;
            }
            Err(e) => {
                debug!(error = %e, "SSE connect failed");
                return SessionEnd::Dropped;
            }
        };

        info!(org_id = %self.config.org_id, "SSE fallback connected");
        self.set_status(BridgeState::Connected, ActiveTransport::Sse);

        let mut stream = response.bytes_stream();
        let mut buffer = String::new();
        let mut event_name = String::new();
        let mut data = String::new();

        loop {
            tokio::select! {
                _ = self.shutdown_rx.changed() => {
                    if *self.shutdown_rx.borrow() {
                        return SessionEnd::Shutdown;
                    }
                }
                chunk = stream.next() => {
                    let chunk = match chunk {
                        Some(Ok(bytes)) => bytes,
                        Some(Err(e)) => {
                            debug!(error = %e, "SSE stream error");
                            return SessionEnd::Dropped;
                        }
                        None => {
                            debug!("SSE stream ended");
                            return SessionEnd::Dropped;
                        }
                    };

                    buffer.push_str(&String::from_utf8_lossy(&chunk));

                    while let Some(pos) = buffer.find('\n') {
                        let line = buffer[..pos].trim_end_matches('\r').to_string();
                        buffer.drain(..=pos);

                        if let Some(name) = line.strip_prefix("event:") {
                            event_name = name.trim().to_string();
                        } else if let Some(payload) = line.strip_prefix("data:") {
                            if !data.is_empty() {
                                data.push('\n');
                            }
                            data.push_str(payload.trim_start());
                        } else if line.is_empty() {
                            if event_name == "insight" && !data.is_empty() {
                                self.handle_sse_event(&data);
                            }
                            event_name.clear();
                            data.clear();
                        }
                        // Comment lines (":keep-alive") fall through.
                    }
                }
            }
        }
    }

    fn handle_frame(&self, text: &str) {
        match parse_frame(text) {
            Ok(Some(change)) => self.apply_change(&change),
            Ok(None) => {}
            Err(e) => {
                // Per-message failure; the connection stays up.
                warn!(org_id = %self.config.org_id, error = %e, "Skipping malformed channel message");
            }
        }
    }

    fn handle_sse_event(&self, data: &str) {
        match parse_sse_data(data) {
            Ok(Some(change)) => self.apply_change(&change),
            Ok(None) => {}
            Err(e) => {
                warn!(org_id = %self.config.org_id, error = %e, "Skipping malformed SSE event");
            }
        }
    }

    fn apply_change(&self, change: &InsightChange) {
        if let Ok(mut counters) = self.counters.lock() {
            counters.apply(change);
        }

        self.sink.invalidate();
        if change.kind == ChangeKind::Insert
            && change.new_status == Some(InsightStatus::Pending)
        {
            self.sink.notify_pending(change);
        }
    }

    /// Sleep, returning true when interrupted by shutdown.
    async fn interruptible_sleep(&mut self, delay: Duration) -> bool {
        tokio::select! {
            _ = self.shutdown_rx.changed() => *self.shutdown_rx.borrow(),
            _ = sleep(delay) => false,
        }
    }
}
