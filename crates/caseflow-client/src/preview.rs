//! Cancellable document-preview fetching.
//!
//! A preview fetch runs as a spawned task tied to a cancel handle. The
//! sink write and the cancel flag share one mutex, so a cancel that
//! lands before the fetch resolves guarantees the sink is never
//! updated, even if the response arrives a moment later.

use std::sync::{Arc, Mutex};

use reqwest::Client;
use tokio::task::JoinHandle;
use tracing::debug;
use uuid::Uuid;

use crate::client::{ApiClientError, ClientResult, TokenSource};

/// Receives the bytes of a resolved preview.
pub trait PreviewSink: Send + Sync {
    fn set_preview(&self, document_id: Uuid, bytes: Vec<u8>);
}

#[derive(Default)]
struct FetchFlags {
    cancelled: bool,
    delivered: bool,
}

/// Handle for one in-flight preview fetch.
pub struct PreviewHandle {
    flags: Arc<Mutex<FetchFlags>>,
    task: JoinHandle<()>,
}

impl PreviewHandle {
    /// Cancels the fetch. After this returns, the sink will not be
    /// written by this fetch; if the write already happened the call is
    /// a no-op.
    pub fn cancel(&self) {
        {
            let mut flags = self.flags.lock().unwrap_or_else(|e| e.into_inner());
            flags.cancelled = true;
        }
        self.task.abort();
    }

    /// Whether the preview reached the sink.
    pub fn delivered(&self) -> bool {
        self.flags
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .delivered
    }

    /// Waits for the fetch task to finish (resolve, fail, or abort).
    pub async fn join(self) {
        let _ = self.task.await;
    }
}

/// Fetches document previews from the API and delivers them to a sink.
pub struct PreviewFetcher {
    http: Client,
    base_url: String,
    org_id: Uuid,
    tokens: Arc<dyn TokenSource>,
}

impl PreviewFetcher {
    pub fn new(base_url: String, org_id: Uuid, tokens: Arc<dyn TokenSource>) -> Self {
        Self {
            http: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            org_id,
            tokens,
        }
    }

    /// Starts fetching the preview for `document_id` in the background.
    pub fn fetch(&self, document_id: Uuid, sink: Arc<dyn PreviewSink>) -> PreviewHandle {
        let flags = Arc::new(Mutex::new(FetchFlags::default()));
        let task_flags = flags.clone();

        let http = self.http.clone();
        let url = format!("{}/api/v1/documents/{}/preview", self.base_url, document_id);
        let org_id = self.org_id;
        let tokens = self.tokens.clone();

        let task = tokio::spawn(async move {
            match Self::download(http, url, org_id, tokens).await {
                Ok(bytes) => {
                    // Flag check and sink write are one critical
                    // section, so cancel() cannot interleave between
                    // them.
                    let mut flags = task_flags.lock().unwrap_or_else(|e| e.into_inner());
                    if flags.cancelled {
                        debug!(%document_id, "preview fetch cancelled, dropping bytes");
                        return;
                    }
                    sink.set_preview(document_id, bytes);
                    flags.delivered = true;
                }
                Err(e) => {
                    debug!(%document_id, error = %e, "preview fetch failed");
                }
            }
        });

        PreviewHandle { flags, task }
    }

    async fn download(
        http: Client,
        url: String,
        org_id: Uuid,
        tokens: Arc<dyn TokenSource>,
    ) -> ClientResult<Vec<u8>> {
        let token = tokens.token().await?;
        let response = http
            .get(url)
            .bearer_auth(token)
            .header("X-Org-Id", org_id.to_string())
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(ApiClientError::Api {
                status: status.as_u16(),
                message,
            });
        }
        Ok(response.bytes().await?.to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::StaticToken;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;
    use tokio::time::sleep;

    struct CountingSink {
        writes: AtomicUsize,
    }

    impl CountingSink {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                writes: AtomicUsize::new(0),
            })
        }
    }

    impl PreviewSink for CountingSink {
        fn set_preview(&self, _document_id: Uuid, _bytes: Vec<u8>) {
            self.writes.fetch_add(1, Ordering::SeqCst);
        }
    }

    async fn read_head(stream: &mut tokio::net::TcpStream) {
        let mut buf = vec![0u8; 4096];
        let mut head = Vec::new();
        loop {
            let n = stream.read(&mut buf).await.unwrap();
            head.extend_from_slice(&buf[..n]);
            if head.windows(4).any(|w| w == b"\r\n\r\n") || n == 0 {
                break;
            }
        }
    }

    /// Serves one HTTP response after an optional delay.
    async fn serve_once(listener: TcpListener, delay: Duration, body: &'static [u8]) {
        let (mut stream, _) = listener.accept().await.unwrap();
        read_head(&mut stream).await;
        sleep(delay).await;
        let response = format!(
            "HTTP/1.1 200 OK\r\nContent-Type: application/octet-stream\r\nContent-Length: {}\r\n\r\n",
            body.len()
        );
        stream.write_all(response.as_bytes()).await.unwrap();
        stream.write_all(body).await.unwrap();
        stream.flush().await.unwrap();
    }

    #[tokio::test]
    async fn test_preview_delivered_to_sink() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let server = tokio::spawn(serve_once(listener, Duration::ZERO, b"preview-bytes"));

        let fetcher = PreviewFetcher::new(
            format!("http://{}", addr),
            Uuid::new_v4(),
            Arc::new(StaticToken("t".to_string())),
        );
        let sink = CountingSink::new();
        let handle = fetcher.fetch(Uuid::new_v4(), sink.clone());

        handle.join().await;
        assert_eq!(sink.writes.load(Ordering::SeqCst), 1);
        server.await.unwrap();
    }

    #[tokio::test]
    async fn test_cancel_before_resolution_never_writes_sink() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        // The server stalls long enough for the cancel to land first.
        let server = tokio::spawn(serve_once(
            listener,
            Duration::from_millis(300),
            b"too-late",
        ));

        let fetcher = PreviewFetcher::new(
            format!("http://{}", addr),
            Uuid::new_v4(),
            Arc::new(StaticToken("t".to_string())),
        );
        let sink = CountingSink::new();
        let handle = fetcher.fetch(Uuid::new_v4(), sink.clone());

        sleep(Duration::from_millis(50)).await;
        handle.cancel();
        assert!(!handle.delivered());
        handle.join().await;

        // Give any stray write a chance to show up before asserting.
        sleep(Duration::from_millis(400)).await;
        assert_eq!(sink.writes.load(Ordering::SeqCst), 0);
        server.abort();
    }

    #[tokio::test]
    async fn test_cancel_after_delivery_is_noop() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let server = tokio::spawn(serve_once(listener, Duration::ZERO, b"bytes"));

        let fetcher = PreviewFetcher::new(
            format!("http://{}", addr),
            Uuid::new_v4(),
            Arc::new(StaticToken("t".to_string())),
        );
        let sink = CountingSink::new();
        let handle = fetcher.fetch(Uuid::new_v4(), sink.clone());

        while !handle.delivered() {
            sleep(Duration::from_millis(10)).await;
        }
        handle.cancel();
        assert_eq!(sink.writes.load(Ordering::SeqCst), 1);
        server.await.unwrap();
    }
}
