//! Shared application state.

use std::sync::atomic::AtomicUsize;
use std::sync::Arc;

use caseflow_core::EventBus;
use caseflow_db::Database;
use caseflow_jobs::WorkerManager;
use caseflow_quickbooks::QuickBooksClient;
use governor::{Quota, RateLimiter};

/// Global rate limiter type (direct quota, no keyed bucketing).
pub type GlobalRateLimiter = RateLimiter<
    governor::state::NotKeyed,
    governor::state::InMemoryState,
    governor::clock::DefaultClock,
>;

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    pub db: Database,
    /// Event bus for real-time notifications (WebSocket, SSE).
    pub event_bus: Arc<EventBus>,
    /// Job worker lifecycle controller.
    pub worker: Arc<WorkerManager>,
    /// QuickBooks client (None when sync is not configured).
    pub qbo: Option<Arc<QuickBooksClient>>,
    /// Global rate limiter (None if rate limiting is disabled).
    pub rate_limiter: Option<Arc<GlobalRateLimiter>>,
    /// Active WebSocket connection count.
    pub ws_connections: Arc<AtomicUsize>,
}

impl AppState {
    /// Build a rate limiter from a requests-per-period quota.
    pub fn build_rate_limiter(requests: u32, period_secs: u64) -> Option<Arc<GlobalRateLimiter>> {
        let requests = std::num::NonZeroU32::new(requests)?;
        let quota = Quota::with_period(std::time::Duration::from_secs(period_secs))?
            .allow_burst(requests);
        Some(Arc::new(RateLimiter::direct(quota)))
    }
}
