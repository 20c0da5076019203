//! Centralized default constants for the caseflow system.
//!
//! **This module is the single source of truth** for all shared default
//! values. Crates reference these constants instead of defining their own
//! magic numbers.

// =============================================================================
// REALTIME BRIDGE
// =============================================================================

/// Base delay for WebSocket reconnect backoff, in milliseconds.
pub const RECONNECT_BASE_DELAY_MS: u64 = 1000;

/// Cap for WebSocket reconnect backoff, in milliseconds.
pub const RECONNECT_MAX_DELAY_MS: u64 = 30_000;

/// Maximum WebSocket reconnect attempts before the path yields.
pub const MAX_RECONNECT_ATTEMPTS: u32 = 5;

/// Fixed retry delay for the SSE fallback transport, in seconds.
pub const SSE_RETRY_DELAY_SECS: u64 = 5;

/// Interval between counter reconciliations against the authoritative
/// counts endpoint, in seconds.
pub const COUNTER_RECONCILE_INTERVAL_SECS: u64 = 60;

// =============================================================================
// JOBS
// =============================================================================

/// Maximum number of jobs processed concurrently by one worker.
pub const JOB_MAX_CONCURRENT: usize = 4;

/// Worker polling interval when the queue is empty, in milliseconds.
pub const JOB_POLL_INTERVAL_MS: u64 = 500;

/// Per-job execution timeout, in seconds.
pub const JOB_TIMEOUT_SECS: u64 = 600;

/// Default retry ceiling for queued jobs.
pub const JOB_MAX_RETRIES: i32 = 3;

/// A running job older than this is considered stalled, in seconds.
pub const JOB_STALL_THRESHOLD_SECS: i64 = 900;

// =============================================================================
// EVENTS
// =============================================================================

/// Broadcast buffer capacity for the event bus.
pub const EVENT_BUS_CAPACITY: usize = 256;

/// Interval between periodic queue status broadcasts, in seconds.
pub const QUEUE_STATUS_INTERVAL_SECS: u64 = 5;

// =============================================================================
// PAGINATION
// =============================================================================

/// Default page size for list endpoints.
pub const LIST_LIMIT: i64 = 50;

/// Maximum page size accepted from clients.
pub const LIST_LIMIT_MAX: i64 = 500;

// =============================================================================
// SHARES
// =============================================================================

/// Default lifetime of a meeting share when no expiry is given, in days.
pub const SHARE_DEFAULT_TTL_DAYS: i64 = 7;
