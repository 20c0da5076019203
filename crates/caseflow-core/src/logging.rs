//! Structured logging field name constants for caseflow.
//!
//! All crates use these constants for consistent structured logging fields
//! so log aggregation tools can query by standardized names across every
//! subsystem.
//!
//! ## Log Level Contract
//!
//! | Level | Usage |
//! |-------|-------|
//! | ERROR | Degraded service, requires operator attention |
//! | WARN  | Recoverable issue, automatic fallback applied |
//! | INFO  | Lifecycle events (startup, shutdown), operation completions |
//! | DEBUG | Decision points, intermediate values, config choices |
//! | TRACE | Per-item iteration, high-volume data (events, rows) |

// ─── Identity fields ───────────────────────────────────────────────────────

/// Correlation ID propagated across request → job → sub-calls.
/// Format: UUIDv7 (time-ordered).
pub const REQUEST_ID: &str = "request_id";

/// Subsystem originating the log event.
/// Values: "api", "db", "jobs", "realtime", "quickbooks", "client"
pub const SUBSYSTEM: &str = "subsystem";

/// Logical operation name.
/// Examples: "retry_job", "push_expense", "claim_next", "ws_connect"
pub const OPERATION: &str = "op";

// ─── Tenant fields ─────────────────────────────────────────────────────────

/// Organization UUID scoping the operation.
pub const ORG_ID: &str = "org_id";

/// Member UUID performing the operation.
pub const MEMBER_ID: &str = "member_id";

// ─── Entity fields ─────────────────────────────────────────────────────────

/// Case UUID being operated on.
pub const CASE_ID: &str = "case_id";

/// Insight UUID being operated on.
pub const INSIGHT_ID: &str = "insight_id";

/// Expense UUID being operated on.
pub const EXPENSE_ID: &str = "expense_id";

/// Job UUID being processed.
pub const JOB_ID: &str = "job_id";

/// Job type enum variant.
pub const JOB_TYPE: &str = "job_type";

// ─── Measurement fields ────────────────────────────────────────────────────

/// Wall-clock duration in milliseconds.
pub const DURATION_MS: &str = "duration_ms";

/// Number of rows/results returned.
pub const RESULT_COUNT: &str = "result_count";

/// Reconnect attempt counter for the realtime bridge.
pub const ATTEMPT: &str = "attempt";

// ─── Outcome fields ────────────────────────────────────────────────────────

/// Boolean success/failure indicator.
pub const SUCCESS: &str = "success";

/// Error message when an operation fails.
pub const ERROR_MSG: &str = "error";
