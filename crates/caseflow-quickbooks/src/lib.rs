//! # caseflow-quickbooks
//!
//! QuickBooks Online sync client for caseflow.
//!
//! Pushes expenses to QuickBooks as Purchase entities. Sync is always
//! explicit: an expense transitions `not_synced → synced` or `→ error`
//! only when the sync endpoint is called, and a failed push is never
//! retried automatically.

pub mod client;
pub mod token;

pub use client::{QuickBooksClient, DEFAULT_QBO_URL};
pub use token::{AccessTokenProvider, EnvTokenProvider, StaticTokenProvider, QBO_ACCESS_TOKEN_VAR};
