//! # caseflow-client
//!
//! Typed HTTP client for the caseflow API plus a cancellable
//! document-preview fetcher. Each client method performs exactly one
//! request; retry, timeout, and caching policies belong to the caller.

pub mod client;
pub mod preview;

pub use client::{ApiClient, ApiClientError, ClientResult, StaticToken, TokenSource};
pub use preview::{PreviewFetcher, PreviewHandle, PreviewSink};
