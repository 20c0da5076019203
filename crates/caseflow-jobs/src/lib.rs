//! # caseflow-jobs
//!
//! Background job queue system for caseflow.
//!
//! This crate provides:
//! - Priority-based job queueing
//! - Async job processing with concurrent workers
//! - Progress tracking and notifications via broadcast channels
//! - Retry logic with configurable limits
//! - A DI'd worker manager exposing start/restart/stop/health
//!
//! ## Example
//!
//! ```ignore
//! use caseflow_jobs::{WorkerBuilder, WorkerConfig, NoOpHandler};
//! use caseflow_db::Database;
//! use caseflow_core::JobType;
//!
//! let db = Database::connect("postgres://...").await?;
//!
//! let worker = WorkerBuilder::new(db)
//!     .with_config(WorkerConfig::from_env())
//!     .with_handler(NoOpHandler::new(JobType::DocumentIndexing))
//!     .build()
//!     .await;
//!
//! let handle = worker.start();
//!
//! let mut events = handle.events();
//! while let Ok(event) = events.recv().await {
//!     println!("Event: {:?}", event);
//! }
//!
//! handle.shutdown().await?;
//! ```

pub mod handler;
pub mod manager;
pub mod worker;

// Re-export core types
pub use caseflow_core::*;

pub use handler::{JobContext, JobHandler, JobResult, NoOpHandler};
pub use manager::{ActionOutcome, WorkerAction, WorkerHealth, WorkerManager, VALID_ACTIONS};
pub use worker::{JobWorker, WorkerBuilder, WorkerConfig, WorkerEvent, WorkerHandle};

/// Default maximum retries for failed jobs.
pub const DEFAULT_MAX_RETRIES: i32 = caseflow_core::defaults::JOB_MAX_RETRIES;

/// Default polling interval for job processing (milliseconds).
pub const DEFAULT_POLL_INTERVAL_MS: u64 = caseflow_core::defaults::JOB_POLL_INTERVAL_MS;
