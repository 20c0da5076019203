//! # caseflow-core
//!
//! Core types, traits, and abstractions for the caseflow platform.
//!
//! This crate provides the foundational data structures and trait
//! definitions that other caseflow crates depend on.

pub mod defaults;
pub mod error;
pub mod events;
pub mod logging;
pub mod models;
pub mod traits;

// Re-export commonly used types at crate root
pub use error::{Error, Result};
pub use events::{ChangeKind, EventBus, EventEnvelope, ServerEvent};
pub use models::*;
pub use traits::*;
