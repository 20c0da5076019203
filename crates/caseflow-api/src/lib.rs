//! caseflow-api library surface.
//!
//! The binary in `main.rs` wires these pieces together; they are
//! exposed as a library so integration tests can build routers against
//! a lazily-connected database.

pub mod app;
pub mod auth;
pub mod error;
pub mod handlers;
pub mod realtime;
pub mod state;

pub use app::build_router;
pub use auth::{Auth, OrgScope, RequireAuth};
pub use error::ApiError;
pub use state::AppState;
