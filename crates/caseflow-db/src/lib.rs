//! # caseflow-db
//!
//! PostgreSQL database layer for caseflow.
//!
//! This crate provides:
//! - Connection pool management
//! - Repository implementations for all core entities
//! - Organization-scoped queries for tenant isolation
//! - The `job_queue` table backing the background worker
//!
//! ## Example
//!
//! ```rust,ignore
//! use caseflow_db::Database;
//! use caseflow_core::{CaseRepository, CreateCaseRequest};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let db = Database::connect("postgres://localhost/caseflow").await?;
//!
//!     let case = db.cases.create(org_id, CreateCaseRequest {
//!         case_number: "2026-CV-0042".to_string(),
//!         title: "Smith v. Jones".to_string(),
//!         parties: None,
//!         case_type: Some("civil".to_string()),
//!     }).await?;
//!
//!     println!("Created case: {}", case.id);
//!     Ok(())
//! }
//! ```
pub mod cases;
pub mod documents;
pub mod expenses;
pub mod insights;
pub mod jobs;
pub mod meetings;
pub mod orgs;
pub mod pool;
pub mod tasks;

// Re-export core types
pub use caseflow_core::*;

pub use cases::PgCaseRepository;
pub use documents::PgDocumentRepository;
pub use expenses::PgExpenseRepository;
pub use insights::PgInsightRepository;
pub use jobs::PgJobRepository;
pub use meetings::PgMeetingRepository;
pub use orgs::{PgOrgRepository, API_KEY_PREFIX};
pub use pool::{
    create_pool, create_pool_lazy, create_pool_with_config, log_pool_metrics, PoolConfig,
};
pub use tasks::PgTaskRepository;

/// Combined database context with all repositories.
///
/// Clones share repository state, notably the job-queue wake handle,
/// so a job queued through one clone wakes a worker polling another.
#[derive(Clone)]
pub struct Database {
    /// The underlying connection pool.
    pub pool: sqlx::Pool<sqlx::Postgres>,
    /// Case repository.
    pub cases: PgCaseRepository,
    /// Task repository.
    pub tasks: PgTaskRepository,
    /// AI task insight repository.
    pub insights: PgInsightRepository,
    /// Expense repository.
    pub expenses: PgExpenseRepository,
    /// Document and folder repository.
    pub documents: PgDocumentRepository,
    /// Meeting and share repository.
    pub meetings: PgMeetingRepository,
    /// Organization, member, and API key repository.
    pub orgs: PgOrgRepository,
    /// Job queue repository.
    pub jobs: PgJobRepository,
}

impl Database {
    /// Create a new Database instance from a connection pool.
    pub fn new(pool: sqlx::Pool<sqlx::Postgres>) -> Self {
        Self {
            cases: PgCaseRepository::new(pool.clone()),
            tasks: PgTaskRepository::new(pool.clone()),
            insights: PgInsightRepository::new(pool.clone()),
            expenses: PgExpenseRepository::new(pool.clone()),
            documents: PgDocumentRepository::new(pool.clone()),
            meetings: PgMeetingRepository::new(pool.clone()),
            orgs: PgOrgRepository::new(pool.clone()),
            jobs: PgJobRepository::new(pool.clone()),
            pool,
        }
    }

    /// Create a new Database instance by connecting to the given URL.
    pub async fn connect(url: &str) -> Result<Self> {
        let pool = create_pool(url).await?;
        Ok(Self::new(pool))
    }

    /// Create with custom pool configuration.
    pub async fn connect_with_config(url: &str, config: PoolConfig) -> Result<Self> {
        let pool = create_pool_with_config(url, config).await?;
        Ok(Self::new(pool))
    }

    /// Create a Database whose pool connects on first use. Useful for
    /// constructing application state without a live server.
    pub fn connect_lazy(url: &str) -> Result<Self> {
        let pool = create_pool_lazy(url)?;
        Ok(Self::new(pool))
    }

    /// Run pending migrations.
    #[cfg(feature = "migrations")]
    pub async fn migrate(&self) -> Result<()> {
        sqlx::migrate!("../../migrations")
            .run(&self.pool)
            .await
            .map_err(|e| Error::Database(sqlx::Error::Migrate(Box::new(e))))?;
        Ok(())
    }

    /// Get the underlying connection pool.
    pub fn pool(&self) -> &sqlx::Pool<sqlx::Postgres> {
        &self.pool
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_clones_share_the_job_wake_handle() {
        let db = Database::connect_lazy("postgres://localhost/caseflow_test").unwrap();
        let clone = db.clone();
        assert!(Arc::ptr_eq(&db.jobs.job_notify(), &clone.jobs.job_notify()));
    }
}
