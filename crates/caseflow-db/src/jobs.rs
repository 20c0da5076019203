//! Job queue repository implementation.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use serde_json::Value as JsonValue;
use sqlx::{Pool, Postgres, Row};
use tokio::sync::Notify;
use uuid::Uuid;

use caseflow_core::{Error, Job, JobRepository, JobStatus, JobType, QueueStats, Result};

/// PostgreSQL implementation of JobRepository.
///
/// Clones share the notify handle, so a job queued through any clone
/// wakes workers waiting on any other.
#[derive(Clone)]
pub struct PgJobRepository {
    pool: Pool<Postgres>,
    /// Notify handle for event-driven worker wake.
    notify: Arc<Notify>,
}

const JOB_COLUMNS: &str = "id, org_id, entity_id, job_type, status, priority, payload, result, \
                           error_message, progress_percent, progress_message, retry_count, \
                           max_retries, created_at, started_at, completed_at";

impl PgJobRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self {
            pool,
            notify: Arc::new(Notify::new()),
        }
    }

    /// Get the job notification handle for event-driven waking.
    pub fn job_notify(&self) -> Arc<Notify> {
        self.notify.clone()
    }

    fn job_type_to_str(job_type: JobType) -> &'static str {
        match job_type {
            JobType::InsightExtraction => "insight_extraction",
            JobType::TranscriptAnalysis => "transcript_analysis",
            JobType::DocumentIndexing => "document_indexing",
            JobType::QuickbooksSync => "quickbooks_sync",
        }
    }

    fn str_to_job_type(s: &str) -> JobType {
        match s {
            "transcript_analysis" => JobType::TranscriptAnalysis,
            "document_indexing" => JobType::DocumentIndexing,
            "quickbooks_sync" => JobType::QuickbooksSync,
            _ => JobType::InsightExtraction, // fallback
        }
    }

    fn str_to_job_status(s: &str) -> JobStatus {
        match s {
            "running" => JobStatus::Running,
            "completed" => JobStatus::Completed,
            "failed" => JobStatus::Failed,
            "stalled" => JobStatus::Stalled,
            "cancelled" => JobStatus::Cancelled,
            _ => JobStatus::Pending, // fallback
        }
    }

    fn parse_job_row(row: sqlx::postgres::PgRow) -> Job {
        let job_type: String = row.get("job_type");
        let status: String = row.get("status");
        Job {
            id: row.get("id"),
            org_id: row.get("org_id"),
            entity_id: row.get("entity_id"),
            job_type: Self::str_to_job_type(&job_type),
            status: Self::str_to_job_status(&status),
            priority: row.get("priority"),
            payload: row.get("payload"),
            result: row.get("result"),
            error_message: row.get("error_message"),
            progress_percent: row.get("progress_percent"),
            progress_message: row.get("progress_message"),
            retry_count: row.get("retry_count"),
            max_retries: row.get("max_retries"),
            created_at: row.get("created_at"),
            started_at: row.get("started_at"),
            completed_at: row.get("completed_at"),
        }
    }
}

#[async_trait]
impl JobRepository for PgJobRepository {
    async fn queue(
        &self,
        org_id: Uuid,
        entity_id: Option<Uuid>,
        job_type: JobType,
        priority: i32,
        payload: Option<JsonValue>,
    ) -> Result<Uuid> {
        let job_id = Uuid::now_v7();

        sqlx::query(
            "INSERT INTO job_queue (id, org_id, entity_id, job_type, status, priority, payload, created_at)
             VALUES ($1, $2, $3, $4, 'pending', $5, $6, $7)",
        )
        .bind(job_id)
        .bind(org_id)
        .bind(entity_id)
        .bind(Self::job_type_to_str(job_type))
        .bind(priority)
        .bind(&payload)
        .bind(Utc::now())
        .execute(&self.pool)
        .await
        .map_err(Error::Database)?;

        self.notify.notify_waiters();
        Ok(job_id)
    }

    async fn queue_deduplicated(
        &self,
        org_id: Uuid,
        entity_id: Option<Uuid>,
        job_type: JobType,
        priority: i32,
        payload: Option<JsonValue>,
    ) -> Result<Option<Uuid>> {
        // Atomic check-and-insert with INSERT ... WHERE NOT EXISTS to avoid
        // a TOCTOU race between concurrent requests queueing the same work.
        // Only deduplicates when entity_id is present.
        let Some(eid) = entity_id else {
            let job_id = self
                .queue(org_id, entity_id, job_type, priority, payload)
                .await?;
            return Ok(Some(job_id));
        };

        let job_type_str = Self::job_type_to_str(job_type);
        let result = sqlx::query_scalar::<_, Uuid>(
            "INSERT INTO job_queue (id, org_id, entity_id, job_type, status, priority, payload, created_at)
             SELECT $1, $2, $3, $4, 'pending', $5, $6, $7
             WHERE NOT EXISTS (
                 SELECT 1 FROM job_queue
                 WHERE org_id = $2 AND entity_id = $3 AND job_type = $4
                   AND status IN ('pending', 'running')
             )
             RETURNING id",
        )
        .bind(Uuid::now_v7())
        .bind(org_id)
        .bind(eid)
        .bind(job_type_str)
        .bind(priority)
        .bind(&payload)
        .bind(Utc::now())
        .fetch_optional(&self.pool)
        .await
        .map_err(Error::Database)?;

        if result.is_some() {
            self.notify.notify_waiters();
        }
        Ok(result)
    }

    async fn claim_next_for_types(&self, job_types: &[JobType]) -> Result<Option<Job>> {
        let type_strings: Vec<String> = job_types
            .iter()
            .map(|jt| Self::job_type_to_str(*jt).to_string())
            .collect();

        // FOR UPDATE SKIP LOCKED for concurrent claiming. Type filter is
        // applied before the lock; an empty array claims any type.
        let row = sqlx::query(&format!(
            "UPDATE job_queue
             SET status = 'running', started_at = $1
             WHERE id = (
                 SELECT id FROM job_queue
                 WHERE status = 'pending'
                   AND (cardinality($2::text[]) = 0 OR job_type = ANY($2))
                 ORDER BY priority DESC, created_at ASC
                 LIMIT 1
                 FOR UPDATE SKIP LOCKED
             )
             RETURNING {JOB_COLUMNS}"
        ))
        .bind(Utc::now())
        .bind(&type_strings)
        .fetch_optional(&self.pool)
        .await
        .map_err(Error::Database)?;

        Ok(row.map(Self::parse_job_row))
    }

    async fn update_progress(
        &self,
        job_id: Uuid,
        percent: i32,
        message: Option<&str>,
    ) -> Result<()> {
        sqlx::query(
            "UPDATE job_queue SET progress_percent = $1, progress_message = $2 WHERE id = $3",
        )
        .bind(percent)
        .bind(message)
        .bind(job_id)
        .execute(&self.pool)
        .await
        .map_err(Error::Database)?;
        Ok(())
    }

    async fn complete(&self, job_id: Uuid, result: Option<JsonValue>) -> Result<()> {
        sqlx::query(
            "UPDATE job_queue
             SET status = 'completed', completed_at = $1, result = $2, progress_percent = 100
             WHERE id = $3",
        )
        .bind(Utc::now())
        .bind(&result)
        .bind(job_id)
        .execute(&self.pool)
        .await
        .map_err(Error::Database)?;
        Ok(())
    }

    async fn fail(&self, job_id: Uuid, error: &str) -> Result<()> {
        let now = Utc::now();
        let mut tx = self.pool.begin().await.map_err(Error::Database)?;

        let (retry_count, max_retries): (i32, i32) =
            sqlx::query_as("SELECT retry_count, max_retries FROM job_queue WHERE id = $1")
                .bind(job_id)
                .fetch_one(&mut *tx)
                .await
                .map_err(Error::Database)?;

        if retry_count < max_retries {
            // Auto-retry: back to pending with incremented retry count.
            sqlx::query(
                "UPDATE job_queue
                 SET status = 'pending', retry_count = $1, error_message = $2,
                     started_at = NULL, progress_percent = 0, progress_message = NULL
                 WHERE id = $3",
            )
            .bind(retry_count + 1)
            .bind(error)
            .bind(job_id)
            .execute(&mut *tx)
            .await
            .map_err(Error::Database)?;
        } else {
            sqlx::query(
                "UPDATE job_queue
                 SET status = 'failed', completed_at = $1, error_message = $2
                 WHERE id = $3",
            )
            .bind(now)
            .bind(error)
            .bind(job_id)
            .execute(&mut *tx)
            .await
            .map_err(Error::Database)?;
        }

        tx.commit().await.map_err(Error::Database)?;

        if retry_count < max_retries {
            self.notify.notify_waiters();
        }
        Ok(())
    }

    async fn fail_terminal(&self, job_id: Uuid, error: &str) -> Result<()> {
        // retry_count is pinned to the ceiling so the manual retry path
        // refuses this job as well.
        sqlx::query(
            "UPDATE job_queue
             SET status = 'failed', completed_at = $1, error_message = $2,
                 retry_count = max_retries
             WHERE id = $3",
        )
        .bind(Utc::now())
        .bind(error)
        .bind(job_id)
        .execute(&self.pool)
        .await
        .map_err(Error::Database)?;
        Ok(())
    }

    async fn retry(&self, org_id: Uuid, job_id: Uuid) -> Result<Option<Job>> {
        // Status and retry-ceiling eligibility is enforced here as well as
        // by the caller, so a concurrent transition can't slip through.
        let row = sqlx::query(&format!(
            "UPDATE job_queue
             SET status = 'pending', retry_count = retry_count + 1,
                 error_message = NULL, started_at = NULL, completed_at = NULL,
                 progress_percent = 0, progress_message = NULL
             WHERE org_id = $1 AND id = $2
               AND status IN ('failed', 'stalled')
               AND retry_count < max_retries
             RETURNING {JOB_COLUMNS}"
        ))
        .bind(org_id)
        .bind(job_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(Error::Database)?;

        if row.is_some() {
            self.notify.notify_waiters();
        }
        Ok(row.map(Self::parse_job_row))
    }

    async fn mark_stalled(&self, threshold_secs: i64) -> Result<u64> {
        let deadline = Utc::now() - chrono::Duration::seconds(threshold_secs);

        let result = sqlx::query(
            "UPDATE job_queue
             SET status = 'stalled'
             WHERE status = 'running' AND started_at < $1",
        )
        .bind(deadline)
        .execute(&self.pool)
        .await
        .map_err(Error::Database)?;

        Ok(result.rows_affected())
    }

    async fn get(&self, org_id: Uuid, job_id: Uuid) -> Result<Option<Job>> {
        let row = sqlx::query(&format!(
            "SELECT {JOB_COLUMNS} FROM job_queue WHERE org_id = $1 AND id = $2"
        ))
        .bind(org_id)
        .bind(job_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(Error::Database)?;

        Ok(row.map(Self::parse_job_row))
    }

    async fn get_any(&self, job_id: Uuid) -> Result<Option<Job>> {
        let row = sqlx::query(&format!("SELECT {JOB_COLUMNS} FROM job_queue WHERE id = $1"))
            .bind(job_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(Error::Database)?;

        Ok(row.map(Self::parse_job_row))
    }

    async fn list(&self, org_id: Uuid, limit: i64) -> Result<Vec<Job>> {
        let rows = sqlx::query(&format!(
            "SELECT {JOB_COLUMNS} FROM job_queue WHERE org_id = $1
             ORDER BY created_at DESC LIMIT $2"
        ))
        .bind(org_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(Error::Database)?;

        Ok(rows.into_iter().map(Self::parse_job_row).collect())
    }

    async fn queue_stats(&self) -> Result<QueueStats> {
        let row = sqlx::query(
            "SELECT
                 COUNT(*) FILTER (WHERE status = 'pending') AS pending,
                 COUNT(*) FILTER (WHERE status = 'running') AS running,
                 COUNT(*) FILTER (WHERE status = 'completed' AND completed_at > NOW() - INTERVAL '1 hour') AS completed_last_hour,
                 COUNT(*) FILTER (WHERE status = 'failed' AND completed_at > NOW() - INTERVAL '1 hour') AS failed_last_hour,
                 COUNT(*) AS total
             FROM job_queue",
        )
        .fetch_one(&self.pool)
        .await
        .map_err(Error::Database)?;

        Ok(QueueStats {
            pending: row.get("pending"),
            running: row.get("running"),
            completed_last_hour: row.get("completed_last_hour"),
            failed_last_hour: row.get("failed_last_hour"),
            total: row.get("total"),
        })
    }

    async fn pending_count(&self) -> Result<i64> {
        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM job_queue WHERE status = 'pending'")
                .fetch_one(&self.pool)
                .await
                .map_err(Error::Database)?;
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_job_type_conversion_roundtrip() {
        for jt in [
            JobType::InsightExtraction,
            JobType::TranscriptAnalysis,
            JobType::DocumentIndexing,
            JobType::QuickbooksSync,
        ] {
            let s = PgJobRepository::job_type_to_str(jt);
            assert_eq!(PgJobRepository::str_to_job_type(s), jt);
        }
    }

    #[test]
    fn test_unknown_status_falls_back_to_pending() {
        assert_eq!(
            PgJobRepository::str_to_job_status("mystery"),
            JobStatus::Pending
        );
        assert_eq!(
            PgJobRepository::str_to_job_status("stalled"),
            JobStatus::Stalled
        );
    }
}
