//! Repository trait definitions.
//!
//! Every tenant-owned repository method takes the scoping `org_id`
//! explicitly; implementations must never return rows from another
//! organization.

use async_trait::async_trait;
use serde_json::Value as JsonValue;
use uuid::Uuid;

use crate::error::Result;
use crate::models::*;

/// Case storage operations.
#[async_trait]
pub trait CaseRepository: Send + Sync {
    async fn create(&self, org_id: Uuid, req: CreateCaseRequest) -> Result<Case>;
    async fn get(&self, org_id: Uuid, id: Uuid) -> Result<Option<Case>>;
    async fn list(&self, org_id: Uuid, limit: i64, offset: i64) -> Result<Vec<Case>>;
    async fn update(&self, org_id: Uuid, id: Uuid, req: UpdateCaseRequest) -> Result<Option<Case>>;
    async fn delete(&self, org_id: Uuid, id: Uuid) -> Result<bool>;
}

/// Task storage operations.
#[async_trait]
pub trait TaskRepository: Send + Sync {
    async fn create(&self, org_id: Uuid, req: CreateTaskRequest) -> Result<Task>;
    async fn get(&self, org_id: Uuid, id: Uuid) -> Result<Option<Task>>;
    async fn list(&self, org_id: Uuid, case_id: Option<Uuid>, limit: i64) -> Result<Vec<Task>>;
    async fn update(&self, org_id: Uuid, id: Uuid, req: UpdateTaskRequest) -> Result<Option<Task>>;
    async fn delete(&self, org_id: Uuid, id: Uuid) -> Result<bool>;
}

/// AI task insight storage operations.
#[async_trait]
pub trait InsightRepository: Send + Sync {
    /// Insert an insight produced by the extraction pipeline.
    async fn insert(&self, insight: &AiTaskInsight) -> Result<()>;
    async fn get(&self, org_id: Uuid, id: Uuid) -> Result<Option<AiTaskInsight>>;
    async fn list(
        &self,
        org_id: Uuid,
        status: Option<InsightStatus>,
        limit: i64,
    ) -> Result<Vec<AiTaskInsight>>;
    /// Authoritative per-status counts for reconciliation.
    async fn counts(&self, org_id: Uuid) -> Result<InsightCounts>;
    /// Apply a review transition. Returns the updated row, or None if the
    /// insight does not exist in this organization.
    async fn review(
        &self,
        org_id: Uuid,
        id: Uuid,
        status: InsightStatus,
        new_title: Option<&str>,
        reviewed_by: Uuid,
    ) -> Result<Option<AiTaskInsight>>;
    async fn delete(&self, org_id: Uuid, id: Uuid) -> Result<bool>;
}

/// Expense storage operations.
#[async_trait]
pub trait ExpenseRepository: Send + Sync {
    async fn create(&self, org_id: Uuid, req: CreateExpenseRequest) -> Result<Expense>;
    async fn get(&self, org_id: Uuid, id: Uuid) -> Result<Option<Expense>>;
    async fn list_for_case(&self, org_id: Uuid, case_id: Uuid) -> Result<Vec<Expense>>;
    /// Record a successful QuickBooks push.
    async fn mark_synced(&self, org_id: Uuid, id: Uuid, qb_id: &str) -> Result<Option<Expense>>;
    /// Record a failed QuickBooks push. The expense stays in `error`
    /// until the next explicit sync call.
    async fn mark_sync_error(&self, org_id: Uuid, id: Uuid, error: &str)
        -> Result<Option<Expense>>;
}

/// Document and folder storage operations.
#[async_trait]
pub trait DocumentRepository: Send + Sync {
    async fn create_folder(&self, org_id: Uuid, req: CreateFolderRequest) -> Result<Folder>;
    /// Folders directly under `parent` (None = top level).
    async fn list_folders(&self, org_id: Uuid, parent: Option<Uuid>) -> Result<Vec<Folder>>;
    async fn create_document(&self, org_id: Uuid, req: CreateDocumentRequest) -> Result<Document>;
    /// Documents directly inside `folder` (None = top level).
    async fn list_documents(&self, org_id: Uuid, folder: Option<Uuid>) -> Result<Vec<Document>>;
    async fn get_document(&self, org_id: Uuid, id: Uuid) -> Result<Option<Document>>;
    async fn delete_document(&self, org_id: Uuid, id: Uuid) -> Result<bool>;
}

/// Meeting/call-recording storage operations.
#[async_trait]
pub trait MeetingRepository: Send + Sync {
    async fn get(&self, org_id: Uuid, id: Uuid) -> Result<Option<Meeting>>;
    async fn list(&self, org_id: Uuid, limit: i64) -> Result<Vec<Meeting>>;
    /// Meetings the member can open: owned, or covered by an unexpired
    /// share. Single query; ordering matches [`MeetingRepository::list`].
    async fn list_accessible(
        &self,
        org_id: Uuid,
        member_id: Uuid,
        limit: i64,
    ) -> Result<Vec<Meeting>>;
    /// Store the AI analysis payload produced for a meeting.
    async fn set_analysis(&self, org_id: Uuid, id: Uuid, analysis: &JsonValue) -> Result<bool>;
    async fn shares_for(&self, meeting_id: Uuid) -> Result<Vec<MeetingShare>>;
    async fn create_share(
        &self,
        meeting_id: Uuid,
        req: CreateShareRequest,
    ) -> Result<MeetingShare>;
    async fn delete_share(&self, meeting_id: Uuid, share_id: Uuid) -> Result<bool>;
}

/// Organization and member administration.
#[async_trait]
pub trait OrgRepository: Send + Sync {
    async fn get(&self, org_id: Uuid) -> Result<Option<Organization>>;
    async fn list_members(&self, org_id: Uuid) -> Result<Vec<Member>>;
    async fn add_member(
        &self,
        org_id: Uuid,
        email: &str,
        display_name: Option<&str>,
        role: MemberRole,
    ) -> Result<Member>;
    async fn remove_member(&self, org_id: Uuid, member_id: Uuid) -> Result<bool>;
    /// Resolve a plaintext API key to a principal, if valid and unrevoked.
    async fn validate_api_key(&self, token: &str) -> Result<Option<AuthPrincipal>>;
}

/// Job queue operations.
#[async_trait]
pub trait JobRepository: Send + Sync {
    /// Queue a new job.
    async fn queue(
        &self,
        org_id: Uuid,
        entity_id: Option<Uuid>,
        job_type: JobType,
        priority: i32,
        payload: Option<JsonValue>,
    ) -> Result<Uuid>;

    /// Queue a job with deduplication (skip if same type+entity pending
    /// or running). Returns None when deduplicated away.
    async fn queue_deduplicated(
        &self,
        org_id: Uuid,
        entity_id: Option<Uuid>,
        job_type: JobType,
        priority: i32,
        payload: Option<JsonValue>,
    ) -> Result<Option<Uuid>>;

    /// Claim the next pending job whose type is in `job_types`.
    /// An empty slice means "claim any type". Claims across all
    /// organizations; the returned job carries its org scope.
    async fn claim_next_for_types(&self, job_types: &[JobType]) -> Result<Option<Job>>;

    /// Update job progress.
    async fn update_progress(&self, job_id: Uuid, percent: i32, message: Option<&str>)
        -> Result<()>;

    /// Mark job as completed.
    async fn complete(&self, job_id: Uuid, result: Option<JsonValue>) -> Result<()>;

    /// Mark job as failed; re-queues automatically while under the retry
    /// ceiling.
    async fn fail(&self, job_id: Uuid, error: &str) -> Result<()>;

    /// Mark job as failed with no re-queue. The retry count is pinned to
    /// the ceiling so neither the automatic path nor a manual retry can
    /// re-run it. Used for jobs with non-idempotent side effects.
    async fn fail_terminal(&self, job_id: Uuid, error: &str) -> Result<()>;

    /// Manual retry of a failed/stalled job: reset to pending.
    /// Eligibility is checked by the caller via [`Job::retry_blocked_reason`].
    async fn retry(&self, org_id: Uuid, job_id: Uuid) -> Result<Option<Job>>;

    /// Transition running jobs past the stall deadline to `stalled`.
    /// Returns the number of jobs transitioned.
    async fn mark_stalled(&self, threshold_secs: i64) -> Result<u64>;

    /// Get a job by ID within an organization.
    async fn get(&self, org_id: Uuid, job_id: Uuid) -> Result<Option<Job>>;

    /// Get a job by ID regardless of organization (worker internals).
    async fn get_any(&self, job_id: Uuid) -> Result<Option<Job>>;

    /// List recent jobs for an organization.
    async fn list(&self, org_id: Uuid, limit: i64) -> Result<Vec<Job>>;

    /// Queue statistics across all organizations.
    async fn queue_stats(&self) -> Result<QueueStats>;

    /// Count of pending jobs.
    async fn pending_count(&self) -> Result<i64>;
}
