//! Domain models for caseflow.
//!
//! Plain records exchanged over HTTP/JSON. Every tenant-owned entity
//! carries an `org_id`; repositories never return rows across that
//! boundary.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use uuid::Uuid;

// =============================================================================
// ORGANIZATIONS & MEMBERS
// =============================================================================

/// Tenant boundary for all case/document/task data.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Organization {
    pub id: Uuid,
    pub name: String,
    pub created_at: DateTime<Utc>,
}

/// Role of a member within an organization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MemberRole {
    Admin,
    Member,
}

impl MemberRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            MemberRole::Admin => "admin",
            MemberRole::Member => "member",
        }
    }
}

/// A user belonging to an organization.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Member {
    pub id: Uuid,
    pub org_id: Uuid,
    pub email: String,
    pub display_name: Option<String>,
    pub role: MemberRole,
    pub created_at: DateTime<Utc>,
}

/// A hashed API key granting a member programmatic access.
///
/// Only the SHA-256 digest of the key is stored; the plaintext is shown
/// once at creation time.
#[derive(Debug, Clone, Serialize)]
pub struct ApiKey {
    pub id: Uuid,
    pub org_id: Uuid,
    pub member_id: Uuid,
    pub label: String,
    #[serde(skip_serializing)]
    pub key_hash: String,
    pub created_at: DateTime<Utc>,
    pub revoked_at: Option<DateTime<Utc>>,
}

/// Identity resolved from a Bearer token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthPrincipal {
    /// Valid API key.
    ApiKey {
        key_id: Uuid,
        org_id: Uuid,
        member_id: Uuid,
        role: MemberRole,
    },
    /// No or invalid credentials.
    Anonymous,
}

impl AuthPrincipal {
    pub fn is_authenticated(&self) -> bool {
        !matches!(self, AuthPrincipal::Anonymous)
    }

    /// Organization the principal belongs to, if authenticated.
    pub fn org_id(&self) -> Option<Uuid> {
        match self {
            AuthPrincipal::ApiKey { org_id, .. } => Some(*org_id),
            AuthPrincipal::Anonymous => None,
        }
    }

    pub fn is_admin(&self) -> bool {
        matches!(
            self,
            AuthPrincipal::ApiKey {
                role: MemberRole::Admin,
                ..
            }
        )
    }
}

// =============================================================================
// CASES
// =============================================================================

/// Lifecycle status of a case.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CaseStatus {
    Open,
    Pending,
    Closed,
    Archived,
}

/// A legal matter owned by an organization.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Case {
    pub id: Uuid,
    pub org_id: Uuid,
    pub case_number: String,
    pub title: String,
    pub status: CaseStatus,
    /// Named parties, e.g. `[{"name": "...", "role": "plaintiff"}]`.
    pub parties: JsonValue,
    pub case_type: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateCaseRequest {
    pub case_number: String,
    pub title: String,
    #[serde(default)]
    pub parties: Option<JsonValue>,
    #[serde(default)]
    pub case_type: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateCaseRequest {
    pub title: Option<String>,
    pub status: Option<CaseStatus>,
    pub parties: Option<JsonValue>,
    pub case_type: Option<String>,
}

// =============================================================================
// TASKS
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Todo,
    InProgress,
    Done,
    Cancelled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskPriority {
    Low,
    Medium,
    High,
    Urgent,
}

/// A work item scoped to a case or project; hierarchical via `parent_id`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    pub id: Uuid,
    pub org_id: Uuid,
    pub case_id: Option<Uuid>,
    pub project_id: Option<Uuid>,
    pub parent_id: Option<Uuid>,
    pub title: String,
    pub status: TaskStatus,
    pub priority: TaskPriority,
    pub due_date: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateTaskRequest {
    pub title: String,
    #[serde(default)]
    pub case_id: Option<Uuid>,
    #[serde(default)]
    pub project_id: Option<Uuid>,
    #[serde(default)]
    pub parent_id: Option<Uuid>,
    #[serde(default)]
    pub priority: Option<TaskPriority>,
    #[serde(default)]
    pub due_date: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateTaskRequest {
    pub title: Option<String>,
    pub status: Option<TaskStatus>,
    pub priority: Option<TaskPriority>,
    pub due_date: Option<DateTime<Utc>>,
}

// =============================================================================
// AI TASK INSIGHTS
// =============================================================================

/// Where an insight was extracted from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InsightSource {
    Document,
    Transcript,
    Email,
    Chat,
}

/// Review state of an insight.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InsightStatus {
    Pending,
    Accepted,
    Rejected,
    AutoApplied,
}

impl InsightStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            InsightStatus::Pending => "pending",
            InsightStatus::Accepted => "accepted",
            InsightStatus::Rejected => "rejected",
            InsightStatus::AutoApplied => "auto_applied",
        }
    }

    /// Parse a wire value. Unknown values map to `None` so malformed
    /// realtime payloads can be skipped without tearing down a stream.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(InsightStatus::Pending),
            "accepted" => Some(InsightStatus::Accepted),
            "rejected" => Some(InsightStatus::Rejected),
            "auto_applied" => Some(InsightStatus::AutoApplied),
            _ => None,
        }
    }
}

/// A suggested task derived from a document/transcript/email/chat source.
///
/// Created by the extraction pipeline, transitioned by user review
/// actions. Last-write-wins; there is no optimistic-lock field.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AiTaskInsight {
    pub id: Uuid,
    pub org_id: Uuid,
    pub case_id: Option<Uuid>,
    pub source: InsightSource,
    pub suggested_title: String,
    pub confidence: f64,
    /// Extracted entities, e.g. `{"people": [...], "dates": [...]}`.
    pub entities: JsonValue,
    pub status: InsightStatus,
    pub created_at: DateTime<Utc>,
    pub reviewed_at: Option<DateTime<Utc>>,
    pub reviewed_by: Option<Uuid>,
}

/// Review action applied to a pending insight.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", tag = "action")]
pub enum InsightFeedback {
    Accept,
    Reject,
    /// Accept with an edited title.
    Modify {
        title: String,
    },
}

/// Authoritative per-status counts for an organization's insights.
///
/// Served by `GET /insights/counts`; the realtime bridge reconciles its
/// optimistic projection against this.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InsightCounts {
    pub pending: i64,
    pub accepted: i64,
    pub rejected: i64,
    pub auto_applied: i64,
    pub total: i64,
}

// =============================================================================
// EXPENSES
// =============================================================================

/// Whether a financial record has been mirrored to QuickBooks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QbSyncStatus {
    NotSynced,
    Synced,
    Error,
}

impl QbSyncStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            QbSyncStatus::NotSynced => "not_synced",
            QbSyncStatus::Synced => "synced",
            QbSyncStatus::Error => "error",
        }
    }
}

/// A case-scoped financial record with optional QuickBooks sync fields.
///
/// Sync transitions `not_synced → synced | error`, driven by explicit
/// sync calls only; failed syncs are never retried automatically.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Expense {
    pub id: Uuid,
    pub org_id: Uuid,
    pub case_id: Uuid,
    pub description: String,
    pub amount_cents: i64,
    pub incurred_on: DateTime<Utc>,
    pub qb_sync_status: QbSyncStatus,
    pub qb_id: Option<String>,
    pub qb_sync_error: Option<String>,
    pub synced_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateExpenseRequest {
    pub case_id: Uuid,
    pub description: String,
    pub amount_cents: i64,
    #[serde(default)]
    pub incurred_on: Option<DateTime<Utc>>,
}

// =============================================================================
// DOCUMENTS & FOLDERS
// =============================================================================

/// Sentinel used on the wire for the top of the folder hierarchy.
pub const ROOT_FOLDER: &str = "root";

/// A folder in the document hierarchy. `parent_id = None` means top level.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Folder {
    pub id: Uuid,
    pub org_id: Uuid,
    pub case_id: Option<Uuid>,
    pub parent_id: Option<Uuid>,
    pub name: String,
    pub created_at: DateTime<Utc>,
}

/// A storage-service-backed document record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    pub id: Uuid,
    pub org_id: Uuid,
    pub case_id: Option<Uuid>,
    pub folder_id: Option<Uuid>,
    pub name: String,
    pub content_type: String,
    pub size_bytes: i64,
    pub storage_key: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateFolderRequest {
    pub name: String,
    /// Parent folder id or the `"root"` sentinel.
    pub parent: String,
    #[serde(default)]
    pub case_id: Option<Uuid>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateDocumentRequest {
    pub name: String,
    pub content_type: String,
    pub size_bytes: i64,
    pub storage_key: String,
    /// Containing folder id or the `"root"` sentinel.
    pub folder: String,
    #[serde(default)]
    pub case_id: Option<Uuid>,
}

/// Resolve a wire folder reference to an optional folder id.
///
/// `"root"` maps to `None`; anything else must be a UUID.
pub fn parse_folder_ref(raw: &str) -> crate::Result<Option<Uuid>> {
    if raw == ROOT_FOLDER {
        return Ok(None);
    }
    Uuid::parse_str(raw)
        .map(Some)
        .map_err(|_| crate::Error::InvalidInput(format!("Invalid folder reference: {}", raw)))
}

// =============================================================================
// MEETINGS / CALL RECORDINGS
// =============================================================================

/// A recorded meeting or call with transcript and AI analysis payload.
///
/// Access-controlled via owner/shared semantics: the owner always has
/// access, others need an unexpired [`MeetingShare`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Meeting {
    pub id: Uuid,
    pub org_id: Uuid,
    pub case_id: Option<Uuid>,
    pub owner_id: Uuid,
    pub title: String,
    pub transcript: Option<String>,
    /// AI analysis payload (summary, action items, sentiment).
    pub analysis: Option<JsonValue>,
    pub recorded_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

/// A share record granting a member access to a meeting, optionally expiring.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MeetingShare {
    pub id: Uuid,
    pub meeting_id: Uuid,
    pub member_id: Uuid,
    pub expires_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl MeetingShare {
    /// A share grants access while unexpired.
    pub fn is_active(&self, now: DateTime<Utc>) -> bool {
        match self.expires_at {
            Some(exp) => exp > now,
            None => true,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateShareRequest {
    pub member_id: Uuid,
    #[serde(default)]
    pub expires_at: Option<DateTime<Utc>>,
}

// =============================================================================
// JOBS
// =============================================================================

/// Status of a queued job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Pending,
    Running,
    Completed,
    Failed,
    /// Running past the stall deadline; eligible for manual retry.
    Stalled,
    Cancelled,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Pending => "pending",
            JobStatus::Running => "running",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
            JobStatus::Stalled => "stalled",
            JobStatus::Cancelled => "cancelled",
        }
    }
}

/// Type of job to process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobType {
    /// Extract task suggestions from a document/transcript/email/chat.
    InsightExtraction,
    /// Analyze a call/meeting transcript (summary, action items).
    TranscriptAnalysis,
    /// Index an uploaded document for search.
    DocumentIndexing,
    /// Push an expense to QuickBooks.
    QuickbooksSync,
}

impl JobType {
    /// Default queue priority for this job type.
    pub fn default_priority(&self) -> i32 {
        match self {
            JobType::InsightExtraction => 5,
            JobType::TranscriptAnalysis => 5,
            JobType::DocumentIndexing => 3,
            JobType::QuickbooksSync => 8,
        }
    }
}

/// A queued background job.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    pub id: Uuid,
    pub org_id: Uuid,
    /// Entity the job operates on (insight, document, expense...).
    pub entity_id: Option<Uuid>,
    pub job_type: JobType,
    pub status: JobStatus,
    pub priority: i32,
    pub payload: Option<JsonValue>,
    pub result: Option<JsonValue>,
    pub error_message: Option<String>,
    pub progress_percent: i32,
    pub progress_message: Option<String>,
    pub retry_count: i32,
    pub max_retries: i32,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl Job {
    /// Why a manual retry must be refused, if it must.
    ///
    /// Only `failed` and `stalled` jobs below their retry ceiling are
    /// retriable. The returned message goes to the client verbatim.
    pub fn retry_blocked_reason(&self) -> Option<String> {
        if !matches!(self.status, JobStatus::Failed | JobStatus::Stalled) {
            return Some(format!(
                "Job cannot be retried because it is currently {}",
                self.status.as_str()
            ));
        }
        if self.retry_count >= self.max_retries {
            return Some(format!(
                "Job has exhausted its retries ({} of {})",
                self.retry_count, self.max_retries
            ));
        }
        None
    }
}

/// Queue statistics summary.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueStats {
    pub pending: i64,
    pub running: i64,
    pub completed_last_hour: i64,
    pub failed_last_hour: i64,
    pub total: i64,
}

/// Per-status breakdown used by health reporting.
pub type StatusCounts = HashMap<String, i64>;

#[cfg(test)]
mod tests {
    use super::*;

    fn job(status: JobStatus, retry_count: i32, max_retries: i32) -> Job {
        Job {
            id: Uuid::nil(),
            org_id: Uuid::nil(),
            entity_id: None,
            job_type: JobType::InsightExtraction,
            status,
            priority: 5,
            payload: None,
            result: None,
            error_message: None,
            progress_percent: 0,
            progress_message: None,
            retry_count,
            max_retries,
            created_at: Utc::now(),
            started_at: None,
            completed_at: None,
        }
    }

    #[test]
    fn test_retry_refused_for_completed_job() {
        let j = job(JobStatus::Completed, 1, 3);
        let reason = j.retry_blocked_reason().expect("should be blocked");
        assert!(reason.contains("Job cannot be retried"));
        assert!(reason.contains("is currently completed"));
    }

    #[test]
    fn test_retry_refused_for_pending_and_running() {
        for status in [JobStatus::Pending, JobStatus::Running, JobStatus::Cancelled] {
            let j = job(status, 0, 3);
            assert!(j.retry_blocked_reason().is_some(), "{:?}", status);
        }
    }

    #[test]
    fn test_retry_refused_at_max_retries() {
        let j = job(JobStatus::Failed, 3, 3);
        let reason = j.retry_blocked_reason().expect("should be blocked");
        assert!(reason.contains("exhausted"));
    }

    #[test]
    fn test_retry_allowed_for_failed_and_stalled_below_ceiling() {
        assert!(job(JobStatus::Failed, 2, 3).retry_blocked_reason().is_none());
        assert!(job(JobStatus::Stalled, 0, 3)
            .retry_blocked_reason()
            .is_none());
    }

    #[test]
    fn test_insight_status_parse_roundtrip() {
        for s in ["pending", "accepted", "rejected", "auto_applied"] {
            let parsed = InsightStatus::parse(s).unwrap();
            assert_eq!(parsed.as_str(), s);
        }
        assert!(InsightStatus::parse("bogus").is_none());
    }

    #[test]
    fn test_insight_feedback_wire_shape() {
        let accept: InsightFeedback = serde_json::from_str(r#"{"action":"accept"}"#).unwrap();
        assert_eq!(accept, InsightFeedback::Accept);

        let modify: InsightFeedback =
            serde_json::from_str(r#"{"action":"modify","title":"File motion"}"#).unwrap();
        assert_eq!(
            modify,
            InsightFeedback::Modify {
                title: "File motion".to_string()
            }
        );

        assert!(serde_json::from_str::<InsightFeedback>(r#"{"action":"bogus"}"#).is_err());
    }

    #[test]
    fn test_parse_folder_ref_root_sentinel() {
        assert_eq!(parse_folder_ref("root").unwrap(), None);
        let id = Uuid::new_v4();
        assert_eq!(parse_folder_ref(&id.to_string()).unwrap(), Some(id));
        assert!(parse_folder_ref("not-a-uuid").is_err());
    }

    #[test]
    fn test_meeting_share_expiry() {
        let now = Utc::now();
        let share = MeetingShare {
            id: Uuid::nil(),
            meeting_id: Uuid::nil(),
            member_id: Uuid::nil(),
            expires_at: Some(now - chrono::Duration::minutes(1)),
            created_at: now - chrono::Duration::days(1),
        };
        assert!(!share.is_active(now));

        let open_ended = MeetingShare {
            expires_at: None,
            ..share.clone()
        };
        assert!(open_ended.is_active(now));

        let future = MeetingShare {
            expires_at: Some(now + chrono::Duration::hours(1)),
            ..share
        };
        assert!(future.is_active(now));
    }

    #[test]
    fn test_job_status_serde_names() {
        assert_eq!(
            serde_json::to_string(&JobStatus::Stalled).unwrap(),
            r#""stalled""#
        );
        assert_eq!(
            serde_json::to_string(&QbSyncStatus::NotSynced).unwrap(),
            r#""not_synced""#
        );
    }

    #[test]
    fn test_auth_principal_helpers() {
        let org = Uuid::new_v4();
        let p = AuthPrincipal::ApiKey {
            key_id: Uuid::new_v4(),
            org_id: org,
            member_id: Uuid::new_v4(),
            role: MemberRole::Admin,
        };
        assert!(p.is_authenticated());
        assert!(p.is_admin());
        assert_eq!(p.org_id(), Some(org));

        assert!(!AuthPrincipal::Anonymous.is_authenticated());
        assert_eq!(AuthPrincipal::Anonymous.org_id(), None);
    }
}
