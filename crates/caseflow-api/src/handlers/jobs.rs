//! Job queue and worker-control handlers.

use axum::extract::{Path, Query, State};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Deserialize;
use serde_json::Value as JsonValue;
use uuid::Uuid;

use caseflow_core::{Job, JobRepository, QueueStats, ServerEvent};
use caseflow_jobs::WorkerAction;

use crate::auth::OrgScope;
use crate::error::ApiError;
use crate::handlers::Pagination;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct ListJobsQuery {
    pub limit: Option<i64>,
}

pub async fn list_jobs(
    scope: OrgScope,
    State(state): State<AppState>,
    Query(query): Query<ListJobsQuery>,
) -> Result<Json<Vec<Job>>, ApiError> {
    let page = Pagination {
        limit: query.limit,
        offset: None,
    };
    let jobs = state.db.jobs.list(scope.org_id, page.limit()).await?;
    Ok(Json(jobs))
}

pub async fn get_job(
    scope: OrgScope,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Job>, ApiError> {
    let job = state
        .db
        .jobs
        .get(scope.org_id, id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Job not found".to_string()))?;
    Ok(Json(job))
}

/// Queue statistics across the whole deployment.
pub async fn queue_stats(
    _scope: OrgScope,
    State(state): State<AppState>,
) -> Result<Json<QueueStats>, ApiError> {
    let stats = state.db.jobs.queue_stats().await?;
    Ok(Json(stats))
}

/// Manually retry a failed or stalled job.
///
/// Eligibility is checked here for the client-facing message and again
/// atomically inside the UPDATE, so a concurrent state change cannot
/// double-queue the job.
pub async fn retry_job(
    scope: OrgScope,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Job>, ApiError> {
    let job = state
        .db
        .jobs
        .get(scope.org_id, id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Job not found".to_string()))?;

    if let Some(reason) = job.retry_blocked_reason() {
        return Err(ApiError::BadRequest(reason));
    }

    let retried = state
        .db
        .jobs
        .retry(scope.org_id, id)
        .await?
        .ok_or_else(|| {
            // Lost the race against a status change since the read above.
            ApiError::BadRequest("Job is no longer retriable".to_string())
        })?;

    tracing::info!(
        job_id = %retried.id,
        org_id = %scope.org_id,
        retry_count = retried.retry_count,
        "Job manually retried"
    );

    state.event_bus.emit(ServerEvent::JobQueued {
        job_id: retried.id,
        org_id: scope.org_id,
        job_type: format!("{:?}", retried.job_type),
        entity_id: retried.entity_id,
    });

    Ok(Json(retried))
}

/// Control the job worker: `{"action": "start" | "restart" | "stop" | "health"}`.
pub async fn worker_action(
    _scope: OrgScope,
    State(state): State<AppState>,
    Json(body): Json<JsonValue>,
) -> Result<Response, ApiError> {
    let raw = body
        .get("action")
        .and_then(|v| v.as_str())
        .ok_or_else(|| ApiError::BadRequest("Missing worker action".to_string()))?;

    let action: WorkerAction = raw.parse()?;

    let response = match action {
        WorkerAction::Start => Json(state.worker.start().await?).into_response(),
        WorkerAction::Restart => Json(state.worker.restart().await?).into_response(),
        WorkerAction::Stop => Json(state.worker.stop().await?).into_response(),
        WorkerAction::Health => Json(state.worker.health().await?).into_response(),
    };
    Ok(response)
}
