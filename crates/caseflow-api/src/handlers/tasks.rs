//! Task CRUD handlers.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;
use uuid::Uuid;

use caseflow_core::{CreateTaskRequest, Task, TaskRepository, UpdateTaskRequest};

use crate::auth::OrgScope;
use crate::error::ApiError;
use crate::handlers::Pagination;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct ListTasksQuery {
    pub case_id: Option<Uuid>,
    pub limit: Option<i64>,
}

pub async fn list_tasks(
    scope: OrgScope,
    State(state): State<AppState>,
    Query(query): Query<ListTasksQuery>,
) -> Result<Json<Vec<Task>>, ApiError> {
    let page = Pagination {
        limit: query.limit,
        offset: None,
    };
    let tasks = state
        .db
        .tasks
        .list(scope.org_id, query.case_id, page.limit())
        .await?;
    Ok(Json(tasks))
}

pub async fn get_task(
    scope: OrgScope,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Task>, ApiError> {
    let task = state
        .db
        .tasks
        .get(scope.org_id, id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Task not found".to_string()))?;
    Ok(Json(task))
}

pub async fn create_task(
    scope: OrgScope,
    State(state): State<AppState>,
    Json(req): Json<CreateTaskRequest>,
) -> Result<(StatusCode, Json<Task>), ApiError> {
    if req.title.trim().is_empty() {
        return Err(ApiError::BadRequest("Title cannot be empty".to_string()));
    }

    let task = state.db.tasks.create(scope.org_id, req).await?;
    Ok((StatusCode::CREATED, Json(task)))
}

pub async fn update_task(
    scope: OrgScope,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(req): Json<UpdateTaskRequest>,
) -> Result<Json<Task>, ApiError> {
    let task = state
        .db
        .tasks
        .update(scope.org_id, id, req)
        .await?
        .ok_or_else(|| ApiError::NotFound("Task not found".to_string()))?;
    Ok(Json(task))
}

pub async fn delete_task(
    scope: OrgScope,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    let deleted = state.db.tasks.delete(scope.org_id, id).await?;
    if !deleted {
        return Err(ApiError::NotFound("Task not found".to_string()));
    }
    Ok(StatusCode::NO_CONTENT)
}
