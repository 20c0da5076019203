//! Case CRUD handlers.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use uuid::Uuid;

use caseflow_core::{Case, CaseRepository, CreateCaseRequest, UpdateCaseRequest};

use crate::auth::OrgScope;
use crate::error::ApiError;
use crate::handlers::Pagination;
use crate::state::AppState;

pub async fn list_cases(
    scope: OrgScope,
    State(state): State<AppState>,
    Query(page): Query<Pagination>,
) -> Result<Json<Vec<Case>>, ApiError> {
    let cases = state
        .db
        .cases
        .list(scope.org_id, page.limit(), page.offset())
        .await?;
    Ok(Json(cases))
}

pub async fn get_case(
    scope: OrgScope,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Case>, ApiError> {
    let case = state
        .db
        .cases
        .get(scope.org_id, id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Case not found".to_string()))?;
    Ok(Json(case))
}

pub async fn create_case(
    scope: OrgScope,
    State(state): State<AppState>,
    Json(req): Json<CreateCaseRequest>,
) -> Result<(StatusCode, Json<Case>), ApiError> {
    if req.case_number.trim().is_empty() {
        return Err(ApiError::BadRequest(
            "Case number cannot be empty".to_string(),
        ));
    }
    if req.title.trim().is_empty() {
        return Err(ApiError::BadRequest("Title cannot be empty".to_string()));
    }

    let case = state.db.cases.create(scope.org_id, req).await?;
    tracing::info!(case_id = %case.id, org_id = %scope.org_id, "Case created");
    Ok((StatusCode::CREATED, Json(case)))
}

pub async fn update_case(
    scope: OrgScope,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(req): Json<UpdateCaseRequest>,
) -> Result<Json<Case>, ApiError> {
    let case = state
        .db
        .cases
        .update(scope.org_id, id, req)
        .await?
        .ok_or_else(|| ApiError::NotFound("Case not found".to_string()))?;
    Ok(Json(case))
}

pub async fn delete_case(
    scope: OrgScope,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    let deleted = state.db.cases.delete(scope.org_id, id).await?;
    if !deleted {
        return Err(ApiError::NotFound("Case not found".to_string()));
    }
    Ok(StatusCode::NO_CONTENT)
}
