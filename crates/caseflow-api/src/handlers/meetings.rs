//! Meeting and meeting-share handlers.
//!
//! A meeting is visible to its owner and to members holding an
//! unexpired share. Everyone else gets 403, existence included — the
//! meeting row itself is org-scoped so cross-tenant requests 404.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use chrono::Utc;
use uuid::Uuid;

use caseflow_core::{CreateShareRequest, Meeting, MeetingRepository, MeetingShare};

use crate::auth::OrgScope;
use crate::error::ApiError;
use crate::handlers::Pagination;
use crate::state::AppState;

/// Check owner-or-active-share access for the calling member.
async fn check_access(
    state: &AppState,
    meeting: &Meeting,
    member_id: Uuid,
) -> Result<(), ApiError> {
    if meeting.owner_id == member_id {
        return Ok(());
    }
    let now = Utc::now();
    let shares = state.db.meetings.shares_for(meeting.id).await?;
    if shares
        .iter()
        .any(|s| s.member_id == member_id && s.is_active(now))
    {
        return Ok(());
    }
    Err(ApiError::Forbidden(
        "You do not have access to this meeting".to_string(),
    ))
}

pub async fn list_meetings(
    scope: OrgScope,
    State(state): State<AppState>,
    Query(page): Query<Pagination>,
) -> Result<Json<Vec<Meeting>>, ApiError> {
    // Listing shows only meetings the caller can open; the access
    // filter runs in a single query.
    let meetings = state
        .db
        .meetings
        .list_accessible(scope.org_id, scope.member_id(), page.limit())
        .await?;
    Ok(Json(meetings))
}

pub async fn get_meeting(
    scope: OrgScope,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Meeting>, ApiError> {
    let meeting = state
        .db
        .meetings
        .get(scope.org_id, id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Meeting not found".to_string()))?;

    check_access(&state, &meeting, scope.member_id()).await?;
    Ok(Json(meeting))
}

pub async fn list_shares(
    scope: OrgScope,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Vec<MeetingShare>>, ApiError> {
    let meeting = state
        .db
        .meetings
        .get(scope.org_id, id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Meeting not found".to_string()))?;

    check_access(&state, &meeting, scope.member_id()).await?;
    let shares = state.db.meetings.shares_for(meeting.id).await?;
    Ok(Json(shares))
}

/// Share a meeting with another member. Only the owner can share.
pub async fn create_share(
    scope: OrgScope,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(req): Json<CreateShareRequest>,
) -> Result<(StatusCode, Json<MeetingShare>), ApiError> {
    let meeting = state
        .db
        .meetings
        .get(scope.org_id, id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Meeting not found".to_string()))?;

    if meeting.owner_id != scope.member_id() {
        return Err(ApiError::Forbidden(
            "Only the meeting owner can manage shares".to_string(),
        ));
    }

    if let Some(expires_at) = req.expires_at {
        if expires_at <= Utc::now() {
            return Err(ApiError::BadRequest(
                "Share expiry must be in the future".to_string(),
            ));
        }
    }

    let share = state.db.meetings.create_share(meeting.id, req).await?;
    Ok((StatusCode::CREATED, Json(share)))
}

pub async fn delete_share(
    scope: OrgScope,
    State(state): State<AppState>,
    Path((id, share_id)): Path<(Uuid, Uuid)>,
) -> Result<StatusCode, ApiError> {
    let meeting = state
        .db
        .meetings
        .get(scope.org_id, id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Meeting not found".to_string()))?;

    if meeting.owner_id != scope.member_id() {
        return Err(ApiError::Forbidden(
            "Only the meeting owner can manage shares".to_string(),
        ));
    }

    let deleted = state.db.meetings.delete_share(meeting.id, share_id).await?;
    if !deleted {
        return Err(ApiError::NotFound("Share not found".to_string()));
    }
    Ok(StatusCode::NO_CONTENT)
}
