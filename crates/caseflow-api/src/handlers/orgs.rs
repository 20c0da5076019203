//! Organization, member, and API key administration handlers.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use caseflow_core::{ApiKey, Member, MemberRole, Organization, OrgRepository};

use crate::auth::OrgScope;
use crate::error::ApiError;
use crate::state::AppState;

pub async fn get_org(
    scope: OrgScope,
    State(state): State<AppState>,
) -> Result<Json<Organization>, ApiError> {
    let org = state
        .db
        .orgs
        .get(scope.org_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Organization not found".to_string()))?;
    Ok(Json(org))
}

pub async fn list_members(
    scope: OrgScope,
    State(state): State<AppState>,
) -> Result<Json<Vec<Member>>, ApiError> {
    let members = state.db.orgs.list_members(scope.org_id).await?;
    Ok(Json(members))
}

#[derive(Debug, Deserialize)]
pub struct AddMemberRequest {
    pub email: String,
    #[serde(default)]
    pub display_name: Option<String>,
    pub role: String,
}

fn parse_role(raw: &str) -> Result<MemberRole, ApiError> {
    match raw {
        "admin" => Ok(MemberRole::Admin),
        "member" => Ok(MemberRole::Member),
        other => Err(ApiError::BadRequest(format!(
            "Unknown member role '{}'. Valid roles: admin, member",
            other
        ))),
    }
}

pub async fn add_member(
    scope: OrgScope,
    State(state): State<AppState>,
    Json(req): Json<AddMemberRequest>,
) -> Result<(StatusCode, Json<Member>), ApiError> {
    scope.auth.require_admin()?;

    let email = req.email.trim();
    if email.is_empty() || !email.contains('@') {
        return Err(ApiError::BadRequest("Invalid email address".to_string()));
    }
    let role = parse_role(&req.role)?;

    let member = state
        .db
        .orgs
        .add_member(scope.org_id, email, req.display_name.as_deref(), role)
        .await?;
    tracing::info!(org_id = %scope.org_id, member_id = %member.id, "Member added");
    Ok((StatusCode::CREATED, Json(member)))
}

pub async fn remove_member(
    scope: OrgScope,
    State(state): State<AppState>,
    Path(member_id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    scope.auth.require_admin()?;

    let removed = state.db.orgs.remove_member(scope.org_id, member_id).await?;
    if !removed {
        return Err(ApiError::NotFound("Member not found".to_string()));
    }
    tracing::info!(org_id = %scope.org_id, member_id = %member_id, "Member removed");
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Debug, Deserialize)]
pub struct CreateApiKeyRequest {
    pub label: String,
    /// Member the key acts as; defaults to the caller.
    #[serde(default)]
    pub member_id: Option<Uuid>,
}

/// Response for key creation. The plaintext key is shown exactly once.
#[derive(Debug, Serialize)]
pub struct CreateApiKeyResponse {
    pub api_key: ApiKey,
    pub key: String,
}

pub async fn create_api_key(
    scope: OrgScope,
    State(state): State<AppState>,
    Json(req): Json<CreateApiKeyRequest>,
) -> Result<(StatusCode, Json<CreateApiKeyResponse>), ApiError> {
    scope.auth.require_admin()?;

    if req.label.trim().is_empty() {
        return Err(ApiError::BadRequest(
            "Key label cannot be empty".to_string(),
        ));
    }

    let member_id = req.member_id.unwrap_or_else(|| scope.member_id());
    let (api_key, key) = state
        .db
        .orgs
        .create_api_key(scope.org_id, member_id, req.label.trim())
        .await?;
    tracing::info!(org_id = %scope.org_id, key_id = %api_key.id, "API key created");
    Ok((
        StatusCode::CREATED,
        Json(CreateApiKeyResponse { api_key, key }),
    ))
}

pub async fn revoke_api_key(
    scope: OrgScope,
    State(state): State<AppState>,
    Path(key_id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    scope.auth.require_admin()?;

    let revoked = state.db.orgs.revoke_api_key(scope.org_id, key_id).await?;
    if !revoked {
        return Err(ApiError::NotFound("API key not found".to_string()));
    }
    tracing::info!(org_id = %scope.org_id, key_id = %key_id, "API key revoked");
    Ok(StatusCode::NO_CONTENT)
}
