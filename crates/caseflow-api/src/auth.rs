//! Authentication and tenant-scoping extractors.
//!
//! Extractors run in order of declaration in a handler signature, so
//! placing `OrgScope` first guarantees 401 (missing/invalid token)
//! takes precedence over 400/403 (tenant header problems).

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use axum::http::header;
use uuid::Uuid;

use caseflow_core::{AuthPrincipal, OrgRepository};
use caseflow_db::API_KEY_PREFIX;

use crate::error::ApiError;
use crate::state::AppState;

/// Extractor that resolves the Bearer token to a principal.
///
/// Never rejects; anonymous requests resolve to
/// [`AuthPrincipal::Anonymous`]. Use [`RequireAuth`] for endpoints that
/// must be authenticated.
#[derive(Debug, Clone)]
pub struct Auth {
    pub principal: AuthPrincipal,
}

#[axum::async_trait]
impl FromRequestParts<AppState> for Auth {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let auth_header = parts
            .headers
            .get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok());

        let principal = match auth_header {
            Some(header) if header.starts_with("Bearer ") => {
                let token = header.trim_start_matches("Bearer ").trim();
                if token.starts_with(API_KEY_PREFIX) {
                    match state.db.orgs.validate_api_key(token).await {
                        Ok(Some(principal)) => principal,
                        _ => AuthPrincipal::Anonymous,
                    }
                } else {
                    AuthPrincipal::Anonymous
                }
            }
            _ => AuthPrincipal::Anonymous,
        };

        Ok(Auth { principal })
    }
}

/// Extractor that requires a valid API key.
#[derive(Debug, Clone)]
pub struct RequireAuth {
    pub principal: AuthPrincipal,
}

impl RequireAuth {
    /// Organization the caller belongs to.
    pub fn org_id(&self) -> Uuid {
        // RequireAuth only constructs from authenticated principals,
        // and every authenticated principal is org-bound.
        self.principal.org_id().unwrap_or_default()
    }

    /// Member behind the API key.
    pub fn member_id(&self) -> Uuid {
        match self.principal {
            AuthPrincipal::ApiKey { member_id, .. } => member_id,
            AuthPrincipal::Anonymous => Uuid::nil(),
        }
    }

    pub fn require_admin(&self) -> Result<(), ApiError> {
        if !self.principal.is_admin() {
            return Err(ApiError::Forbidden("Admin role required".to_string()));
        }
        Ok(())
    }
}

#[axum::async_trait]
impl FromRequestParts<AppState> for RequireAuth {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let auth = Auth::from_request_parts(parts, state).await?;

        if !auth.principal.is_authenticated() {
            return Err(ApiError::Unauthorized(
                "Authentication required".to_string(),
            ));
        }

        Ok(RequireAuth {
            principal: auth.principal,
        })
    }
}

/// Extractor that requires authentication plus a matching `X-Org-Id`
/// header.
///
/// Missing or unparsable header → 400; header naming a different
/// organization than the principal's → 403.
#[derive(Debug, Clone)]
pub struct OrgScope {
    pub org_id: Uuid,
    pub auth: RequireAuth,
}

impl OrgScope {
    pub fn member_id(&self) -> Uuid {
        self.auth.member_id()
    }
}

#[axum::async_trait]
impl FromRequestParts<AppState> for OrgScope {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        // 401 takes precedence over any header validation.
        let auth = RequireAuth::from_request_parts(parts, state).await?;

        let raw = parts
            .headers
            .get("x-org-id")
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| ApiError::BadRequest("Missing X-Org-Id header".to_string()))?;

        let org_id = Uuid::parse_str(raw.trim())
            .map_err(|_| ApiError::BadRequest(format!("Invalid X-Org-Id header: {}", raw)))?;

        if Some(org_id) != auth.principal.org_id() {
            return Err(ApiError::Forbidden(
                "X-Org-Id does not match the authenticated organization".to_string(),
            ));
        }

        Ok(OrgScope { org_id, auth })
    }
}
