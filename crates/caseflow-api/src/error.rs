//! API error type mapped to JSON error responses.

use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;

/// Error type for API handlers, rendered as `{"error": message}`.
#[derive(Debug)]
pub enum ApiError {
    Internal(caseflow_core::Error),
    Unauthorized(String),
    Forbidden(String),
    NotFound(String),
    BadRequest(String),
    Conflict(String),
}

impl From<caseflow_core::Error> for ApiError {
    fn from(err: caseflow_core::Error) -> Self {
        match &err {
            caseflow_core::Error::NotFound(msg) => ApiError::NotFound(msg.clone()),
            caseflow_core::Error::CaseNotFound(_) | caseflow_core::Error::InsightNotFound(_) => {
                ApiError::NotFound(err.to_string())
            }
            caseflow_core::Error::InvalidInput(msg) => ApiError::BadRequest(msg.clone()),
            caseflow_core::Error::Unauthorized(msg) => ApiError::Unauthorized(msg.clone()),
            caseflow_core::Error::Forbidden(msg) => ApiError::Forbidden(msg.clone()),
            caseflow_core::Error::Database(sqlx_err) => {
                let msg = sqlx_err.to_string();
                if msg.contains("duplicate key") || msg.contains("unique constraint") {
                    let friendly = if msg.contains("cases_org_id_case_number") {
                        "A case with this case number already exists".to_string()
                    } else if msg.contains("members_org_id_email") {
                        "A member with this email already exists".to_string()
                    } else if msg.contains("meeting_shares_meeting_id_member_id") {
                        "This meeting is already shared with that member".to_string()
                    } else {
                        msg
                    };
                    return ApiError::Conflict(friendly);
                }
                if msg.contains("foreign key") {
                    return ApiError::BadRequest(msg);
                }
                ApiError::Internal(err)
            }
            _ => ApiError::Internal(err),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        let (status, message) = match self {
            ApiError::Internal(err) => {
                tracing::error!(error = %err, "Unhandled internal error");
                // Internals leak query and connection detail; only show
                // them in debug builds.
                let message = if cfg!(debug_assertions) {
                    err.to_string()
                } else {
                    "Internal server error".to_string()
                };
                (StatusCode::INTERNAL_SERVER_ERROR, message)
            }
            ApiError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, msg),
            ApiError::Forbidden(msg) => (StatusCode::FORBIDDEN, msg),
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::Conflict(msg) => (StatusCode::CONFLICT, msg),
        };

        let body = Json(serde_json::json!({
            "error": message,
        }));

        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_maps_to_404() {
        let err: ApiError = caseflow_core::Error::NotFound("Case not found".to_string()).into();
        assert!(matches!(err, ApiError::NotFound(_)));
    }

    #[test]
    fn test_invalid_input_maps_to_400() {
        let err: ApiError = caseflow_core::Error::InvalidInput("bad".to_string()).into();
        assert!(matches!(err, ApiError::BadRequest(_)));
    }
}
