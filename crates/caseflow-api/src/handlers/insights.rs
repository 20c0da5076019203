//! AI task insight review handlers.

use axum::extract::{Path, Query, State};
use axum::Json;
use serde::Deserialize;
use serde_json::Value as JsonValue;
use uuid::Uuid;

use caseflow_core::{
    AiTaskInsight, ChangeKind, InsightCounts, InsightRepository, InsightStatus, ServerEvent,
};

use crate::auth::OrgScope;
use crate::error::ApiError;
use crate::handlers::Pagination;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct ListInsightsQuery {
    pub status: Option<String>,
    pub limit: Option<i64>,
}

pub async fn list_insights(
    scope: OrgScope,
    State(state): State<AppState>,
    Query(query): Query<ListInsightsQuery>,
) -> Result<Json<Vec<AiTaskInsight>>, ApiError> {
    let status = match query.status.as_deref() {
        None => None,
        Some(raw) => Some(InsightStatus::parse(raw).ok_or_else(|| {
            ApiError::BadRequest(format!(
                "Unknown insight status '{}'. Valid statuses: pending, accepted, rejected, auto_applied",
                raw
            ))
        })?),
    };

    let page = Pagination {
        limit: query.limit,
        offset: None,
    };
    let insights = state
        .db
        .insights
        .list(scope.org_id, status, page.limit())
        .await?;
    Ok(Json(insights))
}

/// Authoritative per-status counts. Realtime bridge clients reconcile
/// their optimistic projections against this endpoint.
pub async fn insight_counts(
    scope: OrgScope,
    State(state): State<AppState>,
) -> Result<Json<InsightCounts>, ApiError> {
    let counts = state.db.insights.counts(scope.org_id).await?;
    Ok(Json(counts))
}

/// Apply a review action to an insight.
///
/// Body: `{"action": "accept" | "reject" | "modify", "title": ...}`
/// (`title` required for `modify`). The action is parsed by hand so an
/// unknown value yields a 400 listing the valid set rather than a
/// generic deserialization rejection.
pub async fn insight_feedback(
    scope: OrgScope,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(body): Json<JsonValue>,
) -> Result<Json<AiTaskInsight>, ApiError> {
    let action = body
        .get("action")
        .and_then(|v| v.as_str())
        .ok_or_else(|| ApiError::BadRequest("Missing feedback action".to_string()))?;

    let (status, new_title) = match action {
        "accept" => (InsightStatus::Accepted, None),
        "reject" => (InsightStatus::Rejected, None),
        "modify" => {
            let title = body
                .get("title")
                .and_then(|v| v.as_str())
                .map(str::trim)
                .filter(|t| !t.is_empty())
                .ok_or_else(|| {
                    ApiError::BadRequest(
                        "Feedback action 'modify' requires a replacement title".to_string(),
                    )
                })?;
            (InsightStatus::Accepted, Some(title.to_string()))
        }
        other => {
            return Err(ApiError::BadRequest(format!(
                "Unknown feedback action '{}'. Valid actions: accept, reject, modify",
                other
            )));
        }
    };

    let insight = state
        .db
        .insights
        .review(
            scope.org_id,
            id,
            status,
            new_title.as_deref(),
            scope.member_id(),
        )
        .await?
        .ok_or_else(|| ApiError::NotFound("Insight not found".to_string()))?;

    tracing::info!(
        insight_id = %insight.id,
        org_id = %scope.org_id,
        status = insight.status.as_str(),
        "Insight reviewed"
    );

    state.event_bus.emit(ServerEvent::InsightChanged {
        change: ChangeKind::Update,
        insight: insight.clone(),
    });

    Ok(Json(insight))
}
