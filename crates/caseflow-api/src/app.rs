//! Application router and HTTP middleware composition.

use axum::http::{header, HeaderValue, Method, StatusCode};
use axum::response::IntoResponse;
use axum::routing::{delete, get, post};
use axum::{Json, Router};
use tower_http::{
    cors::{AllowOrigin, CorsLayer},
    request_id::{MakeRequestId, PropagateRequestIdLayer, RequestId, SetRequestIdLayer},
    trace::TraceLayer,
};
use uuid::Uuid;

use crate::handlers::{cases, documents, expenses, insights, jobs, meetings, orgs, tasks};
use crate::realtime;
use crate::state::AppState;

/// Generates time-ordered UUIDv7 request correlation IDs.
#[derive(Clone, Default)]
struct MakeRequestUuidV7;

impl MakeRequestId for MakeRequestUuidV7 {
    fn make_request_id<B>(&mut self, _request: &axum::http::Request<B>) -> Option<RequestId> {
        let id = Uuid::now_v7().to_string().parse().ok()?;
        Some(RequestId::new(id))
    }
}

/// Allowed CORS origins from `ALLOWED_ORIGINS` (comma-separated).
fn parse_allowed_origins() -> Vec<HeaderValue> {
    let origins_str =
        std::env::var("ALLOWED_ORIGINS").unwrap_or_else(|_| "http://localhost:3000".to_string());

    origins_str
        .split(',')
        .filter_map(|s| {
            let trimmed = s.trim();
            if trimmed.is_empty() {
                return None;
            }
            match trimmed.parse::<HeaderValue>() {
                Ok(v) => Some(v),
                Err(e) => {
                    tracing::warn!("Invalid CORS origin '{}': {}", trimmed, e);
                    None
                }
            }
        })
        .collect()
}

async fn rate_limit_middleware(
    axum::extract::State(state): axum::extract::State<AppState>,
    request: axum::extract::Request,
    next: axum::middleware::Next,
) -> Result<impl IntoResponse, (StatusCode, Json<serde_json::Value>)> {
    if let Some(limiter) = &state.rate_limiter {
        if limiter.check().is_err() {
            tracing::warn!("Rate limit exceeded");
            return Err((
                StatusCode::TOO_MANY_REQUESTS,
                Json(serde_json::json!({
                    "error": "rate_limit_exceeded",
                    "error_description": "Too many requests. Please wait before retrying."
                })),
            ));
        }
    }
    Ok(next.run(request).await)
}

async fn health_check() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "healthy",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

/// Build the v1 router over the given application state.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        // Cases
        .route(
            "/api/v1/cases",
            get(cases::list_cases).post(cases::create_case),
        )
        .route(
            "/api/v1/cases/:id",
            get(cases::get_case)
                .patch(cases::update_case)
                .delete(cases::delete_case),
        )
        // Tasks
        .route(
            "/api/v1/tasks",
            get(tasks::list_tasks).post(tasks::create_task),
        )
        .route(
            "/api/v1/tasks/:id",
            get(tasks::get_task)
                .patch(tasks::update_task)
                .delete(tasks::delete_task),
        )
        // AI task insights
        .route("/api/v1/insights", get(insights::list_insights))
        .route("/api/v1/insights/counts", get(insights::insight_counts))
        .route(
            "/api/v1/insights/:id/feedback",
            post(insights::insight_feedback),
        )
        // Expenses + QuickBooks sync
        .route(
            "/api/v1/expenses",
            get(expenses::list_expenses).post(expenses::create_expense),
        )
        .route("/api/v1/expenses/:id", get(expenses::get_expense))
        .route("/api/v1/expenses/:id/sync", post(expenses::sync_expense))
        // Documents and folders
        .route(
            "/api/v1/folders",
            get(documents::list_folders).post(documents::create_folder),
        )
        .route(
            "/api/v1/documents",
            get(documents::list_documents).post(documents::create_document),
        )
        .route(
            "/api/v1/documents/:id",
            get(documents::get_document).delete(documents::delete_document),
        )
        // Meetings and shares
        .route("/api/v1/meetings", get(meetings::list_meetings))
        .route("/api/v1/meetings/:id", get(meetings::get_meeting))
        .route(
            "/api/v1/meetings/:id/shares",
            get(meetings::list_shares).post(meetings::create_share),
        )
        .route(
            "/api/v1/meetings/:id/shares/:share_id",
            delete(meetings::delete_share),
        )
        // Jobs and worker control
        .route("/api/v1/jobs", get(jobs::list_jobs))
        .route("/api/v1/jobs/stats", get(jobs::queue_stats))
        .route("/api/v1/jobs/workers", post(jobs::worker_action))
        .route("/api/v1/jobs/:id", get(jobs::get_job))
        .route("/api/v1/jobs/:id/retry", post(jobs::retry_job))
        // Organization admin
        .route("/api/v1/org", get(orgs::get_org))
        .route(
            "/api/v1/org/members",
            get(orgs::list_members).post(orgs::add_member),
        )
        .route("/api/v1/org/members/:id", delete(orgs::remove_member))
        .route("/api/v1/org/api-keys", post(orgs::create_api_key))
        .route("/api/v1/org/api-keys/:id", delete(orgs::revoke_api_key))
        // Realtime transports
        .route("/api/v1/ws", get(realtime::ws_handler))
        .route("/api/v1/events", get(realtime::sse_events))
        // Middleware
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            rate_limit_middleware,
        ))
        .layer(TraceLayer::new_for_http())
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuidV7))
        .layer({
            let allowed_origins = parse_allowed_origins();

            CorsLayer::new()
                .allow_origin(AllowOrigin::list(allowed_origins))
                .allow_methods([
                    Method::GET,
                    Method::POST,
                    Method::PATCH,
                    Method::DELETE,
                    Method::OPTIONS,
                ])
                .allow_headers([
                    header::AUTHORIZATION,
                    header::CONTENT_TYPE,
                    header::ACCEPT,
                    header::HeaderName::from_static("x-org-id"),
                ])
                .allow_credentials(true)
                .max_age(std::time::Duration::from_secs(3600))
        })
        .with_state(state)
}
