//! Authentication precedence tests.
//!
//! These run against a lazily-connected database: no query ever
//! executes because every request is rejected during extraction.

use std::sync::atomic::AtomicUsize;
use std::sync::Arc;

use axum::body::Body;
use axum::extract::State;
use axum::http::{Request, StatusCode};
use axum::routing::post;
use axum::{Json, Router};
use tower::ServiceExt;
use uuid::Uuid;

use caseflow_api::auth::OrgScope;
use caseflow_api::error::ApiError;
use caseflow_api::state::AppState;
use caseflow_core::defaults::EVENT_BUS_CAPACITY;
use caseflow_core::EventBus;
use caseflow_db::Database;
use caseflow_jobs::{WorkerConfig, WorkerManager};

fn test_state() -> AppState {
    let db = Database::connect_lazy("postgres://localhost/caseflow_test")
        .expect("lazy pool construction should not touch the network");
    let worker = Arc::new(WorkerManager::new(
        db.clone(),
        WorkerConfig::default().with_enabled(false),
        vec![],
    ));
    AppState {
        db,
        event_bus: Arc::new(EventBus::new(EVENT_BUS_CAPACITY)),
        worker,
        qbo: None,
        rate_limiter: None,
        ws_connections: Arc::new(AtomicUsize::new(0)),
    }
}

/// Handler that would only run if extraction succeeded.
async fn scoped_echo(
    _scope: OrgScope,
    State(_state): State<AppState>,
) -> Result<Json<serde_json::Value>, ApiError> {
    Ok(Json(serde_json::json!({"reached": true})))
}

fn test_router() -> Router {
    Router::new()
        .route("/api/v1/jobs/:id/retry", post(scoped_echo))
        .with_state(test_state())
}

#[tokio::test]
async fn test_missing_token_is_401() {
    let app = test_router();
    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri(format!("/api/v1/jobs/{}/retry", Uuid::new_v4()))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_401_takes_precedence_over_missing_org_header() {
    // No Authorization header AND no X-Org-Id header: the 401 must win
    // over the 400 the missing tenant header would otherwise produce.
    let app = test_router();
    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri(format!("/api/v1/jobs/{}/retry", Uuid::new_v4()))
                .header("content-type", "application/json")
                .body(Body::from("{}"))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_malformed_bearer_token_is_401() {
    // A token without the API-key prefix never reaches the database.
    let app = test_router();
    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri(format!("/api/v1/jobs/{}/retry", Uuid::new_v4()))
                .header("authorization", "Bearer not-a-real-key")
                .header("x-org-id", Uuid::new_v4().to_string())
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}
