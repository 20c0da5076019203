//! Smoke tests over the full application router.
//!
//! Built against a lazily-connected database: every request here is
//! answered before any query would run.

use std::sync::atomic::AtomicUsize;
use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use tower::ServiceExt;
use uuid::Uuid;

use caseflow_api::{build_router, AppState};
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

#[tokio::test]
async fn test_health_endpoint_responds() {
    let app = build_router(test_state());
    let response = app
        .oneshot(
            Request::builder()
                .uri("/health")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);

    let body = axum::body::to_bytes(response.into_body(), 1024).await.unwrap();
    let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json["status"], "healthy");
}

#[tokio::test]
async fn test_protected_routes_reject_unauthenticated_requests() {
    let app = build_router(test_state());
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
async fn test_unknown_route_is_404() {
    let app = build_router(test_state());
    let response = app
        .oneshot(
            Request::builder()
                .uri("/api/v1/nonexistent")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}
