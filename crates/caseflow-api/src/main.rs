//! caseflow-api - HTTP API server for caseflow.

use std::net::SocketAddr;
use std::sync::atomic::AtomicUsize;
use std::sync::Arc;

use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use caseflow_core::defaults::EVENT_BUS_CAPACITY;
use caseflow_core::EventBus;
use caseflow_db::Database;
use caseflow_jobs::{JobHandler, WorkerConfig, WorkerManager};
use caseflow_quickbooks::{EnvTokenProvider, QuickBooksClient};

use caseflow_api::app::build_router;
use caseflow_api::handlers::{
    DocumentIndexingHandler, InsightExtractionHandler, QuickbooksSyncHandler,
    TranscriptAnalysisHandler,
};
use caseflow_api::{realtime, AppState};

async fn shutdown_signal() {
    if tokio::signal::ctrl_c().await.is_err() {
        tracing::error!("Failed to listen for shutdown signal");
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "caseflow_api=debug,tower_http=debug".into());
    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .init();

    let database_url = std::env::var("DATABASE_URL")
        .unwrap_or_else(|_| "postgres://localhost/caseflow".to_string());
    let host = std::env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string());
    let port: u16 = std::env::var("PORT")
        .unwrap_or_else(|_| "3000".to_string())
        .parse()
        .unwrap_or(3000);

    let rate_limit_requests: u32 = std::env::var("RATE_LIMIT_REQUESTS")
        .unwrap_or_else(|_| "100".to_string())
        .parse()
        .unwrap_or(100);
    let rate_limit_period_secs: u64 = std::env::var("RATE_LIMIT_PERIOD_SECS")
        .unwrap_or_else(|_| "60".to_string())
        .parse()
        .unwrap_or(60);
    let rate_limit_enabled: bool = std::env::var("RATE_LIMIT_ENABLED")
        .map(|v| v == "true" || v == "1")
        .unwrap_or(true);

    info!("Connecting to database...");
    let db = Database::connect(&database_url).await?;
    info!("Database connected");

    info!("Running database migrations...");
    db.migrate().await?;
    info!("Database migrations complete");

    let event_bus = Arc::new(EventBus::new(EVENT_BUS_CAPACITY));

    // QuickBooks is optional; without QBO_REALM_ID the sync endpoint
    // answers 400 and the sync job handler fails jobs cleanly.
    let qbo = match QuickBooksClient::from_env(Arc::new(EnvTokenProvider)) {
        Ok(client) => {
            info!("QuickBooks sync configured");
            Some(Arc::new(client))
        }
        Err(e) => {
            info!(reason = %e, "QuickBooks sync not configured");
            None
        }
    };

    // Job worker with the full pipeline handler set.
    let worker_config = WorkerConfig::from_env();
    let handlers: Vec<Arc<dyn JobHandler>> = vec![
        Arc::new(InsightExtractionHandler::new(
            db.clone(),
            event_bus.clone(),
        )),
        Arc::new(TranscriptAnalysisHandler::new(db.clone())),
        Arc::new(DocumentIndexingHandler::new(db.clone())),
        Arc::new(QuickbooksSyncHandler::new(db.clone(), qbo.clone())),
    ];
    let worker_enabled = worker_config.enabled;
    let worker = Arc::new(WorkerManager::new(db.clone(), worker_config, handlers));

    // Bridge worker events onto the bus before the worker starts so no
    // startup events are missed.
    tokio::spawn(realtime::worker_event_bridge(
        event_bus.clone(),
        worker.events(),
    ));
    tokio::spawn(realtime::queue_status_emitter(
        event_bus.clone(),
        db.clone(),
    ));

    if worker_enabled {
        let outcome = worker.start().await?;
        info!(running = outcome.running, "Job worker started");
    } else {
        info!("Job worker disabled (JOB_WORKER_ENABLED=false)");
    }

    let rate_limiter = if rate_limit_enabled {
        AppState::build_rate_limiter(rate_limit_requests, rate_limit_period_secs)
    } else {
        None
    };
    info!(
        "Rate limiting: {} ({} requests per {} seconds)",
        if rate_limiter.is_some() {
            "enabled"
        } else {
            "disabled"
        },
        rate_limit_requests,
        rate_limit_period_secs
    );

    let state = AppState {
        db,
        event_bus,
        worker,
        qbo,
        rate_limiter,
        ws_connections: Arc::new(AtomicUsize::new(0)),
    };

    let app = build_router(state);

    let addr: SocketAddr = format!("{}:{}", host, port).parse()?;
    info!("Starting server on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}
