//! Worker lifecycle manager.
//!
//! Owns the running worker instance and exposes the typed actions the
//! API surfaces (`start`, `restart`, `stop`, `health`). The manager is
//! constructed once and handed to whoever needs it; there is no global
//! singleton.

use std::str::FromStr;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::{broadcast, Mutex};
use tracing::{info, warn};

use caseflow_core::{defaults, Error, JobRepository, Result};
use caseflow_db::Database;

use crate::handler::JobHandler;
use crate::worker::{JobWorker, WorkerConfig, WorkerEvent, WorkerHandle};

/// Typed worker control action.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerAction {
    Start,
    Restart,
    Stop,
    Health,
}

/// The valid action set, in the order reported to clients.
pub const VALID_ACTIONS: &str = "start, restart, stop, health";

impl FromStr for WorkerAction {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "start" => Ok(WorkerAction::Start),
            "restart" => Ok(WorkerAction::Restart),
            "stop" => Ok(WorkerAction::Stop),
            "health" => Ok(WorkerAction::Health),
            other => Err(Error::InvalidInput(format!(
                "Unknown worker action '{}'. Valid actions: {}",
                other, VALID_ACTIONS
            ))),
        }
    }
}

/// Snapshot returned by the `health` action.
#[derive(Debug, Clone, Serialize)]
pub struct WorkerHealth {
    pub running: bool,
    pub pending: i64,
    pub active_since: Option<DateTime<Utc>>,
}

/// Outcome of a control action, serialized to the API response.
#[derive(Debug, Clone, Serialize)]
pub struct ActionOutcome {
    pub action: &'static str,
    pub running: bool,
    /// Set when the action was a no-op (already running / not running).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

struct RunningWorker {
    handle: WorkerHandle,
    started_at: DateTime<Utc>,
}

/// Manages the lifecycle of a single job worker.
pub struct WorkerManager {
    db: Database,
    config: WorkerConfig,
    handlers: Vec<Arc<dyn JobHandler>>,
    state: Mutex<Option<RunningWorker>>,
    /// Worker events forwarded here survive restarts, so subscribers
    /// keep a stable channel across worker generations.
    event_tx: broadcast::Sender<WorkerEvent>,
}

impl WorkerManager {
    /// Create a manager with the given handler set. The worker is not
    /// started until [`WorkerManager::start`] is called.
    pub fn new(db: Database, config: WorkerConfig, handlers: Vec<Arc<dyn JobHandler>>) -> Self {
        let (event_tx, _) = broadcast::channel(defaults::EVENT_BUS_CAPACITY);
        Self {
            db,
            config,
            handlers,
            state: Mutex::new(None),
            event_tx,
        }
    }

    /// Subscribe to worker events. The subscription survives restarts.
    pub fn events(&self) -> broadcast::Receiver<WorkerEvent> {
        self.event_tx.subscribe()
    }

    /// Start the worker. A no-op when already running.
    pub async fn start(&self) -> Result<ActionOutcome> {
        let mut state = self.state.lock().await;
        if state.is_some() {
            return Ok(ActionOutcome {
                action: "start",
                running: true,
                detail: Some("Worker is already running".to_string()),
            });
        }

        let handle = self.spawn_worker().await;
        *state = Some(RunningWorker {
            handle,
            started_at: Utc::now(),
        });
        info!("Worker started via manager");

        Ok(ActionOutcome {
            action: "start",
            running: true,
            detail: None,
        })
    }

    /// Stop the worker gracefully. A no-op when not running.
    pub async fn stop(&self) -> Result<ActionOutcome> {
        let mut state = self.state.lock().await;
        match state.take() {
            Some(running) => {
                if let Err(e) = running.handle.shutdown().await {
                    warn!(error = ?e, "Worker shutdown signal failed");
                }
                info!("Worker stopped via manager");
                Ok(ActionOutcome {
                    action: "stop",
                    running: false,
                    detail: None,
                })
            }
            None => Ok(ActionOutcome {
                action: "stop",
                running: false,
                detail: Some("Worker is not running".to_string()),
            }),
        }
    }

    /// Stop (if running) then start the worker.
    pub async fn restart(&self) -> Result<ActionOutcome> {
        let mut state = self.state.lock().await;
        if let Some(running) = state.take() {
            if let Err(e) = running.handle.shutdown().await {
                warn!(error = ?e, "Worker shutdown signal failed");
            }
        }

        let handle = self.spawn_worker().await;
        *state = Some(RunningWorker {
            handle,
            started_at: Utc::now(),
        });
        info!("Worker restarted via manager");

        Ok(ActionOutcome {
            action: "restart",
            running: true,
            detail: None,
        })
    }

    /// Report worker health: running flag, pending queue depth, and
    /// when the current worker generation started.
    pub async fn health(&self) -> Result<WorkerHealth> {
        let (running, active_since) = {
            let state = self.state.lock().await;
            match state.as_ref() {
                Some(r) => (true, Some(r.started_at)),
                None => (false, None),
            }
        };
        let pending = self.db.jobs.pending_count().await?;

        Ok(WorkerHealth {
            running,
            pending,
            active_since,
        })
    }

    /// Whether a worker is currently running.
    pub async fn is_running(&self) -> bool {
        self.state.lock().await.is_some()
    }

    async fn spawn_worker(&self) -> WorkerHandle {
        let worker = JobWorker::new(self.db.clone(), self.config.clone());
        for handler in &self.handlers {
            worker.register_handler(handler.clone()).await;
        }

        let handle = worker.start();

        // Forward this generation's events to the stable channel.
        let mut rx = handle.events();
        let tx = self.event_tx.clone();
        tokio::spawn(async move {
            loop {
                match rx.recv().await {
                    Ok(event) => {
                        let stopped = matches!(event, WorkerEvent::WorkerStopped);
                        let _ = tx.send(event);
                        if stopped {
                            break;
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        warn!(skipped, "Worker event forwarder lagged");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        });

        handle
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_action_parse_valid() {
        assert_eq!("start".parse::<WorkerAction>().unwrap(), WorkerAction::Start);
        assert_eq!(
            "restart".parse::<WorkerAction>().unwrap(),
            WorkerAction::Restart
        );
        assert_eq!("stop".parse::<WorkerAction>().unwrap(), WorkerAction::Stop);
        assert_eq!(
            "health".parse::<WorkerAction>().unwrap(),
            WorkerAction::Health
        );
    }

    #[test]
    fn test_action_parse_unknown_lists_valid_set() {
        let err = "bogus".parse::<WorkerAction>().unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("bogus"));
        assert!(msg.contains("start, restart, stop, health"));
    }

    #[test]
    fn test_action_parse_is_case_sensitive() {
        assert!("Start".parse::<WorkerAction>().is_err());
        assert!("STOP".parse::<WorkerAction>().is_err());
        assert!("".parse::<WorkerAction>().is_err());
    }
}
