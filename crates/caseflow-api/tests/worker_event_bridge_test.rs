//! Worker-event bridge: WorkerEvent → ServerEvent envelope conversion.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast;
use tokio::time::timeout;
use uuid::Uuid;

use caseflow_api::realtime::worker_event_bridge;
use caseflow_core::{EventBus, JobType, ServerEvent};
use caseflow_jobs::WorkerEvent;

#[tokio::test]
async fn test_job_events_are_bridged_to_the_bus() {
    let bus = Arc::new(EventBus::new(32));
    let (tx, rx) = broadcast::channel(32);

    let bridge = tokio::spawn(worker_event_bridge(bus.clone(), rx));
    let mut bus_rx = bus.subscribe();

    let job_id = Uuid::now_v7();
    let org_id = Uuid::new_v4();

    tx.send(WorkerEvent::JobStarted {
        job_id,
        org_id,
        job_type: JobType::InsightExtraction,
    })
    .unwrap();

    let envelope = timeout(Duration::from_secs(2), bus_rx.recv())
        .await
        .expect("bridged event should arrive")
        .unwrap();

    assert_eq!(envelope.event_type, "job.started");
    assert_eq!(envelope.org_id, Some(org_id));
    match envelope.payload {
        ServerEvent::JobStarted {
            job_id: got_job,
            org_id: got_org,
            ..
        } => {
            assert_eq!(got_job, job_id);
            assert_eq!(got_org, org_id);
        }
        other => panic!("unexpected event: {:?}", other),
    }

    tx.send(WorkerEvent::JobFailed {
        job_id,
        org_id,
        job_type: JobType::QuickbooksSync,
        error: "boom".to_string(),
    })
    .unwrap();

    let envelope = timeout(Duration::from_secs(2), bus_rx.recv())
        .await
        .expect("bridged event should arrive")
        .unwrap();
    assert_eq!(envelope.event_type, "job.failed");

    // Closing the worker channel stops the bridge.
    drop(tx);
    timeout(Duration::from_secs(2), bridge)
        .await
        .expect("bridge should stop when the channel closes")
        .unwrap();
}

#[tokio::test]
async fn test_lifecycle_events_are_not_forwarded() {
    let bus = Arc::new(EventBus::new(32));
    let (tx, rx) = broadcast::channel(32);

    tokio::spawn(worker_event_bridge(bus.clone(), rx));
    let mut bus_rx = bus.subscribe();

    tx.send(WorkerEvent::WorkerStarted).unwrap();
    tx.send(WorkerEvent::WorkerStopped).unwrap();
    tx.send(WorkerEvent::JobCompleted {
        job_id: Uuid::now_v7(),
        org_id: Uuid::new_v4(),
        job_type: JobType::DocumentIndexing,
    })
    .unwrap();

    // Only the job event crosses the bridge.
    let envelope = timeout(Duration::from_secs(2), bus_rx.recv())
        .await
        .expect("job event should arrive")
        .unwrap();
    assert_eq!(envelope.event_type, "job.completed");
}
