//! Tests for the lifecycle log state machine.

use reliquary_core::{LifecyclePhase, LifecycleRecord};
use reliquary_error::LifecycleErrorKind;
use reliquary_pipeline::{CollectingLifecycleSink, LifecycleLog};
use std::sync::Arc;
use uuid::Uuid;

fn log() -> (LifecycleLog, Arc<CollectingLifecycleSink>) {
    let sink = Arc::new(CollectingLifecycleSink::new());
    (LifecycleLog::new(sink.clone()), sink)
}

#[tokio::test]
async fn test_full_run_is_recorded_in_order() {
    let (log, sink) = log();
    let id = Uuid::new_v4();

    log.append(LifecycleRecord::new(id, LifecyclePhase::Pending))
        .await
        .unwrap();
    log.append(LifecycleRecord::new(id, LifecyclePhase::Running))
        .await
        .unwrap();
    log.append(LifecycleRecord::success(id, 42)).await.unwrap();

    assert_eq!(log.phase_of(&id).await, Some(LifecyclePhase::Success));
    let history = log.history(&id).await;
    assert_eq!(history.len(), 3);
    assert_eq!(history[2].size_bytes, Some(42));
    assert_eq!(sink.records(), history);
}

#[tokio::test]
async fn test_first_record_must_be_pending() {
    let (log, sink) = log();
    let id = Uuid::new_v4();

    let err = log
        .append(LifecycleRecord::new(id, LifecyclePhase::Running))
        .await
        .unwrap_err();

    assert!(matches!(err.kind, LifecycleErrorKind::UnknownRequest(_)));
    assert!(log.is_empty().await);
    assert!(sink.records().is_empty());
}

#[tokio::test]
async fn test_terminal_phase_is_immutable() {
    let (log, sink) = log();
    let id = Uuid::new_v4();

    log.append(LifecycleRecord::new(id, LifecyclePhase::Pending))
        .await
        .unwrap();
    log.append(LifecycleRecord::new(id, LifecyclePhase::Running))
        .await
        .unwrap();
    log.append(LifecycleRecord::error(id, "fetch_failed: 502"))
        .await
        .unwrap();

    let err = log
        .append(LifecycleRecord::success(id, 1))
        .await
        .unwrap_err();
    match err.kind {
        LifecycleErrorKind::InvalidTransition { from, to, .. } => {
            assert_eq!(from, "error");
            assert_eq!(to, "success");
        }
        other => panic!("unexpected error: {other}"),
    }

    assert_eq!(log.phase_of(&id).await, Some(LifecyclePhase::Error));
    assert_eq!(sink.records().len(), 3);
}

#[tokio::test]
async fn test_short_circuit_and_invalid_skip() {
    let (log, _sink) = log();
    let hit = Uuid::new_v4();
    let skipped = Uuid::new_v4();

    log.append(LifecycleRecord::new(hit, LifecyclePhase::Pending))
        .await
        .unwrap();
    log.append(LifecycleRecord::success(hit, 7)).await.unwrap();

    log.append(LifecycleRecord::new(skipped, LifecyclePhase::Pending))
        .await
        .unwrap();
    assert!(
        log.append(LifecycleRecord::error(skipped, "boom"))
            .await
            .is_err()
    );
    assert!(
        log.append(LifecycleRecord::new(skipped, LifecyclePhase::Pending))
            .await
            .is_err()
    );

    assert_eq!(log.phase_of(&hit).await, Some(LifecyclePhase::Success));
    assert_eq!(log.phase_of(&skipped).await, Some(LifecyclePhase::Pending));
    assert_eq!(log.len().await, 2);
    assert_eq!(log.phase_of(&Uuid::new_v4()).await, None);
}

#[tokio::test]
async fn test_finished_histories_are_evicted_oldest_first() {
    let sink = Arc::new(CollectingLifecycleSink::new());
    let log = LifecycleLog::with_retention(sink.clone(), 2);

    let in_flight = Uuid::new_v4();
    log.append(LifecycleRecord::new(in_flight, LifecyclePhase::Pending))
        .await
        .unwrap();
    log.append(LifecycleRecord::new(in_flight, LifecyclePhase::Running))
        .await
        .unwrap();

    let finished: Vec<Uuid> = (0..3).map(|_| Uuid::new_v4()).collect();
    for id in &finished {
        log.append(LifecycleRecord::new(*id, LifecyclePhase::Pending))
            .await
            .unwrap();
        log.append(LifecycleRecord::success(*id, 1)).await.unwrap();
    }

    assert_eq!(log.len().await, 3);
    assert!(log.history(&finished[0]).await.is_empty());
    assert_eq!(log.phase_of(&finished[1]).await, Some(LifecyclePhase::Success));
    assert_eq!(log.phase_of(&finished[2]).await, Some(LifecyclePhase::Success));
    assert_eq!(log.phase_of(&in_flight).await, Some(LifecyclePhase::Running));

    // The sink saw every record, evicted or not.
    assert_eq!(sink.records().len(), 8);
}
