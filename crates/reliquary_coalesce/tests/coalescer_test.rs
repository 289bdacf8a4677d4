//! Tests for single-flight coalescing.

use reliquary_coalesce::RequestCoalescer;
use reliquary_core::RequestKey;
use reliquary_error::{
    CoalesceErrorKind, FailureCategory, FetchError, FetchErrorKind, ReliquaryError,
    ReliquaryErrorKind, RetryableError,
};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio::sync::{Barrier, Notify};

type Coalescer = RequestCoalescer<String, ReliquaryError>;

fn key(name: &str) -> RequestKey {
    RequestKey::derive(&format!("https://example.com/{name}"), None)
}

async fn wait_for_subscribers(coalescer: &Coalescer, key: &RequestKey, expected: usize) {
    for _ in 0..400 {
        if coalescer.subscribers(key) == Some(expected) {
            return;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!(
        "expected {expected} subscribers, found {:?}",
        coalescer.subscribers(key)
    );
}

/// A fetch that counts its invocations and waits for `gate` before answering.
fn gated_fetch(
    calls: Arc<AtomicUsize>,
    gate: Arc<Notify>,
    value: &'static str,
) -> impl FnOnce() -> std::pin::Pin<Box<dyn std::future::Future<Output = Result<String, ReliquaryError>> + Send>>
+ Send
+ 'static {
    move || {
        Box::pin(async move {
            calls.fetch_add(1, Ordering::SeqCst);
            gate.notified().await;
            Ok(value.to_string())
        })
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_callers_share_one_fetch() {
    let coalescer = Coalescer::new();
    let calls = Arc::new(AtomicUsize::new(0));
    let gate = Arc::new(Notify::new());
    let k = key("shared");

    let mut handles = Vec::new();
    for _ in 0..16 {
        let coalescer = coalescer.clone();
        let fetch = gated_fetch(calls.clone(), gate.clone(), "payload");
        let k = k.clone();
        handles.push(tokio::spawn(async move { coalescer.acquire(k, fetch).await }));
    }

    wait_for_subscribers(&coalescer, &k, 16).await;
    assert_eq!(coalescer.in_flight(), 1);
    gate.notify_one();

    for handle in handles {
        assert_eq!(handle.await.unwrap().unwrap(), "payload");
    }
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(coalescer.in_flight(), 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_different_keys_run_in_parallel() {
    let coalescer = Coalescer::new();
    // Both fetches must be running at once to pass the barrier.
    let barrier = Arc::new(Barrier::new(2));

    let spawn = |name: &'static str| {
        let coalescer = coalescer.clone();
        let barrier = barrier.clone();
        tokio::spawn(async move {
            coalescer
                .acquire(key(name), move || async move {
                    barrier.wait().await;
                    Ok(name.to_string())
                })
                .await
        })
    };

    let a = spawn("a");
    let b = spawn("b");

    let joined = tokio::time::timeout(Duration::from_secs(5), async {
        (a.await.unwrap().unwrap(), b.await.unwrap().unwrap())
    })
    .await
    .expect("different keys must not block each other");
    assert_eq!(joined, ("a".to_string(), "b".to_string()));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_rate_limit_error_fans_out_without_retry() {
    let coalescer = Coalescer::new();
    let calls = Arc::new(AtomicUsize::new(0));
    let gate = Arc::new(Notify::new());
    let k = key("limited");

    let mut handles = Vec::new();
    for _ in 0..4 {
        let coalescer = coalescer.clone();
        let calls = calls.clone();
        let gate = gate.clone();
        let k = k.clone();
        handles.push(tokio::spawn(async move {
            coalescer
                .acquire(k, move || async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    gate.notified().await;
                    Err::<String, _>(
                        FetchError::rate_limited(Some(Duration::from_secs(30))).into(),
                    )
                })
                .await
        }));
    }

    wait_for_subscribers(&coalescer, &k, 4).await;
    gate.notify_one();

    let mut lines = Vec::new();
    for handle in handles {
        let err = handle.await.unwrap().unwrap_err();
        assert_eq!(err.category(), FailureCategory::RateLimited);
        assert_eq!(err.retry_after(), Some(Duration::from_secs(30)));
        lines.push(err.to_string());
    }
    // Identical error, not four separately constructed ones
    assert!(lines.windows(2).all(|w| w[0] == w[1]));
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_settled_entry_is_removed() {
    let coalescer = Coalescer::new();
    let calls = Arc::new(AtomicUsize::new(0));
    let k = key("fresh");

    for expected in 1..=3 {
        let calls = calls.clone();
        let value = coalescer
            .acquire(k.clone(), move || async move {
                let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
                Ok(format!("run-{n}"))
            })
            .await
            .unwrap();
        assert_eq!(value, format!("run-{expected}"));
        assert_eq!(coalescer.in_flight(), 0);
        assert_eq!(coalescer.subscribers(&k), None);
    }
    assert_eq!(calls.load(Ordering::SeqCst), 3);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_cancelling_one_subscriber_keeps_fetch_for_others() {
    let coalescer = Coalescer::new();
    let calls = Arc::new(AtomicUsize::new(0));
    let gate = Arc::new(Notify::new());
    let k = key("cancel-one");

    let a = {
        let coalescer = coalescer.clone();
        let fetch = gated_fetch(calls.clone(), gate.clone(), "kept");
        let k = k.clone();
        tokio::spawn(async move { coalescer.acquire(k, fetch).await })
    };
    wait_for_subscribers(&coalescer, &k, 1).await;

    let b = {
        let coalescer = coalescer.clone();
        let fetch = gated_fetch(calls.clone(), gate.clone(), "unused");
        let k = k.clone();
        tokio::spawn(async move { coalescer.acquire(k, fetch).await })
    };
    wait_for_subscribers(&coalescer, &k, 2).await;

    a.abort();
    assert!(a.await.unwrap_err().is_cancelled());
    wait_for_subscribers(&coalescer, &k, 1).await;

    gate.notify_one();
    assert_eq!(b.await.unwrap().unwrap(), "kept");
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_cancelling_sole_subscriber_aborts_fetch() {
    let coalescer = Coalescer::new();
    let calls = Arc::new(AtomicUsize::new(0));
    let finished = Arc::new(AtomicUsize::new(0));
    let gate = Arc::new(Notify::new());
    let k = key("cancel-sole");

    let a = {
        let coalescer = coalescer.clone();
        let calls = calls.clone();
        let finished = finished.clone();
        let gate = gate.clone();
        let k = k.clone();
        tokio::spawn(async move {
            coalescer
                .acquire(k, move || async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    gate.notified().await;
                    finished.fetch_add(1, Ordering::SeqCst);
                    Ok("never".to_string())
                })
                .await
        })
    };
    wait_for_subscribers(&coalescer, &k, 1).await;

    a.abort();
    let _ = a.await;
    assert_eq!(coalescer.in_flight(), 0);

    gate.notify_one();
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(finished.load(Ordering::SeqCst), 0, "aborted fetch must not finish");

    // The key is free again
    let value = coalescer
        .acquire(k, || async { Ok("second".to_string()) })
        .await
        .unwrap();
    assert_eq!(value, "second");
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_timeout_applies_to_one_caller_only() {
    let coalescer = Coalescer::new();
    let calls = Arc::new(AtomicUsize::new(0));
    let gate = Arc::new(Notify::new());
    let k = key("slow");

    let patient = {
        let coalescer = coalescer.clone();
        let fetch = gated_fetch(calls.clone(), gate.clone(), "slow-but-fine");
        let k = k.clone();
        tokio::spawn(async move { coalescer.acquire(k, fetch).await })
    };
    wait_for_subscribers(&coalescer, &k, 1).await;

    let impatient = coalescer
        .acquire_with_timeout(
            k.clone(),
            Duration::from_millis(30),
            gated_fetch(calls.clone(), gate.clone(), "unused"),
        )
        .await
        .unwrap_err();
    match impatient.kind() {
        ReliquaryErrorKind::Coalesce(e) => {
            assert!(matches!(e.kind, CoalesceErrorKind::TimedOut(_)))
        }
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(impatient.category(), FailureCategory::TimedOut);
    assert_eq!(coalescer.subscribers(&k), Some(1));

    gate.notify_one();
    assert_eq!(patient.await.unwrap().unwrap(), "slow-but-fine");
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_panicking_fetch_reports_panicked() {
    let coalescer = Coalescer::new();
    let k = key("panics");

    let err = coalescer
        .acquire(k.clone(), || async {
            if true {
                panic!("fetch blew up");
            }
            Ok(String::new())
        })
        .await
        .unwrap_err();

    match err.kind() {
        ReliquaryErrorKind::Coalesce(e) => assert_eq!(e.kind, CoalesceErrorKind::Panicked),
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(coalescer.in_flight(), 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_shutdown_abandons_waiters_and_refuses_new_work() {
    let coalescer = Coalescer::new();
    let calls = Arc::new(AtomicUsize::new(0));
    let gate = Arc::new(Notify::new());
    let k = key("shutdown");

    let waiter = {
        let coalescer = coalescer.clone();
        let fetch = gated_fetch(calls.clone(), gate.clone(), "never");
        let k = k.clone();
        tokio::spawn(async move { coalescer.acquire(k, fetch).await })
    };
    wait_for_subscribers(&coalescer, &k, 1).await;

    coalescer.shutdown();
    assert!(coalescer.is_shut_down());
    assert_eq!(coalescer.in_flight(), 0);

    let err = waiter.await.unwrap().unwrap_err();
    assert_eq!(err.category(), FailureCategory::Cancelled);

    let refused = coalescer
        .acquire(key("late"), || async { Ok("late".to_string()) })
        .await
        .unwrap_err();
    match refused.kind() {
        ReliquaryErrorKind::Coalesce(e) => {
            assert!(matches!(e.kind, CoalesceErrorKind::Abandoned(_)))
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test]
async fn test_not_found_is_not_retryable() {
    let coalescer = Coalescer::new();
    let err = coalescer
        .acquire(key("gone"), || async {
            Err::<String, ReliquaryError>(
                FetchError::new(FetchErrorKind::NotFound("gone".to_string())).into(),
            )
        })
        .await
        .unwrap_err();
    assert_eq!(err.category(), FailureCategory::NotFound);
    assert!(!err.is_retryable());
}
