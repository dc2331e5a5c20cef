use campus_cache::{FetchError, RequestDeduplicator};
use serde_json::json;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

fn slow_fetch(
    calls: &Arc<AtomicUsize>,
    result: campus_cache::FetchResult,
) -> impl std::future::Future<Output = campus_cache::FetchResult> + Send + 'static {
    let calls = Arc::clone(calls);
    async move {
        calls.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(20)).await;
        result
    }
}

#[tokio::test(start_paused = true)]
async fn concurrent_callers_share_one_fetch() {
    let dedup = RequestDeduplicator::new();
    let calls = Arc::new(AtomicUsize::new(0));

    let (a, b, c) = tokio::join!(
        dedup.get_or_fetch("domain:user", || slow_fetch(&calls, Ok(json!("profile")))),
        dedup.get_or_fetch("domain:user", || slow_fetch(&calls, Ok(json!("ignored")))),
        dedup.get_or_fetch("domain:user", || slow_fetch(&calls, Ok(json!("ignored")))),
    );

    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(a.unwrap(), json!("profile"));
    assert_eq!(b.unwrap(), json!("profile"));
    assert_eq!(c.unwrap(), json!("profile"));
}

#[tokio::test(start_paused = true)]
async fn different_keys_fetch_independently() {
    let dedup = RequestDeduplicator::new();
    let calls = Arc::new(AtomicUsize::new(0));

    let (a, b) = tokio::join!(
        dedup.get_or_fetch("domain:user", || slow_fetch(&calls, Ok(json!(1)))),
        dedup.get_or_fetch("domain:dashboard", || slow_fetch(&calls, Ok(json!(2)))),
    );

    assert_eq!(calls.load(Ordering::SeqCst), 2);
    assert_eq!(a.unwrap(), json!(1));
    assert_eq!(b.unwrap(), json!(2));
}

#[tokio::test(start_paused = true)]
async fn all_waiters_see_the_same_rejection() {
    let dedup = RequestDeduplicator::new();
    let calls = Arc::new(AtomicUsize::new(0));
    let err = FetchError::Transient("connection reset".into());

    let (a, b) = tokio::join!(
        dedup.get_or_fetch("k", || slow_fetch(&calls, Err(err.clone()))),
        dedup.get_or_fetch("k", || slow_fetch(&calls, Err(err.clone()))),
    );

    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(a.unwrap_err(), err);
    assert_eq!(b.unwrap_err(), err);
}

#[tokio::test(start_paused = true)]
async fn failure_is_not_cached() {
    let dedup = RequestDeduplicator::new();
    let calls = Arc::new(AtomicUsize::new(0));

    let first = dedup
        .get_or_fetch("k", || {
            slow_fetch(&calls, Err(FetchError::Transient("timeout".into())))
        })
        .await;
    assert!(first.is_err());

    // Settlement removed the registration; the next call retries.
    let second = dedup
        .get_or_fetch("k", || slow_fetch(&calls, Ok(json!("recovered"))))
        .await;
    assert_eq!(second.unwrap(), json!("recovered"));
    assert_eq!(calls.load(Ordering::SeqCst), 2);
}

#[tokio::test(start_paused = true)]
async fn registration_is_removed_after_settlement() {
    let dedup = RequestDeduplicator::new();
    let calls = Arc::new(AtomicUsize::new(0));

    assert_eq!(dedup.in_flight(), 0);
    dedup
        .get_or_fetch("k", || slow_fetch(&calls, Ok(json!("v"))))
        .await
        .unwrap();
    assert_eq!(dedup.in_flight(), 0);
}

#[tokio::test(start_paused = true)]
async fn sequential_calls_each_fetch() {
    let dedup = RequestDeduplicator::new();
    let calls = Arc::new(AtomicUsize::new(0));

    for _ in 0..3 {
        dedup
            .get_or_fetch("k", || slow_fetch(&calls, Ok(json!("v"))))
            .await
            .unwrap();
    }
    assert_eq!(calls.load(Ordering::SeqCst), 3);
}
