//! Correlation registry integration tests
//!
//! Entry lifecycle under fire, timeout, removal and replacement.

mod common;

use common::{advance, Recorder};
use jrmsg_core::{Error, ErrorValue, Response};
use jrmsg_correlation::CorrelationRegistry;
use serde_json::json;
use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

#[tokio::test(start_paused = true)]
async fn test_timeout_fires_once_and_late_fire_is_noop() {
    let registry = CorrelationRegistry::new();
    let recorder = Recorder::new();

    registry
        .register_with_timeout(7, recorder.callback(), Duration::from_millis(1))
        .unwrap();

    advance(10).await;

    let outcomes = recorder.outcomes();
    assert_eq!(outcomes.len(), 1);
    assert_eq!(
        outcomes[0],
        Err(Error::Timeout {
            id: 7,
            after: Duration::from_millis(1)
        })
    );
    assert!(!registry.is_pending(7));

    // A response arriving after expiry finds nothing
    assert!(!registry.fire(&Response::success(7, json!("late"))));
    advance(10).await;
    assert_eq!(recorder.len(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_fire_before_timeout_delivers_once() {
    let registry = CorrelationRegistry::new();
    let recorder = Recorder::new();

    registry
        .register_with_timeout(9, recorder.callback(), Duration::from_millis(50))
        .unwrap();
    assert!(registry.fire(&Response::success(9, json!({"ok": true}))));

    // Well past the original window
    advance(200).await;

    let outcomes = recorder.outcomes();
    assert_eq!(outcomes.len(), 1);
    let response = outcomes[0].clone().unwrap();
    assert_eq!(response.id(), Some(9));
    assert_eq!(response.result(), Some(&json!({"ok": true})));
}

#[tokio::test(start_paused = true)]
async fn test_error_response_is_delivered_as_response() {
    let registry = CorrelationRegistry::new();
    let recorder = Recorder::new();

    registry.register(2, recorder.callback()).unwrap();
    registry.fire(&Response::failure(2, ErrorValue::method_not_found("nope")));

    let response = recorder.outcomes()[0].clone().unwrap();
    assert!(response.is_error());
    assert_eq!(response.error_code(), Some(-32601));
}

#[tokio::test(start_paused = true)]
async fn test_remove_prevents_any_delivery() {
    let registry = CorrelationRegistry::new();
    let recorder = Recorder::new();

    registry
        .register_with_timeout(5, recorder.callback(), Duration::from_millis(5))
        .unwrap();
    assert!(registry.remove(5));

    advance(50).await;
    assert!(!registry.fire(&Response::success(5, json!(1))));
    assert_eq!(recorder.len(), 0);
    assert_eq!(registry.pending_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_reregister_replaces_previous_entry() {
    let registry = CorrelationRegistry::new();
    let first = Recorder::new();
    let second = Recorder::new();

    registry
        .register_with_timeout(3, first.callback(), Duration::from_millis(10))
        .unwrap();
    registry
        .register_with_timeout(3, second.callback(), Duration::from_secs(10))
        .unwrap();
    assert_eq!(registry.pending_count(), 1);

    // The first entry's window passes without effect
    advance(50).await;
    assert_eq!(first.len(), 0);
    assert_eq!(second.len(), 0);

    assert!(registry.fire(&Response::success(3, json!("second"))));
    assert_eq!(first.len(), 0);
    assert_eq!(second.len(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_default_timeout_applies() {
    let registry = CorrelationRegistry::new().with_default_timeout(Duration::from_millis(20));
    let recorder = Recorder::new();

    registry.register(11, recorder.callback()).unwrap();

    advance(10).await;
    assert_eq!(recorder.len(), 0);

    advance(20).await;
    assert!(matches!(
        recorder.outcomes()[0],
        Err(Error::Timeout { id: 11, .. })
    ));
}

#[tokio::test(start_paused = true)]
async fn test_future_resolves_on_fire() {
    let registry = CorrelationRegistry::new();
    let pending = registry.track(21, Duration::from_secs(1)).unwrap();
    assert_eq!(pending.id(), 21);

    let firer = registry.clone();
    tokio::spawn(async move {
        advance(5).await;
        firer.fire(&Response::success(21, json!([1, 2, 3])));
    });

    let response = pending.await.unwrap();
    assert_eq!(response.result(), Some(&json!([1, 2, 3])));
}

#[tokio::test(start_paused = true)]
async fn test_future_rejects_on_timeout() {
    let registry = CorrelationRegistry::new();
    let pending = registry.track(22, Duration::from_millis(3)).unwrap();

    assert!(matches!(
        pending.await,
        Err(Error::Timeout { id: 22, .. })
    ));
}

#[tokio::test(start_paused = true)]
async fn test_future_cancelled_by_remove_or_replace() {
    let registry = CorrelationRegistry::new();

    let removed = registry.track(23, Duration::from_secs(1)).unwrap();
    registry.remove(23);
    assert_eq!(removed.await, Err(Error::Cancelled(23)));

    let replaced = registry.track(24, Duration::from_secs(1)).unwrap();
    let replacement = registry.track(24, Duration::from_secs(1)).unwrap();
    assert_eq!(replaced.await, Err(Error::Cancelled(24)));

    registry.fire(&Response::success(24, json!("winner")));
    assert!(replacement.await.is_ok());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_ids_are_unique() {
    let registry = CorrelationRegistry::new();

    let mut handles = Vec::new();
    for _ in 0..8 {
        let registry = registry.clone();
        handles.push(tokio::spawn(async move {
            (0..500).map(|_| registry.next_id()).collect::<Vec<_>>()
        }));
    }

    let mut seen = HashSet::new();
    for handle in handles {
        for id in handle.await.unwrap() {
            assert!(id > 0);
            assert!(seen.insert(id), "duplicate id {}", id);
        }
    }
    assert_eq!(seen.len(), 4000);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_racing_fires_deliver_once_per_id() {
    let registry = CorrelationRegistry::new();
    let deliveries = Arc::new(AtomicUsize::new(0));

    for id in 1..=100 {
        let deliveries = deliveries.clone();
        registry
            .register(id, move |outcome| {
                assert!(outcome.is_ok());
                deliveries.fetch_add(1, Ordering::SeqCst);
            })
            .unwrap();
    }

    let mut handles = Vec::new();
    for _ in 0..4 {
        let registry = registry.clone();
        handles.push(tokio::spawn(async move {
            (1..=100)
                .filter(|id| registry.fire(&Response::success(*id, json!(id))))
                .count()
        }));
    }

    let mut fired = 0;
    for handle in handles {
        fired += handle.await.unwrap();
    }

    assert_eq!(fired, 100);
    assert_eq!(deliveries.load(Ordering::SeqCst), 100);
    assert_eq!(registry.pending_count(), 0);
}
