//! # Failure, Backpressure, and Shutdown Tests

use std::time::Duration;

use nested_bus::{Envelope, MessageBus, Subject};
use nested_router::{ClientError, FailureKind, WorkerState};
use serde_json::json;
use tokio::time::timeout;

use super::harness::{RoutingHarness, PROMPT};

/// Test: no instance of the target group yields a typed failure
#[tokio::test]
async fn test_no_responders_failure_marker() {
    let harness = RoutingHarness::new();
    let caller = harness.bundle("POUYAN-0001").await;

    let result: Result<serde_json::Value, _> = caller
        .client
        .request_anycast("HELLO", "NOBODY", &json!({}), PROMPT)
        .await;

    match result {
        Err(ClientError::Route(failure)) => {
            assert_eq!(failure.kind, FailureKind::NoResponders);
            assert_eq!(failure.subject, "NOBODY.HELLO");
        }
        other => panic!("expected no-responders failure, got {other:?}"),
    }
}

/// Test: a silent service yields a timeout failure, not an empty payload
#[tokio::test]
async fn test_timeout_failure_marker() {
    let harness = RoutingHarness::new();

    let mut caller_config = RoutingHarness::config("POUYAN-0001");
    caller_config.job.request_timeout_secs = 3;
    let caller = harness.bundle_with(caller_config).await;

    let mut slow_config = RoutingHarness::config("EHSAN-0001");
    slow_config.job.request_timeout_secs = 1;
    let slow = harness.bundle_with(slow_config).await;
    let _silent = slow.serve("HELLO").await;

    let result: Result<serde_json::Value, _> = caller
        .client
        .request_anycast("HELLO", "EHSAN", &json!({}), PROMPT)
        .await;

    match result {
        Err(ClientError::Route(failure)) => assert_eq!(failure.kind, FailureKind::Timeout),
        other => panic!("expected timeout failure, got {other:?}"),
    }
}

/// Test: a saturated external queue rejects instead of growing
#[tokio::test]
async fn test_backpressure_rejects_when_queue_full() {
    let harness = RoutingHarness::new();
    let mut config = RoutingHarness::config("A-0001");
    config.job.ext_workers_count = 1;
    config.job.ext_buffer_size = 2;
    config.job.request_timeout_secs = 1;
    let bundle = harness.bundle_with(config).await;
    let mut service = bundle.serve("slow").await;

    let external = harness.external();
    let request = || {
        Envelope::new(Subject::new("A-0001.slow").unwrap(), Vec::new())
            .with_reply_to(Subject::new("_INBOX.test").unwrap())
    };

    // Occupy the only worker.
    external.publish(request()).await.unwrap();
    timeout(PROMPT, service.recv())
        .await
        .expect("worker busy")
        .expect("envelope");

    let before = external.rejected();
    let mut delivered = 0;
    for _ in 0..5 {
        delivered += external.publish(request()).await.unwrap();
    }
    assert_eq!(delivered, 2);
    assert_eq!(external.rejected() - before, 3);

    let abandoned = bundle.runtime.job().shutdown().await;
    assert_eq!(abandoned, 2);
    assert_eq!(bundle.runtime.state(), WorkerState::Stopped);
}

/// Test: shutdown unsubscribes every bundle from the shared bus
#[tokio::test]
async fn test_graceful_shutdown_all_bundles() {
    let harness = RoutingHarness::new();
    let bundles = vec![
        harness.bundle("A-0001").await,
        harness.bundle("A-0002").await,
        harness.bundle("B-0001").await,
    ];
    assert_eq!(harness.external().subscriber_count(), 6);

    for bundle in &bundles {
        timeout(Duration::from_secs(5), bundle.runtime.shutdown())
            .await
            .expect("shutdown hung");
        assert_eq!(bundle.runtime.state(), WorkerState::Stopped);
        assert_eq!(bundle.internal.subscriber_count(), 0);
    }
    assert_eq!(harness.external().subscriber_count(), 0);
}
