//! # End-to-End Routing Tests
//!
//! ```text
//! [POUYAN-0001 service] ──ROUTER.EHSAN.HELLO──→ [POUYAN-0001 router]
//!                                                      │ EHSAN.HELLO
//!                                                      ↓
//!                                               [external bus]
//!                                                      │ queue group EHSAN
//!                                                      ↓
//!                                              [EHSAN-000x router] ──HELLO──→ [EHSAN service]
//! ```

use std::time::Duration;

use nested_bus::{MessageBus, Subject};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tokio::time::{sleep, timeout};

use super::harness::{RoutingHarness, PROMPT};

#[derive(Debug, Serialize, Deserialize, PartialEq)]
struct Hello {
    from: String,
    text: String,
}

/// Test: anycast request from POUYAN-0001 answered by EHSAN-0001
#[tokio::test]
async fn test_e2e_anycast_request_reply() {
    let harness = RoutingHarness::new();
    let pouyan = harness.bundle("POUYAN-0001").await;
    let ehsan = harness.bundle("EHSAN-0001").await;

    let mut service = ehsan.serve("HELLO").await;
    let bus = ehsan.internal.clone();
    let served = tokio::spawn(async move {
        let request = service.recv().await.expect("request");
        let hello: Hello = serde_json::from_slice(&request.payload).expect("json body");
        bus.respond(
            &request,
            serde_json::to_vec(&Hello {
                from: "EHSAN-0001".into(),
                text: format!("hi {}", hello.from),
            })
            .unwrap(),
        )
        .await
        .unwrap();

        // Exactly one delivery.
        sleep(Duration::from_millis(100)).await;
        assert!(service.try_recv().unwrap().is_none());
        hello
    });

    let reply: Hello = timeout(
        PROMPT,
        pouyan.client.request_anycast(
            "HELLO",
            "ehsan",
            &Hello {
                from: "POUYAN-0001".into(),
                text: "hello".into(),
            },
            PROMPT,
        ),
    )
    .await
    .expect("request within 10s")
    .expect("reply");

    assert_eq!(reply.from, "EHSAN-0001");
    assert_eq!(reply.text, "hi POUYAN-0001");

    let received = served.await.unwrap();
    assert_eq!(
        received,
        Hello {
            from: "POUYAN-0001".into(),
            text: "hello".into()
        }
    );
}

/// Test: one anycast message reaches exactly one instance of the group
#[tokio::test]
async fn test_e2e_anycast_reaches_one_instance() {
    let harness = RoutingHarness::new();
    let caller = harness.bundle("POUYAN-0001").await;
    let first = harness.bundle("EHSAN-0001").await;
    let second = harness.bundle("EHSAN-0002").await;

    let mut first_service = first.serve("jobs.run").await;
    let mut second_service = second.serve("jobs.run").await;

    caller
        .client
        .publish_anycast("jobs.run", "EHSAN", &json!({"job": 1}))
        .await
        .unwrap();

    let delivered = timeout(PROMPT, async {
        tokio::select! {
            Some(envelope) = first_service.recv() => envelope,
            Some(envelope) = second_service.recv() => envelope,
        }
    })
    .await
    .expect("anycast delivered");
    assert_eq!(delivered.payload, br#"{"job":1}"#);

    sleep(Duration::from_millis(100)).await;
    let extra = usize::from(first_service.try_recv().unwrap().is_some())
        + usize::from(second_service.try_recv().unwrap().is_some());
    assert_eq!(extra, 0);
}

/// Test: unicast reaches only the addressed instance
#[tokio::test]
async fn test_e2e_unicast_isolation() {
    let harness = RoutingHarness::new();
    let caller = harness.bundle("B-0001").await;
    let a1 = harness.bundle("A-0001").await;
    let a2 = harness.bundle("A-0002").await;

    let mut a1_service = a1.serve("tasks.>").await;
    let mut a2_service = a2.serve("tasks.>").await;

    caller
        .client
        .publish_unicast("tasks.sync", "a-0002", &json!({"n": 2}))
        .await
        .unwrap();

    let delivered = timeout(PROMPT, a2_service.recv())
        .await
        .expect("unicast delivered")
        .expect("envelope");
    assert_eq!(delivered.subject.as_str(), "tasks.sync");

    sleep(Duration::from_millis(100)).await;
    assert!(a1_service.try_recv().unwrap().is_none());
}

/// Test: external subjects for anycast and unicast carry the target prefix
#[tokio::test]
async fn test_e2e_external_subjects() {
    let harness = RoutingHarness::new();
    let caller = harness.bundle("POUYAN-0001").await;
    let mut tap = harness
        .external()
        .subscribe(Subject::new("OTHERGROUP.>").unwrap(), 4)
        .await
        .unwrap();
    let mut unicast_tap = harness
        .external()
        .subscribe(Subject::new("OTHERGROUP-0001.>").unwrap(), 4)
        .await
        .unwrap();

    let body = br#"{"greeting":"hello"}"#.to_vec();
    let envelope = caller
        .client
        .prepare_anycast(body.clone(), "HELLO", "OTHERGROUP")
        .unwrap();
    caller.internal.publish(envelope).await.unwrap();

    let seen = timeout(PROMPT, tap.recv()).await.unwrap().unwrap();
    assert_eq!(seen.subject.as_str(), "OTHERGROUP.HELLO");
    assert_eq!(seen.payload, body);

    let envelope = caller
        .client
        .prepare_unicast(body.clone(), "users.get", "OTHERGROUP-0001")
        .unwrap();
    caller.internal.publish(envelope).await.unwrap();

    let seen = timeout(PROMPT, unicast_tap.recv()).await.unwrap().unwrap();
    assert_eq!(seen.subject.as_str(), "OTHERGROUP-0001.users.get");
    assert_eq!(seen.payload, body);
}

/// Test: unicast request answered by the addressed instance
#[tokio::test]
async fn test_e2e_unicast_request_reply() {
    let harness = RoutingHarness::new();
    let caller = harness.bundle("POUYAN-0001").await;
    let target = harness.bundle("EHSAN-0002").await;
    target
        .respond_with("users.count", |_| br#"{"count":3}"#.to_vec())
        .await;

    let reply: serde_json::Value = caller
        .client
        .request_unicast("users.count", "EHSAN-0002", &json!({}), PROMPT)
        .await
        .unwrap();
    assert_eq!(reply, json!({"count": 3}));
}
