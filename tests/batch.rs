//! Batch runner tests: one login per batch, ordered results, failure policies.

use belake::{
    CancellationFlag, Error, FailurePolicy, FieldValues, Invocation, Operation, OperationKey,
    Resource, testing::test_client,
};
use serde_json::json;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

async fn mount_login(server: &MockServer) {
    Mock::given(method("POST"))
        .and(path("/login/api-key-auth"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "batch-token"
        })))
        .expect(1)
        .mount(server)
        .await;
}

/// `[ok, fails, ok]`: agents list, a missing agent, departments list.
fn invocations() -> Vec<Invocation> {
    vec![
        Invocation::new(
            OperationKey::new(Resource::Agent, Operation::ListAgents),
            FieldValues::new(),
        ),
        Invocation::new(
            OperationKey::new(Resource::Agent, Operation::GetAgent),
            FieldValues::new().with("agentId", "missing"),
        ),
        Invocation::new(
            OperationKey::new(Resource::Department, Operation::ListDepartments),
            FieldValues::new(),
        ),
    ]
}

async fn mount_operations(server: &MockServer, expect_last: u64) {
    Mock::given(method("GET"))
        .and(path("/Agent/availables"))
        .and(header("authorization", "Bearer batch-token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([{ "id": "a1" }])))
        .expect(1)
        .mount(server)
        .await;

    Mock::given(method("GET"))
        .and(path("/Agent/missing"))
        .and(header("authorization", "Bearer batch-token"))
        .respond_with(
            ResponseTemplate::new(404).set_body_json(json!({ "message": "agent not found" })),
        )
        .expect(1)
        .mount(server)
        .await;

    Mock::given(method("GET"))
        .and(path("/Department"))
        .and(header("authorization", "Bearer batch-token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([{ "id": "d1" }])))
        .expect(expect_last)
        .mount(server)
        .await;
}

#[tokio::test]
async fn continue_policy_collects_every_result_in_order() {
    let server = MockServer::start().await;
    mount_login(&server).await;
    mount_operations(&server, 1).await;

    let report = test_client(&server.uri())
        .batch(FailurePolicy::Continue)
        .run(&invocations())
        .await
        .expect("batch should complete");

    assert!(!report.cancelled);
    assert_eq!(report.len(), 3);
    let indexes: Vec<usize> = report.items.iter().map(|item| item.index).collect();
    assert_eq!(indexes, vec![0, 1, 2]);

    assert_eq!(report.items[0].result.payload(), Some(&json!([{ "id": "a1" }])));
    let failure = report.items[1].result.failure().expect("index 1 failed");
    assert_eq!(failure.index, 1);
    assert_eq!(failure.status, Some(404));
    assert!(failure.message.contains("agent not found"));
    assert_eq!(report.items[2].result.payload(), Some(&json!([{ "id": "d1" }])));

    let output = report.to_output();
    assert_eq!(output[1]["pairedItem"], 1);
    assert!(output[1]["json"]["error"].as_str().unwrap().contains("agent not found"));
}

#[tokio::test]
async fn abort_policy_stops_at_first_failure() {
    let server = MockServer::start().await;
    mount_login(&server).await;
    mount_operations(&server, 0).await;

    let err = test_client(&server.uri())
        .batch(FailurePolicy::Abort)
        .run(&invocations())
        .await
        .expect_err("batch should abort");
    match err {
        Error::Upstream(up) => assert_eq!(up.status, 404),
        other => panic!("expected upstream error, got {other:?}"),
    }
}

#[tokio::test]
async fn login_failure_fails_the_batch_under_any_policy() {
    for policy in [FailurePolicy::Abort, FailurePolicy::Continue] {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/login/api-key-auth"))
            .respond_with(ResponseTemplate::new(401))
            .expect(1)
            .mount(&server)
            .await;

        let err = test_client(&server.uri())
            .batch(policy)
            .run(&invocations())
            .await
            .expect_err("login failure should fail the batch");
        assert!(matches!(err, Error::Authentication(_)), "got {err:?}");

        let requests = server.received_requests().await.expect("requests");
        assert_eq!(requests.len(), 1, "only the login call should be made");
    }
}

#[tokio::test]
async fn validation_failures_are_captured_under_continue() {
    let server = MockServer::start().await;
    mount_login(&server).await;

    Mock::given(method("GET"))
        .and(path("/chat"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .expect(1)
        .mount(&server)
        .await;

    let invocations = vec![
        Invocation::new(
            OperationKey::new(Resource::Chat, Operation::SendMessage),
            FieldValues::new().with("message", "no agents"),
        ),
        Invocation::new(
            OperationKey::new(Resource::Chat, Operation::ListChats),
            FieldValues::new(),
        ),
    ];

    let report = test_client(&server.uri())
        .batch(FailurePolicy::Continue)
        .run(&invocations)
        .await
        .expect("batch should complete");
    let failure = report.items[0].result.failure().expect("validation failure");
    assert_eq!(failure.index, 0);
    assert!(failure.status.is_none());
    assert!(failure.message.contains("agentsIds"));
    assert!(report.items[1].result.is_success());
}

#[tokio::test]
async fn cancelled_batch_starts_no_invocations() {
    let server = MockServer::start().await;
    mount_login(&server).await;

    let flag = CancellationFlag::new();
    flag.cancel();

    let report = test_client(&server.uri())
        .batch(FailurePolicy::Abort)
        .with_cancellation(flag)
        .run(&invocations())
        .await
        .expect("cancelled batch still reports");
    assert!(report.cancelled);
    assert!(report.is_empty());

    let requests = server.received_requests().await.expect("requests");
    assert_eq!(requests.len(), 1, "only the login call should be made");
}

#[tokio::test]
async fn invocations_deserialize_from_host_items() {
    let server = MockServer::start().await;
    mount_login(&server).await;

    Mock::given(method("GET"))
        .and(path("/languageModel/lm-1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "id": "lm-1" })))
        .expect(1)
        .mount(&server)
        .await;

    let invocations: Vec<Invocation> = serde_json::from_value(json!([
        {
            "resource": "languageModel",
            "operation": "Get Language Model by ID",
            "fields": { "languageModelId": "lm-1" }
        }
    ]))
    .expect("invocations should deserialize");

    let report = test_client(&server.uri())
        .batch(FailurePolicy::default())
        .run(&invocations)
        .await
        .expect("batch should complete");
    assert_eq!(report.items[0].result.payload(), Some(&json!({ "id": "lm-1" })));
}
