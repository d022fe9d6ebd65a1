//! Operation dispatch tests using a wiremock server.
//!
//! These verify request shapes for every registered operation, header handling
//! and the mapping of upstream failures.

use belake::{
    AuthToken, Client, Config, Error, FieldValues, HeaderEntry, HeaderList, Operation,
    OperationKey, RequestOptions, Resource,
    testing::{test_client, test_credentials},
};
use serde_json::json;
use wiremock::matchers::{body_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn token() -> AuthToken {
    AuthToken::new("tok-abc")
}

fn send_message() -> OperationKey {
    OperationKey::parse("chat", "Send Message").expect("registered")
}

#[tokio::test]
async fn send_message_omits_empty_chat_id() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/chat/agentchat"))
        .and(header("authorization", "Bearer tok-abc"))
        .and(header("accept", "application/json"))
        .and(header("content-type", "application/json"))
        .and(body_json(json!({
            "agentsIds": ["a1"],
            "message": "hi",
            "language": "en-us",
            "hideChat": false
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "chatId": "c-new",
            "answer": "hello"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let fields = FieldValues::new()
        .with("agentsIds", json!(["a1"]))
        .with("message", "hi")
        .with("language", "en-us")
        .with("hideChat", false);
    let payload = test_client(&server.uri())
        .operations()
        .dispatch(&token(), &send_message(), &fields)
        .await
        .expect("dispatch should succeed");
    assert_eq!(payload["chatId"], "c-new");
}

#[tokio::test]
async fn send_message_includes_chat_id_when_present() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/chat/agentchat"))
        .and(body_json(json!({
            "agentsIds": ["a1", "a2"],
            "message": "again",
            "language": "pt-br",
            "chatId": "c1",
            "hideChat": true
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "chatId": "c1" })))
        .expect(1)
        .mount(&server)
        .await;

    let fields = FieldValues::new()
        .with("agentsIds", "a1, a2")
        .with("message", "again")
        .with("chatId", "c1")
        .with("hideChat", true);
    let payload = test_client(&server.uri())
        .operations()
        .dispatch(&token(), &send_message(), &fields)
        .await
        .expect("dispatch should succeed");
    assert_eq!(payload["chatId"], "c1");
}

#[tokio::test]
async fn get_agent_by_id_interpolates_path() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/Agent/42"))
        .and(header("authorization", "Bearer tok-abc"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "42",
            "name": "Support"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let payload = test_client(&server.uri())
        .operations()
        .dispatch(
            &token(),
            &OperationKey::new(Resource::Agent, Operation::GetAgent),
            &FieldValues::new().with("agentId", "42"),
        )
        .await
        .expect("dispatch should succeed");
    assert_eq!(payload["name"], "Support");
}

#[tokio::test]
async fn every_get_operation_hits_its_route() {
    let server = MockServer::start().await;

    let cases = [
        ("chat", "Get Chat by ID", "chatId", "/chat/c9"),
        ("chat", "Get Chats", "", "/chat"),
        ("agent", "Get Agents", "", "/Agent/availables"),
        ("datasource", "Get Datasource by ID", "datasourceId", "/datasource/c9"),
        ("datasource", "Get Datasources", "", "/datasource/availables"),
        ("department", "Get Department by ID", "departmentId", "/Department/c9"),
        ("department", "Get Departments", "", "/Department"),
        ("languageModel", "Get Language Model by ID", "languageModelId", "/languageModel/c9"),
        ("languageModel", "Get Language Models", "", "/languageModel/availables"),
    ];

    for (_, _, _, route) in cases {
        Mock::given(method("GET"))
            .and(path(route))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "route": route })))
            .expect(1)
            .mount(&server)
            .await;
    }

    let ops = test_client(&server.uri()).operations();
    for (resource, operation, id_field, route) in cases {
        let key = OperationKey::parse(resource, operation).expect("registered");
        let mut fields = FieldValues::new();
        if !id_field.is_empty() {
            fields.insert(id_field, "c9");
        }
        let payload = ops
            .dispatch(&token(), &key, &fields)
            .await
            .unwrap_or_else(|err| panic!("{key} failed: {err}"));
        assert_eq!(payload["route"], route);
    }
}

#[tokio::test]
async fn upstream_failure_carries_status_and_body() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/datasource/missing"))
        .respond_with(
            ResponseTemplate::new(404)
                .insert_header("X-Request-Id", "req-77")
                .set_body_json(json!({ "message": "datasource not found" })),
        )
        .expect(1)
        .mount(&server)
        .await;

    let err = test_client(&server.uri())
        .operations()
        .dispatch(
            &token(),
            &OperationKey::new(Resource::Datasource, Operation::GetDatasource),
            &FieldValues::new().with("datasourceId", "missing"),
        )
        .await
        .expect_err("404 should fail");
    match err {
        Error::Upstream(up) => {
            assert_eq!(up.status, 404);
            assert_eq!(up.status_text, "Not Found");
            assert_eq!(up.message, "datasource not found");
            assert_eq!(up.request_id.as_deref(), Some("req-77"));
            assert!(up.raw_body.unwrap().contains("datasource not found"));
        }
        other => panic!("expected upstream error, got {other:?}"),
    }
}

#[tokio::test]
async fn missing_required_field_sends_nothing() {
    let server = MockServer::start().await;

    let err = test_client(&server.uri())
        .operations()
        .dispatch(
            &token(),
            &send_message(),
            &FieldValues::new().with("agentsIds", "a1"),
        )
        .await
        .expect_err("missing message should fail validation");
    match err {
        Error::Validation(ve) => assert_eq!(ve.field.as_deref(), Some("message")),
        other => panic!("expected validation error, got {other:?}"),
    }

    let requests = server
        .received_requests()
        .await
        .expect("should be able to read received requests");
    assert!(requests.is_empty(), "request should not be sent on validation failure");
}

#[tokio::test]
async fn mismatched_pair_is_a_config_error() {
    let server = MockServer::start().await;

    let err = test_client(&server.uri())
        .operations()
        .dispatch(
            &token(),
            &OperationKey::new(Resource::Department, Operation::ListAgents),
            &FieldValues::new(),
        )
        .await
        .expect_err("unregistered pair should fail");
    assert!(matches!(err, Error::Config(_)), "got {err:?}");
}

#[tokio::test]
async fn caller_headers_override_defaults_but_not_authorization() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/chat"))
        .and(header("accept", "application/vnd.belake+json"))
        .and(header("authorization", "Bearer tok-abc"))
        .and(header("x-tenant", "acme"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .expect(1)
        .mount(&server)
        .await;

    let mut defaults = HeaderList::new();
    defaults.push(HeaderEntry::new("X-Tenant".into(), "acme".into()));
    let client = Client::new(Config {
        default_headers: Some(defaults),
        ..Config::from_credentials(test_credentials(&server.uri()))
    })
    .expect("client");

    let options = RequestOptions::default()
        .with_header("Accept", "application/vnd.belake+json")
        .with_header("Authorization", "Bearer forged");
    let payload = client
        .operations()
        .dispatch_with_options(
            &token(),
            &OperationKey::new(Resource::Chat, Operation::ListChats),
            &FieldValues::new(),
            &options,
        )
        .await
        .expect("dispatch should succeed");
    assert_eq!(payload, json!([]));

    let requests = server.received_requests().await.expect("requests");
    let auth: Vec<_> = requests[0].headers.get_all("authorization").iter().collect();
    assert_eq!(auth.len(), 1);
}

#[tokio::test]
async fn empty_success_body_is_null() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/Department"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    let payload = test_client(&server.uri())
        .operations()
        .dispatch(
            &token(),
            &OperationKey::new(Resource::Department, Operation::ListDepartments),
            &FieldValues::new(),
        )
        .await
        .expect("dispatch should succeed");
    assert!(payload.is_null());
}

#[tokio::test]
async fn malformed_success_body_is_a_serialization_error() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/Agent/availables"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>oops</html>"))
        .expect(1)
        .mount(&server)
        .await;

    let err = test_client(&server.uri())
        .operations()
        .dispatch(
            &token(),
            &OperationKey::new(Resource::Agent, Operation::ListAgents),
            &FieldValues::new(),
        )
        .await
        .expect_err("html should not parse");
    assert!(matches!(err, Error::Serialization(_)), "got {err:?}");
}

#[tokio::test]
async fn traversal_identifiers_are_rejected_before_sending() {
    let server = MockServer::start().await;
    let ops = test_client(&server.uri()).operations();
    let key = OperationKey::new(Resource::Chat, Operation::GetChat);

    for bad in ["..", "%2e%2e", "a\\..\\..\\Department"] {
        let err = ops
            .dispatch(&token(), &key, &FieldValues::new().with("chatId", bad))
            .await
            .expect_err("traversal identifier should fail validation");
        match err {
            Error::Validation(ve) => assert_eq!(ve.field.as_deref(), Some("chatId")),
            other => panic!("expected validation error for {bad:?}, got {other:?}"),
        }
    }

    let requests = server.received_requests().await.expect("requests");
    assert!(requests.is_empty(), "no request should reach the backend");
}

#[tokio::test]
async fn non_string_agent_ids_fail_validation() {
    let server = MockServer::start().await;

    let err = test_client(&server.uri())
        .operations()
        .dispatch(
            &token(),
            &send_message(),
            &FieldValues::new()
                .with("agentsIds", json!([true, "a1"]))
                .with("message", "hi"),
        )
        .await
        .expect_err("boolean agent id should fail validation");
    match err {
        Error::Validation(ve) => assert_eq!(ve.field.as_deref(), Some("agentsIds")),
        other => panic!("expected validation error, got {other:?}"),
    }

    let requests = server.received_requests().await.expect("requests");
    assert!(requests.is_empty());
}
