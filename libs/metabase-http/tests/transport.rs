#![allow(clippy::unwrap_used, clippy::expect_used)]

//! Transport behavior against a mock Metabase server.

use std::time::Duration;

use httpmock::prelude::*;
use metabase_http::{
    ApiErrorDetail, Method, SESSION_HEADER, StatusCode, Transport, TransportConfig, TransportError,
};
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use serde_json::json;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
struct Group {
    id: u64,
    name: String,
}

fn transport(server: &MockServer) -> Transport {
    let config = TransportConfig::default().with_user_agent("metabase-admin-tests/1.0");
    Transport::new(&server.base_url(), &config)
        .unwrap()
        .with_session(SecretString::from("session-123".to_owned()))
}

#[tokio::test]
async fn attaches_session_and_user_agent_headers() {
    let server = MockServer::start_async().await;
    let mock = server
        .mock_async(|when, then| {
            when.method(GET)
                .path("/api/permissions/group/3")
                .header(SESSION_HEADER, "session-123")
                .header("user-agent", "metabase-admin-tests/1.0");
            then.status(200).json_body(json!({"id": 3, "name": "Analysts"}));
        })
        .await;

    let group: Group = transport(&server).get("permissions/group/3").await.unwrap();

    mock.assert_async().await;
    assert_eq!(
        group,
        Group {
            id: 3,
            name: "Analysts".to_owned()
        }
    );
}

#[tokio::test]
async fn no_session_header_without_session() {
    let server = MockServer::start_async().await;
    let with_header = server
        .mock_async(|when, then| {
            when.method(POST)
                .path("/api/session")
                .header_exists(SESSION_HEADER);
            then.status(500);
        })
        .await;
    let without_header = server
        .mock_async(|when, then| {
            when.method(POST).path("/api/session");
            then.status(200).json_body(json!({"id": "fresh"}));
        })
        .await;

    let anonymous = Transport::new(&server.base_url(), &TransportConfig::default()).unwrap();
    let body: serde_json::Value = anonymous
        .post("session", &json!({"username": "a", "password": "b"}))
        .await
        .unwrap();

    assert_eq!(body["id"], "fresh");
    assert_eq!(with_header.hits_async().await, 0);
    without_header.assert_async().await;
}

#[tokio::test]
async fn sends_json_body() {
    let server = MockServer::start_async().await;
    let mock = server
        .mock_async(|when, then| {
            when.method(POST)
                .path("/api/permissions/group")
                .header("content-type", "application/json")
                .json_body(json!({"id": 0, "name": "Finance"}));
            then.status(200).json_body(json!({"id": 7, "name": "Finance"}));
        })
        .await;

    let created: Group = transport(&server)
        .post(
            "permissions/group",
            &Group {
                id: 0,
                name: "Finance".to_owned(),
            },
        )
        .await
        .unwrap();

    mock.assert_async().await;
    assert_eq!(created.id, 7);
}

#[tokio::test]
async fn no_content_leaves_body_empty() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(DELETE).path("/api/permissions/group/7");
            then.status(204);
        })
        .await;

    let response = transport(&server)
        .delete::<serde_json::Value>("permissions/group/7")
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NO_CONTENT);
    assert!(response.body().is_none());
}

#[tokio::test]
async fn required_body_on_no_content_is_missing_body() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/api/collection/graph");
            then.status(204);
        })
        .await;

    let err = transport(&server)
        .get::<serde_json::Value>("collection/graph")
        .await
        .unwrap_err();

    assert!(matches!(err, TransportError::MissingBody { .. }));
    assert!(err.is_decode());
}

#[tokio::test]
async fn redirect_class_statuses_below_400_are_success() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/api/user/current");
            then.status(304);
        })
        .await;

    let status = transport(&server)
        .probe(Method::GET, "user/current")
        .await
        .unwrap();

    assert_eq!(status, StatusCode::NOT_MODIFIED);
}

#[tokio::test]
async fn structured_error_body_is_parsed() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(POST).path("/api/user");
            then.status(400).json_body(json!({
                "errors": {"email": "value must be a valid email address."},
                "message": "Invalid input"
            }));
        })
        .await;

    let err = transport(&server)
        .post::<_, serde_json::Value>("user", &json!({"email": "nope"}))
        .await
        .unwrap_err();

    let api = err.as_api().expect("api error");
    assert_eq!(api.status(), StatusCode::BAD_REQUEST);
    let envelope = api.envelope().expect("structured detail");
    assert_eq!(envelope.message.as_deref(), Some("Invalid input"));
    assert_eq!(
        envelope.errors.get("email").map(String::as_str),
        Some("value must be a valid email address.")
    );
}

#[tokio::test]
async fn unstructured_error_body_is_kept_raw() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(PUT).path("/api/collection/graph");
            then.status(409)
                .body("Looks like someone else edited the permissions and your data is out of date.");
        })
        .await;

    let err = transport(&server)
        .put::<_, serde_json::Value>("collection/graph", &json!({"revision": 1, "groups": {}}))
        .await
        .unwrap_err();

    assert_eq!(err.status(), Some(StatusCode::CONFLICT));
    let api = err.as_api().unwrap();
    assert!(matches!(&api.detail, ApiErrorDetail::Raw(body) if body.contains("out of date")));
}

#[tokio::test]
async fn undecodable_success_body_is_decode_error() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/api/permissions/group/3");
            then.status(200).body("<html>definitely not json</html>");
        })
        .await;

    let err = transport(&server)
        .get::<Group>("permissions/group/3")
        .await
        .unwrap_err();

    assert!(matches!(err, TransportError::Decode { status, .. } if status == StatusCode::OK));
    assert!(!err.is_network());
}

#[tokio::test]
async fn refused_connection_is_network_error() {
    // Bind and drop a listener to get a port nobody is serving.
    let port = {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap().port()
    };
    let transport = Transport::new(&format!("http://127.0.0.1:{port}"), &TransportConfig::default()).unwrap();

    let err = transport.get::<Group>("user/current").await.unwrap_err();

    assert!(matches!(err, TransportError::Network { .. }));
    assert!(err.is_network());
    assert!(!err.is_timeout());
}

#[tokio::test]
async fn slow_response_is_timeout() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/api/collection/graph");
            then.status(200)
                .delay(Duration::from_millis(500))
                .json_body(json!({"revision": 1, "groups": {}}));
        })
        .await;

    let config = TransportConfig::default().with_timeout(Duration::from_millis(50));
    let transport = Transport::new(&server.base_url(), &config).unwrap();

    let err = transport
        .get::<serde_json::Value>("collection/graph")
        .await
        .unwrap_err();

    assert!(err.is_timeout());
    assert!(err.is_network());
}
