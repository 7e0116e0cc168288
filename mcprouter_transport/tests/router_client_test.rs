//! RouterClient against a wiremock router API.

use mcprouter_transport::{BridgeError, RouterClient};
use serde_json::json;
use wiremock::matchers::{body_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn client_for(server: &MockServer) -> RouterClient {
    RouterClient::with_api_base("router-key", &format!("{}/v1", server.uri())).unwrap()
}

#[tokio::test]
async fn list_tools_unwraps_data() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/list-tools"))
        .and(header("authorization", "Bearer router-key"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "code": 0,
            "message": "ok",
            "data": {"tools": [{"name": "echo"}]}
        })))
        .expect(1)
        .mount(&server)
        .await;

    let data = client_for(&server).list_tools().await.unwrap();
    assert_eq!(data, json!({"tools": [{"name": "echo"}]}));
}

#[tokio::test]
async fn call_tool_sends_name_and_arguments() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/call-tool"))
        .and(body_json(json!({"name": "echo", "arguments": {"text": "hi"}})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "code": 0,
            "message": "ok",
            "data": {"content": [{"type": "text", "text": "hi"}]}
        })))
        .expect(1)
        .mount(&server)
        .await;

    let data = client_for(&server)
        .call_tool("echo", &json!({"text": "hi"}))
        .await
        .unwrap();
    assert_eq!(data["content"][0]["text"], "hi");
}

#[tokio::test]
async fn non_zero_code_is_a_router_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "code": -1,
            "message": "invalid server key"
        })))
        .mount(&server)
        .await;

    let err = client_for(&server).list_tools().await.unwrap_err();
    match err {
        BridgeError::Router(message) => assert_eq!(message, "invalid server key"),
        other => panic!("unexpected error {other:?}"),
    }
}

#[tokio::test]
async fn error_status_is_reported() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;

    let err = client_for(&server).list_tools().await.unwrap_err();
    assert!(matches!(err, BridgeError::HttpStatus { status: 401 }));
}

#[tokio::test]
async fn envelope_without_code_is_invalid() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"data": []})))
        .mount(&server)
        .await;

    let err = client_for(&server).list_tools().await.unwrap_err();
    assert!(matches!(err, BridgeError::InvalidReply(_)));
}
