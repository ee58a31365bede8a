//! HTTP mock tests for the token exchange and deployment query clients.
//!
//! Uses wiremock to stand in for IBM Cloud IAM and a watsonx deployment.

use searchdeck_core_sdk::auth::{IdentityClient, GRANT_TYPE_APIKEY};
use searchdeck_core_sdk::error::SdkError;
use searchdeck_core_sdk::search::QueryClient;
use searchdeck_core_sdk::shell::{AppState, Clients, NoticeLevel};
use serde_json::json;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use wiremock::matchers::{body_json, body_string_contains, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const TOKEN_PATH: &str = "/identity/token";
const DEPLOYMENT_PATH: &str = "/ml/v4/deployments/dep-1/predictions";

fn identity_for(server: &MockServer) -> IdentityClient {
    IdentityClient::new(format!("{}{}", server.uri(), TOKEN_PATH))
}

fn deployment_url(server: &MockServer) -> String {
    format!("{}{}?version=2021-05-01", server.uri(), DEPLOYMENT_PATH)
}

fn state_for(server: &MockServer, api_key: &str) -> AppState {
    AppState {
        api_key: api_key.to_string(),
        endpoint_url: deployment_url(server),
    }
}

async fn mount_token_ok(server: &MockServer, token: &str) {
    Mock::given(method("POST"))
        .and(path(TOKEN_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": token,
            "token_type": "Bearer",
            "expires_in": 3600
        })))
        .mount(server)
        .await;
}

/// Serves one connection: reads the request, answers 200 with a `Content-Length`
/// larger than the body it sends, then closes the socket.
async fn spawn_truncated_200() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("local addr");
    tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.expect("accept");
        read_request(&mut socket).await;
        socket
            .write_all(
                b"HTTP/1.1 200 OK\r\nContent-Type: application/json\r\nContent-Length: 500\r\n\r\n{\"access_token\":",
            )
            .await
            .expect("write");
        socket.flush().await.ok();
        drop(socket);
    });
    format!("http://{}", addr)
}

async fn read_request(socket: &mut tokio::net::TcpStream) {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 1024];
    loop {
        let n = socket.read(&mut chunk).await.expect("read");
        if n == 0 {
            return;
        }
        buf.extend_from_slice(&chunk[..n]);
        let text = String::from_utf8_lossy(&buf);
        if let Some(end) = text.find("\r\n\r\n") {
            let content_length = text[..end]
                .lines()
                .filter_map(|l| l.split_once(':'))
                .find(|(k, _)| k.trim().eq_ignore_ascii_case("content-length"))
                .and_then(|(_, v)| v.trim().parse::<usize>().ok())
                .unwrap_or(0);
            if buf.len() >= end + 4 + content_length {
                return;
            }
        }
    }
}

// =============================================================================
// Token exchange
// =============================================================================

#[tokio::test]
async fn test_token_exchange_returns_access_token() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path(TOKEN_PATH))
        .and(header("content-type", "application/x-www-form-urlencoded"))
        .and(body_string_contains("apikey=my-key"))
        .and(body_string_contains("grant_type=urn%3Aibm%3Aparams%3Aoauth%3Agrant-type%3Aapikey"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"access_token": "T"})))
        .expect(1)
        .mount(&server)
        .await;

    let token = identity_for(&server)
        .exchange_token("my-key")
        .await
        .expect("token");
    assert_eq!(token, "T");
    assert_eq!(GRANT_TYPE_APIKEY, "urn:ibm:params:oauth:grant-type:apikey");
}

#[tokio::test]
async fn test_token_exchange_non_200_is_auth_error_with_status() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path(TOKEN_PATH))
        .respond_with(ResponseTemplate::new(400).set_body_string("Provided API key could not be found"))
        .mount(&server)
        .await;

    let err = identity_for(&server)
        .exchange_token("bad-key")
        .await
        .unwrap_err();
    match &err {
        SdkError::Auth { status, body } => {
            assert_eq!(*status, 400);
            assert!(body.contains("could not be found"));
        }
        other => panic!("Expected Auth error, got {:?}", other),
    }
    assert!(err.to_string().contains("400"));
}

#[tokio::test]
async fn test_empty_api_key_makes_no_identity_call() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path(TOKEN_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"access_token": "T"})))
        .expect(0)
        .mount(&server)
        .await;

    let err = identity_for(&server).exchange_token("  ").await.unwrap_err();
    assert!(matches!(err, SdkError::MissingApiKey));
}

#[tokio::test]
async fn test_token_body_without_access_token_is_parse_error() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path(TOKEN_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"errorCode": "BXNIM0415E"})))
        .mount(&server)
        .await;

    let err = identity_for(&server).exchange_token("k").await.unwrap_err();
    assert!(matches!(err, SdkError::Parse { .. }));
}

#[tokio::test]
async fn test_token_body_cut_short_is_transport_error() {
    let base = spawn_truncated_200().await;

    let err = IdentityClient::new(format!("{}{}", base, TOKEN_PATH))
        .exchange_token("k")
        .await
        .unwrap_err();
    assert!(
        matches!(err, SdkError::Transport(_)),
        "expected Transport error, got {:?}",
        err
    );
}

// =============================================================================
// Deployment query
// =============================================================================

#[tokio::test]
async fn test_query_sends_payload_and_bearer_header() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path(DEPLOYMENT_PATH))
        .and(header("authorization", "Bearer T"))
        .and(body_json(json!({
            "input_data": [{
                "fields": ["Search", "access_token"],
                "values": [[{"role": "user", "content": "what is RAG?"}], ["T"]]
            }]
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "predictions": [{"values": [[], "hello"]}]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let result = QueryClient::new()
        .search("what is RAG?", "T", &deployment_url(&server))
        .await
        .expect("search");
    assert_eq!(result.generated_response, "hello");
    assert!(result.proximity_matches.is_empty());
}

#[tokio::test]
async fn test_query_non_200_is_request_error() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path(DEPLOYMENT_PATH))
        .respond_with(ResponseTemplate::new(500).set_body_string("Internal Server Error"))
        .mount(&server)
        .await;

    let err = QueryClient::new()
        .query("q", "T", &deployment_url(&server))
        .await
        .unwrap_err();
    match err {
        SdkError::Request { status, body } => {
            assert_eq!(status, 500);
            assert_eq!(body, "Internal Server Error");
        }
        other => panic!("Expected Request error, got {:?}", other),
    }
}

#[tokio::test]
async fn test_query_malformed_json_is_parse_error() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path(DEPLOYMENT_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_string("this is not json"))
        .mount(&server)
        .await;

    let err = QueryClient::new()
        .query("q", "T", &deployment_url(&server))
        .await
        .unwrap_err();
    assert!(matches!(err, SdkError::Parse { .. }));
    assert_eq!(err.raw_body(), Some("this is not json"));
}

#[tokio::test]
async fn test_query_body_cut_short_is_transport_error() {
    let base = spawn_truncated_200().await;

    let err = QueryClient::new()
        .query("q", "T", &format!("{}{}", base, DEPLOYMENT_PATH))
        .await
        .unwrap_err();
    assert!(
        matches!(err, SdkError::Transport(_)),
        "expected Transport error, got {:?}",
        err
    );
}

// =============================================================================
// Full query action
// =============================================================================

#[tokio::test]
async fn test_run_query_renders_generated_text_and_matches() {
    let server = MockServer::start().await;
    mount_token_ok(&server, "T").await;

    Mock::given(method("POST"))
        .and(path(DEPLOYMENT_PATH))
        .and(header("authorization", "Bearer T"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "predictions": [{"values": [
                [{"score": 0.876, "metadata": {"asset_name": "handbook.pdf", "from": 120, "to": 480}}],
                "Retrieval-augmented generation."
            ]}]
        })))
        .mount(&server)
        .await;

    let clients = Clients::new(identity_for(&server), QueryClient::new());
    let outcome = clients
        .run_query(&state_for(&server, "my-key"), "what is RAG?")
        .await;

    assert!(outcome.is_ok());
    assert!(outcome.notices.is_empty());
    let text = outcome.rendered.expect("rendered");
    assert!(text.contains("Retrieval-augmented generation."));
    assert!(text.contains("Asset: handbook.pdf (Score: 0.88)"));
    assert!(text.contains("Range: 120 - 480"));
}

#[tokio::test]
async fn test_run_query_empty_result_renders_no_match_blocks() {
    let server = MockServer::start().await;
    mount_token_ok(&server, "T").await;

    Mock::given(method("POST"))
        .and(path(DEPLOYMENT_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "predictions": [{"values": [[], "hello"]}]
        })))
        .mount(&server)
        .await;

    let clients = Clients::new(identity_for(&server), QueryClient::new());
    let outcome = clients.run_query(&state_for(&server, "k"), "hi").await;
    let text = outcome.rendered.expect("rendered");
    assert!(text.contains("hello"));
    assert!(!text.contains("Asset:"));
}

#[tokio::test]
async fn test_run_query_auth_failure_skips_deployment() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path(TOKEN_PATH))
        .respond_with(ResponseTemplate::new(401).set_body_string("unauthorized"))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path(DEPLOYMENT_PATH))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let clients = Clients::new(identity_for(&server), QueryClient::new());
    let outcome = clients.run_query(&state_for(&server, "k"), "hi").await;
    assert!(!outcome.is_ok());
    assert_eq!(outcome.notices[0].level, NoticeLevel::Error);
    assert!(outcome.notices[0].text.contains("401"));
}

#[tokio::test]
async fn test_run_query_malformed_body_has_no_render() {
    let server = MockServer::start().await;
    mount_token_ok(&server, "T").await;

    Mock::given(method("POST"))
        .and(path(DEPLOYMENT_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>gateway</html>"))
        .mount(&server)
        .await;

    let clients = Clients::new(identity_for(&server), QueryClient::new());
    let outcome = clients.run_query(&state_for(&server, "k"), "hi").await;
    assert!(outcome.rendered.is_none());
    assert!(outcome.result.is_none());
    assert!(outcome.notices[0].text.starts_with("Error parsing response"));
    assert!(outcome
        .notices
        .iter()
        .any(|n| n.text.contains("<html>gateway</html>")));
}

#[tokio::test]
async fn test_run_query_empty_query_makes_no_calls() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let clients = Clients::new(identity_for(&server), QueryClient::new());
    let outcome = clients.run_query(&state_for(&server, "k"), "").await;
    assert_eq!(outcome.notices.len(), 1);
    assert_eq!(outcome.notices[0].level, NoticeLevel::Warning);
}
