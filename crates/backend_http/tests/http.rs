mod support;

use std::time::Duration;

use backend_channel::{BackendChannel, BackendErrorKind, BackendRequest, FileSnapshot};
use backend_http::{normalize_endpoint, HttpBackend, HttpBackendClient, HttpBackendConfig};
use pretty_assertions::assert_eq;
use serde_json::{json, Value};

use support::{closed_port_url, serve, serve_raw};

fn request() -> BackendRequest {
    BackendRequest {
        prompt_text: "add a dropout layer".to_string(),
        active_file: FileSnapshot::new("model.py", "x = 1\n"),
        context_files: vec![FileSnapshot::new("utils.py", "u = 1\n")],
        model: "m1".to_string(),
    }
}

fn fast_config(endpoint: String) -> HttpBackendConfig {
    HttpBackendConfig::new(endpoint, vec!["m1".to_string()])
        .with_retry_base_delay(Duration::from_millis(1))
        .with_timeout(Duration::from_secs(10))
}

#[test]
fn request_targets_normalized_endpoint_with_bearer_token() {
    let client = HttpBackendClient::new(
        HttpBackendConfig::new("http://localhost:9000/", vec!["m1".to_string()])
            .with_api_key("secret"),
    )
    .expect("client");

    let http_request = client
        .build_request(&request())
        .build()
        .expect("request");

    assert_eq!(http_request.url().as_str(), "http://localhost:9000/propose");
    assert_eq!(http_request.method(), "POST");
    assert_eq!(
        http_request
            .headers()
            .get("authorization")
            .and_then(|value| value.to_str().ok()),
        Some("Bearer secret")
    );
}

#[test]
fn request_without_api_key_has_no_authorization_header() {
    let client = HttpBackendClient::new(HttpBackendConfig::new("", Vec::new())).expect("client");

    let http_request = client.build_request(&request()).build().expect("request");

    assert_eq!(http_request.url().as_str(), normalize_endpoint(""));
    assert!(http_request.headers().get("authorization").is_none());
}

#[test]
fn posts_camel_case_json_and_returns_reply() {
    let reply = json!({"type": "replace_file", "content": "x = 1\ndropout = 0.5\n"});
    let (url, server) = serve(vec![(200, reply.to_string())]);
    let backend = HttpBackend::new(fast_config(url)).expect("backend");

    let received = backend.send(request()).expect("reply");

    assert_eq!(received, reply);
    let captured = server.join().expect("server thread");
    assert_eq!(captured[0].request_line(), "POST /propose HTTP/1.1");
    let body: Value = serde_json::from_str(&captured[0].body).expect("json body");
    assert_eq!(body["promptText"], "add a dropout layer");
    assert_eq!(body["activeFile"]["path"], "model.py");
    assert_eq!(body["contextFiles"][0]["content"], "u = 1\n");
    assert_eq!(body["model"], "m1");
}

#[test]
fn retryable_status_is_retried_until_success() {
    let (url, server) = serve(vec![
        (503, r#"{"error":{"message":"overloaded"}}"#.to_string()),
        (429, String::new()),
        (200, r#"{"type":"explanation","content":"ok"}"#.to_string()),
    ]);
    let backend = HttpBackend::new(fast_config(url)).expect("backend");

    let reply = backend.send(request()).expect("eventual success");

    assert_eq!(reply["content"], "ok");
    assert_eq!(server.join().expect("server thread").len(), 3);
}

#[test]
fn non_retryable_status_fails_with_payload_message() {
    let (url, server) = serve(vec![(
        400,
        r#"{"error":{"message":"prompt too long"}}"#.to_string(),
    )]);
    let backend = HttpBackend::new(fast_config(url)).expect("backend");

    let error = backend.send(request()).expect_err("status failure");

    assert_eq!(error.kind(), BackendErrorKind::Transport);
    assert!(error.message().contains("prompt too long"), "{error}");
    assert_eq!(server.join().expect("server thread").len(), 1);
}

#[test]
fn exhausted_retries_report_last_status() {
    let responses = (0..4).map(|_| (502, String::new())).collect();
    let (url, server) = serve(responses);
    let backend = HttpBackend::new(fast_config(url)).expect("backend");

    let error = backend.send(request()).expect_err("retries exhausted");

    assert_eq!(error.kind(), BackendErrorKind::Transport);
    assert!(error.message().contains("502"), "{error}");
    assert_eq!(server.join().expect("server thread").len(), 4);
}

#[test]
fn non_json_body_is_a_protocol_error() {
    let (url, server) = serve(vec![(200, "<html>oops</html>".to_string())]);
    let backend = HttpBackend::new(fast_config(url)).expect("backend");

    let error = backend.send(request()).expect_err("invalid json");

    assert_eq!(error.kind(), BackendErrorKind::Protocol);
    server.join().expect("server thread");
}

#[test]
fn closed_port_is_unreachable() {
    let backend = HttpBackend::new(fast_config(closed_port_url())).expect("backend");

    let error = backend.send(request()).expect_err("nothing listening");

    assert_eq!(error.kind(), BackendErrorKind::Unreachable);
}

#[test]
fn malformed_response_head_fails_without_retry() {
    let (url, server) = serve_raw(
        vec!["NOT-HTTP garbage\r\n\r\n".to_string()],
        Duration::from_millis(300),
    );
    let backend = HttpBackend::new(fast_config(url)).expect("backend");

    let error = backend.send(request()).expect_err("malformed response");

    assert_eq!(error.kind(), BackendErrorKind::Transport);
    assert_eq!(server.join().expect("server thread").len(), 1);
}

#[test]
fn truncated_body_fails_without_retry() {
    let truncated = "HTTP/1.1 200 OK\r\nContent-Type: application/json\r\nContent-Length: 100\r\nConnection: close\r\n\r\n{\"type\"".to_string();
    let (url, server) = serve_raw(vec![truncated], Duration::from_millis(300));
    let backend = HttpBackend::new(fast_config(url)).expect("backend");

    let error = backend.send(request()).expect_err("truncated body");

    assert_eq!(error.kind(), BackendErrorKind::Transport);
    assert_eq!(server.join().expect("server thread").len(), 1);
}
