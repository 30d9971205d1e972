//! Gateway behavior against a live HTTP server.

#![allow(clippy::unwrap_used)]

use reqwest::header::{CONTENT_TYPE, HeaderValue};
use reqwest::{Method, StatusCode, multipart};
use serde_json::{Value, json};

use tote_client::auth::{AuthCredential, TokenHolder};
use tote_client::{Gateway, GatewayError, RequestOptions};
use tote_integration_tests::{CannedResponse, MockBackend};

fn gateway(backend: &MockBackend) -> Gateway {
    Gateway::new(backend.api_url(), TokenHolder::new()).unwrap()
}

#[tokio::test]
async fn test_html_response_is_a_diagnostic_error() {
    let page = format!("<!DOCTYPE html><html><body>{}</body></html>", "x".repeat(2_000));
    let backend = MockBackend::builder()
        .route(Method::GET, "/api/products", CannedResponse::html(200, page))
        .start()
        .await
        .unwrap();

    let err = gateway(&backend).get("/products").await.unwrap_err();
    match err {
        GatewayError::UnexpectedResponse {
            status,
            content_type,
            body,
        } => {
            assert_eq!(status, 200);
            assert!(content_type.starts_with("text/html"));
            assert!(body.starts_with("<!DOCTYPE html>"));
            assert_eq!(body.chars().count(), 500);
        }
        other => panic!("expected UnexpectedResponse, got {other:?}"),
    }
}

#[tokio::test]
async fn test_error_message_comes_from_body() {
    let backend = MockBackend::builder()
        .route(
            Method::POST,
            "/api/auth/login",
            CannedResponse::json(401, &json!({"success": false, "message": "Invalid email or password"})),
        )
        .route(Method::GET, "/api/broken", CannedResponse::json(500, &json!({"error": "boom"})))
        .start()
        .await
        .unwrap();
    let gw = gateway(&backend);

    let err = gw
        .post_json::<_, Value>("/auth/login", &json!({"email": "a@b.co"}))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        GatewayError::Api { status: 401, ref message } if message == "Invalid email or password"
    ));
    assert!(err.is_unauthorized());

    let err = gw.get("/broken").await.unwrap_err();
    assert!(matches!(
        err,
        GatewayError::Api { status: 500, ref message } if message == "Request failed with status 500"
    ));
}

#[tokio::test]
async fn test_json_requests_carry_json_content_type() {
    let backend = MockBackend::builder()
        .route(Method::POST, "/api/echo", CannedResponse::json(200, &json!({"ok": true})))
        .start()
        .await
        .unwrap();

    let reply: Value = gateway(&backend)
        .post_json("/echo", &json!({"email": "a@b.co"}))
        .await
        .unwrap();
    assert_eq!(reply, json!({"ok": true}));

    let requests = backend.requests_to("/api/echo");
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].header("content-type"), Some("application/json"));
    assert_eq!(requests[0].json(), Some(json!({"email": "a@b.co"})));
}

#[tokio::test]
async fn test_bearer_only_sent_to_internal_targets() {
    let api = MockBackend::builder()
        .route(Method::GET, "/api/me", CannedResponse::json(200, &json!({})))
        .start()
        .await
        .unwrap();
    let external = MockBackend::builder()
        .route(Method::GET, "/asset.json", CannedResponse::json(200, &json!({})))
        .start()
        .await
        .unwrap();

    let tokens = TokenHolder::new();
    let gw = Gateway::new(api.api_url(), tokens.clone()).unwrap();

    gw.get("/me").await.unwrap();
    assert_eq!(api.requests_to("/api/me")[0].header("authorization"), None);

    tokens.set(AuthCredential::new("session-token"));
    gw.get("/me").await.unwrap();
    let absolute = api.api_url().join("me").unwrap();
    gw.get(absolute.as_str()).await.unwrap();

    let external_url = external.root_url().join("asset.json").unwrap();
    gw.get(external_url.as_str()).await.unwrap();

    let me = api.requests_to("/api/me");
    assert_eq!(me.len(), 3);
    assert_eq!(me[1].header("authorization"), Some("Bearer session-token"));
    assert_eq!(me[2].header("authorization"), Some("Bearer session-token"));
    assert_eq!(external.requests_to("/asset.json")[0].header("authorization"), None);

    tokens.clear();
    gw.get("/me").await.unwrap();
    assert_eq!(api.requests_to("/api/me")[3].header("authorization"), None);
}

#[tokio::test]
async fn test_multipart_keeps_transport_content_type() {
    let backend = MockBackend::builder()
        .route(Method::POST, "/api/uploads", CannedResponse::json(201, &json!({"id": 1})))
        .start()
        .await
        .unwrap();

    let form = multipart::Form::new()
        .text("orderId", "1042")
        .part("file", multipart::Part::bytes(b"png bytes".to_vec()).file_name("receipt.png"));
    let options = RequestOptions::post_multipart(form).header(
        CONTENT_TYPE,
        HeaderValue::from_static("application/json"),
    );

    let reply = gateway(&backend).request("/uploads", options).await.unwrap();
    assert_eq!(reply, json!({"id": 1}));

    let request = &backend.requests_to("/api/uploads")[0];
    let content_type = request.header("content-type").unwrap();
    assert!(content_type.starts_with("multipart/form-data; boundary="));
}

#[tokio::test]
async fn test_caller_headers_override_defaults() {
    let backend = MockBackend::builder()
        .route(Method::PUT, "/api/profile", CannedResponse::json(200, &json!({})))
        .start()
        .await
        .unwrap();

    let options = RequestOptions::post_json(&json!({"name": "Ann"}))
        .unwrap()
        .method(Method::PUT)
        .header(
            CONTENT_TYPE,
            HeaderValue::from_static("application/merge-patch+json"),
        );
    gateway(&backend).request("/profile", options).await.unwrap();

    let request = &backend.requests_to("/api/profile")[0];
    assert_eq!(request.method, Method::PUT);
    assert_eq!(request.header("content-type"), Some("application/merge-patch+json"));
}

#[tokio::test]
async fn test_empty_json_body_is_null() {
    let backend = MockBackend::builder()
        .route(
            Method::GET,
            "/api/ping",
            CannedResponse {
                status: StatusCode::OK,
                content_type: "application/json",
                body: String::new(),
            },
        )
        .start()
        .await
        .unwrap();

    assert_eq!(gateway(&backend).get("/ping").await.unwrap(), Value::Null);
}
