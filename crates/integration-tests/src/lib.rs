//! Integration test support for Tote.
//!
//! [`MockBackend`] is an `axum` server on `127.0.0.1:0` that answers each
//! `(method, path)` with a canned response and records every request it
//! receives. Tests point a real [`Gateway`](tote_client::Gateway) at it.
//!
//! # Running Tests
//!
//! ```bash
//! cargo test -p tote-integration-tests
//! ```
//!
//! # Test Categories
//!
//! - `gateway` - Content-type checks, error mapping, bearer attachment, multipart
//! - `session` - Login flows with cart snapshot and merge
//! - `refund` - Refund detail submission

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex, PoisonError};

use axum::Router;
use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderMap, HeaderValue, Method, StatusCode, Uri, header};
use axum::response::{IntoResponse, Response};
use serde_json::Value;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use url::Url;

use tote_client::{ClientConfig, ToteClient};

/// A response the mock hands back.
#[derive(Debug, Clone)]
pub struct CannedResponse {
    pub status: StatusCode,
    pub content_type: &'static str,
    pub body: String,
}

impl CannedResponse {
    /// JSON body with `status`.
    #[must_use]
    pub fn json(status: u16, body: &Value) -> Self {
        Self {
            status: StatusCode::from_u16(status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR),
            content_type: "application/json; charset=utf-8",
            body: body.to_string(),
        }
    }

    /// HTML body with `status`, as a misrouted proxy or error page would send.
    #[must_use]
    pub fn html(status: u16, body: impl Into<String>) -> Self {
        Self {
            status: StatusCode::from_u16(status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR),
            content_type: "text/html; charset=utf-8",
            body: body.into(),
        }
    }
}

/// A request the mock received.
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub method: Method,
    pub path: String,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl RecordedRequest {
    /// Header value as text, if present.
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    /// Body parsed as JSON.
    #[must_use]
    pub fn json(&self) -> Option<Value> {
        serde_json::from_slice(&self.body).ok()
    }
}

#[derive(Default)]
struct Shared {
    routes: HashMap<(Method, String), CannedResponse>,
    requests: Mutex<Vec<RecordedRequest>>,
}

/// Routes for a [`MockBackend`], added before it starts.
#[derive(Default)]
pub struct MockBackendBuilder {
    routes: HashMap<(Method, String), CannedResponse>,
}

impl MockBackendBuilder {
    /// Answer `method path` with `response`.
    #[must_use]
    pub fn route(mut self, method: Method, path: &str, response: CannedResponse) -> Self {
        self.routes.insert((method, path.to_string()), response);
        self
    }

    /// Bind to an ephemeral port and start serving.
    ///
    /// # Errors
    ///
    /// Returns the I/O error if the listener cannot be bound.
    pub async fn start(self) -> std::io::Result<MockBackend> {
        let shared = Arc::new(Shared {
            routes: self.routes,
            requests: Mutex::new(Vec::new()),
        });

        let app = Router::new().fallback(handle).with_state(Arc::clone(&shared));
        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;
        let task = tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });

        Ok(MockBackend { addr, shared, task })
    }
}

/// An in-process backend for one test.
pub struct MockBackend {
    addr: SocketAddr,
    shared: Arc<Shared>,
    task: JoinHandle<()>,
}

impl Drop for MockBackend {
    fn drop(&mut self) {
        self.task.abort();
    }
}

impl MockBackend {
    /// Start describing a backend.
    #[must_use]
    pub fn builder() -> MockBackendBuilder {
        MockBackendBuilder::default()
    }

    /// Server root, e.g. `http://127.0.0.1:49152/`.
    #[must_use]
    pub fn root_url(&self) -> Url {
        let raw = format!("http://{}/", self.addr);
        Url::parse(&raw).unwrap_or_else(|e| panic!("bad mock URL {raw}: {e}"))
    }

    /// API base, `<root>/api/`.
    #[must_use]
    pub fn api_url(&self) -> Url {
        self.root_url()
            .join("api/")
            .unwrap_or_else(|e| panic!("bad mock API URL: {e}"))
    }

    /// Every request received so far, in arrival order.
    #[must_use]
    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.shared
            .requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Requests received for `path`.
    #[must_use]
    pub fn requests_to(&self, path: &str) -> Vec<RecordedRequest> {
        self.requests()
            .into_iter()
            .filter(|r| r.path == path)
            .collect()
    }

    /// A client against this backend whose cart lives in `data_dir`.
    #[must_use]
    pub fn client(&self, data_dir: &std::path::Path) -> ToteClient {
        let mut config = ClientConfig::new(self.api_url());
        config.data_dir = data_dir.to_path_buf();
        ToteClient::new(config).unwrap_or_else(|e| panic!("failed to build client: {e}"))
    }
}

async fn handle(
    State(shared): State<Arc<Shared>>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let path = uri.path().to_string();
    shared
        .requests
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .push(RecordedRequest {
            method: method.clone(),
            path: path.clone(),
            headers,
            body,
        });

    match shared.routes.get(&(method, path)) {
        Some(canned) => (
            canned.status,
            [(header::CONTENT_TYPE, HeaderValue::from_static(canned.content_type))],
            canned.body.clone(),
        )
            .into_response(),
        None => (
            StatusCode::NOT_FOUND,
            [(header::CONTENT_TYPE, HeaderValue::from_static("application/json"))],
            r#"{"success":false,"message":"Route not found"}"#,
        )
            .into_response(),
    }
}

/// A successful auth reply for user 7.
#[must_use]
pub fn auth_ok(token: &str) -> Value {
    serde_json::json!({
        "success": true,
        "token": token,
        "user": {"id": 7, "email": "ann@example.com", "name": "Ann", "roleId": 1}
    })
}
