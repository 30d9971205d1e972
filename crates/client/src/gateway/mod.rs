//! Outbound HTTP chokepoint for every backend call.
//!
//! # Contract
//!
//! - Targets are paths relative to the API base (`/auth/login`) or absolute
//!   URLs. Only internal targets (relative, or under the API base) carry the
//!   session's `Authorization: Bearer` header.
//! - Payloads default to `Content-Type: application/json`; multipart bodies
//!   are left to `reqwest`, which sets the boundary.
//! - Responses must declare a JSON content type. Anything else fails with
//!   [`GatewayError::UnexpectedResponse`] carrying the start of the body.
//! - Non-2xx responses fail with [`GatewayError::Api`] using the body's
//!   `message` field when present.
//! - No retries, no backoff, no caching, no timeouts: each call is sent at
//!   most once.

mod error;

pub use error::GatewayError;

use std::sync::Arc;

use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, HeaderMap, HeaderName, HeaderValue};
use reqwest::{Method, multipart};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, error, instrument};
use url::Url;

use crate::auth::TokenHolder;

/// Longest body excerpt kept in diagnostics.
const DIAGNOSTIC_BODY_CHARS: usize = 500;

/// Request payload.
#[derive(Debug, Default)]
pub enum RequestBody {
    /// No body.
    #[default]
    Empty,
    /// JSON document.
    Json(Value),
    /// Multipart form (file uploads); content type is set by the transport.
    Multipart(multipart::Form),
}

/// Method, body and extra headers for one call.
#[derive(Debug)]
pub struct RequestOptions {
    /// HTTP method.
    pub method: Method,
    /// Payload.
    pub body: RequestBody,
    /// Extra headers; these override the defaults.
    pub headers: HeaderMap,
}

impl Default for RequestOptions {
    fn default() -> Self {
        Self {
            method: Method::GET,
            body: RequestBody::Empty,
            headers: HeaderMap::new(),
        }
    }
}

impl RequestOptions {
    /// A `GET` with no body.
    #[must_use]
    pub fn get() -> Self {
        Self::default()
    }

    /// A `POST` of a JSON document.
    ///
    /// # Errors
    ///
    /// Returns `GatewayError::Parse` if `body` cannot be serialized.
    pub fn post_json<B: Serialize + ?Sized>(body: &B) -> Result<Self, GatewayError> {
        Ok(Self {
            method: Method::POST,
            body: RequestBody::Json(serde_json::to_value(body)?),
            headers: HeaderMap::new(),
        })
    }

    /// A `POST` of a multipart form.
    #[must_use]
    pub fn post_multipart(form: multipart::Form) -> Self {
        Self {
            method: Method::POST,
            body: RequestBody::Multipart(form),
            headers: HeaderMap::new(),
        }
    }

    /// Use `method` instead of the constructor's default.
    #[must_use]
    pub fn method(mut self, method: Method) -> Self {
        self.method = method;
        self
    }

    /// Add or replace a header.
    #[must_use]
    pub fn header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }
}

/// The single wrapper all backend I/O goes through.
///
/// Cheap to clone; clones share the connection pool and the token holder.
#[derive(Clone)]
pub struct Gateway {
    inner: Arc<GatewayInner>,
}

struct GatewayInner {
    client: reqwest::Client,
    api_base: Url,
    tokens: TokenHolder,
}

impl std::fmt::Debug for Gateway {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Gateway")
            .field("api_base", &self.inner.api_base.as_str())
            .finish_non_exhaustive()
    }
}

impl Gateway {
    /// Create a gateway for the API rooted at `api_base`.
    ///
    /// A trailing slash is added to `api_base` if missing so that relative
    /// targets resolve beneath it.
    ///
    /// # Errors
    ///
    /// Returns `GatewayError::Http` if the HTTP client cannot be built.
    pub fn new(api_base: Url, tokens: TokenHolder) -> Result<Self, GatewayError> {
        let client = reqwest::Client::builder().build()?;
        Ok(Self::with_client(client, api_base, tokens))
    }

    /// Create a gateway over an existing `reqwest` client.
    #[must_use]
    pub fn with_client(client: reqwest::Client, mut api_base: Url, tokens: TokenHolder) -> Self {
        if !api_base.path().ends_with('/') {
            let path = format!("{}/", api_base.path());
            api_base.set_path(&path);
        }
        Self {
            inner: Arc::new(GatewayInner {
                client,
                api_base,
                tokens,
            }),
        }
    }

    /// The API base URL (always ends in `/`).
    #[must_use]
    pub fn api_base(&self) -> &Url {
        &self.inner.api_base
    }

    /// The token holder whose credential this gateway presents.
    #[must_use]
    pub fn tokens(&self) -> &TokenHolder {
        &self.inner.tokens
    }

    /// Whether `target` addresses the backend API rather than an external
    /// resource.
    #[must_use]
    pub fn is_internal(&self, target: &str) -> bool {
        match Url::parse(target) {
            Ok(_) => target.starts_with(self.inner.api_base.as_str()),
            Err(_) => true,
        }
    }

    fn resolve(&self, target: &str) -> Result<Url, GatewayError> {
        let invalid = |source| GatewayError::InvalidTarget {
            target: target.to_owned(),
            source,
        };
        match Url::parse(target) {
            Ok(url) => Ok(url),
            Err(url::ParseError::RelativeUrlWithoutBase) => self
                .inner
                .api_base
                .join(target.trim_start_matches('/'))
                .map_err(invalid),
            Err(e) => Err(invalid(e)),
        }
    }

    /// Send one request and return the parsed JSON body.
    ///
    /// # Errors
    ///
    /// Returns `GatewayError::UnexpectedResponse` if the response is not JSON,
    /// `GatewayError::Api` for non-2xx statuses, `GatewayError::Http` on
    /// transport failure, and `GatewayError::Parse` for malformed JSON.
    #[instrument(skip(self, options), fields(method = %options.method))]
    pub async fn request(&self, target: &str, options: RequestOptions) -> Result<Value, GatewayError> {
        let url = self.resolve(target)?;
        let RequestOptions {
            method,
            body,
            headers: extra_headers,
        } = options;
        let multipart_body = matches!(body, RequestBody::Multipart(_));

        let mut headers = HeaderMap::new();
        if !multipart_body {
            headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        }
        if self.is_internal(target)
            && let Some(token) = self.inner.tokens.bearer()
        {
            headers.insert(AUTHORIZATION, HeaderValue::from_str(&format!("Bearer {token}"))?);
        }
        for (name, value) in &extra_headers {
            if multipart_body && name == CONTENT_TYPE {
                continue;
            }
            headers.insert(name.clone(), value.clone());
        }

        let mut builder = self.inner.client.request(method, url).headers(headers);
        builder = match body {
            RequestBody::Empty => builder,
            RequestBody::Json(value) => builder.body(serde_json::to_vec(&value)?),
            RequestBody::Multipart(form) => builder.multipart(form),
        };

        let response = builder.send().await?;
        let status = response.status();
        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_owned();

        // Read the body as text first so diagnostics can include it
        let text = response.text().await?;

        if !content_type.to_ascii_lowercase().contains("application/json") {
            let excerpt: String = text.chars().take(DIAGNOSTIC_BODY_CHARS).collect();
            error!(
                status = %status,
                content_type = %content_type,
                body = %excerpt,
                "Backend returned a non-JSON response"
            );
            return Err(GatewayError::UnexpectedResponse {
                status: status.as_u16(),
                content_type,
                body: excerpt,
            });
        }

        let body: Value = if text.trim().is_empty() {
            Value::Null
        } else {
            serde_json::from_str(&text).map_err(|e| {
                error!(
                    error = %e,
                    body = %text.chars().take(DIAGNOSTIC_BODY_CHARS).collect::<String>(),
                    "Failed to parse backend JSON response"
                );
                GatewayError::Parse(e)
            })?
        };

        if !status.is_success() {
            let message = body
                .get("message")
                .and_then(Value::as_str)
                .map_or_else(
                    || format!("Request failed with status {}", status.as_u16()),
                    str::to_owned,
                );
            debug!(status = %status, message = %message, "Backend returned an error");
            return Err(GatewayError::Api {
                status: status.as_u16(),
                message,
            });
        }

        Ok(body)
    }

    /// Send one request and deserialize the JSON body into `T`.
    ///
    /// # Errors
    ///
    /// Everything [`request`](Self::request) returns, plus
    /// `GatewayError::Parse` if the body does not match `T`.
    pub async fn request_json<T: DeserializeOwned>(
        &self,
        target: &str,
        options: RequestOptions,
    ) -> Result<T, GatewayError> {
        let value = self.request(target, options).await?;
        Ok(serde_json::from_value(value)?)
    }

    /// `GET` `target`.
    ///
    /// # Errors
    ///
    /// See [`request`](Self::request).
    pub async fn get(&self, target: &str) -> Result<Value, GatewayError> {
        self.request(target, RequestOptions::get()).await
    }

    /// `POST` `body` as JSON to `target` and deserialize the reply.
    ///
    /// # Errors
    ///
    /// See [`request_json`](Self::request_json).
    pub async fn post_json<B, T>(&self, target: &str, body: &B) -> Result<T, GatewayError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        self.request_json(target, RequestOptions::post_json(body)?)
            .await
    }
}
