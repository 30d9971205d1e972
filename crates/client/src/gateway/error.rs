//! Gateway error types.

use thiserror::Error;

/// Status code the backend uses for "this already exists".
const CONFLICT: u16 = 409;
/// Status code for a missing or rejected credential.
const UNAUTHORIZED: u16 = 401;

/// Errors returned by every [`Gateway`](super::Gateway) call.
#[derive(Debug, Error)]
pub enum GatewayError {
    /// The request never produced a response (DNS, connect, TLS, read).
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The target could not be turned into a URL.
    #[error("invalid request target {target:?}: {source}")]
    InvalidTarget {
        /// Target as passed by the caller.
        target: String,
        /// Parse failure.
        #[source]
        source: url::ParseError,
    },

    /// A header value could not be encoded.
    #[error("invalid header value: {0}")]
    InvalidHeader(#[from] reqwest::header::InvalidHeaderValue),

    /// The response did not declare a JSON content type.
    #[error("unexpected response (HTTP {status}, content-type {content_type:?}): {body}")]
    UnexpectedResponse {
        /// HTTP status code.
        status: u16,
        /// Declared content type, empty if absent.
        content_type: String,
        /// Start of the raw body, for diagnostics.
        body: String,
    },

    /// The backend answered with a non-2xx status.
    #[error("API error: {status} - {message}")]
    Api {
        /// HTTP status code.
        status: u16,
        /// The body's `message` field, or a generic status message.
        message: String,
    },

    /// The body was declared JSON but did not parse (or did not match the
    /// expected shape).
    #[error("JSON parse error: {0}")]
    Parse(#[from] serde_json::Error),
}

impl GatewayError {
    /// HTTP status of the response, if one was received.
    #[must_use]
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Api { status, .. } | Self::UnexpectedResponse { status, .. } => Some(*status),
            Self::Http(e) => e.status().map(|s| s.as_u16()),
            Self::InvalidTarget { .. } | Self::InvalidHeader(_) | Self::Parse(_) => None,
        }
    }

    /// Whether the backend reported a conflict (HTTP 409).
    #[must_use]
    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::Api { status, .. } if *status == CONFLICT)
    }

    /// Whether the backend rejected the credential (HTTP 401).
    #[must_use]
    pub fn is_unauthorized(&self) -> bool {
        matches!(self, Self::Api { status, .. } if *status == UNAUTHORIZED)
    }
}
