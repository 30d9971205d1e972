//! Session error types.

use thiserror::Error;

use tote_core::EmailError;

use crate::gateway::GatewayError;

/// Errors from the login/reconciliation protocol.
#[derive(Debug, Error)]
pub enum SessionError {
    /// The requested step is not valid in the current state.
    #[error("cannot go from {from} to {to}")]
    InvalidTransition {
        /// Current state name.
        from: &'static str,
        /// Requested state name.
        to: &'static str,
    },

    /// Login input failed validation before any request was made.
    #[error("invalid email: {0}")]
    InvalidEmail(#[from] EmailError),

    /// The backend refused the credentials (bad password, wrong or expired OTP).
    #[error("authentication rejected: {message}")]
    Rejected {
        /// HTTP status, when the refusal came as a 4xx.
        status: Option<u16>,
        /// Backend message, suitable for showing inline.
        message: String,
    },

    /// The exchange failed for a reason other than refusal.
    #[error("gateway error: {0}")]
    Gateway(GatewayError),
}

impl From<GatewayError> for SessionError {
    fn from(err: GatewayError) -> Self {
        match err {
            GatewayError::Api { status, message } if (400..500).contains(&status) => {
                Self::Rejected {
                    status: Some(status),
                    message,
                }
            }
            other => Self::Gateway(other),
        }
    }
}
