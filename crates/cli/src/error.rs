//! CLI error type.

use thiserror::Error;

use tote_client::api::RefundError;
use tote_client::{ClientError, GatewayError, SessionError};
use tote_core::EmailError;

/// Anything a command can fail with.
#[derive(Debug, Error)]
pub enum CliError {
    #[error("Client error: {0}")]
    Client(#[from] ClientError),

    #[error("Login failed: {0}")]
    Session(#[from] SessionError),

    #[error("Refund submission failed: {0}")]
    Refund(#[from] RefundError),

    #[error("Request failed: {0}")]
    Gateway(#[from] GatewayError),

    #[error("Invalid email: {0}")]
    Email(#[from] EmailError),
}
