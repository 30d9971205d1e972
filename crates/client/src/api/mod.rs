//! Typed calls to the backend REST endpoints.
//!
//! Every call goes through the [`Gateway`]; this module only fixes paths and
//! payload shapes.

pub mod auth;
pub mod refund;

pub use auth::{AuthGrant, AuthResponse, MessageResponse};
pub use refund::{RefundDetails, RefundError};

use secrecy::SecretString;
use serde_json::Value;
use tracing::{info, instrument};

use tote_core::Email;

use crate::gateway::{Gateway, GatewayError};

/// Endpoint paths, relative to the API base.
pub mod paths {
    /// Email/password login.
    pub const LOGIN: &str = "/auth/login";
    /// Account registration.
    pub const REGISTER: &str = "/auth/register";
    /// Send a one-time passcode.
    pub const OTP_SEND: &str = "/auth/otp/send";
    /// Exchange a one-time passcode for a session.
    pub const OTP_VERIFY: &str = "/auth/otp/verify";
    /// Exchange a Google profile for a session.
    pub const GOOGLE: &str = "/auth/google";
    /// Submit payout details for a refund.
    pub const REFUND_DETAILS: &str = "/order/refund-details";
}

/// Typed backend API.
#[derive(Debug, Clone)]
pub struct Api {
    gateway: Gateway,
}

impl Api {
    /// Wrap a gateway.
    #[must_use]
    pub const fn new(gateway: Gateway) -> Self {
        Self { gateway }
    }

    /// The underlying gateway.
    #[must_use]
    pub const fn gateway(&self) -> &Gateway {
        &self.gateway
    }

    /// Exchange email and password for a session.
    ///
    /// # Errors
    ///
    /// Returns `GatewayError` if the call fails; a `success: false` reply is
    /// returned as `Ok` for the caller to inspect.
    #[instrument(skip(self, password), fields(email = %email))]
    pub async fn login(
        &self,
        email: &Email,
        password: &SecretString,
    ) -> Result<AuthResponse, GatewayError> {
        self.gateway
            .post_json(paths::LOGIN, &auth::LoginRequest { email, password })
            .await
    }

    /// Create an account and start a session for it.
    ///
    /// # Errors
    ///
    /// Returns `GatewayError` if the call fails.
    #[instrument(skip(self, password), fields(email = %email))]
    pub async fn register(
        &self,
        name: &str,
        email: &Email,
        password: &SecretString,
    ) -> Result<AuthResponse, GatewayError> {
        self.gateway
            .post_json(
                paths::REGISTER,
                &auth::RegisterRequest {
                    name,
                    email,
                    password,
                },
            )
            .await
    }

    /// Ask the backend to email a one-time passcode.
    ///
    /// # Errors
    ///
    /// Returns `GatewayError` if the call fails.
    #[instrument(skip(self), fields(email = %email))]
    pub async fn send_otp(&self, email: &Email) -> Result<MessageResponse, GatewayError> {
        let response: MessageResponse = self
            .gateway
            .post_json(paths::OTP_SEND, &auth::OtpSendRequest { email })
            .await?;
        info!(success = response.success, "OTP requested");
        Ok(response)
    }

    /// Exchange a one-time passcode for a session.
    ///
    /// # Errors
    ///
    /// Returns `GatewayError` if the call fails.
    #[instrument(skip(self, otp), fields(email = %email))]
    pub async fn verify_otp(&self, email: &Email, otp: &str) -> Result<AuthResponse, GatewayError> {
        self.gateway
            .post_json(paths::OTP_VERIFY, &auth::OtpVerifyRequest { email, otp })
            .await
    }

    /// Exchange a Google profile (from the OAuth callback) for a session.
    ///
    /// # Errors
    ///
    /// Returns `GatewayError` if the call fails.
    #[instrument(skip(self, google_id), fields(email = %email))]
    pub async fn google(
        &self,
        email: &Email,
        name: &str,
        google_id: &str,
    ) -> Result<AuthResponse, GatewayError> {
        self.gateway
            .post_json(
                paths::GOOGLE,
                &auth::GoogleRequest {
                    email,
                    name,
                    google_id,
                },
            )
            .await
    }

    /// Submit payout details for a cancelled order's refund.
    ///
    /// Returns the persisted record as sent back by the backend.
    ///
    /// # Errors
    ///
    /// Returns `RefundError::AlreadySubmitted` on HTTP 409,
    /// `RefundError::MissingPayoutMethod` before any I/O if no payout target is
    /// set, and `RefundError::Gateway` for every other failure.
    #[instrument(skip(self, details), fields(order_id = %details.order_id))]
    pub async fn submit_refund_details(&self, details: &RefundDetails) -> Result<Value, RefundError> {
        details.validate()?;

        match self.gateway.post_json(paths::REFUND_DETAILS, details).await {
            Ok(record) => Ok(record),
            Err(e) if e.is_conflict() => Err(RefundError::AlreadySubmitted(details.order_id.clone())),
            Err(e) => Err(RefundError::Gateway(e)),
        }
    }
}
