//! Auth endpoint payloads.

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize, Serializer};

use tote_core::{AuthUser, Email};

#[allow(clippy::trivially_copy_pass_by_ref)] // serde passes the field by reference
fn expose<S: Serializer>(secret: &&SecretString, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(secret.expose_secret())
}

/// `POST /auth/login` body.
#[derive(Serialize)]
pub struct LoginRequest<'a> {
    pub email: &'a Email,
    #[serde(serialize_with = "expose")]
    pub password: &'a SecretString,
}

/// `POST /auth/register` body.
#[derive(Serialize)]
pub struct RegisterRequest<'a> {
    pub name: &'a str,
    pub email: &'a Email,
    #[serde(serialize_with = "expose")]
    pub password: &'a SecretString,
}

/// `POST /auth/otp/send` body.
#[derive(Serialize)]
pub struct OtpSendRequest<'a> {
    pub email: &'a Email,
}

/// `POST /auth/otp/verify` body.
#[derive(Serialize)]
pub struct OtpVerifyRequest<'a> {
    pub email: &'a Email,
    pub otp: &'a str,
}

/// `POST /auth/google` body.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GoogleRequest<'a> {
    pub email: &'a Email,
    pub name: &'a str,
    pub google_id: &'a str,
}

/// Reply of every credential-exchange endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct AuthResponse {
    /// Whether the exchange succeeded.
    #[serde(default)]
    pub success: bool,
    /// Issued bearer token.
    #[serde(default)]
    pub token: Option<String>,
    /// Authenticated user.
    #[serde(default)]
    pub user: Option<AuthUser>,
    /// Optional human-readable message.
    #[serde(default)]
    pub message: Option<String>,
}

/// A successful credential exchange.
#[derive(Debug, Clone)]
pub struct AuthGrant {
    /// Issued bearer token.
    pub token: String,
    /// Authenticated user.
    pub user: AuthUser,
}

impl AuthResponse {
    /// Split into token and user, or the rejection message.
    ///
    /// # Errors
    ///
    /// Returns the backend's message (or a generic one) when `success` is
    /// false or the token or user is missing.
    pub fn into_grant(self) -> Result<AuthGrant, String> {
        match (self.success, self.token, self.user) {
            (true, Some(token), Some(user)) if !token.is_empty() => Ok(AuthGrant { token, user }),
            _ => Err(self
                .message
                .unwrap_or_else(|| "Authentication failed".to_string())),
        }
    }
}

/// Reply of endpoints that only acknowledge.
#[derive(Debug, Clone, Deserialize)]
pub struct MessageResponse {
    /// Whether the request was accepted.
    #[serde(default)]
    pub success: bool,
    /// Human-readable message.
    #[serde(default)]
    pub message: Option<String>,
}
