//! Bearer credential and its holder.

use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use chrono::{DateTime, Utc};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;

/// Seconds before `exp` at which a token is already treated as expired.
const EXPIRY_LEEWAY_SECS: i64 = 30;

/// An opaque bearer token.
///
/// If the token happens to be a JWT with an `exp` claim, that expiry is
/// honored locally; any other token is valid until cleared.
#[derive(Clone)]
pub struct AuthCredential {
    token: SecretString,
    expires_at: Option<DateTime<Utc>>,
}

impl std::fmt::Debug for AuthCredential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthCredential")
            .field("token", &"[REDACTED]")
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

impl AuthCredential {
    /// Wrap a token issued by the backend.
    #[must_use]
    pub fn new(token: impl Into<String>) -> Self {
        let token = token.into();
        let expires_at = jwt_expiry(&token);
        Self {
            token: SecretString::from(token),
            expires_at,
        }
    }

    /// When the token stops being valid, if known.
    #[must_use]
    pub const fn expires_at(&self) -> Option<DateTime<Utc>> {
        self.expires_at
    }

    /// Whether the token is expired (or within the leeway of expiring).
    #[must_use]
    pub fn is_expired(&self) -> bool {
        self.expires_at.is_some_and(|exp| {
            Utc::now().timestamp() >= exp.timestamp() - EXPIRY_LEEWAY_SECS
        })
    }

    /// The raw token, for building an `Authorization` header.
    #[must_use]
    pub fn expose(&self) -> &str {
        self.token.expose_secret()
    }
}

#[derive(Deserialize)]
struct JwtClaims {
    exp: Option<i64>,
}

/// Read the `exp` claim from a JWT payload without verifying the signature.
fn jwt_expiry(token: &str) -> Option<DateTime<Utc>> {
    let mut segments = token.split('.');
    let (Some(_header), Some(payload), Some(_signature), None) = (
        segments.next(),
        segments.next(),
        segments.next(),
        segments.next(),
    ) else {
        return None;
    };

    let bytes = URL_SAFE_NO_PAD.decode(payload.trim_end_matches('=')).ok()?;
    let claims: JwtClaims = serde_json::from_slice(&bytes).ok()?;
    DateTime::from_timestamp(claims.exp?, 0)
}

/// Holds the current session credential.
///
/// Cheap to clone; all clones see the same credential. At most one
/// credential is held at a time. Access is synchronous so that storing a
/// credential and acting on it never straddle an `.await`.
#[derive(Debug, Clone, Default)]
pub struct TokenHolder {
    inner: Arc<RwLock<Option<AuthCredential>>>,
}

impl TokenHolder {
    /// Create an empty holder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> RwLockReadGuard<'_, Option<AuthCredential>> {
        self.inner.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, Option<AuthCredential>> {
        self.inner.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Store a new credential, replacing any previous one.
    pub fn set(&self, credential: AuthCredential) {
        *self.write() = Some(credential);
    }

    /// Drop the current credential.
    pub fn clear(&self) {
        *self.write() = None;
    }

    /// The token to present as a bearer header, if one is held and unexpired.
    #[must_use]
    pub fn bearer(&self) -> Option<String> {
        self.read()
            .as_ref()
            .filter(|credential| !credential.is_expired())
            .map(|credential| credential.expose().to_owned())
    }

    /// Whether an unexpired credential is held.
    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        self.read()
            .as_ref()
            .is_some_and(|credential| !credential.is_expired())
    }

    /// Expiry of the held credential, if known.
    #[must_use]
    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        self.read().as_ref().and_then(AuthCredential::expires_at)
    }
}
