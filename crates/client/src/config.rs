//! Client configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Required
//! - `TOTE_API_URL` - Backend API base URL (falls back to `NEXT_PUBLIC_API_URL`)
//!
//! ## Optional
//! - `TOTE_DATA_DIR` - Directory for persisted client state (default: `.tote`)
//! - `TOTE_CART_STORAGE_KEY` - Storage key of the cart record (default: `cart-storage`)
//! - `TOTE_CART_KEY_INCLUDES_VARIANT` - Keep color variants as separate cart lines (default: false)
//! - `SENTRY_DSN` - Sentry error tracking DSN
//! - `SENTRY_ENVIRONMENT` - Sentry environment tag

use std::path::PathBuf;

use thiserror::Error;
use url::Url;

use tote_core::KeyPolicy;

use crate::cart::{CartOptions, DEFAULT_STORAGE_KEY};

const API_URL_VAR: &str = "TOTE_API_URL";
const LEGACY_API_URL_VAR: &str = "NEXT_PUBLIC_API_URL";

/// Configuration errors that can occur during loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
}

/// Client configuration.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Backend API base URL, always ending in `/`
    pub api_url: Url,
    /// Directory for persisted client state
    pub data_dir: PathBuf,
    /// Storage key of the cart record
    pub cart_storage_key: String,
    /// Which fields identify a cart line
    pub key_policy: KeyPolicy,
    /// Sentry DSN for error tracking
    pub sentry_dsn: Option<String>,
    /// Sentry environment tag
    pub sentry_environment: Option<String>,
}

impl ClientConfig {
    /// Load configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv()` to load from `.env` file if present.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if the API URL is missing or any variable fails
    /// to parse.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build configuration from an arbitrary variable source.
    ///
    /// # Errors
    ///
    /// See [`from_env`](Self::from_env).
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let api_url = parse_api_url(&lookup)?;
        let data_dir = PathBuf::from(get_or_default(&lookup, "TOTE_DATA_DIR", ".tote"));
        let cart_storage_key = get_or_default(&lookup, "TOTE_CART_STORAGE_KEY", DEFAULT_STORAGE_KEY);
        let key_policy = if get_bool(&lookup, "TOTE_CART_KEY_INCLUDES_VARIANT")? {
            KeyPolicy::ProductVariantAndSize
        } else {
            KeyPolicy::ProductAndSize
        };

        Ok(Self {
            api_url,
            data_dir,
            cart_storage_key,
            key_policy,
            sentry_dsn: get_optional(&lookup, "SENTRY_DSN"),
            sentry_environment: get_optional(&lookup, "SENTRY_ENVIRONMENT"),
        })
    }

    /// Minimal configuration for `api_url` with every default applied.
    #[must_use]
    pub fn new(api_url: Url) -> Self {
        Self {
            api_url: with_trailing_slash(api_url),
            data_dir: PathBuf::from(".tote"),
            cart_storage_key: DEFAULT_STORAGE_KEY.to_string(),
            key_policy: KeyPolicy::default(),
            sentry_dsn: None,
            sentry_environment: None,
        }
    }

    /// Cart Store construction parameters.
    #[must_use]
    pub fn cart_options(&self) -> CartOptions {
        CartOptions {
            storage_key: self.cart_storage_key.clone(),
            key_policy: self.key_policy,
        }
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

/// API URL with fallback to the storefront's `NEXT_PUBLIC_API_URL`.
fn parse_api_url(lookup: &impl Fn(&str) -> Option<String>) -> Result<Url, ConfigError> {
    let (key, raw) = get_optional(lookup, API_URL_VAR)
        .map(|v| (API_URL_VAR, v))
        .or_else(|| get_optional(lookup, LEGACY_API_URL_VAR).map(|v| (LEGACY_API_URL_VAR, v)))
        .ok_or_else(|| ConfigError::MissingEnvVar(API_URL_VAR.to_string()))?;

    let url = Url::parse(&raw).map_err(|e| ConfigError::InvalidEnvVar(key.to_string(), e.to_string()))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(ConfigError::InvalidEnvVar(
            key.to_string(),
            format!("unsupported scheme {}", url.scheme()),
        ));
    }
    Ok(with_trailing_slash(url))
}

fn with_trailing_slash(mut url: Url) -> Url {
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    url
}

/// Get an optional variable, treating empty values as unset.
fn get_optional(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Option<String> {
    lookup(key).filter(|v| !v.trim().is_empty())
}

/// Get a variable with a default value.
fn get_or_default(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: &str) -> String {
    get_optional(lookup, key).unwrap_or_else(|| default.to_string())
}

/// Parse a boolean flag; unset means false.
fn get_bool(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Result<bool, ConfigError> {
    let Some(raw) = get_optional(lookup, key) else {
        return Ok(false);
    };
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => Err(ConfigError::InvalidEnvVar(
            key.to_string(),
            format!("expected a boolean, got {other:?}"),
        )),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn load(vars: &[(&str, &str)]) -> Result<ClientConfig, ConfigError> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        ClientConfig::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = load(&[("TOTE_API_URL", "http://localhost:5000/api")]).unwrap();
        assert_eq!(config.api_url.as_str(), "http://localhost:5000/api/");
        assert_eq!(config.data_dir, PathBuf::from(".tote"));
        assert_eq!(config.cart_storage_key, "cart-storage");
        assert_eq!(config.key_policy, KeyPolicy::ProductAndSize);
        assert_eq!(config.sentry_dsn, None);
    }

    #[test]
    fn test_missing_api_url() {
        assert!(matches!(load(&[]), Err(ConfigError::MissingEnvVar(key)) if key == "TOTE_API_URL"));
    }

    #[test]
    fn test_legacy_api_url_fallback() {
        let config = load(&[("NEXT_PUBLIC_API_URL", "https://shop.example.com/api")]).unwrap();
        assert_eq!(config.api_url.as_str(), "https://shop.example.com/api/");

        let config = load(&[
            ("TOTE_API_URL", "https://new.example.com/api"),
            ("NEXT_PUBLIC_API_URL", "https://old.example.com/api"),
        ])
        .unwrap();
        assert_eq!(config.api_url.host_str(), Some("new.example.com"));
    }

    #[test]
    fn test_invalid_api_url() {
        assert!(matches!(
            load(&[("TOTE_API_URL", "not a url")]),
            Err(ConfigError::InvalidEnvVar(..))
        ));
        assert!(matches!(
            load(&[("TOTE_API_URL", "ftp://example.com/")]),
            Err(ConfigError::InvalidEnvVar(..))
        ));
    }

    #[test]
    fn test_variant_flag() {
        let config = load(&[
            ("TOTE_API_URL", "http://localhost:5000/api"),
            ("TOTE_CART_KEY_INCLUDES_VARIANT", "true"),
        ])
        .unwrap();
        assert_eq!(config.key_policy, KeyPolicy::ProductVariantAndSize);
        assert_eq!(config.cart_options().key_policy, KeyPolicy::ProductVariantAndSize);

        assert!(matches!(
            load(&[
                ("TOTE_API_URL", "http://localhost:5000/api"),
                ("TOTE_CART_KEY_INCLUDES_VARIANT", "maybe"),
            ]),
            Err(ConfigError::InvalidEnvVar(..))
        ));
    }

    #[test]
    fn test_empty_values_fall_back_to_defaults() {
        let config = load(&[
            ("TOTE_API_URL", "http://localhost:5000/api"),
            ("TOTE_DATA_DIR", ""),
            ("SENTRY_DSN", "  "),
        ])
        .unwrap();
        assert_eq!(config.data_dir, PathBuf::from(".tote"));
        assert_eq!(config.sentry_dsn, None);
    }
}
