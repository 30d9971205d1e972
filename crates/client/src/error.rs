//! Client-level errors and Sentry context helpers.
//!
//! Sentry calls are no-ops until the host binary initializes a Sentry client,
//! so library code can call these unconditionally.

use thiserror::Error;

use crate::config::ConfigError;
use crate::gateway::GatewayError;

/// Errors constructing a [`ToteClient`](crate::ToteClient).
#[derive(Debug, Error)]
pub enum ClientError {
    /// Configuration could not be loaded.
    #[error("Config error: {0}")]
    Config(#[from] ConfigError),

    /// The gateway could not be built.
    #[error("Gateway error: {0}")]
    Gateway(#[from] GatewayError),
}

/// Set the Sentry user context after a successful login.
pub fn set_sentry_user(user_id: &impl ToString, email: Option<&str>) {
    sentry::configure_scope(|scope| {
        scope.set_user(Some(sentry::User {
            id: Some(user_id.to_string()),
            email: email.map(String::from),
            ..Default::default()
        }));
    });
}

/// Clear the Sentry user context on logout.
pub fn clear_sentry_user() {
    sentry::configure_scope(|scope| {
        scope.set_user(None);
    });
}

/// Record a cart or session action as a Sentry breadcrumb.
///
/// Breadcrumbs show up in later error reports as the trail of actions that
/// led to the error.
pub fn add_breadcrumb(category: &str, message: &str, data: &[(&str, String)]) {
    let mut breadcrumb = sentry::Breadcrumb {
        category: Some(category.to_string()),
        message: Some(message.to_string()),
        level: sentry::Level::Info,
        ..Default::default()
    };

    for (key, value) in data {
        breadcrumb
            .data
            .insert((*key).to_string(), serde_json::Value::String(value.clone()));
    }

    sentry::add_breadcrumb(breadcrumb);
}
