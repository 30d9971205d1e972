//! Login, registration, and logout commands.
//!
//! Each login runs the full reconcile protocol against the persisted cart:
//! snapshot, exchange, merge into an empty session cart, save.
//!
//! # Usage
//!
//! ```bash
//! tote login password -e shopper@example.com        # password from TOTE_PASSWORD
//! tote login otp send -e shopper@example.com
//! tote login otp verify -e shopper@example.com -c 123456
//! tote login google -e shopper@gmail.com -n "Ann" --google-id 1098...
//! tote register -n "Ann" -e shopper@example.com
//! ```
//!
//! The session credential is never written to disk, so every invocation
//! starts anonymous.

use tote_client::{LoginMethod, Reconciliation, ToteClient};
use tote_core::Email;

use crate::error::CliError;

/// Log in (or register) with `method` and merge the guest cart.
pub async fn login(client: &ToteClient, method: LoginMethod) -> Result<Reconciliation, CliError> {
    tracing::info!(method = method.kind(), "Logging in...");

    let outcome = client.login(method).await?;
    #[allow(clippy::print_stdout)]
    {
        println!("{}", summary(&outcome));
    }
    Ok(outcome)
}

/// One-line description of a completed login.
pub fn summary(outcome: &Reconciliation) -> String {
    let who = outcome.user.name.as_deref().unwrap_or(&outcome.user.email);
    format!(
        "Logged in as {who}. Merged {} guest line(s) ({} items); cart now holds {} items.",
        outcome.merged_lines, outcome.snapshot_items, outcome.cart_total_items
    )
}

/// Ask the backend to email a one-time passcode.
pub async fn send_otp(client: &ToteClient, email: &str) -> Result<(), CliError> {
    let email = Email::parse(email)?;
    let response = client.api().send_otp(&email).await?;
    let message = response
        .message
        .unwrap_or_else(|| format!("Passcode sent to {email}"));

    if response.success {
        tracing::info!("{message}");
    } else {
        tracing::warn!("{message}");
    }
    Ok(())
}

/// End the session. The cart is kept.
pub fn logout(client: &ToteClient) -> Result<(), CliError> {
    client.reconciler().logout()?;
    tracing::info!("Logged out; cart kept");
    Ok(())
}
