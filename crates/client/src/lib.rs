//! Tote Client - Cart store, API gateway, and login-time cart reconciliation.
//!
//! # Overview
//!
//! - [`cart`] - The shopper's cart, persisted through a [`storage`] adapter
//! - [`gateway`] - The single chokepoint for outbound HTTP
//! - [`api`] - Typed backend endpoints on top of the gateway
//! - [`session`] - Snapshot, authenticate, then merge the guest cart
//! - [`state`] - [`ToteClient`], which wires the pieces together
//!
//! # Example
//!
//! ```rust,no_run
//! use secrecy::SecretString;
//! use tote_client::{LoginMethod, ToteClient};
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let client = ToteClient::from_env()?;
//! let mut cart = client.open_cart();
//!
//! let pending = client.reconciler().begin(&cart)?;
//! let method = LoginMethod::password("shopper@example.com", SecretString::from("hunter22"))?;
//! let outcome = client.reconciler().complete(pending, method, &mut cart).await?;
//! println!("{} items in cart", outcome.cart_total_items);
//! # Ok(())
//! # }
//! ```

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod api;
pub mod auth;
pub mod cart;
pub mod config;
pub mod error;
pub mod gateway;
pub mod session;
pub mod state;
pub mod storage;

pub use cart::{CartOptions, CartStore};
pub use config::{ClientConfig, ConfigError};
pub use error::ClientError;
pub use gateway::{Gateway, GatewayError, RequestBody, RequestOptions};
pub use session::{LoginMethod, PendingLogin, Reconciliation, SessionError, SessionReconciler, SessionState};
pub use state::ToteClient;
