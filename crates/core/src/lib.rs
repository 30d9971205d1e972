//! Tote Core - Shared cart and identity types.
//!
//! This crate provides the types used across all Tote components:
//! - `client` - Cart store, network gateway, and session reconciliation
//! - `cli` - Command-line driver for the client
//!
//! # Architecture
//!
//! The core crate contains only types and pure functions - no I/O, no storage
//! adapters, no HTTP clients. Everything that touches the outside world lives
//! in `tote-client`.
//!
//! # Modules
//!
//! - [`types`] - Newtype IDs, emails, cart lines, snapshots, and persisted records

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod types;

pub use types::*;
