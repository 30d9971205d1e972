//! Core types for Tote.
//!
//! This module provides type-safe wrappers for the cart and identity domain.

pub mod cart;
pub mod email;
pub mod id;
pub mod persisted;
pub mod snapshot;
pub mod user;

pub use cart::{CartLine, KeyPolicy, LineKey, checked_totals, totals};
pub use email::{Email, EmailError};
pub use id::*;
pub use persisted::{CART_RECORD_VERSION, CartRecord, PersistedRecord};
pub use snapshot::CartSnapshot;
pub use user::{AuthUser, UserId};
