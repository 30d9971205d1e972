//! On-disk layout of the persisted cart.
//!
//! The record is stored under a single storage key as
//! `{"state":{"items":[...]},"version":0}`, the versioned wrapper the
//! browser storefront writes to local storage. Records the browser wrote load
//! as they are, numeric `unitPrice` included.
//!
//! Records written here carry `unitPrice` as a decimal string (`"12.50"`) so
//! no precision is lost. A reader that expects a JSON number must parse that
//! field itself.

use serde::{Deserialize, Serialize};

use super::cart::CartLine;

/// Current version of [`CartRecord`].
pub const CART_RECORD_VERSION: u32 = 0;

/// Versioned wrapper around persisted state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersistedRecord<T> {
    /// The persisted state itself.
    pub state: T,
    /// Schema version of `state`.
    #[serde(default)]
    pub version: u32,
}

impl<T> PersistedRecord<T> {
    /// Wrap `state` at the given version.
    pub const fn new(state: T, version: u32) -> Self {
        Self { state, version }
    }
}

/// Persisted cart state.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CartRecord {
    /// Cart lines in display order.
    #[serde(default)]
    pub items: Vec<CartLine>,
}
