//! Durable key-value storage behind the cart store.
//!
//! The cart never talks to the filesystem directly. It reads and writes one
//! string value under one key through a [`KeyValueStorage`] adapter, the same
//! contract browser local storage offers:
//!
//! - [`FileStorage`] - one JSON file per key in a data directory
//! - [`MemoryStorage`] - process-local map; clones share contents

mod file;
mod memory;

pub use file::FileStorage;
pub use memory::MemoryStorage;

use thiserror::Error;

/// Errors raised by a storage adapter.
#[derive(Debug, Error)]
pub enum StorageError {
    /// Reading or writing the backing medium failed.
    #[error("storage I/O error for key {key}: {source}")]
    Io {
        /// Storage key being accessed.
        key: String,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The key cannot be mapped onto the backing medium.
    #[error("invalid storage key: {0}")]
    InvalidKey(String),

    /// Serializing or deserializing the stored value failed.
    #[error("storage serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A lock guarding in-memory contents was poisoned.
    #[error("storage lock poisoned")]
    Poisoned,
}

/// String-valued storage addressed by key.
///
/// Implementations are synchronous: callers treat a returned `Ok` from
/// [`set_item`](Self::set_item) as durable.
pub trait KeyValueStorage: Send + Sync {
    /// Read the value stored under `key`, if any.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the backing medium cannot be read.
    fn get_item(&self, key: &str) -> Result<Option<String>, StorageError>;

    /// Replace the value stored under `key`.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the value cannot be written.
    fn set_item(&self, key: &str, value: &str) -> Result<(), StorageError>;

    /// Delete the value stored under `key`. Absent keys are not an error.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the backing medium cannot be modified.
    fn remove_item(&self, key: &str) -> Result<(), StorageError>;
}

impl<T: KeyValueStorage + ?Sized> KeyValueStorage for std::sync::Arc<T> {
    fn get_item(&self, key: &str) -> Result<Option<String>, StorageError> {
        (**self).get_item(key)
    }

    fn set_item(&self, key: &str, value: &str) -> Result<(), StorageError> {
        (**self).set_item(key, value)
    }

    fn remove_item(&self, key: &str) -> Result<(), StorageError> {
        (**self).remove_item(key)
    }
}
