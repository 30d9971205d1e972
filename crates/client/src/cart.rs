//! The shopper's cart: ordered lines, persisted after every change.
//!
//! # Persistence
//!
//! Every mutating method finishes by calling [`CartStore::persist`], which
//! writes the whole cart under one storage key. A failed write is logged and
//! the in-memory cart stays authoritative; the next successful write catches
//! storage up.
//!
//! # Invariants
//!
//! Every stored line has a quantity of at least 1 and a unit price of at least
//! zero, and the cart total always fits in a [`Decimal`]. Adds and updates
//! that would break this are logged and ignored; persisted lines that break
//! it are dropped on load.
//!
//! # Example
//!
//! ```rust
//! use rust_decimal::Decimal;
//! use tote_client::cart::{CartOptions, CartStore};
//! use tote_client::storage::MemoryStorage;
//! use tote_core::CartLine;
//!
//! let mut cart = CartStore::open(MemoryStorage::new(), CartOptions::default());
//! cart.add_to_cart(CartLine::new("p1", "Mug", Decimal::new(100, 0), 1));
//! cart.add_to_cart(CartLine::new("p1", "Mug", Decimal::new(100, 0), 1));
//!
//! assert_eq!(cart.len(), 1);
//! assert_eq!(cart.total_items(), 2);
//! assert_eq!(cart.total_price(), Decimal::new(200, 0));
//! ```

use rust_decimal::Decimal;
use tracing::{debug, error, instrument, warn};

use tote_core::{
    CART_RECORD_VERSION, CartLine, CartRecord, CartSnapshot, KeyPolicy, LineKey, PersistedRecord,
    checked_totals, totals,
};

use crate::storage::{KeyValueStorage, StorageError};

/// Storage key the storefront has always used for the cart.
pub const DEFAULT_STORAGE_KEY: &str = "cart-storage";

/// Construction parameters for a [`CartStore`].
#[derive(Debug, Clone)]
pub struct CartOptions {
    /// Key the cart record is stored under.
    pub storage_key: String,
    /// Which fields identify a line.
    pub key_policy: KeyPolicy,
}

impl Default for CartOptions {
    fn default() -> Self {
        Self {
            storage_key: DEFAULT_STORAGE_KEY.to_string(),
            key_policy: KeyPolicy::default(),
        }
    }
}

/// Single source of truth for the shopper's intended purchases.
pub struct CartStore<S: KeyValueStorage> {
    storage: S,
    options: CartOptions,
    lines: Vec<CartLine>,
}

impl<S: KeyValueStorage> std::fmt::Debug for CartStore<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CartStore")
            .field("storage_key", &self.options.storage_key)
            .field("key_policy", &self.options.key_policy)
            .field("lines", &self.lines)
            .finish_non_exhaustive()
    }
}

impl<S: KeyValueStorage> CartStore<S> {
    /// Open the cart persisted in `storage`, or an empty cart if there is none.
    ///
    /// Unreadable, corrupt, or wrong-version records are logged and replaced by
    /// an empty cart on the next write.
    #[must_use]
    pub fn open(storage: S, options: CartOptions) -> Self {
        let lines = load_lines(&storage, &options.storage_key);
        Self {
            storage,
            options,
            lines,
        }
    }

    /// Re-read the persisted cart, discarding in-memory lines.
    ///
    /// Another store sharing the same storage may have written since this one
    /// last read or wrote.
    pub fn reload(&mut self) {
        self.lines = load_lines(&self.storage, &self.options.storage_key);
    }

    /// The key policy in force.
    #[must_use]
    pub const fn key_policy(&self) -> KeyPolicy {
        self.options.key_policy
    }

    /// Lines in display order.
    #[must_use]
    pub fn lines(&self) -> &[CartLine] {
        &self.lines
    }

    /// Number of distinct lines.
    #[must_use]
    pub fn len(&self) -> usize {
        self.lines.len()
    }

    /// Whether the cart has no lines.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// The line addressed by `key`, if present.
    #[must_use]
    pub fn find(&self, key: &LineKey) -> Option<&CartLine> {
        let policy = self.options.key_policy;
        self.lines.iter().find(|line| policy.matches(line, key))
    }

    /// Add `line`, merging into an existing line with the same key.
    ///
    /// On merge only the quantity changes; the existing line keeps its price
    /// and presentation fields. Lines with a zero quantity or a negative price
    /// are ignored, as are adds that would overflow the cart total.
    #[instrument(skip(self, line), fields(product_id = %line.product_id, quantity = line.quantity))]
    pub fn add_to_cart(&mut self, line: CartLine) {
        if self.apply_add(line) {
            self.persist();
        }
    }

    /// Delete the line addressed by `key`. Absent lines are ignored.
    #[instrument(skip(self), fields(product_id = %key.product_id))]
    pub fn remove_from_cart(&mut self, key: &LineKey) {
        let policy = self.options.key_policy;
        let before = self.lines.len();
        self.lines.retain(|line| !policy.matches(line, key));

        if self.lines.len() == before {
            debug!("Line not in cart, nothing removed");
        }
        self.persist();
    }

    /// Set the quantity of the line addressed by `key`.
    ///
    /// A quantity below 1 leaves the cart untouched; removing a line is
    /// [`remove_from_cart`](Self::remove_from_cart)'s job.
    #[instrument(skip(self), fields(product_id = %key.product_id))]
    pub fn update_quantity(&mut self, key: &LineKey, quantity: u32) {
        if quantity < 1 {
            debug!("Ignoring quantity update below 1");
            return;
        }

        let policy = self.options.key_policy;
        let Some(index) = self.lines.iter().position(|line| policy.matches(line, key)) else {
            debug!("Line not in cart, quantity unchanged");
            self.persist();
            return;
        };

        let previous = self.set_quantity(index, quantity);
        if checked_totals(&self.lines).is_none() {
            warn!(quantity, "Ignoring quantity update, cart total would overflow");
            if let Some(previous) = previous {
                self.set_quantity(index, previous);
            }
            return;
        }
        self.persist();
    }

    /// Remove every line.
    #[instrument(skip(self))]
    pub fn clear_cart(&mut self) {
        self.lines.clear();
        self.persist();
    }

    /// Replay `lines` with [`add_to_cart`](Self::add_to_cart) semantics,
    /// persisting once at the end.
    ///
    /// Returns how many of the replayed lines were accepted.
    #[instrument(skip(self, lines))]
    pub fn merge_cart(&mut self, lines: impl IntoIterator<Item = CartLine>) -> usize {
        let merged = lines
            .into_iter()
            .map(|line| self.apply_add(line))
            .filter(|accepted| *accepted)
            .count();

        debug!(merged, total_lines = self.lines.len(), "Merged lines into cart");
        self.persist();
        merged
    }

    /// Replace every line with `lines`, replayed with
    /// [`add_to_cart`](Self::add_to_cart) semantics, persisting once.
    ///
    /// Returns how many of `lines` were accepted.
    #[instrument(skip(self, lines))]
    pub fn replace_cart(&mut self, lines: impl IntoIterator<Item = CartLine>) -> usize {
        self.lines.clear();
        self.merge_cart(lines)
    }

    /// Sum of all line quantities.
    #[must_use]
    pub fn total_items(&self) -> u64 {
        totals(&self.lines).0
    }

    /// Sum of `unit_price * quantity` over all lines.
    #[must_use]
    pub fn total_price(&self) -> Decimal {
        totals(&self.lines).1
    }

    /// Deep copy of the cart with totals computed now.
    #[must_use]
    pub fn get_cart_snapshot(&self) -> CartSnapshot {
        CartSnapshot::capture(&self.lines)
    }

    /// Write the whole cart to storage.
    ///
    /// Called by every mutating method. Failures are logged, not returned.
    pub fn persist(&self) {
        if let Err(e) = self.try_persist() {
            error!(
                error = %e,
                storage_key = %self.options.storage_key,
                "Failed to persist cart"
            );
        }
    }

    /// Write the whole cart to storage, returning any failure.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if serialization or the write fails.
    pub fn try_persist(&self) -> Result<(), StorageError> {
        let record = PersistedRecord::new(
            CartRecord {
                items: self.lines.clone(),
            },
            CART_RECORD_VERSION,
        );
        let raw = serde_json::to_string(&record)?;
        self.storage.set_item(&self.options.storage_key, &raw)
    }

    /// Merge or append without persisting. Returns whether the line was kept.
    fn apply_add(&mut self, line: CartLine) -> bool {
        if line.quantity == 0 {
            warn!(product_id = %line.product_id, "Ignoring cart line with zero quantity");
            return false;
        }
        if line.unit_price < Decimal::ZERO {
            warn!(
                product_id = %line.product_id,
                unit_price = %line.unit_price,
                "Ignoring cart line with negative unit price"
            );
            return false;
        }

        let policy = self.options.key_policy;
        let product_id = line.product_id.clone();
        let undo = match self.lines.iter().position(|l| policy.same_line(l, &line)) {
            Some(index) => {
                let current = self.lines.get(index).map_or(0, |l| l.quantity);
                let Some(quantity) = current.checked_add(line.quantity) else {
                    warn!(%product_id, "Ignoring cart line, quantity would overflow");
                    return false;
                };
                self.set_quantity(index, quantity).map(|previous| (index, previous))
            }
            None => {
                self.lines.push(line);
                None
            }
        };

        if checked_totals(&self.lines).is_none() {
            warn!(%product_id, "Ignoring cart line, cart total would overflow");
            match undo {
                Some((index, previous)) => {
                    self.set_quantity(index, previous);
                }
                None => {
                    self.lines.pop();
                }
            }
            return false;
        }
        true
    }

    /// Set the quantity of the line at `index`, returning the old quantity.
    fn set_quantity(&mut self, index: usize, quantity: u32) -> Option<u32> {
        self.lines
            .get_mut(index)
            .map(|line| std::mem::replace(&mut line.quantity, quantity))
    }
}

/// Read the cart record under `key`, falling back to an empty cart.
fn load_lines<S: KeyValueStorage>(storage: &S, key: &str) -> Vec<CartLine> {
    let raw = match storage.get_item(key) {
        Ok(Some(raw)) => raw,
        Ok(None) => return Vec::new(),
        Err(e) => {
            warn!(error = %e, storage_key = %key, "Failed to read persisted cart");
            return Vec::new();
        }
    };

    let record: PersistedRecord<CartRecord> = match serde_json::from_str(&raw) {
        Ok(record) => record,
        Err(e) => {
            warn!(error = %e, storage_key = %key, "Persisted cart is corrupt, starting empty");
            return Vec::new();
        }
    };

    if record.version != CART_RECORD_VERSION {
        warn!(
            found = record.version,
            expected = CART_RECORD_VERSION,
            "Persisted cart has unknown version, starting empty"
        );
        return Vec::new();
    }

    let mut lines = record.state.items;
    let loaded = lines.len();
    let mut running = Decimal::ZERO;
    lines.retain(|line| {
        if line.quantity < 1 || line.unit_price < Decimal::ZERO {
            return false;
        }
        match line.checked_line_total().and_then(|total| running.checked_add(total)) {
            Some(next) => {
                running = next;
                true
            }
            None => false,
        }
    });

    if lines.len() < loaded {
        warn!(
            dropped = loaded - lines.len(),
            storage_key = %key,
            "Dropped invalid lines from persisted cart"
        );
    }
    lines
}
