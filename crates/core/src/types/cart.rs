//! Cart line items and the key that deduplicates them.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::id::{ProductId, SizeId, VariantId};

/// A single purchasable unit in the cart.
///
/// Presentation fields and the unit price are captured when the line is first
/// added and are never re-fetched.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CartLine {
    /// Product identifier.
    pub product_id: ProductId,
    /// Color/style variant, if the product has variants.
    #[serde(default)]
    pub variant_id: Option<VariantId>,
    /// Size option; `None` when the product has no sizing.
    #[serde(default)]
    pub size_id: Option<SizeId>,
    /// Number of units, always at least 1 once stored.
    pub quantity: u32,
    /// Price of one unit at add time.
    ///
    /// Written as a decimal string; read from a string or a JSON number.
    pub unit_price: Decimal,
    /// Product name shown in the cart.
    pub display_name: String,
    /// Product image.
    #[serde(default)]
    pub image_url: Option<String>,
    /// Human-readable size (e.g. "M").
    #[serde(default)]
    pub size_label: Option<String>,
    /// Human-readable color.
    #[serde(default)]
    pub color: Option<String>,
}

impl CartLine {
    /// Create a line with no variant, size, or presentation extras.
    #[must_use]
    pub fn new(
        product_id: impl Into<ProductId>,
        display_name: impl Into<String>,
        unit_price: Decimal,
        quantity: u32,
    ) -> Self {
        Self {
            product_id: product_id.into(),
            variant_id: None,
            size_id: None,
            quantity,
            unit_price,
            display_name: display_name.into(),
            image_url: None,
            size_label: None,
            color: None,
        }
    }

    /// Set the size option.
    #[must_use]
    pub fn with_size(mut self, size_id: impl Into<SizeId>, label: Option<String>) -> Self {
        self.size_id = Some(size_id.into());
        self.size_label = label;
        self
    }

    /// Set the color/style variant.
    #[must_use]
    pub fn with_variant(mut self, variant_id: impl Into<VariantId>, color: Option<String>) -> Self {
        self.variant_id = Some(variant_id.into());
        self.color = color;
        self
    }

    /// Set the image URL.
    #[must_use]
    pub fn with_image(mut self, url: impl Into<String>) -> Self {
        self.image_url = Some(url.into());
        self
    }

    /// `unit_price * quantity`, saturating at the bounds of [`Decimal`].
    #[must_use]
    pub fn line_total(&self) -> Decimal {
        self.unit_price.saturating_mul(Decimal::from(self.quantity))
    }

    /// `unit_price * quantity`, or `None` if it does not fit in a [`Decimal`].
    #[must_use]
    pub fn checked_line_total(&self) -> Option<Decimal> {
        self.unit_price.checked_mul(Decimal::from(self.quantity))
    }
}

/// Identity of a cart line for merge, removal and quantity updates.
///
/// Whether `variant_id` takes part in comparisons is decided by the
/// [`KeyPolicy`] in force, not by the key itself.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct LineKey {
    /// Product identifier.
    pub product_id: ProductId,
    /// Variant identifier (ignored under [`KeyPolicy::ProductAndSize`]).
    pub variant_id: Option<VariantId>,
    /// Size identifier.
    pub size_id: Option<SizeId>,
}

impl LineKey {
    /// Key a product/size pair.
    #[must_use]
    pub fn new(product_id: impl Into<ProductId>, size_id: Option<SizeId>) -> Self {
        Self {
            product_id: product_id.into(),
            variant_id: None,
            size_id,
        }
    }

    /// Add a variant to the key.
    #[must_use]
    pub fn with_variant(mut self, variant_id: impl Into<VariantId>) -> Self {
        self.variant_id = Some(variant_id.into());
        self
    }
}

/// Which fields make two cart lines "the same line".
///
/// The storefront historically keyed lines on product and size only, so two
/// colors of the same product and size collapse into one line. That stays the
/// default; `ProductVariantAndSize` keeps variants apart.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum KeyPolicy {
    /// `(product_id, size_id)`.
    #[default]
    ProductAndSize,
    /// `(product_id, variant_id, size_id)`.
    ProductVariantAndSize,
}

impl KeyPolicy {
    /// Build the key for a line under this policy.
    #[must_use]
    pub fn key_for(self, line: &CartLine) -> LineKey {
        LineKey {
            product_id: line.product_id.clone(),
            variant_id: match self {
                Self::ProductAndSize => None,
                Self::ProductVariantAndSize => line.variant_id.clone(),
            },
            size_id: line.size_id.clone(),
        }
    }

    /// Whether `line` is the line addressed by `key`.
    #[must_use]
    pub fn matches(self, line: &CartLine, key: &LineKey) -> bool {
        line.product_id == key.product_id
            && line.size_id == key.size_id
            && match self {
                Self::ProductAndSize => true,
                Self::ProductVariantAndSize => line.variant_id == key.variant_id,
            }
    }

    /// Whether two lines share a key.
    #[must_use]
    pub fn same_line(self, a: &CartLine, b: &CartLine) -> bool {
        self.matches(a, &self.key_for(b))
    }
}

/// Sum of quantities and of line totals.
///
/// Both sums saturate. The client's cart store never holds lines whose
/// totals overflow, so saturation only shows for lines built by hand; use
/// [`checked_totals`] to detect it.
#[must_use]
pub fn totals(lines: &[CartLine]) -> (u64, Decimal) {
    lines.iter().fold((0_u64, Decimal::ZERO), |(items, price), line| {
        (
            items.saturating_add(u64::from(line.quantity)),
            price.saturating_add(line.line_total()),
        )
    })
}

/// Sum of quantities and of line totals, or `None` if either overflows.
#[must_use]
pub fn checked_totals(lines: &[CartLine]) -> Option<(u64, Decimal)> {
    lines.iter().try_fold((0_u64, Decimal::ZERO), |(items, price), line| {
        Some((
            items.checked_add(u64::from(line.quantity))?,
            price.checked_add(line.checked_line_total()?)?,
        ))
    })
}
