//! Point-in-time copies of the cart.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::cart::{CartLine, totals};

/// An immutable copy of the cart and its totals, taken at one instant.
///
/// Used to carry the guest cart across the login round-trip: whatever
/// happens to the live store in the meantime, the snapshot keeps the lines it
/// was captured with.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CartSnapshot {
    lines: Vec<CartLine>,
    total_items: u64,
    total_price: Decimal,
    captured_at: DateTime<Utc>,
}

impl CartSnapshot {
    /// Capture `lines`, computing totals now.
    #[must_use]
    pub fn capture(lines: &[CartLine]) -> Self {
        let (total_items, total_price) = totals(lines);
        Self {
            lines: lines.to_vec(),
            total_items,
            total_price,
            captured_at: Utc::now(),
        }
    }

    /// Lines at capture time, in display order.
    #[must_use]
    pub fn lines(&self) -> &[CartLine] {
        &self.lines
    }

    /// Sum of quantities at capture time.
    #[must_use]
    pub const fn total_items(&self) -> u64 {
        self.total_items
    }

    /// Sum of line totals at capture time.
    #[must_use]
    pub const fn total_price(&self) -> Decimal {
        self.total_price
    }

    /// When the snapshot was taken.
    #[must_use]
    pub const fn captured_at(&self) -> DateTime<Utc> {
        self.captured_at
    }

    /// Whether the snapshot holds no lines.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Consume the snapshot, returning its lines.
    #[must_use]
    pub fn into_lines(self) -> Vec<CartLine> {
        self.lines
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_capture_is_a_deep_copy() {
        let mut lines = vec![CartLine::new("p1", "Mug", Decimal::new(1200, 2), 2)];
        let snapshot = CartSnapshot::capture(&lines);

        lines[0].quantity = 9;
        lines.clear();

        assert_eq!(snapshot.lines().len(), 1);
        assert_eq!(snapshot.lines()[0].quantity, 2);
        assert_eq!(snapshot.total_items(), 2);
        assert_eq!(snapshot.total_price(), Decimal::new(2400, 2));
    }

    #[test]
    fn test_empty_snapshot() {
        let snapshot = CartSnapshot::capture(&[]);
        assert!(snapshot.is_empty());
        assert_eq!(snapshot.total_items(), 0);
        assert_eq!(snapshot.total_price(), Decimal::ZERO);
    }
}
