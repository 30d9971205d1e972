//! Cart commands.
//!
//! # Usage
//!
//! ```bash
//! tote cart add tee --name "Tee" --price 25.00 --size m --size-label M
//! tote cart update tee 3 --size m
//! tote cart remove tee --size m
//! tote cart show
//! tote cart clear
//! ```

use std::fmt::Write;

use rust_decimal::Decimal;

use tote_client::CartStore;
use tote_client::storage::KeyValueStorage;
use tote_core::{CartLine, LineKey, SizeId};

/// Fields for a new cart line.
#[derive(Debug)]
pub struct NewLine {
    pub product_id: String,
    pub name: String,
    pub price: Decimal,
    pub quantity: u32,
    pub size: Option<String>,
    pub size_label: Option<String>,
    pub variant: Option<String>,
    pub color: Option<String>,
    pub image: Option<String>,
}

impl NewLine {
    fn into_line(self) -> CartLine {
        let mut line = CartLine::new(self.product_id, self.name, self.price, self.quantity);
        if let Some(size) = self.size {
            line = line.with_size(size, self.size_label);
        }
        if let Some(variant) = self.variant {
            line = line.with_variant(variant, self.color);
        }
        if let Some(image) = self.image {
            line = line.with_image(image);
        }
        line
    }
}

/// Build the key addressing an existing line.
pub fn line_key(product_id: &str, size: Option<String>, variant: Option<String>) -> LineKey {
    let key = LineKey::new(product_id, size.map(SizeId::from));
    match variant {
        Some(variant) => key.with_variant(variant),
        None => key,
    }
}

/// Render the cart as text.
pub fn render<S: KeyValueStorage>(cart: &CartStore<S>) -> String {
    if cart.is_empty() {
        return "Cart is empty".to_string();
    }

    let mut out = String::new();
    for line in cart.lines() {
        let size = line
            .size_label
            .as_deref()
            .or_else(|| line.size_id.as_ref().map(SizeId::as_str));
        let _ = write!(out, "{:>3} x {}", line.quantity, line.display_name);
        if let Some(size) = size {
            let _ = write!(out, " [{size}]");
        }
        if let Some(color) = &line.color {
            let _ = write!(out, " ({color})");
        }
        let _ = writeln!(out, "  @ {}  = {}", line.unit_price, line.line_total());
    }
    let _ = write!(
        out,
        "{} items, total {}",
        cart.total_items(),
        cart.total_price()
    );
    out
}

pub fn show<S: KeyValueStorage>(cart: &CartStore<S>) {
    #[allow(clippy::print_stdout)]
    {
        println!("{}", render(cart));
    }
}

pub fn add<S: KeyValueStorage>(cart: &mut CartStore<S>, new_line: NewLine) {
    cart.add_to_cart(new_line.into_line());
    tracing::info!(total_items = cart.total_items(), "Added to cart");
}

pub fn remove<S: KeyValueStorage>(cart: &mut CartStore<S>, key: &LineKey) {
    cart.remove_from_cart(key);
    tracing::info!(total_items = cart.total_items(), "Removed from cart");
}

pub fn update<S: KeyValueStorage>(cart: &mut CartStore<S>, key: &LineKey, quantity: u32) {
    if quantity < 1 {
        tracing::warn!("Quantity must be at least 1; use `cart remove` to delete a line");
    }
    cart.update_quantity(key, quantity);
}

pub fn clear<S: KeyValueStorage>(cart: &mut CartStore<S>) {
    cart.clear_cart();
    tracing::info!("Cart cleared");
}
