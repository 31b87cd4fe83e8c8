//! The cart state container.
//!
//! The cart is the only client-owned mutable state in the system. It maps
//! `(product, package)` pairs to quantities and lives in the browser
//! session between requests; it never touches the backend until checkout.
//! All mutation goes through the methods here so the container can be
//! tested in isolation.
//!
//! Subtotals are computed against whatever catalog prices the caller has
//! currently loaded. They can be stale until the catalog refreshes and are
//! display-only: the backend persists the authoritative total at
//! order-creation time.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::types::{PackageId, ProductId};

/// One line of the cart: a product/package pair and a quantity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartItem {
    /// The product being bought.
    pub product_id: ProductId,
    /// The price point (duration/tier) of the product.
    pub package_id: PackageId,
    /// Number of units. Always at least 1 while the item is in the cart.
    pub quantity: u32,
}

/// In-memory cart scoped to a browsing session.
///
/// Lines keep insertion order so repeated renders are stable.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cart {
    items: Vec<CartItem>,
}

impl Cart {
    /// Create an empty cart.
    #[must_use]
    pub const fn new() -> Self {
        Self { items: Vec::new() }
    }

    /// Add one unit of a product/package, inserting the line at quantity 1
    /// if it is not present yet.
    pub fn add(&mut self, product_id: ProductId, package_id: PackageId) {
        match self.line_mut(product_id, package_id) {
            Some(item) => item.quantity = item.quantity.saturating_add(1),
            None => self.items.push(CartItem {
                product_id,
                package_id,
                quantity: 1,
            }),
        }
    }

    /// Set the quantity of an existing line. A quantity of 0 removes the
    /// line; setting a quantity for an absent line is a no-op.
    pub fn set_quantity(&mut self, product_id: ProductId, package_id: PackageId, quantity: u32) {
        if quantity == 0 {
            self.remove(product_id, package_id);
            return;
        }
        if let Some(item) = self.line_mut(product_id, package_id) {
            item.quantity = quantity;
        }
    }

    /// Remove a line entirely.
    pub fn remove(&mut self, product_id: ProductId, package_id: PackageId) {
        self.items
            .retain(|i| !(i.product_id == product_id && i.package_id == package_id));
    }

    /// Empty the cart. Called after a successful checkout.
    pub fn clear(&mut self) {
        self.items.clear();
    }

    /// Whether the cart has no lines.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Quantity for a specific line, 0 if absent.
    #[must_use]
    pub fn quantity(&self, product_id: ProductId, package_id: PackageId) -> u32 {
        self.line(product_id, package_id).map_or(0, |i| i.quantity)
    }

    /// Total number of units across all lines.
    #[must_use]
    pub fn unit_count(&self) -> u32 {
        self.items.iter().map(|i| i.quantity).sum()
    }

    /// The cart lines in insertion order.
    #[must_use]
    pub fn items(&self) -> &[CartItem] {
        &self.items
    }

    /// Advisory subtotal: sum of `price(package) * quantity` over all
    /// lines. Lines whose package the lookup cannot price (e.g. the item
    /// left the catalog since it was added) contribute nothing.
    pub fn subtotal<F>(&self, mut price_of: F) -> Decimal
    where
        F: FnMut(PackageId) -> Option<Decimal>,
    {
        self.items
            .iter()
            .filter_map(|i| price_of(i.package_id).map(|p| p * Decimal::from(i.quantity)))
            .sum()
    }

    fn line(&self, product_id: ProductId, package_id: PackageId) -> Option<&CartItem> {
        self.items
            .iter()
            .find(|i| i.product_id == product_id && i.package_id == package_id)
    }

    fn line_mut(&mut self, product_id: ProductId, package_id: PackageId) -> Option<&mut CartItem> {
        self.items
            .iter_mut()
            .find(|i| i.product_id == product_id && i.package_id == package_id)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn ids() -> (ProductId, PackageId) {
        (ProductId::generate(), PackageId::generate())
    }

    #[test]
    fn test_add_same_line_n_times_yields_quantity_n() {
        let (product, package) = ids();
        let mut cart = Cart::new();
        for _ in 0..7 {
            cart.add(product, package);
        }
        assert_eq!(cart.quantity(product, package), 7);
        assert_eq!(cart.items().len(), 1);
    }

    #[test]
    fn test_add_distinct_packages_are_separate_lines() {
        let product = ProductId::generate();
        let pkg_a = PackageId::generate();
        let pkg_b = PackageId::generate();
        let mut cart = Cart::new();
        cart.add(product, pkg_a);
        cart.add(product, pkg_b);
        assert_eq!(cart.items().len(), 2);
        assert_eq!(cart.unit_count(), 2);
    }

    #[test]
    fn test_clear_always_empties() {
        let (product, package) = ids();
        let mut cart = Cart::new();
        cart.clear();
        assert!(cart.is_empty());

        cart.add(product, package);
        cart.add(product, package);
        cart.clear();
        assert!(cart.is_empty());
        assert_eq!(cart.unit_count(), 0);
    }

    #[test]
    fn test_set_quantity_zero_removes_line() {
        let (product, package) = ids();
        let mut cart = Cart::new();
        cart.add(product, package);
        cart.set_quantity(product, package, 0);
        assert!(cart.is_empty());
    }

    #[test]
    fn test_set_quantity_absent_line_is_noop() {
        let (product, package) = ids();
        let mut cart = Cart::new();
        cart.set_quantity(product, package, 5);
        assert!(cart.is_empty());
    }

    #[test]
    fn test_subtotal_example_from_catalog() {
        // Two units of a 500-priced package must total 1000.
        let (product, package) = ids();
        let mut cart = Cart::new();
        cart.add(product, package);
        cart.add(product, package);

        let price = Decimal::new(500, 0);
        let subtotal = cart.subtotal(|p| (p == package).then_some(price));
        assert_eq!(subtotal, Decimal::new(1000, 0));

        cart.clear();
        let subtotal = cart.subtotal(|p| (p == package).then_some(price));
        assert_eq!(subtotal, Decimal::ZERO);
    }

    #[test]
    fn test_subtotal_skips_unpriceable_lines() {
        let (product, package) = ids();
        let mut cart = Cart::new();
        cart.add(product, package);
        let subtotal = cart.subtotal(|_| None);
        assert_eq!(subtotal, Decimal::ZERO);
    }

    #[test]
    fn test_serde_roundtrip() {
        let (product, package) = ids();
        let mut cart = Cart::new();
        cart.add(product, package);
        let json = serde_json::to_string(&cart).unwrap();
        let back: Cart = serde_json::from_str(&json).unwrap();
        assert_eq!(back, cart);
    }
}
