//! The cart model.
//!
//! A [`Cart`] is an ordered list of [`CartItem`]s, unique by product ID, in
//! the order products were first added. All operations are in-memory; the
//! storefront loads a cart, applies one operation and persists the result.
//!
//! ```
//! use cartkeeper_core::{Cart, NewCartItem, ProductId};
//! use rust_decimal::Decimal;
//!
//! let mut cart = Cart::new();
//! let item = NewCartItem::new(
//!     ProductId::parse("a").unwrap(),
//!     "Tee",
//!     Decimal::new(10, 0),
//!     "/img/tee.jpg",
//! )
//! .unwrap();
//!
//! cart.add_item(item.clone()).unwrap();
//! assert_eq!(cart.add_item(item).unwrap(), 2);
//! assert_eq!(cart.len(), 1);
//! ```

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::types::{Price, ProductId, Quantity};

/// Errors from constructing cart contents.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum CartError {
    /// Unit prices cannot be negative.
    #[error("price for product {0} cannot be negative")]
    NegativePrice(ProductId),

    /// A line total or the subtotal would exceed what a [`Decimal`] holds.
    #[error("cart total is too large")]
    TotalTooLarge,
}

/// One product entry in the cart with an accumulated quantity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartItem {
    pub id: ProductId,
    pub name: String,
    /// Unit price.
    pub price: Decimal,
    /// Image URL.
    pub image: String,
    pub quantity: Quantity,
}

impl CartItem {
    /// Unit price times quantity.
    ///
    /// Items inside a [`Cart`] always have a representable total; a detached
    /// item whose total overflows saturates at [`Decimal::MAX`].
    #[must_use]
    pub fn line_total(&self) -> Decimal {
        self.checked_line_total().unwrap_or(Decimal::MAX)
    }

    /// Unit price times quantity, `None` on overflow.
    #[must_use]
    pub fn checked_line_total(&self) -> Option<Decimal> {
        self.price.checked_mul(Decimal::from(self.quantity.get()))
    }

    /// Unit price as a displayable [`Price`].
    #[must_use]
    pub fn unit_price(&self) -> Price {
        Price::new(self.price)
    }
}

/// A product being added to the cart.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewCartItem {
    id: ProductId,
    name: String,
    price: Decimal,
    image: String,
}

impl NewCartItem {
    /// Validate a product for adding to the cart.
    ///
    /// # Errors
    ///
    /// Returns [`CartError::NegativePrice`] if `price` is below zero.
    pub fn new(
        id: ProductId,
        name: impl Into<String>,
        price: Decimal,
        image: impl Into<String>,
    ) -> Result<Self, CartError> {
        if price.is_sign_negative() && !price.is_zero() {
            return Err(CartError::NegativePrice(id));
        }
        Ok(Self {
            id,
            name: name.into(),
            price,
            image: image.into(),
        })
    }

    /// The product ID.
    #[must_use]
    pub const fn id(&self) -> &ProductId {
        &self.id
    }

    /// The product name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }
}

/// Direction of a single quantity step from the cart controls.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QuantityAction {
    Increase,
    Decrease,
}

/// The ordered collection of line items a visitor intends to purchase.
///
/// Serializes as a bare JSON array of items. Deserializing merges repeated
/// IDs into the first occurrence and rejects negative prices.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Vec<CartItem>", into = "Vec<CartItem>")]
pub struct Cart {
    items: Vec<CartItem>,
}

impl Cart {
    /// Create an empty cart.
    #[must_use]
    pub const fn new() -> Self {
        Self { items: Vec::new() }
    }

    /// Items in insertion order.
    #[must_use]
    pub fn items(&self) -> &[CartItem] {
        &self.items
    }

    /// Number of distinct products.
    #[must_use]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Look up an item by product ID.
    #[must_use]
    pub fn get(&self, id: &ProductId) -> Option<&CartItem> {
        self.items.iter().find(|item| &item.id == id)
    }

    fn get_mut(&mut self, id: &ProductId) -> Option<&mut CartItem> {
        self.items.iter_mut().find(|item| &item.id == id)
    }

    /// Add one unit of a product.
    ///
    /// An existing entry with the same ID gets its quantity bumped; otherwise
    /// a new entry with quantity 1 is appended. Name, price and image of an
    /// existing entry are left as first added.
    ///
    /// Returns the total item count after the add.
    ///
    /// # Errors
    ///
    /// Returns [`CartError::TotalTooLarge`] and leaves the cart unchanged if
    /// the add would push a line total or the subtotal past [`Decimal::MAX`].
    pub fn add_item(&mut self, item: NewCartItem) -> Result<u32, CartError> {
        self.apply_checked(|items| {
            if let Some(existing) = items.iter_mut().find(|i| i.id == item.id) {
                existing.quantity = existing.quantity.increment();
            } else {
                items.push(CartItem {
                    id: item.id,
                    name: item.name,
                    price: item.price,
                    image: item.image,
                    quantity: Quantity::ONE,
                });
            }
        })?;
        Ok(self.item_count())
    }

    /// Remove the entry for `id`. Returns `false` if there was none.
    pub fn remove_item(&mut self, id: &ProductId) -> bool {
        let before = self.items.len();
        self.items.retain(|item| &item.id != id);
        self.items.len() != before
    }

    /// Set the quantity for `id`.
    ///
    /// A quantity of zero removes the entry. Returns `false` if `id` is not
    /// in the cart.
    ///
    /// # Errors
    ///
    /// Returns [`CartError::TotalTooLarge`] and leaves the cart unchanged if
    /// the new quantity makes the totals unrepresentable.
    pub fn set_quantity(&mut self, id: &ProductId, quantity: u32) -> Result<bool, CartError> {
        let Ok(quantity) = Quantity::new(quantity) else {
            return Ok(self.remove_item(id));
        };
        if self.get(id).is_none() {
            return Ok(false);
        }
        self.apply_checked(|items| {
            if let Some(item) = items.iter_mut().find(|i| &i.id == id) {
                item.quantity = quantity;
            }
        })?;
        Ok(true)
    }

    /// Step the quantity for `id` up or down by one.
    ///
    /// Decreasing never goes below one; removal only happens through
    /// [`Cart::remove_item`]. Returns the new quantity, or `None` if `id` is
    /// not in the cart.
    ///
    /// # Errors
    ///
    /// Returns [`CartError::TotalTooLarge`] and leaves the cart unchanged if
    /// an increase would make the totals unrepresentable.
    pub fn adjust_quantity(
        &mut self,
        id: &ProductId,
        action: QuantityAction,
    ) -> Result<Option<Quantity>, CartError> {
        let Some(current) = self.get(id).map(|item| item.quantity) else {
            return Ok(None);
        };
        let next = match action {
            QuantityAction::Increase => current.increment(),
            QuantityAction::Decrease => current.decrement(),
        };
        self.set_quantity(id, next.get())?;
        Ok(Some(next))
    }

    /// Remove every item.
    pub fn clear(&mut self) {
        self.items.clear();
    }

    /// Sum of quantities across all entries.
    #[must_use]
    pub fn item_count(&self) -> u32 {
        self.items
            .iter()
            .fold(0u32, |sum, item| sum.saturating_add(item.quantity.get()))
    }

    /// Sum of `price * quantity` across all entries.
    ///
    /// Every mutation keeps this representable, so it never saturates for a
    /// cart built through this API or deserialized from JSON.
    #[must_use]
    pub fn subtotal(&self) -> Decimal {
        self.checked_subtotal().unwrap_or(Decimal::MAX)
    }

    /// Sum of `price * quantity` across all entries, `None` on overflow.
    #[must_use]
    pub fn checked_subtotal(&self) -> Option<Decimal> {
        checked_sum(&self.items)
    }

    /// Apply `f` to a copy of the items and keep the result only if its
    /// totals are still representable.
    fn apply_checked(&mut self, f: impl FnOnce(&mut Vec<CartItem>)) -> Result<(), CartError> {
        let mut items = self.items.clone();
        f(&mut items);
        checked_sum(&items).ok_or(CartError::TotalTooLarge)?;
        self.items = items;
        Ok(())
    }
}

fn checked_sum(items: &[CartItem]) -> Option<Decimal> {
    items.iter().try_fold(Decimal::ZERO, |sum, item| {
        sum.checked_add(item.checked_line_total()?)
    })
}

impl TryFrom<Vec<CartItem>> for Cart {
    type Error = CartError;

    fn try_from(raw: Vec<CartItem>) -> Result<Self, Self::Error> {
        let mut cart = Self::new();
        for item in raw {
            if item.price.is_sign_negative() && !item.price.is_zero() {
                return Err(CartError::NegativePrice(item.id));
            }
            match cart.get_mut(&item.id) {
                Some(existing) => {
                    existing.quantity = existing.quantity.saturating_add(item.quantity);
                }
                None => cart.items.push(item),
            }
        }
        cart.checked_subtotal().ok_or(CartError::TotalTooLarge)?;
        Ok(cart)
    }
}

impl From<Cart> for Vec<CartItem> {
    fn from(cart: Cart) -> Self {
        cart.items
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use super::*;

    fn id(s: &str) -> ProductId {
        ProductId::parse(s).unwrap()
    }

    fn product(s: &str, price: i64) -> NewCartItem {
        NewCartItem::new(id(s), format!("Product {s}"), Decimal::new(price, 0), "/img.jpg")
            .unwrap()
    }

    #[test]
    fn test_adding_same_id_twice_merges() {
        let mut cart = Cart::new();
        cart.add_item(product("a", 10)).unwrap();
        cart.add_item(product("a", 10)).unwrap();

        assert_eq!(cart.len(), 1);
        assert_eq!(cart.get(&id("a")).unwrap().quantity.get(), 2);
    }

    #[test]
    fn test_adding_distinct_ids_preserves_insertion_order() {
        let mut cart = Cart::new();
        cart.add_item(product("b", 5)).unwrap();
        cart.add_item(product("a", 10)).unwrap();
        cart.add_item(product("b", 5)).unwrap();

        let ids: Vec<_> = cart.items().iter().map(|i| i.id.as_str()).collect();
        assert_eq!(ids, ["b", "a"]);
    }

    #[test]
    fn test_add_returns_total_item_count() {
        let mut cart = Cart::new();
        assert_eq!(cart.add_item(product("a", 1)).unwrap(), 1);
        assert_eq!(cart.add_item(product("b", 1)).unwrap(), 2);
        assert_eq!(cart.add_item(product("a", 1)).unwrap(), 3);
    }

    #[test]
    fn test_add_keeps_first_name_and_price() {
        let mut cart = Cart::new();
        cart.add_item(product("a", 10)).unwrap();
        let renamed = NewCartItem::new(id("a"), "Renamed", Decimal::new(99, 0), "/x.jpg").unwrap();
        cart.add_item(renamed).unwrap();

        let item = cart.get(&id("a")).unwrap();
        assert_eq!(item.name, "Product a");
        assert_eq!(item.price, Decimal::new(10, 0));
    }

    #[test]
    fn test_remove_nonexistent_id_is_noop() {
        let mut cart = Cart::new();
        cart.add_item(product("a", 10)).unwrap();
        let before = cart.clone();

        assert!(!cart.remove_item(&id("zzz")));
        assert_eq!(cart, before);
    }

    #[test]
    fn test_remove_existing_id() {
        let mut cart = Cart::new();
        cart.add_item(product("a", 10)).unwrap();
        cart.add_item(product("b", 10)).unwrap();

        assert!(cart.remove_item(&id("a")));
        assert_eq!(cart.len(), 1);
        assert!(cart.get(&id("a")).is_none());
    }

    #[test]
    fn test_decrease_from_one_stays_at_one() {
        let mut cart = Cart::new();
        cart.add_item(product("a", 10)).unwrap();

        let q = cart.adjust_quantity(&id("a"), QuantityAction::Decrease).unwrap();
        assert_eq!(q, Some(Quantity::ONE));
        assert_eq!(cart.get(&id("a")).unwrap().quantity, Quantity::ONE);
    }

    #[test]
    fn test_increase_adds_one() {
        let mut cart = Cart::new();
        cart.add_item(product("a", 10)).unwrap();
        for expected in 2..=5 {
            let q = cart.adjust_quantity(&id("a"), QuantityAction::Increase).unwrap().unwrap();
            assert_eq!(q.get(), expected);
        }
        let q = cart.adjust_quantity(&id("a"), QuantityAction::Decrease).unwrap().unwrap();
        assert_eq!(q.get(), 4);
    }

    #[test]
    fn test_adjust_unknown_id_returns_none() {
        let mut cart = Cart::new();
        assert_eq!(cart.adjust_quantity(&id("a"), QuantityAction::Increase), Ok(None));
        assert!(cart.is_empty());
    }

    #[test]
    fn test_set_quantity_zero_removes() {
        let mut cart = Cart::new();
        cart.add_item(product("a", 10)).unwrap();

        assert!(cart.set_quantity(&id("a"), 0).unwrap());
        assert!(cart.is_empty());
    }

    #[test]
    fn test_set_quantity_unknown_id() {
        let mut cart = Cart::new();
        assert!(!cart.set_quantity(&id("a"), 3).unwrap());
    }

    #[test]
    fn test_totals_example() {
        let mut cart = Cart::new();
        cart.add_item(product("a", 10)).unwrap();
        cart.add_item(product("b", 5)).unwrap();
        cart.add_item(product("b", 5)).unwrap();

        assert_eq!(cart.item_count(), 3);
        assert_eq!(cart.subtotal(), Decimal::new(20, 0));
        assert_eq!(Price::new(cart.subtotal()).display(), "$20.00");
    }

    #[test]
    fn test_empty_cart_totals() {
        let cart = Cart::new();
        assert_eq!(cart.item_count(), 0);
        assert_eq!(Price::new(cart.subtotal()).display(), "$0.00");
    }

    #[test]
    fn test_negative_price_rejected() {
        let err = NewCartItem::new(id("a"), "A", Decimal::new(-1, 0), "").unwrap_err();
        assert_eq!(err, CartError::NegativePrice(id("a")));
        assert!(NewCartItem::new(id("a"), "A", Decimal::ZERO, "").is_ok());
    }

    fn huge(s: &str) -> NewCartItem {
        let price: Decimal = "50000000000000000000000000000".parse().unwrap();
        NewCartItem::new(id(s), "Big", price, "").unwrap()
    }

    #[test]
    fn test_add_rejects_subtotal_overflow() {
        let mut cart = Cart::new();
        assert_eq!(cart.add_item(huge("a")), Ok(1));
        let before = cart.clone();

        assert_eq!(cart.add_item(huge("b")), Err(CartError::TotalTooLarge));
        assert_eq!(cart, before);
        assert_eq!(cart.checked_subtotal(), Some(before.subtotal()));
    }

    #[test]
    fn test_add_rejects_line_total_overflow() {
        let mut cart = Cart::new();
        cart.add_item(huge("a")).unwrap();

        assert_eq!(cart.add_item(huge("a")), Err(CartError::TotalTooLarge));
        assert_eq!(cart.get(&id("a")).unwrap().quantity, Quantity::ONE);
    }

    #[test]
    fn test_increase_rejects_overflow() {
        let mut cart = Cart::new();
        cart.add_item(huge("a")).unwrap();

        let result = cart.adjust_quantity(&id("a"), QuantityAction::Increase);
        assert_eq!(result, Err(CartError::TotalTooLarge));
        assert_eq!(cart.get(&id("a")).unwrap().quantity, Quantity::ONE);
        assert_eq!(cart.set_quantity(&id("a"), 3), Err(CartError::TotalTooLarge));
    }

    #[test]
    fn test_line_total_saturates_outside_a_cart() {
        let item = CartItem {
            id: id("a"),
            name: "Big".to_string(),
            price: Decimal::MAX,
            image: String::new(),
            quantity: Quantity::new(2).unwrap(),
        };
        assert_eq!(item.checked_line_total(), None);
        assert_eq!(item.line_total(), Decimal::MAX);
    }

    #[test]
    fn test_deserialize_rejects_unrepresentable_total() {
        let json = r#"[
            {"id":"a","name":"A","price":"50000000000000000000000000000","image":"","quantity":1},
            {"id":"b","name":"B","price":"50000000000000000000000000000","image":"","quantity":1}
        ]"#;
        assert!(serde_json::from_str::<Cart>(json).is_err());

        let single = r#"[
            {"id":"a","name":"A","price":"50000000000000000000000000000","image":"","quantity":2}
        ]"#;
        assert!(serde_json::from_str::<Cart>(single).is_err());
    }

    #[test]
    fn test_json_shape_is_array_of_items() {
        let mut cart = Cart::new();
        cart.add_item(product("a", 10)).unwrap();
        let json: serde_json::Value = serde_json::to_value(&cart).unwrap();

        let items = json.as_array().unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0]["id"], "a");
        assert_eq!(items[0]["quantity"], 1);
        // Prices are decimal strings so they survive storage exactly.
        assert_eq!(items[0]["price"], "10");
    }

    #[test]
    fn test_json_round_trip_preserves_order_and_fields() {
        let mut cart = Cart::new();
        cart.add_item(product("b", 5)).unwrap();
        cart.add_item(product("a", 10)).unwrap();
        cart.adjust_quantity(&id("b"), QuantityAction::Increase).unwrap();

        let json = serde_json::to_string(&cart).unwrap();
        let restored: Cart = serde_json::from_str(&json).unwrap();
        assert_eq!(restored, cart);
    }

    #[test]
    fn test_deserialize_merges_duplicate_ids() {
        let json = r#"[
            {"id":"a","name":"A","price":"1.50","image":"","quantity":1},
            {"id":"b","name":"B","price":"2","image":"","quantity":1},
            {"id":"a","name":"A again","price":"9","image":"","quantity":2}
        ]"#;
        let cart: Cart = serde_json::from_str(json).unwrap();

        assert_eq!(cart.len(), 2);
        let a = cart.get(&id("a")).unwrap();
        assert_eq!(a.quantity.get(), 3);
        assert_eq!(a.name, "A");
        assert_eq!(cart.items()[1].id.as_str(), "b");
    }

    #[test]
    fn test_deserialize_rejects_zero_quantity_and_negative_price() {
        let zero = r#"[{"id":"a","name":"A","price":"1","image":"","quantity":0}]"#;
        assert!(serde_json::from_str::<Cart>(zero).is_err());

        let negative = r#"[{"id":"a","name":"A","price":"-1","image":"","quantity":1}]"#;
        assert!(serde_json::from_str::<Cart>(negative).is_err());
    }
}
