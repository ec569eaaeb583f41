//! Shopping cart aggregate.
//!
//! A cart holds at most one line per product. Lines embed the resolved
//! [`Product`] so totals always reflect the catalog state the cart was loaded
//! against. Totals are derived on every call and never stored.

use std::collections::BTreeMap;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::product::{Product, ProductId};
use crate::errors::DomainError;

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(pub i64);

impl std::fmt::Display for UserId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct CartLine {
    product: Product,
    quantity: i64,
    discount_percent: Decimal,
    line_total: Decimal,
}

impl CartLine {
    pub fn new(product: Product, quantity: i64) -> Result<Self, DomainError> {
        Self::with_discount(product, quantity, Decimal::ZERO)
    }

    /// Fails when the line total `price * quantity * (1 - discount_percent)` is not
    /// representable as a `Decimal`.
    pub fn with_discount(
        product: Product,
        quantity: i64,
        discount_percent: Decimal,
    ) -> Result<Self, DomainError> {
        ensure_positive(quantity)?;
        if discount_percent < Decimal::ZERO || discount_percent > Decimal::ONE {
            return Err(DomainError::DiscountOutOfRange(discount_percent));
        }

        let subtotal = product.price.checked_mul(Decimal::from(quantity));
        let line_total = subtotal
            .and_then(|subtotal| subtotal.checked_sub(subtotal.checked_mul(discount_percent)?))
            .ok_or(DomainError::TotalOverflow { product_id: product.id })?;

        Ok(Self { product, quantity, discount_percent, line_total })
    }

    pub fn product(&self) -> &Product {
        &self.product
    }

    pub fn product_id(&self) -> ProductId {
        self.product.id
    }

    pub fn quantity(&self) -> i64 {
        self.quantity
    }

    pub fn discount_percent(&self) -> Decimal {
        self.discount_percent
    }

    pub fn line_total(&self) -> Decimal {
        self.line_total
    }
}

/// Persisted shape of a cart line: the product is stored by reference only.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartLineRecord {
    pub product_id: ProductId,
    pub quantity: i64,
    pub discount_percent: Decimal,
}

impl From<&CartLine> for CartLineRecord {
    fn from(line: &CartLine) -> Self {
        Self {
            product_id: line.product_id(),
            quantity: line.quantity,
            discount_percent: line.discount_percent,
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct ShoppingCart {
    items: BTreeMap<ProductId, CartLine>,
}

impl ShoppingCart {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds `quantity` of `product`, merging into an existing line for the same product.
    pub fn add(&mut self, product: Product, quantity: i64) -> Result<&CartLine, DomainError> {
        ensure_positive(quantity)?;

        let product_id = product.id;
        let line = match self.items.get(&product_id) {
            Some(existing) => {
                let merged = existing
                    .quantity
                    .checked_add(quantity)
                    .ok_or(DomainError::QuantityOverflow { product_id })?;
                // refresh to the caller's view of the product
                CartLine::with_discount(product, merged, existing.discount_percent)?
            }
            None => CartLine::new(product, quantity)?,
        };

        self.commit(line)
    }

    /// Inserts a fully formed line, merging quantities when the product is already present.
    pub fn insert_line(&mut self, line: CartLine) -> Result<(), DomainError> {
        let product_id = line.product_id();
        let line = match self.items.get(&product_id) {
            Some(existing) => {
                let merged = existing
                    .quantity
                    .checked_add(line.quantity)
                    .ok_or(DomainError::QuantityOverflow { product_id })?;
                let discount = existing.discount_percent;
                CartLine::with_discount(existing.product.clone(), merged, discount)?
            }
            None => line,
        };

        self.commit(line).map(|_| ())
    }

    /// Sets the quantity of an existing line. Never creates a line.
    pub fn update_quantity(
        &mut self,
        product_id: ProductId,
        quantity: i64,
    ) -> Result<&CartLine, DomainError> {
        ensure_positive(quantity)?;

        let existing =
            self.items.get(&product_id).ok_or(DomainError::LineNotFound { product_id })?;
        let line =
            CartLine::with_discount(existing.product.clone(), quantity, existing.discount_percent)?;

        self.commit(line)
    }

    /// Stores `line` in place of any line for the same product, provided the cart's total
    /// quantity and total price stay representable. On error the cart is unchanged.
    fn commit(&mut self, line: CartLine) -> Result<&CartLine, DomainError> {
        let product_id = line.product_id();
        let mut quantity = line.quantity;
        let mut total = line.line_total;
        for other in self.items.values().filter(|other| other.product_id() != product_id) {
            quantity = quantity
                .checked_add(other.quantity)
                .ok_or(DomainError::QuantityOverflow { product_id })?;
            total = total
                .checked_add(other.line_total)
                .ok_or(DomainError::TotalOverflow { product_id })?;
        }

        self.items.insert(product_id, line);
        self.items.get(&product_id).ok_or(DomainError::LineNotFound { product_id })
    }

    /// Removes the line for `product_id` if present.
    pub fn remove(&mut self, product_id: ProductId) -> Option<CartLine> {
        self.items.remove(&product_id)
    }

    pub fn clear(&mut self) {
        self.items.clear();
    }

    pub fn get(&self, product_id: ProductId) -> Option<&CartLine> {
        self.items.get(&product_id)
    }

    pub fn contains(&self, product_id: ProductId) -> bool {
        self.items.contains_key(&product_id)
    }

    pub fn lines(&self) -> impl Iterator<Item = &CartLine> {
        self.items.values()
    }

    pub fn records(&self) -> Vec<CartLineRecord> {
        self.items.values().map(CartLineRecord::from).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Number of distinct products.
    pub fn item_count(&self) -> usize {
        self.items.len()
    }

    /// Sum of line quantities. [`Self::commit`] keeps it within `i64`.
    pub fn total_quantity(&self) -> i64 {
        self.items.values().map(CartLine::quantity).sum()
    }

    /// Sum of line totals. [`Self::commit`] keeps it within `Decimal` range.
    pub fn total(&self) -> Decimal {
        self.items.values().map(CartLine::line_total).sum()
    }
}

fn ensure_positive(quantity: i64) -> Result<(), DomainError> {
    if quantity <= 0 {
        return Err(DomainError::NonPositiveQuantity(quantity));
    }
    Ok(())
}
