// src/checkout.rs
//
// Money rules: discount price, cart line merge, order totals and rating mean.

use chrono::{DateTime, Utc};
use rust_decimal::{Decimal, RoundingStrategy};
use thiserror::Error;
use uuid::Uuid;

use crate::models::{Cart, CartItem, OrderItem, Product};

/// 18% GST, applied to the cart subtotal.
pub const TAX_RATE: Decimal = Decimal::from_parts(18, 0, 0, false, 2);
pub const SHIPPING_FEE: Decimal = Decimal::from_parts(199, 0, 0, false, 0);
/// Orders with a subtotal at or above this ship free.
pub const FREE_SHIPPING_THRESHOLD: Decimal = Decimal::from_parts(5000, 0, 0, false, 0);
/// Largest value a `NUMERIC(14,2)` money column holds: 999,999,999,999.99.
pub const MAX_PRICE: Decimal = Decimal::from_parts(276_447_231, 23_283, 0, false, 2);
/// Upper bound on one cart line's quantity.
pub const MAX_LINE_QUANTITY: i32 = 10_000;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CartError {
    #[error("quantity must not exceed {MAX_LINE_QUANTITY}")]
    QuantityTooLarge,
    #[error("cart total is out of range")]
    TotalOverflow,
}

pub fn round_money(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

/// `base × (1 − percent/100)`. A non-positive percent leaves the base untouched
/// and a percent above 100 is treated as 100.
pub fn discount_price(base_price: Decimal, discount_percent: Decimal) -> Decimal {
    if discount_percent <= Decimal::ZERO {
        return base_price;
    }
    let keep = Decimal::ONE - discount_percent.min(Decimal::ONE_HUNDRED) / Decimal::ONE_HUNDRED;
    round_money(base_price * keep)
}

pub fn line_total(price: Decimal, quantity: i32) -> Result<Decimal, CartError> {
    price
        .checked_mul(Decimal::from(quantity))
        .ok_or(CartError::TotalOverflow)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OrderTotals {
    pub subtotal: Decimal,
    pub tax: Decimal,
    pub shipping: Decimal,
    pub total: Decimal,
}

impl OrderTotals {
    pub fn from_subtotal(subtotal: Decimal) -> Self {
        let tax = round_money(subtotal * TAX_RATE);
        let shipping = if subtotal < FREE_SHIPPING_THRESHOLD {
            SHIPPING_FEE
        } else {
            Decimal::ZERO
        };
        Self {
            subtotal,
            tax,
            shipping,
            total: subtotal + tax + shipping,
        }
    }
}

/// Unit price for a new cart line: the variant's price when one is chosen,
/// otherwise the discount price, falling back to the base price when the
/// discount price is zero.
pub fn line_price(product: &Product, variant_id: Option<Uuid>) -> Option<(Decimal, String)> {
    match variant_id {
        Some(id) => product.variant(id).map(|v| (v.price, v.size.clone())),
        None if product.discount_price.is_zero() => Some((product.base_price, String::new())),
        None => Some((product.discount_price, String::new())),
    }
}

impl Cart {
    pub fn empty(user_id: Uuid, now: DateTime<Utc>) -> Self {
        Self {
            id: None,
            user_id,
            items: Vec::new(),
            total: Decimal::ZERO,
            updated_at: now,
        }
    }

    /// Merges a line keyed by (product, variant): an existing line gains
    /// `quantity`, otherwise `item` is appended. A merged quantity above
    /// `MAX_LINE_QUANTITY` leaves the cart unchanged.
    pub fn add_item(&mut self, item: CartItem, now: DateTime<Utc>) -> Result<(), CartError> {
        match self
            .items
            .iter_mut()
            .find(|line| line.product_id == item.product_id && line.variant_id == item.variant_id)
        {
            Some(line) => {
                line.quantity = line
                    .quantity
                    .checked_add(item.quantity)
                    .filter(|q| *q <= MAX_LINE_QUANTITY)
                    .ok_or(CartError::QuantityTooLarge)?;
            }
            None if item.quantity > MAX_LINE_QUANTITY => return Err(CartError::QuantityTooLarge),
            None => self.items.push(item),
        }
        self.touch(now)
    }

    /// Sets the quantity of matching lines; zero removes them. `variant_id`
    /// narrows the match to one line, `None` matches every line of the product.
    /// Returns false when nothing matched.
    pub fn set_quantity(
        &mut self,
        product_id: Uuid,
        variant_id: Option<Uuid>,
        quantity: i32,
        now: DateTime<Utc>,
    ) -> Result<bool, CartError> {
        if quantity > MAX_LINE_QUANTITY {
            return Err(CartError::QuantityTooLarge);
        }
        let matches = |line: &CartItem| {
            line.product_id == product_id && variant_id.is_none_or(|v| line.variant_id == Some(v))
        };
        let found = self.items.iter().any(matches);
        if quantity > 0 {
            for line in self.items.iter_mut().filter(|l| matches(l)) {
                line.quantity = quantity;
            }
        } else {
            self.items.retain(|l| !matches(l));
        }
        self.touch(now)?;
        Ok(found)
    }

    pub fn remove_product(
        &mut self,
        product_id: Uuid,
        variant_id: Option<Uuid>,
        now: DateTime<Utc>,
    ) -> Result<bool, CartError> {
        let before = self.items.len();
        self.items.retain(|line| {
            !(line.product_id == product_id && variant_id.is_none_or(|v| line.variant_id == Some(v)))
        });
        self.touch(now)?;
        Ok(self.items.len() != before)
    }

    /// Full re-summation of price × quantity.
    pub fn recompute_total(&mut self) -> Result<(), CartError> {
        let mut total = Decimal::ZERO;
        for line in &self.items {
            total = total
                .checked_add(line_total(line.price, line.quantity)?)
                .ok_or(CartError::TotalOverflow)?;
        }
        self.total = total;
        Ok(())
    }

    pub fn order_items(&self) -> Result<Vec<OrderItem>, CartError> {
        self.items
            .iter()
            .map(|line| {
                Ok(OrderItem {
                    product_id: line.product_id,
                    product_name: line.product_name.clone(),
                    thumbnail: line.thumbnail.clone(),
                    variant_id: line.variant_id,
                    size: line.size.clone(),
                    quantity: line.quantity,
                    price: line.price,
                    total_price: line_total(line.price, line.quantity)?,
                })
            })
            .collect()
    }

    fn touch(&mut self, now: DateTime<Utc>) -> Result<(), CartError> {
        self.recompute_total()?;
        self.updated_at = now;
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RatingSummary {
    pub average: f64,
    pub count: i32,
}

impl RatingSummary {
    pub fn from_ratings(ratings: &[i32]) -> Self {
        if ratings.is_empty() {
            return Self { average: 0.0, count: 0 };
        }
        let sum: i64 = ratings.iter().map(|r| i64::from(*r)).sum();
        Self {
            average: sum as f64 / ratings.len() as f64,
            count: ratings.len() as i32,
        }
    }
}

/// `EJ-YYYYMMDD-XXXXXXXX`, eight uppercase hex digits from four random bytes.
pub fn order_number(now: DateTime<Utc>) -> String {
    let random = Uuid::new_v4();
    let suffix: String = random.as_bytes()[..4].iter().map(|b| format!("{b:02X}")).collect();
    format!("EJ-{}-{}", now.format("%Y%m%d"), suffix)
}
