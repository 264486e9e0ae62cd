//! Session cart as a value type.
//!
//! A cart is an ordered list of line items keyed by product id. Prices are snapshotted when a
//! product is first added; later catalog edits never reprice an existing line.

use std::str::FromStr;

use bigdecimal::{BigDecimal, RoundingMode, Zero};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use utoipa::ToSchema;

use crate::infra::app_error::AppError;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CartError {
    #[error("Quantity must be at least 1")]
    InvalidQuantity,
    #[error("Quantity can't exceed {MAX_LINE_QTY} per product")]
    QuantityLimit,
    #[error("Unknown cart update type: {0}")]
    UnknownChange(String),
}

impl From<CartError> for AppError {
    fn from(err: CartError) -> Self {
        AppError::Validation(err.to_string())
    }
}

/// Upper bound for a single line, matching the `order_items.qty` column.
pub const MAX_LINE_QTY: u32 = i32::MAX as u32;

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, ToSchema)]
pub struct CartLine {
    pub product_id: i32,
    pub name: String,
    #[schema(value_type = String)]
    pub price: BigDecimal,
    pub qty: u32,
}

impl CartLine {
    pub fn line_total(&self) -> BigDecimal {
        &self.price * BigDecimal::from(self.qty)
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, ToSchema)]
pub struct Cart {
    #[serde(default)]
    pub items: Vec<CartLine>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QtyChange {
    Plus,
    Minus,
}

impl FromStr for QtyChange {
    type Err = CartError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "plus" => Ok(QtyChange::Plus),
            "minus" => Ok(QtyChange::Minus),
            other => Err(CartError::UnknownChange(other.to_string())),
        }
    }
}

impl Cart {
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn get(&self, product_id: i32) -> Option<&CartLine> {
        self.items.iter().find(|line| line.product_id == product_id)
    }

    /// Adds `qty` units of a product. An existing line accumulates quantity and keeps its
    /// original price snapshot.
    pub fn add(
        &mut self,
        product_id: i32,
        name: &str,
        price: BigDecimal,
        qty: u32,
    ) -> Result<&CartLine, CartError> {
        if qty == 0 {
            return Err(CartError::InvalidQuantity);
        }
        if qty > MAX_LINE_QTY {
            return Err(CartError::QuantityLimit);
        }

        let index = match self.items.iter().position(|l| l.product_id == product_id) {
            Some(index) => {
                let line = &mut self.items[index];
                line.qty = line
                    .qty
                    .checked_add(qty)
                    .filter(|total| *total <= MAX_LINE_QTY)
                    .ok_or(CartError::QuantityLimit)?;
                index
            }
            None => {
                self.items.push(CartLine {
                    product_id,
                    name: name.to_string(),
                    price,
                    qty,
                });
                self.items.len() - 1
            }
        };

        Ok(&self.items[index])
    }

    /// Steps a line's quantity by one. Decrementing a single unit drops the line; incrementing
    /// stops at [`MAX_LINE_QTY`]. Returns `false` when the product is not in the cart.
    pub fn update(&mut self, product_id: i32, change: QtyChange) -> bool {
        let Some(index) = self.items.iter().position(|l| l.product_id == product_id) else {
            return false;
        };

        match change {
            QtyChange::Plus if self.items[index].qty < MAX_LINE_QTY => self.items[index].qty += 1,
            QtyChange::Plus => {}
            QtyChange::Minus if self.items[index].qty > 1 => self.items[index].qty -= 1,
            QtyChange::Minus => {
                self.items.remove(index);
            }
        }
        true
    }

    pub fn remove(&mut self, product_id: i32) -> Option<CartLine> {
        let index = self.items.iter().position(|l| l.product_id == product_id)?;
        Some(self.items.remove(index))
    }

    pub fn clear(&mut self) {
        self.items.clear();
    }

    pub fn total(&self) -> BigDecimal {
        self.items
            .iter()
            .fold(BigDecimal::zero(), |acc, line| acc + line.line_total())
    }

    pub fn total_qty(&self) -> u64 {
        self.items.iter().map(|line| u64::from(line.qty)).sum()
    }
}

/// Formats an amount as taka with thousands separators, e.g. `৳1,234.50`.
pub fn format_taka(amount: &BigDecimal) -> String {
    let rounded = amount.with_scale_round(2, RoundingMode::HalfUp).to_string();
    let (sign, digits) = match rounded.strip_prefix('-') {
        Some(rest) => ("-", rest),
        None => ("", rounded.as_str()),
    };
    let (int_part, frac_part) = digits.split_once('.').unwrap_or((digits, "00"));

    let mut grouped = String::with_capacity(int_part.len() + int_part.len() / 3);
    for (i, ch) in int_part.chars().enumerate() {
        if i > 0 && (int_part.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }

    format!("{sign}৳{grouped}.{frac_part}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn price(raw: &str) -> BigDecimal {
        raw.parse().unwrap()
    }

    #[test]
    fn adding_same_product_accumulates_quantity() {
        let mut cart = Cart::default();
        cart.add(7, "Widget", price("100.00"), 1).unwrap();
        cart.add(7, "Widget", price("100.00"), 2).unwrap();

        assert_eq!(cart.items.len(), 1);
        assert_eq!(cart.get(7).unwrap().qty, 3);
        assert_eq!(cart.total(), price("300.00"));
    }

    #[test]
    fn re_adding_keeps_first_price_snapshot() {
        let mut cart = Cart::default();
        cart.add(7, "Widget", price("100.00"), 1).unwrap();
        cart.add(7, "Widget", price("80.00"), 1).unwrap();

        assert_eq!(cart.get(7).unwrap().price, price("100.00"));
    }

    #[test]
    fn zero_quantity_is_rejected() {
        let mut cart = Cart::default();
        assert_eq!(
            cart.add(1, "Pen", price("5"), 0).unwrap_err(),
            CartError::InvalidQuantity
        );
        assert!(cart.is_empty());
    }

    #[test]
    fn quantity_is_capped_per_line() {
        let mut cart = Cart::default();
        assert_eq!(
            cart.add(1, "Pen", price("5"), u32::MAX).unwrap_err(),
            CartError::QuantityLimit
        );

        cart.add(1, "Pen", price("5"), MAX_LINE_QTY).unwrap();
        assert_eq!(
            cart.add(1, "Pen", price("5"), 1).unwrap_err(),
            CartError::QuantityLimit
        );
        assert_eq!(cart.get(1).unwrap().qty, MAX_LINE_QTY);

        assert!(cart.update(1, QtyChange::Plus));
        assert_eq!(cart.get(1).unwrap().qty, MAX_LINE_QTY);
    }

    #[test]
    fn total_qty_does_not_overflow_across_lines() {
        let mut cart = Cart::default();
        cart.add(1, "Pen", price("5"), MAX_LINE_QTY).unwrap();
        cart.add(2, "Ink", price("5"), MAX_LINE_QTY).unwrap();
        cart.add(3, "Pad", price("5"), MAX_LINE_QTY).unwrap();
        assert_eq!(cart.total_qty(), 3 * u64::from(MAX_LINE_QTY));
    }

    #[test]
    fn minus_on_single_unit_removes_line() {
        let mut cart = Cart::default();
        cart.add(3, "Mug", price("250"), 1).unwrap();

        assert!(cart.update(3, QtyChange::Minus));
        assert!(cart.get(3).is_none());
    }

    #[test]
    fn minus_on_multiple_units_decrements_by_one() {
        let mut cart = Cart::default();
        cart.add(3, "Mug", price("250"), 4).unwrap();

        cart.update(3, QtyChange::Minus);
        assert_eq!(cart.get(3).unwrap().qty, 3);

        cart.update(3, QtyChange::Plus);
        assert_eq!(cart.get(3).unwrap().qty, 4);
    }

    #[test]
    fn update_on_missing_line_is_a_no_op() {
        let mut cart = Cart::default();
        cart.add(1, "Pen", price("5"), 1).unwrap();

        assert!(!cart.update(99, QtyChange::Plus));
        assert_eq!(cart.total_qty(), 1);
    }

    #[test]
    fn remove_is_unconditional() {
        let mut cart = Cart::default();
        cart.add(1, "Pen", price("5"), 10).unwrap();

        assert_eq!(cart.remove(1).map(|l| l.qty), Some(10));
        assert_eq!(cart.remove(1), None);
    }

    #[test]
    fn qty_change_parses_query_values() {
        assert_eq!("plus".parse::<QtyChange>(), Ok(QtyChange::Plus));
        assert_eq!("minus".parse::<QtyChange>(), Ok(QtyChange::Minus));
        assert!("double".parse::<QtyChange>().is_err());
    }

    #[test]
    fn cart_round_trips_through_session_json() {
        let mut cart = Cart::default();
        cart.add(7, "Widget", price("100.00"), 2).unwrap();

        let value = serde_json::to_value(&cart).unwrap();
        let restored: Cart = serde_json::from_value(value).unwrap();
        assert_eq!(restored, cart);
    }

    #[test]
    fn taka_formatting() {
        assert_eq!(format_taka(&price("0")), "৳0.00");
        assert_eq!(format_taka(&price("260")), "৳260.00");
        assert_eq!(format_taka(&price("1234.5")), "৳1,234.50");
        assert_eq!(format_taka(&price("1234567.891")), "৳1,234,567.89");
        assert_eq!(format_taka(&price("-1500")), "-৳1,500.00");
    }

    proptest! {
        #[test]
        fn total_is_sum_of_line_totals(
            lines in prop::collection::vec((1i32..20, 1u32..1000, 1u32..5), 0..30)
        ) {
            let mut cart = Cart::default();
            for (id, cents, qty) in &lines {
                let unit = BigDecimal::from(*cents) / BigDecimal::from(100);
                cart.add(*id, "item", unit, *qty).unwrap();
            }

            let expected = cart
                .items
                .iter()
                .fold(BigDecimal::zero(), |acc, l| acc + &l.price * BigDecimal::from(l.qty));
            prop_assert_eq!(cart.total(), expected);

            let qty: u64 = lines.iter().map(|(_, _, q)| u64::from(*q)).sum();
            prop_assert_eq!(cart.total_qty(), qty);

            let mut ids: Vec<i32> = cart.items.iter().map(|l| l.product_id).collect();
            ids.sort();
            ids.dedup();
            prop_assert_eq!(ids.len(), cart.items.len());
        }
    }
}
