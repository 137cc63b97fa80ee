//! Core business logic - framework-agnostic catalog, inventory, order, refund, coupon,
//! audit and analytics operations.
//!
//! Functions take a `sea_orm` connection and return [`crate::errors::Result`]. Helpers that
//! must run inside a caller's database transaction are generic over `ConnectionTrait`.

pub mod analytics;
pub mod audit;
pub mod cart;
pub mod checkout;
pub mod coupon;
pub mod inventory;
pub mod order;
pub mod product;
pub mod refund;
pub mod sync;

/// Rounds a money amount to cents.
#[must_use]
pub fn round_money(amount: f64) -> f64 {
    (amount * 100.0).round() / 100.0
}

/// Converts a money amount to integer cents for the payment gateway.
#[must_use]
#[allow(clippy::cast_possible_truncation)]
pub fn to_cents(amount: f64) -> i64 {
    (amount * 100.0).round() as i64
}
