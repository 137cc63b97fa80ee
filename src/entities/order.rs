//! Order entity - A placed order with its lifecycle status and money totals.
//!
//! Order lines live in `order_items` and refund requests in `refunds`, both keyed by
//! `order_id`. `total_refunded` never exceeds `total_amount`.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle status of an order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::None)")]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    /// Created at checkout, waiting for payment confirmation
    #[sea_orm(string_value = "pending")]
    Pending,
    /// Paid and being prepared
    #[sea_orm(string_value = "processing")]
    Processing,
    /// Handed to the carrier
    #[sea_orm(string_value = "shipped")]
    Shipped,
    /// Received by the shopper
    #[sea_orm(string_value = "delivered")]
    Delivered,
    /// Cancelled before shipping
    #[sea_orm(string_value = "cancelled")]
    Cancelled,
    /// Every refundable unit has been refunded
    #[sea_orm(string_value = "refunded")]
    Refunded,
    /// Some, but not all, of the charged amount has been refunded
    #[sea_orm(string_value = "partially_refunded")]
    PartiallyRefunded,
}

impl OrderStatus {
    /// Statuses an admin may move an order to from `self`.
    #[must_use]
    pub const fn allowed_transitions(self) -> &'static [Self] {
        match self {
            Self::Pending => &[Self::Processing, Self::Cancelled],
            Self::Processing => &[Self::Shipped, Self::Cancelled],
            Self::Shipped => &[Self::Delivered],
            Self::Delivered => &[Self::Refunded, Self::PartiallyRefunded],
            Self::PartiallyRefunded => &[Self::Refunded],
            Self::Cancelled | Self::Refunded => &[],
        }
    }

    /// Whether moving from `self` to `next` is a legal transition.
    #[must_use]
    pub fn can_transition_to(self, next: Self) -> bool {
        self.allowed_transitions().contains(&next)
    }

    /// Whether refunds may be requested against an order in this status.
    #[must_use]
    pub const fn accepts_refunds(self) -> bool {
        matches!(self, Self::Delivered | Self::PartiallyRefunded)
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_value())
    }
}

/// Payment state reported by the gateway
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::None)")]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    /// No payment collected yet
    #[sea_orm(string_value = "unpaid")]
    Unpaid,
    /// Payment collected
    #[sea_orm(string_value = "paid")]
    Paid,
}

/// Order database model
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "orders")]
pub struct Model {
    /// Unique identifier for the order
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Shopper who placed the order
    pub user_id: String,
    /// Lifecycle status
    pub status: OrderStatus,
    /// Amount charged after discounts
    pub total_amount: f64,
    /// Sum of approved refunds
    pub total_refunded: f64,
    /// Discount taken off the subtotal by a coupon
    pub discount_amount: f64,
    /// Coupon applied at checkout, if any
    pub coupon_code: Option<String>,
    /// Gateway checkout session backing this order
    pub payment_session_id: Option<String>,
    /// Whether the gateway has collected the payment
    pub payment_status: PaymentStatus,
    /// Where the order ships
    pub shipping_address: String,
    /// Set once the inventory sync has decremented stock for this order
    pub inventory_processed: bool,
    /// When the order was placed
    pub created_at: DateTimeUtc,
    /// When the order was last modified
    pub updated_at: DateTimeUtc,
}

/// Defines relationships between Order and other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// One order has many lines
    #[sea_orm(has_many = "super::order_item::Entity")]
    Items,
    /// One order has many refund requests
    #[sea_orm(has_many = "super::refund::Entity")]
    Refunds,
}

impl Related<super::order_item::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Items.def()
    }
}

impl Related<super::refund::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Refunds.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl Model {
    /// Subtotal before the coupon discount.
    #[must_use]
    pub fn subtotal(&self) -> f64 {
        self.total_amount + self.discount_amount
    }

    /// Fraction of the subtotal actually charged; refunds are scaled by it.
    #[must_use]
    pub fn charged_ratio(&self) -> f64 {
        let subtotal = self.subtotal();
        if subtotal <= 0.0 {
            return 0.0;
        }
        self.total_amount / subtotal
    }
}
