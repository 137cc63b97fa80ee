//! Coupon entity - A percentage discount code, optionally bound to one shopper.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Coupon database model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "coupons")]
pub struct Model {
    /// Unique identifier for the coupon
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Upper-case code the shopper enters at checkout
    #[sea_orm(unique)]
    pub code: String,
    /// Whole percent taken off the subtotal, 1 to 100
    pub discount_percentage: i32,
    /// Last moment the coupon can be used
    pub expiration_date: DateTimeUtc,
    /// Owner of the coupon; `None` means anyone may use it
    pub user_id: Option<String>,
    /// Cleared when the coupon is used, replaced or deactivated
    pub is_active: bool,
    /// When an order redeemed the coupon
    pub used_at: Option<DateTimeUtc>,
    /// When the coupon was issued
    pub created_at: DateTimeUtc,
}

/// Coupons stand alone
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
