//! Inventory log entity - One row per variant stock mutation.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Why a variant's stock changed
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::None)")]
#[serde(rename_all = "snake_case")]
pub enum AdjustmentType {
    /// Admin added units
    #[sea_orm(string_value = "restock")]
    Restock,
    /// Admin overwrote the count
    #[sea_orm(string_value = "manual_set")]
    ManualSet,
    /// Admin removed units
    #[sea_orm(string_value = "decrement")]
    Decrement,
    /// Units shipped on a delivered order
    #[sea_orm(string_value = "order_fulfillment")]
    OrderFulfillment,
    /// Units returned by an approved refund
    #[sea_orm(string_value = "refund_restock")]
    RefundRestock,
}

/// Inventory log database model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "inventory_logs")]
pub struct Model {
    /// Unique identifier for the log row
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Product owning the variant
    pub product_id: i64,
    /// Variant whose stock changed
    pub variant_id: i64,
    /// Why the stock changed
    pub adjustment_type: AdjustmentType,
    /// Units requested by the adjustment, before clamping
    pub quantity: i32,
    /// Stock before the change
    pub old_stock: i32,
    /// Stock after the change
    pub new_stock: i32,
    /// Human-readable explanation
    pub reason: String,
    /// Admin who made the change; `None` for automated adjustments
    pub admin_id: Option<String>,
    /// Order that caused the change, if any
    pub order_id: Option<i64>,
    /// When the change was written
    pub created_at: DateTimeUtc,
}

/// No declared relations
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
