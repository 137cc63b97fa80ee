//! Audit log entity - Append-only record of admin-initiated mutations.
//!
//! Rows are written for traceability and display; they are never replayed.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Kind of admin action being recorded
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::None)")]
#[serde(rename_all = "snake_case")]
pub enum AuditAction {
    /// A product was added to the catalog
    #[sea_orm(string_value = "product_created")]
    ProductCreated,
    /// Product fields other than price changed
    #[sea_orm(string_value = "product_updated")]
    ProductUpdated,
    /// A product was hidden from the storefront
    #[sea_orm(string_value = "product_archived")]
    ProductArchived,
    /// An archived product was made visible again
    #[sea_orm(string_value = "product_restored")]
    ProductRestored,
    /// A product base price changed
    #[sea_orm(string_value = "price_changed")]
    PriceChanged,
    /// A variant was added to a product
    #[sea_orm(string_value = "variant_added")]
    VariantAdded,
    /// Variant attributes changed
    #[sea_orm(string_value = "variant_updated")]
    VariantUpdated,
    /// An admin adjusted variant stock by hand
    #[sea_orm(string_value = "stock_adjusted")]
    StockAdjusted,
    /// An admin moved an order to a new status
    #[sea_orm(string_value = "order_status_changed")]
    OrderStatusChanged,
    /// A refund request was approved and paid out
    #[sea_orm(string_value = "refund_approved")]
    RefundApproved,
    /// A refund request was rejected
    #[sea_orm(string_value = "refund_rejected")]
    RefundRejected,
    /// A coupon was issued by an admin
    #[sea_orm(string_value = "coupon_created")]
    CouponCreated,
    /// A coupon was switched off by an admin
    #[sea_orm(string_value = "coupon_deactivated")]
    CouponDeactivated,
    /// An admin ran the inventory sync
    #[sea_orm(string_value = "inventory_synced")]
    InventorySynced,
}

impl fmt::Display for AuditAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_value())
    }
}

/// Audit log database model
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "audit_logs")]
pub struct Model {
    /// Unique identifier for the audit row
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Admin who performed the action
    pub admin_id: String,
    /// What was done
    pub action: AuditAction,
    /// Kind of record touched, e.g. `"product"` or `"order"`
    pub entity_type: String,
    /// Identifier of the touched record, stored as text
    pub entity_id: String,
    /// Free-form description of what changed
    pub changes: Json,
    /// When the action happened
    pub created_at: DateTimeUtc,
}

/// Audit rows stand alone
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
