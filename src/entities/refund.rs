//! Refund entity - A single refund request/approval cycle for one order line.
//!
//! Refunds carry their own status; the order status is derived from the
//! approved refund total, never the other way round.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Lifecycle of a refund request
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::None)")]
#[serde(rename_all = "snake_case")]
pub enum RefundStatus {
    /// Waiting for an admin decision
    #[sea_orm(string_value = "requested")]
    Requested,
    /// Money returned and units restocked
    #[sea_orm(string_value = "approved")]
    Approved,
    /// Declined by an admin
    #[sea_orm(string_value = "rejected")]
    Rejected,
}

/// Refund database model
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "refunds")]
pub struct Model {
    /// Unique identifier for the refund
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Order the refund is requested against
    pub order_id: i64,
    /// The order line being refunded
    pub order_item_id: i64,
    /// Where the request is in its lifecycle
    pub status: RefundStatus,
    /// Money returned to the shopper once approved
    pub amount: f64,
    /// Units being returned
    pub quantity: i32,
    /// Why the shopper wants a refund
    pub reason: String,
    /// Copy of the order line at request time
    pub product_snapshot: Json,
    /// Note left by the admin who resolved the request
    pub admin_note: Option<String>,
    /// Gateway reference of the executed refund
    pub gateway_refund_id: Option<String>,
    /// When the shopper asked for the refund
    pub requested_at: DateTimeUtc,
    /// When an admin approved or rejected it
    pub resolved_at: Option<DateTimeUtc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// Each refund belongs to one order
    #[sea_orm(
        belongs_to = "super::order::Entity",
        from = "Column::OrderId",
        to = "super::order::Column::Id"
    )]
    Order,
}

impl Related<super::order::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Order.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
