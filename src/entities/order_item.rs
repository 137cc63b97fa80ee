//! Order item entity - A product line captured at purchase time.
//!
//! Name, size, color and price are snapshots so later catalog edits do not
//! rewrite order history.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Order line database model
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "order_items")]
pub struct Model {
    /// Unique identifier for the order line
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Order this line belongs to
    pub order_id: i64,
    /// Product bought, at purchase time
    pub product_id: i64,
    /// Variant bought, at purchase time
    pub variant_id: i64,
    /// Product name at purchase time
    pub name: String,
    /// Variant size at purchase time
    pub size: String,
    /// Variant color at purchase time
    pub color: String,
    /// Units bought
    pub quantity: i32,
    /// Unit price paid before the order-level discount
    pub price: f64,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// Each line belongs to one order
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

impl Model {
    #[must_use]
    pub fn line_total(&self) -> f64 {
        self.price * f64::from(self.quantity)
    }
}
