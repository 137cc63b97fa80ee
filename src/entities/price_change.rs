//! Price change entity - The price history of a product.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Price history database model
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "price_changes")]
pub struct Model {
    /// Unique identifier for the price change
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Product whose price changed
    pub product_id: i64,
    /// Price before the change
    pub old_price: f64,
    /// Price after the change
    pub new_price: f64,
    /// Admin who changed the price
    pub changed_by: String,
    /// When the price changed
    pub changed_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// Each price change belongs to one product
    #[sea_orm(
        belongs_to = "super::product::Entity",
        from = "Column::ProductId",
        to = "super::product::Column::Id"
    )]
    Product,
}

impl Related<super::product::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Product.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
