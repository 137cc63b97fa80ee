//! Variant entity - A size/color combination of a product.
//!
//! Each variant carries its own stock count and an optional price override.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Product variant database model
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "product_variants")]
pub struct Model {
    /// Unique identifier for the variant
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Owning product
    pub product_id: i64,
    /// Size label (e.g., "M", "42")
    pub size: String,
    /// Color label (e.g., "navy")
    pub color: String,
    /// Units on hand, never negative
    pub count_in_stock: i32,
    /// Overrides the product price when set
    pub price: Option<f64>,
    /// Stock keeping unit, unique across the catalog
    #[sea_orm(unique)]
    pub sku: String,
}

/// Defines relationships between Variant and other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// Each variant belongs to one product
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

impl Model {
    /// Unit price for this variant given its product's base price.
    #[must_use]
    pub fn effective_price(&self, product_price: f64) -> f64 {
        self.price.unwrap_or(product_price)
    }
}
