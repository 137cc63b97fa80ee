//! Product entity - A catalog item sold in one or more size/color variants.
//!
//! Stock is tracked on variants only. The top-level `count_in_stock` column is kept for
//! compatibility with older catalog exports and is always written as zero.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Product database model
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "products")]
pub struct Model {
    /// Unique identifier for the product
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Display name (e.g., "Linen Shirt")
    pub name: String,
    /// Long-form description shown on the product page
    pub description: String,
    /// Free-form category used for storefront filtering
    pub category: String,
    /// Base price; variants may override it
    pub price: f64,
    /// JSON array of image URLs
    pub images: Json,
    /// Whether the product is shown in the featured carousel
    pub is_featured: bool,
    /// Soft delete flag - archived products are hidden from the storefront
    pub archived: bool,
    /// Vestigial product-level stock, always 0
    pub count_in_stock: i32,
    /// When the product was created
    pub created_at: DateTimeUtc,
    /// When the product was last modified
    pub updated_at: DateTimeUtc,
}

/// Defines relationships between Product and other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// One product has many variants
    #[sea_orm(has_many = "super::variant::Entity")]
    Variants,
    /// One product has many recorded price changes
    #[sea_orm(has_many = "super::price_change::Entity")]
    PriceChanges,
}

impl Related<super::variant::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Variants.def()
    }
}

impl Related<super::price_change::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::PriceChanges.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl Model {
    /// Image URLs stored in the `images` JSON column.
    #[must_use]
    pub fn image_urls(&self) -> Vec<String> {
        self.images
            .as_array()
            .map(|urls| {
                urls.iter()
                    .filter_map(|u| u.as_str().map(str::to_string))
                    .collect()
            })
            .unwrap_or_default()
    }
}
