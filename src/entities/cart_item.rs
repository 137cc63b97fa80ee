//! Cart item entity - One line of a shopper's cart.
//!
//! A shopper has at most one line per variant; adding the same variant again
//! increases the quantity of the existing line.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Cart line database model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "cart_items")]
pub struct Model {
    /// Unique identifier for the cart line
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Shopper that owns the cart
    pub user_id: String,
    /// Product the variant belongs to
    pub product_id: i64,
    /// Variant in the cart
    pub variant_id: i64,
    /// Units wanted, at least 1
    pub quantity: i32,
    /// When the line was first added
    pub added_at: DateTimeUtc,
}

/// No declared relations; lines are joined by hand when pricing a cart
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
