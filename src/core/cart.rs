//! Cart business logic - a shopper's pending selection of variants.
//!
//! Prices are not stored on cart lines; they are resolved from the catalog every time the
//! cart is read, so a price change between "add to cart" and checkout is honored.

use crate::{
    core::round_money,
    entities::{CartItem, Product, Variant, cart_item, product, variant},
    errors::{Error, Result},
};
use chrono::Utc;
use sea_orm::{QueryOrder, Set, prelude::*};
use serde::Serialize;
use std::collections::HashMap;
use tracing::{debug, warn};

/// One priced cart line.
#[derive(Debug, Clone, Serialize)]
pub struct CartLine {
    /// Cart item id
    pub item_id: i64,
    /// Owning product
    pub product_id: i64,
    /// Variant in the cart
    pub variant_id: i64,
    /// Product name
    pub name: String,
    /// Variant size
    pub size: String,
    /// Variant color
    pub color: String,
    /// Variant SKU
    pub sku: String,
    /// Units in the cart
    pub quantity: i32,
    /// Current effective price
    pub unit_price: f64,
    /// `unit_price * quantity`, rounded
    pub line_total: f64,
    /// Units currently on hand
    pub available_stock: i32,
}

/// A shopper's cart with computed totals.
#[derive(Debug, Clone, Serialize)]
pub struct Cart {
    /// Cart owner
    pub user_id: String,
    /// Lines, oldest first
    pub lines: Vec<CartLine>,
    /// Sum of line totals
    pub subtotal: f64,
    /// Total units
    pub item_count: i32,
}

impl Cart {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }
}

/// Loads a variant whose product is still on sale.
async fn sellable_variant<C>(conn: &C, variant_id: i64) -> Result<(variant::Model, product::Model)>
where
    C: ConnectionTrait,
{
    let variant = Variant::find_by_id(variant_id)
        .one(conn)
        .await?
        .ok_or(Error::VariantNotFound { id: variant_id })?;
    let product = Product::find_by_id(variant.product_id)
        .one(conn)
        .await?
        .filter(|p| !p.archived)
        .ok_or(Error::ProductNotFound {
            id: variant.product_id,
        })?;
    Ok((variant, product))
}

fn ensure_stock(variant: &variant::Model, requested: i32) -> Result<()> {
    if requested > variant.count_in_stock {
        return Err(Error::InsufficientStock {
            variant_id: variant.id,
            requested,
            available: variant.count_in_stock,
        });
    }
    Ok(())
}

/// Adds `quantity` units of a variant to the shopper's cart, merging with an existing line.
///
/// # Errors
/// Returns an error if:
/// - `quantity` is less than 1
/// - The variant does not exist or its product is archived
/// - The resulting line quantity exceeds the variant's stock
/// - A database operation fails
pub async fn add_to_cart(
    db: &DatabaseConnection,
    user_id: &str,
    variant_id: i64,
    quantity: i32,
) -> Result<cart_item::Model> {
    if quantity < 1 {
        return Err(Error::InvalidQuantity { quantity });
    }
    let (variant, product) = sellable_variant(db, variant_id).await?;

    let existing = CartItem::find()
        .filter(cart_item::Column::UserId.eq(user_id))
        .filter(cart_item::Column::VariantId.eq(variant_id))
        .one(db)
        .await?;

    if let Some(line) = existing {
        let new_quantity = line.quantity.saturating_add(quantity);
        ensure_stock(&variant, new_quantity)?;
        let mut active: cart_item::ActiveModel = line.into();
        active.quantity = Set(new_quantity);
        debug!(user_id, variant_id, new_quantity, "merged cart line");
        return active.update(db).await.map_err(Into::into);
    }

    ensure_stock(&variant, quantity)?;
    cart_item::ActiveModel {
        user_id: Set(user_id.to_string()),
        product_id: Set(product.id),
        variant_id: Set(variant_id),
        quantity: Set(quantity),
        added_at: Set(Utc::now()),
        ..Default::default()
    }
    .insert(db)
    .await
    .map_err(Into::into)
}

async fn owned_line(db: &DatabaseConnection, user_id: &str, item_id: i64) -> Result<cart_item::Model> {
    CartItem::find_by_id(item_id)
        .filter(cart_item::Column::UserId.eq(user_id))
        .one(db)
        .await?
        .ok_or(Error::CartItemNotFound { id: item_id })
}

/// Sets the quantity of one of the shopper's cart lines.
///
/// # Errors
/// Returns an error if the quantity is less than 1, the line does not belong to the shopper,
/// the variant is no longer sellable, stock is insufficient, or the update fails.
pub async fn update_cart_item(
    db: &DatabaseConnection,
    user_id: &str,
    item_id: i64,
    quantity: i32,
) -> Result<cart_item::Model> {
    if quantity < 1 {
        return Err(Error::InvalidQuantity { quantity });
    }
    let line = owned_line(db, user_id, item_id).await?;
    let (variant, _) = sellable_variant(db, line.variant_id).await?;
    ensure_stock(&variant, quantity)?;

    let mut active: cart_item::ActiveModel = line.into();
    active.quantity = Set(quantity);
    active.update(db).await.map_err(Into::into)
}

/// Removes one line from the shopper's cart.
///
/// # Errors
/// Returns an error if the line does not belong to the shopper or the delete fails.
pub async fn remove_cart_item(db: &DatabaseConnection, user_id: &str, item_id: i64) -> Result<()> {
    let result = CartItem::delete_many()
        .filter(cart_item::Column::Id.eq(item_id))
        .filter(cart_item::Column::UserId.eq(user_id))
        .exec(db)
        .await?;
    if result.rows_affected == 0 {
        return Err(Error::CartItemNotFound { id: item_id });
    }
    Ok(())
}

/// Empties the shopper's cart and returns the number of removed lines.
///
/// # Errors
/// Returns an error if the delete fails.
pub async fn clear_cart<C>(conn: &C, user_id: &str) -> Result<u64>
where
    C: ConnectionTrait,
{
    let result = CartItem::delete_many()
        .filter(cart_item::Column::UserId.eq(user_id))
        .exec(conn)
        .await?;
    Ok(result.rows_affected)
}

/// Loads the shopper's cart with current catalog prices.
///
/// Lines whose variant was removed or whose product was archived are left out of the
/// totals.
///
/// # Errors
/// Returns an error if a database query fails.
pub async fn get_cart(db: &DatabaseConnection, user_id: &str) -> Result<Cart> {
    let items = CartItem::find()
        .filter(cart_item::Column::UserId.eq(user_id))
        .order_by_asc(cart_item::Column::AddedAt)
        .order_by_asc(cart_item::Column::Id)
        .all(db)
        .await?;

    let variant_ids: Vec<i64> = items.iter().map(|i| i.variant_id).collect();
    let variants: HashMap<i64, variant::Model> = Variant::find()
        .filter(variant::Column::Id.is_in(variant_ids))
        .all(db)
        .await?
        .into_iter()
        .map(|v| (v.id, v))
        .collect();
    let product_ids: Vec<i64> = variants.values().map(|v| v.product_id).collect();
    let products: HashMap<i64, product::Model> = Product::find()
        .filter(product::Column::Id.is_in(product_ids))
        .filter(product::Column::Archived.eq(false))
        .all(db)
        .await?
        .into_iter()
        .map(|p| (p.id, p))
        .collect();

    let mut lines = Vec::with_capacity(items.len());
    for item in items {
        let Some(variant) = variants.get(&item.variant_id) else {
            warn!(item_id = item.id, "cart line references a missing variant");
            continue;
        };
        let Some(product) = products.get(&variant.product_id) else {
            warn!(item_id = item.id, "cart line references an unavailable product");
            continue;
        };
        let unit_price = variant.effective_price(product.price);
        lines.push(CartLine {
            item_id: item.id,
            product_id: product.id,
            variant_id: variant.id,
            name: product.name.clone(),
            size: variant.size.clone(),
            color: variant.color.clone(),
            sku: variant.sku.clone(),
            quantity: item.quantity,
            unit_price,
            line_total: round_money(unit_price * f64::from(item.quantity)),
            available_stock: variant.count_in_stock,
        });
    }

    let subtotal = round_money(lines.iter().map(|l| l.line_total).sum());
    let item_count = lines.iter().map(|l| l.quantity).sum();
    Ok(Cart {
        user_id: user_id.to_string(),
        lines,
        subtotal,
        item_count,
    })
}
