//! Product business logic - Handles catalog operations.
//!
//! This module provides functions for creating, retrieving, updating, archiving and
//! re-pricing products and their size/color variants. Stock totals are computed on read
//! by summing the variants. Admin mutations write audit rows in the same database
//! transaction as the change itself; initial variant stock is recorded in the inventory log.

use crate::{
    core::{
        audit::AuditLogger,
        inventory::{StockChange, apply_stock_change},
    },
    entities::{
        AdjustmentType, AuditAction, PriceChange, Product, Variant, price_change, product,
        variant,
    },
    errors::{Error, Result},
};
use chrono::Utc;
use sea_orm::{QueryOrder, Set, TransactionTrait, prelude::*};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};
use std::collections::{HashMap, HashSet};
use tracing::{info, instrument};

/// Input for one variant of a new or existing product.
#[derive(Debug, Clone, Deserialize)]
pub struct NewVariant {
    /// Variant size
    pub size: String,
    /// Variant color
    pub color: String,
    /// Initial stock
    #[serde(default)]
    pub count_in_stock: i32,
    /// Overrides the product price
    pub price: Option<f64>,
    /// Generated from product name, size and color when omitted
    pub sku: Option<String>,
}

/// Input for [`create_product`].
#[derive(Debug, Clone, Deserialize)]
pub struct NewProduct {
    /// Product name
    pub name: String,
    /// Long description
    #[serde(default)]
    pub description: String,
    /// Category name
    #[serde(default)]
    pub category: String,
    /// Base price for every variant without its own
    pub price: f64,
    /// Image URLs
    #[serde(default)]
    pub images: Vec<String>,
    /// Shown on the storefront front page
    #[serde(default)]
    pub is_featured: bool,
    /// Variants created with the product
    pub variants: Vec<NewVariant>,
}

/// Partial update for [`update_product`]. Absent fields are left untouched.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProductPatch {
    /// Product name
    pub name: Option<String>,
    /// Long description
    pub description: Option<String>,
    /// Category name
    pub category: Option<String>,
    /// Image URLs
    pub images: Option<Vec<String>>,
    /// Shown on the storefront front page
    pub is_featured: Option<bool>,
    /// New base price, recorded in the price history
    pub price: Option<f64>,
}

/// Partial update for [`update_variant`]. Stock is changed through inventory adjustments.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct VariantPatch {
    /// Variant size
    pub size: Option<String>,
    /// Variant color
    pub color: Option<String>,
    /// Variant price override
    pub price: Option<f64>,
    /// Stock keeping unit
    pub sku: Option<String>,
}

/// Storefront listing filters.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProductFilter {
    /// Only this category
    pub category: Option<String>,
    /// Only featured (or non-featured) products
    pub featured: Option<bool>,
    /// Case-insensitive substring of the product name
    pub search: Option<String>,
    /// Also list archived products
    #[serde(default)]
    pub include_archived: bool,
}

/// A product together with its variants and computed stock total.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProductDetails {
    /// Product row
    #[serde(flatten)]
    pub product: product::Model,
    /// All variants, oldest first
    pub variants: Vec<variant::Model>,
    /// Units on hand across variants
    pub total_stock: i64,
}

impl ProductDetails {
    fn new(product: product::Model, variants: Vec<variant::Model>) -> Self {
        let total_stock = total_stock(&variants);
        Self {
            product,
            variants,
            total_stock,
        }
    }
}

/// Sums the stock of all variants.
#[must_use]
pub fn total_stock(variants: &[variant::Model]) -> i64 {
    variants.iter().map(|v| i64::from(v.count_in_stock)).sum()
}

/// Builds the default SKU for a variant, e.g. `LINEN-SHIRT-M-NAVY`.
#[must_use]
pub fn default_sku(product_name: &str, size: &str, color: &str) -> String {
    [product_name, size, color]
        .iter()
        .map(|part| {
            part.split_whitespace()
                .collect::<Vec<_>>()
                .join("-")
                .to_uppercase()
        })
        .collect::<Vec<_>>()
        .join("-")
}

fn validate_price(price: f64) -> Result<()> {
    if !price.is_finite() || price < 0.0 {
        return Err(Error::InvalidAmount { amount: price });
    }
    Ok(())
}

fn validate_name(name: &str) -> Result<()> {
    if name.trim().is_empty() {
        return Err(Error::validation("Product name cannot be empty"));
    }
    Ok(())
}

fn validate_variant(variant: &NewVariant) -> Result<()> {
    if variant.size.trim().is_empty() || variant.color.trim().is_empty() {
        return Err(Error::validation("Variant size and color are required"));
    }
    if variant.count_in_stock < 0 {
        return Err(Error::InvalidQuantity {
            quantity: variant.count_in_stock,
        });
    }
    if let Some(price) = variant.price {
        validate_price(price)?;
    }
    Ok(())
}

/// Fails with `Conflict` if any of `skus` is already used by another variant.
async fn ensure_skus_available<C>(conn: &C, skus: &[String], except: Option<i64>) -> Result<()>
where
    C: ConnectionTrait,
{
    let mut query = Variant::find().filter(variant::Column::Sku.is_in(skus.iter().cloned()));
    if let Some(id) = except {
        query = query.filter(variant::Column::Id.ne(id));
    }
    if let Some(taken) = query.one(conn).await? {
        return Err(Error::conflict(format!("SKU {} is already in use", taken.sku)));
    }
    Ok(())
}

async fn insert_variant<C>(
    conn: &C,
    admin_id: &str,
    product_id: i64,
    new_variant: NewVariant,
    sku: String,
) -> Result<variant::Model>
where
    C: ConnectionTrait,
{
    let initial_stock = new_variant.count_in_stock;
    let inserted = variant::ActiveModel {
        product_id: Set(product_id),
        size: Set(new_variant.size.trim().to_string()),
        color: Set(new_variant.color.trim().to_string()),
        count_in_stock: Set(0),
        price: Set(new_variant.price),
        sku: Set(sku),
        ..Default::default()
    }
    .insert(conn)
    .await?;

    if initial_stock == 0 {
        return Ok(inserted);
    }
    let (stocked, _) = apply_stock_change(
        conn,
        inserted,
        StockChange {
            kind: AdjustmentType::Restock,
            quantity: initial_stock,
            new_stock: initial_stock,
            reason: "initial stock".to_string(),
            admin_id: Some(admin_id.to_string()),
            order_id: None,
        },
    )
    .await?;
    Ok(stocked)
}

/// Creates a product with its variants.
///
/// # Errors
/// Returns an error if:
/// - The name is empty or the price is negative or not finite
/// - No variants are given, or a variant is invalid
/// - Two variants share a SKU or a SKU is already in use
/// - A database operation fails
#[instrument(skip(db, new_product), fields(name = %new_product.name))]
pub async fn create_product(
    db: &DatabaseConnection,
    admin_id: &str,
    new_product: NewProduct,
) -> Result<ProductDetails> {
    validate_name(&new_product.name)?;
    validate_price(new_product.price)?;
    if new_product.variants.is_empty() {
        return Err(Error::validation("A product needs at least one variant"));
    }
    for v in &new_product.variants {
        validate_variant(v)?;
    }

    let name = new_product.name.trim().to_string();
    let skus: Vec<String> = new_product
        .variants
        .iter()
        .map(|v| {
            v.sku
                .as_deref()
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map_or_else(|| default_sku(&name, &v.size, &v.color), str::to_string)
        })
        .collect();
    let mut seen = HashSet::new();
    if let Some(dup) = skus.iter().find(|sku| !seen.insert(sku.as_str())) {
        return Err(Error::conflict(format!("Duplicate SKU {dup} in request")));
    }

    let txn = db.begin().await?;
    ensure_skus_available(&txn, &skus, None).await?;

    let now = Utc::now();
    let product = product::ActiveModel {
        name: Set(name),
        description: Set(new_product.description),
        category: Set(new_product.category.trim().to_string()),
        price: Set(new_product.price),
        images: Set(json!(new_product.images)),
        is_featured: Set(new_product.is_featured),
        archived: Set(false),
        count_in_stock: Set(0),
        created_at: Set(now),
        updated_at: Set(now),
        ..Default::default()
    }
    .insert(&txn)
    .await?;

    let mut variants = Vec::with_capacity(new_product.variants.len());
    for (new_variant, sku) in new_product.variants.into_iter().zip(skus) {
        variants.push(insert_variant(&txn, admin_id, product.id, new_variant, sku).await?);
    }

    AuditLogger::log(
        &txn,
        admin_id,
        AuditAction::ProductCreated,
        "product",
        product.id,
        json!({
            "name": product.name,
            "price": product.price,
            "variants": variants.iter().map(|v| &v.sku).collect::<Vec<_>>(),
        }),
    )
    .await?;

    txn.commit().await?;
    info!(product_id = product.id, "Created product '{}'", product.name);
    Ok(ProductDetails::new(product, variants))
}

async fn load_variants<C>(conn: &C, product_id: i64) -> Result<Vec<variant::Model>>
where
    C: ConnectionTrait,
{
    Variant::find()
        .filter(variant::Column::ProductId.eq(product_id))
        .order_by_asc(variant::Column::Id)
        .all(conn)
        .await
        .map_err(Into::into)
}

/// Retrieves a product with its variants.
///
/// Archived products are reported as not found unless `include_archived` is set.
///
/// # Errors
/// Returns an error if the product does not exist or the query fails.
pub async fn get_product(
    db: &DatabaseConnection,
    product_id: i64,
    include_archived: bool,
) -> Result<ProductDetails> {
    let product = Product::find_by_id(product_id)
        .one(db)
        .await?
        .filter(|p| include_archived || !p.archived)
        .ok_or(Error::ProductNotFound { id: product_id })?;
    let variants = load_variants(db, product_id).await?;
    Ok(ProductDetails::new(product, variants))
}

/// Lists products matching `filter`, ordered by name.
///
/// # Errors
/// Returns an error if the database query fails.
pub async fn list_products(
    db: &DatabaseConnection,
    filter: &ProductFilter,
) -> Result<Vec<ProductDetails>> {
    let mut query = Product::find();
    if !filter.include_archived {
        query = query.filter(product::Column::Archived.eq(false));
    }
    if let Some(category) = filter.category.as_deref().filter(|c| !c.is_empty()) {
        query = query.filter(product::Column::Category.eq(category));
    }
    if let Some(featured) = filter.featured {
        query = query.filter(product::Column::IsFeatured.eq(featured));
    }
    if let Some(search) = filter.search.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
        query = query.filter(product::Column::Name.contains(search));
    }
    let products = query
        .order_by_asc(product::Column::Name)
        .order_by_asc(product::Column::Id)
        .all(db)
        .await?;

    let ids: Vec<i64> = products.iter().map(|p| p.id).collect();
    let mut by_product: HashMap<i64, Vec<variant::Model>> = HashMap::new();
    for v in Variant::find()
        .filter(variant::Column::ProductId.is_in(ids))
        .order_by_asc(variant::Column::Id)
        .all(db)
        .await?
    {
        by_product.entry(v.product_id).or_default().push(v);
    }

    Ok(products
        .into_iter()
        .map(|p| {
            let variants = by_product.remove(&p.id).unwrap_or_default();
            ProductDetails::new(p, variants)
        })
        .collect())
}

/// Lists featured, non-archived products.
///
/// # Errors
/// Returns an error if the database query fails.
pub async fn featured_products(db: &DatabaseConnection) -> Result<Vec<ProductDetails>> {
    list_products(
        db,
        &ProductFilter {
            featured: Some(true),
            ..Default::default()
        },
    )
    .await
}

fn record_change<T: Serialize>(changes: &mut Map<String, Value>, field: &str, from: T, to: T) {
    changes.insert(field.to_string(), json!({ "from": from, "to": to }));
}

/// Applies a partial update to a product.
///
/// A price change appends a row to the price history and a `price_changed` audit row;
/// any other changed fields are recorded in one `product_updated` audit row.
///
/// # Errors
/// Returns an error if:
/// - A patched name is empty or a patched price is invalid
/// - The product does not exist
/// - A database operation fails
#[instrument(skip(db, patch))]
pub async fn update_product(
    db: &DatabaseConnection,
    admin_id: &str,
    product_id: i64,
    patch: ProductPatch,
) -> Result<ProductDetails> {
    if let Some(name) = &patch.name {
        validate_name(name)?;
    }
    if let Some(price) = patch.price {
        validate_price(price)?;
    }

    let txn = db.begin().await?;
    let existing = Product::find_by_id(product_id)
        .one(&txn)
        .await?
        .ok_or(Error::ProductNotFound { id: product_id })?;

    let mut changes = Map::new();
    let mut active: product::ActiveModel = existing.clone().into();

    if let Some(name) = patch.name.map(|n| n.trim().to_string()) {
        if name != existing.name {
            record_change(&mut changes, "name", existing.name.as_str(), name.as_str());
            active.name = Set(name);
        }
    }
    if let Some(description) = patch.description {
        if description != existing.description {
            record_change(&mut changes, "description", &existing.description, &description);
            active.description = Set(description);
        }
    }
    if let Some(category) = patch.category.map(|c| c.trim().to_string()) {
        if category != existing.category {
            record_change(&mut changes, "category", existing.category.as_str(), category.as_str());
            active.category = Set(category);
        }
    }
    if let Some(images) = patch.images {
        let images = json!(images);
        if images != existing.images {
            record_change(&mut changes, "images", &existing.images, &images);
            active.images = Set(images);
        }
    }
    if let Some(featured) = patch.is_featured {
        if featured != existing.is_featured {
            record_change(&mut changes, "is_featured", existing.is_featured, featured);
            active.is_featured = Set(featured);
        }
    }
    let price_change = patch
        .price
        .filter(|p| (p - existing.price).abs() > f64::EPSILON);
    if let Some(new_price) = price_change {
        active.price = Set(new_price);
    }

    if changes.is_empty() && price_change.is_none() {
        txn.commit().await?;
        let variants = load_variants(db, product_id).await?;
        return Ok(ProductDetails::new(existing, variants));
    }

    let now = Utc::now();
    active.updated_at = Set(now);
    let updated = active.update(&txn).await?;

    if let Some(new_price) = price_change {
        price_change::ActiveModel {
            product_id: Set(product_id),
            old_price: Set(existing.price),
            new_price: Set(new_price),
            changed_by: Set(admin_id.to_string()),
            changed_at: Set(now),
            ..Default::default()
        }
        .insert(&txn)
        .await?;
        AuditLogger::log(
            &txn,
            admin_id,
            AuditAction::PriceChanged,
            "product",
            product_id,
            json!({ "old_price": existing.price, "new_price": new_price }),
        )
        .await?;
    }
    if !changes.is_empty() {
        AuditLogger::log(
            &txn,
            admin_id,
            AuditAction::ProductUpdated,
            "product",
            product_id,
            Value::Object(changes),
        )
        .await?;
    }

    let variants = load_variants(&txn, product_id).await?;
    txn.commit().await?;
    Ok(ProductDetails::new(updated, variants))
}

async fn set_archived(
    db: &DatabaseConnection,
    admin_id: &str,
    product_id: i64,
    archived: bool,
) -> Result<product::Model> {
    let txn = db.begin().await?;
    let existing = Product::find_by_id(product_id)
        .one(&txn)
        .await?
        .ok_or(Error::ProductNotFound { id: product_id })?;

    if existing.archived == archived {
        let state = if archived { "archived" } else { "active" };
        return Err(Error::conflict(format!(
            "Product {product_id} is already {state}"
        )));
    }

    let mut active: product::ActiveModel = existing.into();
    active.archived = Set(archived);
    active.updated_at = Set(Utc::now());
    let updated = active.update(&txn).await?;

    let action = if archived {
        AuditAction::ProductArchived
    } else {
        AuditAction::ProductRestored
    };
    AuditLogger::log(
        &txn,
        admin_id,
        action,
        "product",
        product_id,
        json!({ "name": updated.name }),
    )
    .await?;

    txn.commit().await?;
    info!(product_id, archived, "Product archive flag changed");
    Ok(updated)
}

/// Soft deletes a product, hiding it from the storefront while preserving order history.
///
/// # Errors
/// Returns an error if the product does not exist, is already archived, or the update fails.
pub async fn archive_product(
    db: &DatabaseConnection,
    admin_id: &str,
    product_id: i64,
) -> Result<product::Model> {
    set_archived(db, admin_id, product_id, true).await
}

/// Makes an archived product visible again.
///
/// # Errors
/// Returns an error if the product does not exist, is not archived, or the update fails.
pub async fn restore_product(
    db: &DatabaseConnection,
    admin_id: &str,
    product_id: i64,
) -> Result<product::Model> {
    set_archived(db, admin_id, product_id, false).await
}

/// Returns the price history of a product, newest first.
///
/// # Errors
/// Returns an error if the product does not exist or the query fails.
pub async fn price_history(
    db: &DatabaseConnection,
    product_id: i64,
) -> Result<Vec<price_change::Model>> {
    Product::find_by_id(product_id)
        .one(db)
        .await?
        .ok_or(Error::ProductNotFound { id: product_id })?;

    PriceChange::find()
        .filter(price_change::Column::ProductId.eq(product_id))
        .order_by_desc(price_change::Column::ChangedAt)
        .order_by_desc(price_change::Column::Id)
        .all(db)
        .await
        .map_err(Into::into)
}

/// Adds a variant to an existing product.
///
/// # Errors
/// Returns an error if the variant is invalid, the product does not exist,
/// the SKU is taken, or a database operation fails.
#[instrument(skip(db, new_variant))]
pub async fn add_variant(
    db: &DatabaseConnection,
    admin_id: &str,
    product_id: i64,
    new_variant: NewVariant,
) -> Result<variant::Model> {
    validate_variant(&new_variant)?;

    let txn = db.begin().await?;
    let product = Product::find_by_id(product_id)
        .one(&txn)
        .await?
        .ok_or(Error::ProductNotFound { id: product_id })?;

    let sku = new_variant
        .sku
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map_or_else(
            || default_sku(&product.name, &new_variant.size, &new_variant.color),
            str::to_string,
        );
    ensure_skus_available(&txn, std::slice::from_ref(&sku), None).await?;

    let inserted = insert_variant(&txn, admin_id, product_id, new_variant, sku).await?;
    AuditLogger::log(
        &txn,
        admin_id,
        AuditAction::VariantAdded,
        "product",
        product_id,
        json!({
            "variant_id": inserted.id,
            "sku": inserted.sku,
            "size": inserted.size,
            "color": inserted.color,
            "count_in_stock": inserted.count_in_stock,
        }),
    )
    .await?;

    txn.commit().await?;
    Ok(inserted)
}

/// Updates a variant's size, color, price override or SKU.
///
/// # Errors
/// Returns an error if a patched field is invalid, the variant does not exist,
/// the new SKU is taken, or a database operation fails.
pub async fn update_variant(
    db: &DatabaseConnection,
    admin_id: &str,
    variant_id: i64,
    patch: VariantPatch,
) -> Result<variant::Model> {
    if let Some(price) = patch.price {
        validate_price(price)?;
    }
    for field in [&patch.size, &patch.color, &patch.sku].into_iter().flatten() {
        if field.trim().is_empty() {
            return Err(Error::validation("Variant fields cannot be empty"));
        }
    }

    let txn = db.begin().await?;
    let existing = Variant::find_by_id(variant_id)
        .one(&txn)
        .await?
        .ok_or(Error::VariantNotFound { id: variant_id })?;

    let mut changes = Map::new();
    let mut active: variant::ActiveModel = existing.clone().into();
    if let Some(size) = patch.size.map(|s| s.trim().to_string()) {
        if size != existing.size {
            record_change(&mut changes, "size", existing.size.as_str(), size.as_str());
            active.size = Set(size);
        }
    }
    if let Some(color) = patch.color.map(|c| c.trim().to_string()) {
        if color != existing.color {
            record_change(&mut changes, "color", existing.color.as_str(), color.as_str());
            active.color = Set(color);
        }
    }
    if let Some(price) = patch.price {
        if existing.price != Some(price) {
            record_change(&mut changes, "price", existing.price, Some(price));
            active.price = Set(Some(price));
        }
    }
    if let Some(sku) = patch.sku.map(|s| s.trim().to_string()) {
        if sku != existing.sku {
            ensure_skus_available(&txn, std::slice::from_ref(&sku), Some(variant_id)).await?;
            record_change(&mut changes, "sku", existing.sku.as_str(), sku.as_str());
            active.sku = Set(sku);
        }
    }

    if changes.is_empty() {
        txn.commit().await?;
        return Ok(existing);
    }

    let updated = active.update(&txn).await?;
    AuditLogger::log(
        &txn,
        admin_id,
        AuditAction::VariantUpdated,
        "variant",
        variant_id,
        Value::Object(changes),
    )
    .await?;
    txn.commit().await?;
    Ok(updated)
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    #![allow(clippy::float_cmp)]
    use super::*;
    use crate::core::audit::{AuditFilter, list_audit_logs};
    use crate::core::inventory::{InventoryLogFilter, inventory_logs};
    use crate::test_utils::*;
    use sea_orm::{DatabaseBackend, MockDatabase};

    fn shirt(variants: Vec<NewVariant>) -> NewProduct {
        NewProduct {
            name: "Linen Shirt".to_string(),
            description: "Breathable".to_string(),
            category: "tops".to_string(),
            price: 49.0,
            images: vec!["https://cdn.example/shirt.jpg".to_string()],
            is_featured: false,
            variants,
        }
    }

    fn variant(size: &str, color: &str, stock: i32) -> NewVariant {
        NewVariant {
            size: size.to_string(),
            color: color.to_string(),
            count_in_stock: stock,
            price: None,
            sku: None,
        }
    }

    #[test]
    fn test_default_sku() {
        assert_eq!(default_sku("Linen Shirt", "M", "navy"), "LINEN-SHIRT-M-NAVY");
        assert_eq!(default_sku(" Cap ", "one size", "red"), "CAP-ONE-SIZE-RED");
    }

    #[tokio::test]
    async fn test_create_product_validation() -> Result<()> {
        let db = MockDatabase::new(DatabaseBackend::Sqlite).into_connection();

        let mut empty_name = shirt(vec![variant("M", "navy", 1)]);
        empty_name.name = "   ".to_string();
        let result = create_product(&db, "admin", empty_name).await;
        assert!(matches!(result.unwrap_err(), Error::Validation { message: _ }));

        let mut negative = shirt(vec![variant("M", "navy", 1)]);
        negative.price = -1.0;
        let result = create_product(&db, "admin", negative).await;
        assert!(matches!(
            result.unwrap_err(),
            Error::InvalidAmount { amount: -1.0 }
        ));

        let mut nan = shirt(vec![variant("M", "navy", 1)]);
        nan.price = f64::NAN;
        let result = create_product(&db, "admin", nan).await;
        assert!(matches!(result.unwrap_err(), Error::InvalidAmount { amount: _ }));

        let result = create_product(&db, "admin", shirt(vec![])).await;
        assert!(matches!(result.unwrap_err(), Error::Validation { message: _ }));

        let result = create_product(&db, "admin", shirt(vec![variant("M", "navy", -2)])).await;
        assert!(matches!(
            result.unwrap_err(),
            Error::InvalidQuantity { quantity: -2 }
        ));

        let result = create_product(
            &db,
            "admin",
            shirt(vec![variant("M", "navy", 1), variant("M", "navy", 3)]),
        )
        .await;
        assert!(matches!(result.unwrap_err(), Error::Conflict { message: _ }));

        Ok(())
    }

    #[tokio::test]
    async fn test_create_product_integration() -> Result<()> {
        init_test_tracing();
        let db = setup_test_db().await?;

        let created = create_product(
            &db,
            "admin-1",
            shirt(vec![variant("M", "navy", 4), variant("L", "navy", 6)]),
        )
        .await?;

        assert_eq!(created.product.name, "Linen Shirt");
        assert_eq!(created.product.count_in_stock, 0);
        assert_eq!(created.variants.len(), 2);
        assert_eq!(created.total_stock, 10);
        assert_eq!(created.variants[0].sku, "LINEN-SHIRT-M-NAVY");
        assert_eq!(
            created.product.image_urls(),
            vec!["https://cdn.example/shirt.jpg"]
        );

        let logs = inventory_logs(
            &db,
            &InventoryLogFilter {
                product_id: Some(created.product.id),
                ..Default::default()
            },
        )
        .await?;
        assert_eq!(logs.len(), 2);
        assert!(logs.iter().all(|l| l.adjustment_type == AdjustmentType::Restock));

        let audits = list_audit_logs(&db, &AuditFilter::default()).await?;
        assert_eq!(audits.len(), 1);
        assert_eq!(audits[0].action, AuditAction::ProductCreated);
        assert_eq!(audits[0].entity_id, created.product.id.to_string());

        // SKU collision with an existing product
        let again = create_product(&db, "admin-1", shirt(vec![variant("M", "navy", 1)])).await;
        assert!(matches!(again.unwrap_err(), Error::Conflict { message: _ }));

        Ok(())
    }

    #[tokio::test]
    async fn test_archive_hides_from_storefront() -> Result<()> {
        let db = setup_test_db().await?;
        let tee = create_test_product(&db, "Tee", 20.0, &[("M", "black", 3)]).await?;
        create_test_product(&db, "Hoodie", 60.0, &[("L", "grey", 2)]).await?;

        archive_product(&db, "admin", tee.product.id).await?;

        let listed = list_products(&db, &ProductFilter::default()).await?;
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].product.name, "Hoodie");

        let hidden = get_product(&db, tee.product.id, false).await;
        assert!(matches!(hidden.unwrap_err(), Error::ProductNotFound { id: _ }));
        let visible_to_admin = get_product(&db, tee.product.id, true).await?;
        assert!(visible_to_admin.product.archived);

        let twice = archive_product(&db, "admin", tee.product.id).await;
        assert!(matches!(twice.unwrap_err(), Error::Conflict { message: _ }));

        let restored = restore_product(&db, "admin", tee.product.id).await?;
        assert!(!restored.archived);
        assert_eq!(list_products(&db, &ProductFilter::default()).await?.len(), 2);

        Ok(())
    }

    #[tokio::test]
    async fn test_list_products_filters() -> Result<()> {
        let db = setup_test_db().await?;
        let mut featured = shirt(vec![variant("M", "navy", 1)]);
        featured.is_featured = true;
        create_product(&db, "admin", featured).await?;
        create_test_product(&db, "Wool Socks", 9.0, &[("OS", "grey", 10)]).await?;

        let found = list_products(
            &db,
            &ProductFilter {
                search: Some("linen".to_string()),
                ..Default::default()
            },
        )
        .await?;
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].product.name, "Linen Shirt");

        let tops = list_products(
            &db,
            &ProductFilter {
                category: Some("tops".to_string()),
                ..Default::default()
            },
        )
        .await?;
        assert_eq!(tops.len(), 1);

        let featured = featured_products(&db).await?;
        assert_eq!(featured.len(), 1);
        assert!(featured[0].product.is_featured);

        let all = list_products(&db, &ProductFilter::default()).await?;
        assert_eq!(all[0].product.name, "Linen Shirt");
        assert_eq!(all[1].total_stock, 10);

        Ok(())
    }

    #[tokio::test]
    async fn test_update_product_records_price_history() -> Result<()> {
        let db = setup_test_db().await?;
        let tee = create_test_product(&db, "Tee", 20.0, &[("M", "black", 3)]).await?;

        let updated = update_product(
            &db,
            "admin-7",
            tee.product.id,
            ProductPatch {
                name: Some("Heavy Tee".to_string()),
                price: Some(25.0),
                ..Default::default()
            },
        )
        .await?;
        assert_eq!(updated.product.name, "Heavy Tee");
        assert_eq!(updated.product.price, 25.0);
        assert_eq!(updated.total_stock, 3);

        let history = price_history(&db, tee.product.id).await?;
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].old_price, 20.0);
        assert_eq!(history[0].new_price, 25.0);
        assert_eq!(history[0].changed_by, "admin-7");

        let audits = list_audit_logs(
            &db,
            &AuditFilter {
                entity_type: Some("product".to_string()),
                ..Default::default()
            },
        )
        .await?;
        let actions: Vec<_> = audits.iter().map(|a| a.action).collect();
        assert!(actions.contains(&AuditAction::PriceChanged));
        assert!(actions.contains(&AuditAction::ProductUpdated));

        // Same price again records nothing new
        update_product(
            &db,
            "admin-7",
            tee.product.id,
            ProductPatch {
                price: Some(25.0),
                ..Default::default()
            },
        )
        .await?;
        assert_eq!(price_history(&db, tee.product.id).await?.len(), 1);

        Ok(())
    }

    #[tokio::test]
    async fn test_update_missing_product() -> Result<()> {
        let db = setup_test_db().await?;
        let result = update_product(&db, "admin", 42, ProductPatch::default()).await;
        assert!(matches!(result.unwrap_err(), Error::ProductNotFound { id: 42 }));
        Ok(())
    }

    #[tokio::test]
    async fn test_add_and_update_variant() -> Result<()> {
        let db = setup_test_db().await?;
        let tee = create_test_product(&db, "Tee", 20.0, &[("M", "black", 3)]).await?;

        let added = add_variant(
            &db,
            "admin",
            tee.product.id,
            NewVariant {
                size: "XL".to_string(),
                color: "black".to_string(),
                count_in_stock: 2,
                price: Some(22.0),
                sku: None,
            },
        )
        .await?;
        assert_eq!(added.sku, "TEE-XL-BLACK");
        assert_eq!(added.count_in_stock, 2);
        assert_eq!(added.effective_price(20.0), 22.0);

        let details = get_product(&db, tee.product.id, false).await?;
        assert_eq!(details.total_stock, 5);

        let conflict = update_variant(
            &db,
            "admin",
            added.id,
            VariantPatch {
                sku: Some(tee.variants[0].sku.clone()),
                ..Default::default()
            },
        )
        .await;
        assert!(matches!(conflict.unwrap_err(), Error::Conflict { message: _ }));

        let renamed = update_variant(
            &db,
            "admin",
            added.id,
            VariantPatch {
                color: Some("white".to_string()),
                ..Default::default()
            },
        )
        .await?;
        assert_eq!(renamed.color, "white");

        Ok(())
    }
}
