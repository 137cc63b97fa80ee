//! Inventory business logic - variant stock adjustments and their log.
//!
//! Stock lives on variants only. Every mutation writes one `inventory_logs` row with the
//! old and new count. Decrements clamp at zero instead of failing.

use crate::{
    core::audit::AuditLogger,
    entities::{
        AdjustmentType, AuditAction, InventoryLog, Product, Variant, inventory_log, product,
        variant,
    },
    errors::{Error, Result},
};
use chrono::Utc;
use sea_orm::{QueryOrder, QuerySelect, Set, TransactionTrait, prelude::*};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{info, instrument};

/// Default number of rows returned by [`inventory_logs`].
pub const DEFAULT_LOG_LIMIT: u64 = 200;

/// A manual stock change requested by an admin.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", content = "quantity", rename_all = "snake_case")]
pub enum Adjustment {
    /// Overwrite the count
    Set(i32),
    /// Add units
    Increase(i32),
    /// Remove units, clamping at zero
    Decrease(i32),
}

impl Adjustment {
    /// Rejects negative targets and non-positive deltas.
    ///
    /// # Errors
    /// Returns `Error::InvalidQuantity` for an unusable quantity.
    pub fn validate(self) -> Result<()> {
        match self {
            Self::Set(n) if n < 0 => Err(Error::InvalidQuantity { quantity: n }),
            Self::Increase(n) | Self::Decrease(n) if n <= 0 => {
                Err(Error::InvalidQuantity { quantity: n })
            }
            _ => Ok(()),
        }
    }

    /// Stock count after applying this adjustment to `current`.
    #[must_use]
    pub fn apply(self, current: i32) -> i32 {
        match self {
            Self::Set(n) => n,
            Self::Increase(n) => current.saturating_add(n),
            Self::Decrease(n) => clamp_decrement(current, n),
        }
    }

    #[must_use]
    pub const fn adjustment_type(self) -> AdjustmentType {
        match self {
            Self::Set(_) => AdjustmentType::ManualSet,
            Self::Increase(_) => AdjustmentType::Restock,
            Self::Decrease(_) => AdjustmentType::Decrement,
        }
    }

    #[must_use]
    pub const fn quantity(self) -> i32 {
        match self {
            Self::Set(n) | Self::Increase(n) | Self::Decrease(n) => n,
        }
    }
}

/// Subtracts `by` from `current` without going below zero.
#[must_use]
pub fn clamp_decrement(current: i32, by: i32) -> i32 {
    current.saturating_sub(by).max(0)
}

/// A stock mutation to persist together with its log row.
#[derive(Debug, Clone)]
pub(crate) struct StockChange {
    pub(crate) kind: AdjustmentType,
    pub(crate) quantity: i32,
    pub(crate) new_stock: i32,
    pub(crate) reason: String,
    pub(crate) admin_id: Option<String>,
    pub(crate) order_id: Option<i64>,
}

/// Writes a variant's new stock count and the matching inventory log row.
///
/// Runs on the caller's connection so it can join an open transaction.
pub(crate) async fn apply_stock_change<C>(
    conn: &C,
    variant: variant::Model,
    change: StockChange,
) -> Result<(variant::Model, inventory_log::Model)>
where
    C: ConnectionTrait,
{
    let old_stock = variant.count_in_stock;
    let product_id = variant.product_id;
    let variant_id = variant.id;

    let mut active: variant::ActiveModel = variant.into();
    active.count_in_stock = Set(change.new_stock);
    let updated = active.update(conn).await?;

    let log = inventory_log::ActiveModel {
        product_id: Set(product_id),
        variant_id: Set(variant_id),
        adjustment_type: Set(change.kind),
        quantity: Set(change.quantity),
        old_stock: Set(old_stock),
        new_stock: Set(change.new_stock),
        reason: Set(change.reason),
        admin_id: Set(change.admin_id),
        order_id: Set(change.order_id),
        created_at: Set(Utc::now()),
        ..Default::default()
    }
    .insert(conn)
    .await?;

    info!(
        variant_id,
        old_stock,
        new_stock = change.new_stock,
        kind = ?change.kind,
        "variant stock changed"
    );
    Ok((updated, log))
}

/// Result of a manual stock adjustment.
#[derive(Debug, Clone, Serialize)]
pub struct StockAdjustment {
    /// Variant after the change
    pub variant: variant::Model,
    /// Inventory log row written
    pub log: inventory_log::Model,
}

/// Applies a manual stock adjustment to one variant.
///
/// The stock update, the inventory log row and the `stock_adjusted` audit row commit
/// together.
///
/// # Errors
/// Returns an error if:
/// - The adjustment quantity is invalid
/// - The variant does not exist
/// - A database operation fails
#[instrument(skip(db))]
pub async fn adjust_variant_stock(
    db: &DatabaseConnection,
    admin_id: &str,
    variant_id: i64,
    adjustment: Adjustment,
    reason: &str,
) -> Result<StockAdjustment> {
    adjustment.validate()?;
    let reason = if reason.trim().is_empty() {
        "manual adjustment".to_string()
    } else {
        reason.trim().to_string()
    };

    let txn = db.begin().await?;

    let variant = Variant::find_by_id(variant_id)
        .one(&txn)
        .await?
        .ok_or(Error::VariantNotFound { id: variant_id })?;
    let old_stock = variant.count_in_stock;
    let new_stock = adjustment.apply(old_stock);
    let sku = variant.sku.clone();

    let (variant, log) = apply_stock_change(
        &txn,
        variant,
        StockChange {
            kind: adjustment.adjustment_type(),
            quantity: adjustment.quantity(),
            new_stock,
            reason: reason.clone(),
            admin_id: Some(admin_id.to_string()),
            order_id: None,
        },
    )
    .await?;

    AuditLogger::log(
        &txn,
        admin_id,
        AuditAction::StockAdjusted,
        "variant",
        variant_id,
        json!({
            "sku": sku,
            "adjustment": adjustment,
            "old_stock": old_stock,
            "new_stock": new_stock,
            "reason": reason,
        }),
    )
    .await?;

    txn.commit().await?;
    Ok(StockAdjustment { variant, log })
}

/// Filters for [`inventory_logs`].
#[derive(Debug, Clone, Default, Deserialize)]
pub struct InventoryLogFilter {
    /// Only this product
    pub product_id: Option<i64>,
    /// Only this variant
    pub variant_id: Option<i64>,
    /// Only this kind of change
    pub adjustment_type: Option<AdjustmentType>,
    /// Only changes caused by this order
    pub order_id: Option<i64>,
    /// Maximum rows, newest first
    pub limit: Option<u64>,
}

/// Lists inventory log rows, newest first.
///
/// # Errors
/// Returns an error if the database query fails.
pub async fn inventory_logs(
    db: &DatabaseConnection,
    filter: &InventoryLogFilter,
) -> Result<Vec<inventory_log::Model>> {
    let mut query = InventoryLog::find();
    if let Some(product_id) = filter.product_id {
        query = query.filter(inventory_log::Column::ProductId.eq(product_id));
    }
    if let Some(variant_id) = filter.variant_id {
        query = query.filter(inventory_log::Column::VariantId.eq(variant_id));
    }
    if let Some(kind) = filter.adjustment_type {
        query = query.filter(inventory_log::Column::AdjustmentType.eq(kind));
    }
    if let Some(order_id) = filter.order_id {
        query = query.filter(inventory_log::Column::OrderId.eq(order_id));
    }
    query
        .order_by_desc(inventory_log::Column::CreatedAt)
        .order_by_desc(inventory_log::Column::Id)
        .limit(filter.limit.unwrap_or(DEFAULT_LOG_LIMIT))
        .all(db)
        .await
        .map_err(Into::into)
}

/// A variant at or below the low-stock threshold.
#[derive(Debug, Clone, Serialize)]
pub struct LowStockItem {
    /// Product the variant belongs to
    pub product_id: i64,
    /// Product name
    pub product_name: String,
    /// Variant running low
    pub variant_id: i64,
    /// Variant size
    pub size: String,
    /// Variant color
    pub color: String,
    /// Variant SKU
    pub sku: String,
    /// Units on hand
    pub count_in_stock: i32,
}

/// Lists variants of non-archived products with stock at or below `threshold`,
/// lowest stock first.
///
/// # Errors
/// Returns an error if the database query fails.
pub async fn low_stock_report(db: &DatabaseConnection, threshold: i32) -> Result<Vec<LowStockItem>> {
    let rows = Variant::find()
        .find_also_related(Product)
        .filter(variant::Column::CountInStock.lte(threshold))
        .filter(product::Column::Archived.eq(false))
        .order_by_asc(variant::Column::CountInStock)
        .order_by_asc(variant::Column::Id)
        .all(db)
        .await?;

    Ok(rows
        .into_iter()
        .filter_map(|(variant, product)| {
            product.map(|product| LowStockItem {
                product_id: product.id,
                product_name: product.name,
                variant_id: variant.id,
                size: variant.size,
                color: variant.color,
                sku: variant.sku,
                count_in_stock: variant.count_in_stock,
            })
        })
        .collect())
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;
    use crate::core::audit::{AuditFilter, list_audit_logs};
    use crate::test_utils::*;
    use sea_orm::{DatabaseBackend, MockDatabase};

    #[test]
    fn test_adjustment_apply_and_clamp() {
        assert_eq!(Adjustment::Set(7).apply(3), 7);
        assert_eq!(Adjustment::Increase(5).apply(3), 8);
        assert_eq!(Adjustment::Decrease(2).apply(3), 1);
        assert_eq!(Adjustment::Decrease(10).apply(3), 0);
        assert_eq!(clamp_decrement(0, 1), 0);
    }

    #[test]
    fn test_adjustment_validation() {
        assert!(Adjustment::Set(0).validate().is_ok());
        assert!(Adjustment::Set(-1).validate().is_err());
        assert!(Adjustment::Increase(0).validate().is_err());
        assert!(Adjustment::Decrease(-3).validate().is_err());
        assert!(Adjustment::Decrease(1).validate().is_ok());
    }

    #[test]
    fn test_adjustment_serde_shape() {
        let parsed: Adjustment =
            serde_json::from_str(r#"{"mode":"increase","quantity":4}"#).unwrap();
        assert_eq!(parsed, Adjustment::Increase(4));
    }

    #[tokio::test]
    async fn test_adjust_rejects_bad_quantity_before_touching_db() -> Result<()> {
        let db = MockDatabase::new(DatabaseBackend::Sqlite).into_connection();
        let result = adjust_variant_stock(&db, "admin", 1, Adjustment::Increase(0), "x").await;
        assert!(matches!(
            result.unwrap_err(),
            Error::InvalidQuantity { quantity: 0 }
        ));
        Ok(())
    }

    #[tokio::test]
    async fn test_adjust_writes_log_and_audit() -> Result<()> {
        init_test_tracing();
        let db = setup_test_db().await?;
        let product = create_test_product(&db, "Tee", 20.0, &[("M", "black", 5)]).await?;
        let variant_id = product.variants[0].id;

        let adjusted =
            adjust_variant_stock(&db, "admin-1", variant_id, Adjustment::Decrease(8), "damaged")
                .await?;
        assert_eq!(adjusted.variant.count_in_stock, 0);
        assert_eq!(adjusted.log.old_stock, 5);
        assert_eq!(adjusted.log.new_stock, 0);
        assert_eq!(adjusted.log.quantity, 8);
        assert_eq!(adjusted.log.adjustment_type, AdjustmentType::Decrement);

        let logs = inventory_logs(
            &db,
            &InventoryLogFilter {
                variant_id: Some(variant_id),
                adjustment_type: Some(AdjustmentType::Decrement),
                ..Default::default()
            },
        )
        .await?;
        assert_eq!(logs.len(), 1);
        assert_eq!(logs[0].reason, "damaged");

        let audits = list_audit_logs(
            &db,
            &AuditFilter {
                action: Some(AuditAction::StockAdjusted),
                ..Default::default()
            },
        )
        .await?;
        assert_eq!(audits.len(), 1);
        assert_eq!(audits[0].changes["new_stock"], 0);

        Ok(())
    }

    #[tokio::test]
    async fn test_adjust_unknown_variant() -> Result<()> {
        let db = setup_test_db().await?;
        let result = adjust_variant_stock(&db, "admin", 999, Adjustment::Set(1), "").await;
        assert!(matches!(result.unwrap_err(), Error::VariantNotFound { id: 999 }));
        Ok(())
    }

    #[tokio::test]
    async fn test_low_stock_report_skips_archived() -> Result<()> {
        let db = setup_test_db().await?;
        let shirt =
            create_test_product(&db, "Shirt", 30.0, &[("S", "white", 1), ("M", "white", 20)])
                .await?;
        let hat = create_test_product(&db, "Hat", 15.0, &[("OS", "red", 0)]).await?;
        crate::core::product::archive_product(&db, "admin", hat.product.id).await?;

        let report = low_stock_report(&db, 2).await?;
        assert_eq!(report.len(), 1);
        assert_eq!(report[0].product_id, shirt.product.id);
        assert_eq!(report[0].size, "S");
        assert_eq!(report[0].count_in_stock, 1);

        Ok(())
    }
}
