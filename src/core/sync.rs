//! Inventory sync job.
//!
//! Delivered orders decrement variant stock once, in a batch pass over every delivered order
//! whose `inventory_processed` flag is still unset. The time of the last pass is kept in the
//! `system_state` table under [`LAST_INVENTORY_SYNC_KEY`].

use crate::{
    core::{
        audit::AuditLogger,
        inventory::{StockChange, apply_stock_change, clamp_decrement},
    },
    entities::{
        AdjustmentType, AuditAction, Order, OrderItem, OrderStatus, SystemState, Variant, order,
        order_item, system_state, variant,
    },
    errors::{Error, Result},
};
use chrono::{DateTime, Duration, Utc};
use sea_orm::{QueryOrder, Set, TransactionTrait, prelude::*};
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

pub const LAST_INVENTORY_SYNC_KEY: &str = "last_inventory_sync";

/// Statuses of orders whose goods have left the warehouse. Refund approval moves a delivered
/// order on to one of the refund statuses, which may happen before the sync reaches it.
const FULFILLED_STATUSES: [OrderStatus; 3] = [
    OrderStatus::Delivered,
    OrderStatus::PartiallyRefunded,
    OrderStatus::Refunded,
];

/// Outcome of one sync pass.
#[derive(Debug, Clone, Serialize)]
pub struct SyncSummary {
    /// Orders marked processed in this pass
    pub orders_processed: usize,
    /// Stock decrements written
    pub adjustments: usize,
    /// Order lines whose variant no longer exists
    pub skipped_lines: usize,
    /// Orders left unprocessed because their transaction failed
    pub failed_orders: Vec<i64>,
    /// Time recorded as the last sync
    pub synced_at: DateTime<Utc>,
}

/// When the last sync pass finished, if one ever ran.
///
/// # Errors
/// Returns an error if the query fails or the stored timestamp cannot be parsed.
pub async fn last_sync_time(db: &DatabaseConnection) -> Result<Option<DateTime<Utc>>> {
    let state = SystemState::find()
        .filter(system_state::Column::Key.eq(LAST_INVENTORY_SYNC_KEY))
        .one(db)
        .await?;

    state
        .map(|s| {
            DateTime::parse_from_rfc3339(&s.value)
                .map(|at| at.with_timezone(&Utc))
                .map_err(|e| Error::Config {
                    message: format!("Failed to parse last inventory sync time: {e}"),
                })
        })
        .transpose()
}

async fn set_last_sync_time<C>(conn: &C, at: DateTime<Utc>) -> Result<()>
where
    C: ConnectionTrait,
{
    let value = at.to_rfc3339();
    let existing = SystemState::find()
        .filter(system_state::Column::Key.eq(LAST_INVENTORY_SYNC_KEY))
        .one(conn)
        .await?;

    if let Some(state) = existing {
        let mut active: system_state::ActiveModel = state.into();
        active.value = Set(value);
        active.updated_at = Set(at.naive_utc());
        active.update(conn).await?;
    } else {
        system_state::ActiveModel {
            key: Set(LAST_INVENTORY_SYNC_KEY.to_string()),
            value: Set(value),
            updated_at: Set(at.naive_utc()),
            ..Default::default()
        }
        .insert(conn)
        .await?;
    }
    Ok(())
}

/// True when no sync has run yet or the last one is at least `interval` old.
///
/// # Errors
/// See [`last_sync_time`].
pub async fn is_sync_due(db: &DatabaseConnection, interval: Duration) -> Result<bool> {
    Ok(last_sync_time(db)
        .await?
        .is_none_or(|last| Utc::now() - last >= interval))
}

/// Finds the variant an order line was bought as, falling back to product, size and color
/// when the original variant row was replaced.
async fn resolve_variant<C>(conn: &C, item: &order_item::Model) -> Result<Option<variant::Model>>
where
    C: ConnectionTrait,
{
    if let Some(found) = Variant::find_by_id(item.variant_id).one(conn).await? {
        return Ok(Some(found));
    }
    Variant::find()
        .filter(variant::Column::ProductId.eq(item.product_id))
        .filter(variant::Column::Size.eq(item.size.as_str()))
        .filter(variant::Column::Color.eq(item.color.as_str()))
        .one(conn)
        .await
        .map_err(Into::into)
}

/// Applies one order's lines. Returns `(adjustments, skipped_lines)`, or `None` if another
/// pass already processed the order.
async fn sync_order(db: &DatabaseConnection, order_id: i64) -> Result<Option<(usize, usize)>> {
    let txn = db.begin().await?;
    let Some(current) = Order::find_by_id(order_id)
        .one(&txn)
        .await?
        .filter(|o| !o.inventory_processed)
    else {
        return Ok(None);
    };

    let items = OrderItem::find()
        .filter(order_item::Column::OrderId.eq(order_id))
        .order_by_asc(order_item::Column::Id)
        .all(&txn)
        .await?;

    let mut adjustments = 0;
    let mut skipped = 0;
    for item in items {
        let Some(variant) = resolve_variant(&txn, &item).await? else {
            warn!(
                order_id,
                product_id = item.product_id,
                size = %item.size,
                color = %item.color,
                "No variant for order line, skipping"
            );
            skipped += 1;
            continue;
        };
        let new_stock = clamp_decrement(variant.count_in_stock, item.quantity);
        apply_stock_change(
            &txn,
            variant,
            StockChange {
                kind: AdjustmentType::OrderFulfillment,
                quantity: item.quantity,
                new_stock,
                reason: format!("order #{order_id} delivered"),
                admin_id: None,
                order_id: Some(order_id),
            },
        )
        .await?;
        adjustments += 1;
    }

    let mut active: order::ActiveModel = current.into();
    active.inventory_processed = Set(true);
    active.update(&txn).await?;
    txn.commit().await?;

    debug!(order_id, adjustments, skipped, "Order inventory processed");
    Ok(Some((adjustments, skipped)))
}

/// Decrements stock for every delivered (or since refunded) order not yet processed.
///
/// Each order runs in its own transaction; one failing order is reported in
/// [`SyncSummary::failed_orders`] and does not stop the pass.
///
/// # Errors
/// Returns an error if the order scan or recording the sync time fails.
pub async fn sync_inventory_with_store_orders(db: &DatabaseConnection) -> Result<SyncSummary> {
    let pending: Vec<i64> = Order::find()
        .filter(order::Column::Status.is_in(FULFILLED_STATUSES))
        .filter(order::Column::InventoryProcessed.eq(false))
        .order_by_asc(order::Column::Id)
        .all(db)
        .await?
        .into_iter()
        .map(|o| o.id)
        .collect();

    let mut orders_processed = 0;
    let mut adjustments = 0;
    let mut skipped_lines = 0;
    let mut failed_orders = Vec::new();
    for order_id in pending {
        match sync_order(db, order_id).await {
            Ok(Some((applied, skipped))) => {
                orders_processed += 1;
                adjustments += applied;
                skipped_lines += skipped;
            }
            Ok(None) => {}
            Err(e) => {
                error!(order_id, "Inventory sync failed for order: {}", e);
                failed_orders.push(order_id);
            }
        }
    }

    let synced_at = Utc::now();
    set_last_sync_time(db, synced_at).await?;

    info!(
        orders_processed,
        adjustments,
        skipped_lines,
        failed = failed_orders.len(),
        "Inventory sync finished"
    );
    Ok(SyncSummary {
        orders_processed,
        adjustments,
        skipped_lines,
        failed_orders,
        synced_at,
    })
}

/// Runs a sync pass on an admin's request and records an `inventory_synced` audit row.
///
/// # Errors
/// See [`sync_inventory_with_store_orders`].
pub async fn trigger_sync(db: &DatabaseConnection, admin_id: &str) -> Result<SyncSummary> {
    let summary = sync_inventory_with_store_orders(db).await?;
    AuditLogger::log(
        db,
        admin_id,
        AuditAction::InventorySynced,
        "inventory",
        LAST_INVENTORY_SYNC_KEY,
        serde_json::to_value(&summary)?,
    )
    .await?;
    Ok(summary)
}

/// Runs the sync forever, checking every `check_every` whether a pass is due.
pub async fn run_periodic_sync(
    db: Arc<DatabaseConnection>,
    interval: Duration,
    check_every: std::time::Duration,
) {
    let mut ticker = tokio::time::interval(check_every);
    loop {
        ticker.tick().await;
        match is_sync_due(&db, interval).await {
            Ok(true) => {
                if let Err(e) = sync_inventory_with_store_orders(&db).await {
                    error!("Scheduled inventory sync failed: {}", e);
                }
            }
            Ok(false) => {}
            Err(e) => error!("Could not read inventory sync state: {}", e),
        }
    }
}
