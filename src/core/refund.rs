//! Refund business logic.
//!
//! A refund targets one order line. Its own status (`requested` → `approved` | `rejected`)
//! is independent of the order status, which is re-derived from `total_refunded` whenever
//! a refund is approved.

use crate::{
    core::{
        audit::AuditLogger,
        inventory::{StockChange, apply_stock_change},
        order::status_from_refunds,
        round_money,
    },
    email::{self, Mailer},
    entities::{
        AdjustmentType, AuditAction, Order, OrderItem, Refund, RefundStatus, Variant, order,
        order_item, refund,
    },
    errors::{Error, Result},
    payments::PaymentGateway,
};
use chrono::Utc;
use sea_orm::{QueryOrder, Set, TransactionTrait, prelude::*};
use serde::Serialize;
use serde_json::json;
use tracing::{error, info, instrument, warn};

/// A resolved refund together with the order it touched.
#[derive(Debug, Clone, Serialize)]
pub struct RefundOutcome {
    /// Refund after the change
    pub refund: refund::Model,
    /// Order after the change
    pub order: order::Model,
}

fn snapshot(item: &order_item::Model) -> Json {
    json!({
        "product_id": item.product_id,
        "variant_id": item.variant_id,
        "name": item.name,
        "size": item.size,
        "color": item.color,
        "price": item.price,
    })
}

fn snapshot_name(refund: &refund::Model) -> &str {
    refund.product_snapshot["name"].as_str().unwrap_or("your item")
}

/// Units of an order line already covered by open or approved refunds.
async fn committed_quantity<C>(conn: &C, order_item_id: i64) -> Result<i32>
where
    C: ConnectionTrait,
{
    let refunds = Refund::find()
        .filter(refund::Column::OrderItemId.eq(order_item_id))
        .filter(refund::Column::Status.is_in([RefundStatus::Requested, RefundStatus::Approved]))
        .all(conn)
        .await?;
    Ok(refunds.iter().map(|r| r.quantity).sum())
}

/// Files a refund request for part or all of one order line.
///
/// The amount is the line's unit price times `quantity`, scaled down by any order-level
/// discount.
///
/// # Errors
/// Returns an error if:
/// - `quantity` is less than 1 or `reason` is blank
/// - The order does not exist or belongs to another shopper
/// - The order is not delivered or partially refunded
/// - The line does not belong to the order
/// - `quantity` exceeds the units not yet requested or refunded
pub async fn request_refund(
    db: &DatabaseConnection,
    user_id: &str,
    order_id: i64,
    order_item_id: i64,
    quantity: i32,
    reason: &str,
) -> Result<refund::Model> {
    if quantity < 1 {
        return Err(Error::InvalidQuantity { quantity });
    }
    let reason = reason.trim();
    if reason.is_empty() {
        return Err(Error::validation("A refund reason is required"));
    }

    let txn = db.begin().await?;
    let order = Order::find_by_id(order_id)
        .filter(order::Column::UserId.eq(user_id))
        .one(&txn)
        .await?
        .ok_or(Error::OrderNotFound { id: order_id })?;
    if !order.status.accepts_refunds() {
        return Err(Error::conflict(format!(
            "Order #{order_id} is {} and cannot be refunded",
            order.status
        )));
    }
    let item = OrderItem::find_by_id(order_item_id)
        .filter(order_item::Column::OrderId.eq(order_id))
        .one(&txn)
        .await?
        .ok_or(Error::OrderItemNotFound { id: order_item_id })?;

    let remaining = item.quantity - committed_quantity(&txn, item.id).await?;
    if quantity > remaining {
        return Err(Error::validation(format!(
            "Only {} unit(s) of {} can still be refunded",
            remaining.max(0),
            item.name
        )));
    }

    let amount = round_money(item.price * f64::from(quantity) * order.charged_ratio());
    let created = refund::ActiveModel {
        order_id: Set(order_id),
        order_item_id: Set(item.id),
        status: Set(RefundStatus::Requested),
        amount: Set(amount),
        quantity: Set(quantity),
        reason: Set(reason.to_string()),
        product_snapshot: Set(snapshot(&item)),
        admin_note: Set(None),
        gateway_refund_id: Set(None),
        requested_at: Set(Utc::now()),
        resolved_at: Set(None),
        ..Default::default()
    }
    .insert(&txn)
    .await?;
    txn.commit().await?;

    info!(refund_id = created.id, order_id, amount, "Refund requested");
    Ok(created)
}

async fn open_refund<C>(conn: &C, refund_id: i64) -> Result<refund::Model>
where
    C: ConnectionTrait,
{
    let found = Refund::find_by_id(refund_id)
        .one(conn)
        .await?
        .ok_or(Error::RefundNotFound { id: refund_id })?;
    if found.status != RefundStatus::Requested {
        return Err(Error::conflict(format!(
            "Refund #{refund_id} was already resolved"
        )));
    }
    Ok(found)
}

/// Approves a requested refund: pays it back through the gateway, updates the order's
/// refunded total and status, and returns the units to stock.
///
/// # Errors
/// Returns an error if the refund is unknown or already resolved, the order has no
/// collected payment or nothing left to refund, or the gateway or database fails.
#[instrument(skip(db, gateway, mailer))]
pub async fn approve_refund(
    db: &DatabaseConnection,
    gateway: &dyn PaymentGateway,
    mailer: &dyn Mailer,
    admin_id: &str,
    refund_id: i64,
    note: Option<String>,
) -> Result<RefundOutcome> {
    let pending = open_refund(db, refund_id).await?;
    let order = Order::find_by_id(pending.order_id)
        .one(db)
        .await?
        .ok_or(Error::OrderNotFound {
            id: pending.order_id,
        })?;
    let session_id = order
        .payment_session_id
        .clone()
        .ok_or_else(|| Error::conflict(format!("Order #{} has no payment to refund", order.id)))?;
    let amount = round_money(pending.amount.min(order.total_amount - order.total_refunded));
    if amount <= 0.0 {
        return Err(Error::conflict(format!(
            "Order #{} is already fully refunded",
            order.id
        )));
    }

    let receipt = gateway.refund(&session_id, amount).await?;

    let txn = db.begin().await?;
    let pending = match open_refund(&txn, refund_id).await {
        Ok(r) => r,
        Err(e) => {
            error!(refund_id, gateway_refund = %receipt.id, "Refund resolved concurrently after gateway refund");
            return Err(e);
        }
    };
    let order = Order::find_by_id(pending.order_id)
        .one(&txn)
        .await?
        .ok_or(Error::OrderNotFound {
            id: pending.order_id,
        })?;

    let now = Utc::now();
    let mut refund_active: refund::ActiveModel = pending.clone().into();
    refund_active.status = Set(RefundStatus::Approved);
    refund_active.amount = Set(amount);
    refund_active.admin_note = Set(note.clone());
    refund_active.gateway_refund_id = Set(Some(receipt.id.clone()));
    refund_active.resolved_at = Set(Some(now));
    let approved = refund_active.update(&txn).await?;

    let old_status = order.status;
    let mut refunded = order.clone();
    refunded.total_refunded = round_money((order.total_refunded + amount).min(order.total_amount));
    let new_status = status_from_refunds(&refunded)
        .filter(|s| *s != old_status && old_status.can_transition_to(*s))
        .unwrap_or(old_status);
    let mut order_active: order::ActiveModel = order.into();
    order_active.total_refunded = Set(refunded.total_refunded);
    order_active.status = Set(new_status);
    order_active.updated_at = Set(now);
    let order = order_active.update(&txn).await?;

    let item = OrderItem::find_by_id(pending.order_item_id).one(&txn).await?;
    let variant = match &item {
        Some(item) => Variant::find_by_id(item.variant_id).one(&txn).await?,
        None => None,
    };
    match variant {
        Some(variant) => {
            let new_stock = variant.count_in_stock.saturating_add(pending.quantity);
            apply_stock_change(
                &txn,
                variant,
                StockChange {
                    kind: AdjustmentType::RefundRestock,
                    quantity: pending.quantity,
                    new_stock,
                    reason: format!("refund #{refund_id}"),
                    admin_id: Some(admin_id.to_string()),
                    order_id: Some(order.id),
                },
            )
            .await?;
        }
        None => warn!(refund_id, "Refunded variant no longer exists, skipping restock"),
    }

    AuditLogger::log(
        &txn,
        admin_id,
        AuditAction::RefundApproved,
        "refund",
        refund_id,
        json!({
            "order_id": order.id,
            "amount": amount,
            "quantity": pending.quantity,
            "order_status": { "from": old_status, "to": new_status },
            "note": note,
        }),
    )
    .await?;
    txn.commit().await?;
    info!(refund_id, order_id = order.id, amount, status = %new_status, "Refund approved");

    email::deliver(
        mailer,
        email::refund_approved(
            &order.user_id,
            order.id,
            snapshot_name(&approved),
            amount,
            note.as_deref(),
        ),
    )
    .await;

    Ok(RefundOutcome {
        refund: approved,
        order,
    })
}

/// Rejects a requested refund.
///
/// # Errors
/// Returns an error if the refund is unknown or already resolved, or a database operation
/// fails.
#[instrument(skip(db, mailer))]
pub async fn reject_refund(
    db: &DatabaseConnection,
    mailer: &dyn Mailer,
    admin_id: &str,
    refund_id: i64,
    note: Option<String>,
) -> Result<RefundOutcome> {
    let txn = db.begin().await?;
    let pending = open_refund(&txn, refund_id).await?;
    let order = Order::find_by_id(pending.order_id)
        .one(&txn)
        .await?
        .ok_or(Error::OrderNotFound {
            id: pending.order_id,
        })?;

    let mut active: refund::ActiveModel = pending.into();
    active.status = Set(RefundStatus::Rejected);
    active.admin_note = Set(note.clone());
    active.resolved_at = Set(Some(Utc::now()));
    let rejected = active.update(&txn).await?;

    AuditLogger::log(
        &txn,
        admin_id,
        AuditAction::RefundRejected,
        "refund",
        refund_id,
        json!({ "order_id": order.id, "note": note }),
    )
    .await?;
    txn.commit().await?;
    info!(refund_id, order_id = order.id, "Refund rejected");

    email::deliver(
        mailer,
        email::refund_rejected(
            &order.user_id,
            order.id,
            snapshot_name(&rejected),
            note.as_deref(),
        ),
    )
    .await;

    Ok(RefundOutcome {
        refund: rejected,
        order,
    })
}

/// Lists refunds, optionally with one status, newest first.
///
/// # Errors
/// Returns an error if the database query fails.
pub async fn list_refunds(
    db: &DatabaseConnection,
    status: Option<RefundStatus>,
) -> Result<Vec<refund::Model>> {
    let mut query = Refund::find();
    if let Some(status) = status {
        query = query.filter(refund::Column::Status.eq(status));
    }
    query
        .order_by_desc(refund::Column::RequestedAt)
        .order_by_desc(refund::Column::Id)
        .all(db)
        .await
        .map_err(Into::into)
}
