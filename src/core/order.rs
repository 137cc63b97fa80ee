//! Order business logic - lookups, admin listing and the guarded status lifecycle.

use crate::{
    core::audit::AuditLogger,
    entities::{
        AuditAction, Order, OrderItem, OrderStatus, Refund, order, order_item, refund,
    },
    errors::{Error, Result},
};
use chrono::Utc;
use sea_orm::{PaginatorTrait, QueryOrder, Set, TransactionTrait, prelude::*};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{info, instrument};

pub const DEFAULT_PAGE_SIZE: u64 = 20;
pub const MAX_PAGE_SIZE: u64 = 100;

/// An order together with its lines and refund records.
#[derive(Debug, Clone, Serialize)]
pub struct OrderDetails {
    /// The order row
    #[serde(flatten)]
    pub order: order::Model,
    /// Order lines
    pub items: Vec<order_item::Model>,
    /// Refunds requested so far
    pub refunds: Vec<refund::Model>,
}

/// Admin order listing filter. `page` is 1-based.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct OrderFilter {
    /// Only this status
    pub status: Option<OrderStatus>,
    /// Only this shopper
    pub user_id: Option<String>,
    /// Zero-based page
    pub page: Option<u64>,
    /// Page size
    pub per_page: Option<u64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct OrderPage {
    /// Orders on this page
    pub orders: Vec<order::Model>,
    /// Zero-based page
    pub page: u64,
    /// Page size
    pub per_page: u64,
    /// Orders matching the filter
    pub total: u64,
    /// Number of pages
    pub total_pages: u64,
}

pub(crate) async fn load_details<C>(conn: &C, order: order::Model) -> Result<OrderDetails>
where
    C: ConnectionTrait,
{
    let items = OrderItem::find()
        .filter(order_item::Column::OrderId.eq(order.id))
        .order_by_asc(order_item::Column::Id)
        .all(conn)
        .await?;
    let refunds = Refund::find()
        .filter(refund::Column::OrderId.eq(order.id))
        .order_by_asc(refund::Column::RequestedAt)
        .order_by_asc(refund::Column::Id)
        .all(conn)
        .await?;
    Ok(OrderDetails {
        order,
        items,
        refunds,
    })
}

/// Loads any order by id (admin view).
///
/// # Errors
/// Returns `OrderNotFound` if no order has this id, or a database error.
pub async fn get_order(db: &DatabaseConnection, id: i64) -> Result<OrderDetails> {
    let order = Order::find_by_id(id)
        .one(db)
        .await?
        .ok_or(Error::OrderNotFound { id })?;
    load_details(db, order).await
}

/// Loads an order only if it belongs to `user_id`.
///
/// # Errors
/// Returns `OrderNotFound` for unknown orders and for orders of other shoppers.
pub async fn get_user_order(db: &DatabaseConnection, user_id: &str, id: i64) -> Result<OrderDetails> {
    let order = Order::find_by_id(id)
        .filter(order::Column::UserId.eq(user_id))
        .one(db)
        .await?
        .ok_or(Error::OrderNotFound { id })?;
    load_details(db, order).await
}

/// All orders placed by a shopper, newest first.
///
/// # Errors
/// Returns an error if a database query fails.
pub async fn list_user_orders(db: &DatabaseConnection, user_id: &str) -> Result<Vec<OrderDetails>> {
    let orders = Order::find()
        .filter(order::Column::UserId.eq(user_id))
        .order_by_desc(order::Column::CreatedAt)
        .order_by_desc(order::Column::Id)
        .all(db)
        .await?;

    let mut details = Vec::with_capacity(orders.len());
    for order in orders {
        details.push(load_details(db, order).await?);
    }
    Ok(details)
}

/// Paged admin listing, newest first.
///
/// # Errors
/// Returns an error if a database query fails.
pub async fn list_orders(db: &DatabaseConnection, filter: &OrderFilter) -> Result<OrderPage> {
    let per_page = filter
        .per_page
        .unwrap_or(DEFAULT_PAGE_SIZE)
        .clamp(1, MAX_PAGE_SIZE);
    let page = filter.page.unwrap_or(1).max(1);

    let mut query = Order::find();
    if let Some(status) = filter.status {
        query = query.filter(order::Column::Status.eq(status));
    }
    if let Some(user_id) = &filter.user_id {
        query = query.filter(order::Column::UserId.eq(user_id.as_str()));
    }
    let paginator = query
        .order_by_desc(order::Column::CreatedAt)
        .order_by_desc(order::Column::Id)
        .paginate(db, per_page);

    let counts = paginator.num_items_and_pages().await?;
    let orders = paginator.fetch_page(page - 1).await?;
    Ok(OrderPage {
        orders,
        page,
        per_page,
        total: counts.number_of_items,
        total_pages: counts.number_of_pages,
    })
}

/// The status an order should carry given how much of it has been refunded.
///
/// Returns `None` while nothing has been refunded.
#[must_use]
pub fn status_from_refunds(order: &order::Model) -> Option<OrderStatus> {
    if order.total_refunded <= 0.0 {
        None
    } else if order.total_refunded + 0.005 >= order.total_amount {
        Some(OrderStatus::Refunded)
    } else {
        Some(OrderStatus::PartiallyRefunded)
    }
}

/// Moves an order to `new_status` if the transition table allows it.
///
/// # Errors
/// Returns `OrderNotFound`, `InvalidTransition` for a disallowed move, or a database error.
#[instrument(skip(db))]
pub async fn update_order_status(
    db: &DatabaseConnection,
    admin_id: &str,
    id: i64,
    new_status: OrderStatus,
) -> Result<order::Model> {
    let txn = db.begin().await?;
    let existing = Order::find_by_id(id)
        .one(&txn)
        .await?
        .ok_or(Error::OrderNotFound { id })?;
    let old_status = existing.status;
    if !old_status.can_transition_to(new_status) {
        return Err(Error::InvalidTransition {
            from: old_status.to_string(),
            to: new_status.to_string(),
        });
    }

    let mut active: order::ActiveModel = existing.into();
    active.status = Set(new_status);
    active.updated_at = Set(Utc::now());
    let updated = active.update(&txn).await?;

    AuditLogger::log(
        &txn,
        admin_id,
        AuditAction::OrderStatusChanged,
        "order",
        id,
        json!({ "from": old_status, "to": new_status }),
    )
    .await?;
    txn.commit().await?;

    info!(order_id = id, from = %old_status, to = %new_status, "Order status changed");
    Ok(updated)
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;
    use crate::entities::PaymentStatus;
    use crate::test_utils::*;

    #[test]
    fn test_status_from_refunds() {
        let mut order = sample_order_model(100.0);
        assert_eq!(status_from_refunds(&order), None);
        order.total_refunded = 40.0;
        assert_eq!(
            status_from_refunds(&order),
            Some(OrderStatus::PartiallyRefunded)
        );
        order.total_refunded = 100.0;
        assert_eq!(status_from_refunds(&order), Some(OrderStatus::Refunded));
    }

    #[tokio::test]
    async fn test_lifecycle_is_guarded_and_audited() -> Result<()> {
        let db = setup_test_db().await?;
        let order = create_test_order(&db, "alice", OrderStatus::Pending).await?;

        let skip = update_order_status(&db, "admin", order.order.id, OrderStatus::Delivered).await;
        assert!(matches!(skip.unwrap_err(), Error::InvalidTransition { .. }));

        for next in [
            OrderStatus::Processing,
            OrderStatus::Shipped,
            OrderStatus::Delivered,
        ] {
            let updated = update_order_status(&db, "admin", order.order.id, next).await?;
            assert_eq!(updated.status, next);
        }

        let back = update_order_status(&db, "admin", order.order.id, OrderStatus::Pending).await;
        assert!(matches!(back.unwrap_err(), Error::InvalidTransition { .. }));

        let audits = crate::core::audit::list_audit_logs(
            &db,
            &crate::core::audit::AuditFilter {
                action: Some(AuditAction::OrderStatusChanged),
                ..Default::default()
            },
        )
        .await?;
        assert_eq!(audits.len(), 3);
        assert_eq!(audits[0].changes["to"], "delivered");

        Ok(())
    }

    #[tokio::test]
    async fn test_orders_are_scoped_to_their_owner() -> Result<()> {
        let db = setup_test_db().await?;
        let order = create_test_order(&db, "alice", OrderStatus::Processing).await?;

        let own = get_user_order(&db, "alice", order.order.id).await?;
        assert_eq!(own.items.len(), 1);
        assert_eq!(own.order.payment_status, PaymentStatus::Paid);

        let foreign = get_user_order(&db, "bob", order.order.id).await;
        assert!(matches!(foreign.unwrap_err(), Error::OrderNotFound { .. }));

        assert_eq!(list_user_orders(&db, "alice").await?.len(), 1);
        assert!(list_user_orders(&db, "bob").await?.is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn test_list_orders_pages_and_filters() -> Result<()> {
        let db = setup_test_db().await?;
        for _ in 0..3 {
            create_test_order(&db, "alice", OrderStatus::Processing).await?;
        }
        create_test_order(&db, "bob", OrderStatus::Delivered).await?;

        let first = list_orders(
            &db,
            &OrderFilter {
                per_page: Some(2),
                ..Default::default()
            },
        )
        .await?;
        assert_eq!(first.total, 4);
        assert_eq!(first.total_pages, 2);
        assert_eq!(first.orders.len(), 2);

        let delivered = list_orders(
            &db,
            &OrderFilter {
                status: Some(OrderStatus::Delivered),
                ..Default::default()
            },
        )
        .await?;
        assert_eq!(delivered.total, 1);
        assert_eq!(delivered.orders[0].user_id, "bob");

        let alice = list_orders(
            &db,
            &OrderFilter {
                user_id: Some("alice".to_string()),
                page: Some(2),
                per_page: Some(2),
                ..Default::default()
            },
        )
        .await?;
        assert_eq!(alice.orders.len(), 1);
        Ok(())
    }
}
