//! Sales analytics for the admin dashboard.
//!
//! Only paid orders count. Cancelled orders are left out of revenue but still show up in
//! the per-status breakdown. Revenue is net of approved refunds.

use crate::{
    core::round_money,
    entities::{Order, OrderItem, OrderStatus, PaymentStatus, order, order_item},
    errors::{Error, Result},
};
use chrono::{DateTime, Days, NaiveDate, NaiveTime, Utc};
use sea_orm::{
    FromQueryResult, JoinType, QueryOrder, QuerySelect,
    prelude::*,
    sea_query::{Func, SimpleExpr},
};
use serde::Serialize;
use std::collections::BTreeMap;
use tracing::warn;

/// Longest range [`daily_sales`] will produce rows for.
pub const MAX_DAILY_RANGE_DAYS: u64 = 366;

/// Headline numbers for the dashboard.
#[derive(Debug, Clone, Serialize)]
pub struct DashboardSummary {
    /// Charged minus refunded, over sales
    pub revenue: f64,
    /// Number of sales
    pub order_count: u64,
    /// `revenue / order_count`, zero without sales
    pub average_order_value: f64,
    /// Refunded amount across sales
    pub refunded_total: f64,
    /// Paid orders per status, cancelled included
    pub orders_by_status: BTreeMap<String, u64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DailySales {
    pub date: NaiveDate,
    /// Net revenue of sales created that day
    pub revenue: f64,
    pub orders: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TopProduct {
    pub product_id: i64,
    /// Name snapshot from the order lines; the greatest one if the product was renamed
    pub name: String,
    pub units_sold: i64,
    /// Sum of line totals before order-level discounts
    pub revenue: f64,
}

#[derive(Debug, FromQueryResult)]
struct SalesTotals {
    orders: i64,
    charged: Option<f64>,
    refunded: Option<f64>,
}

#[derive(Debug, FromQueryResult)]
struct DayTotals {
    day: String,
    orders: i64,
    charged: Option<f64>,
    refunded: Option<f64>,
}

#[derive(Debug, FromQueryResult)]
struct ProductTotals {
    product_id: i64,
    name: String,
    units_sold: i64,
    revenue: f64,
}

/// Restricts a query to paid orders created in `[from, to)`.
fn paid_between<Q: QueryFilter>(
    query: Q,
    from: Option<DateTime<Utc>>,
    to: Option<DateTime<Utc>>,
) -> Q {
    let mut query = query.filter(order::Column::PaymentStatus.eq(PaymentStatus::Paid));
    if let Some(from) = from {
        query = query.filter(order::Column::CreatedAt.gte(from));
    }
    if let Some(to) = to {
        query = query.filter(order::Column::CreatedAt.lt(to));
    }
    query
}

/// Paid orders that count as sales.
fn sales_between<Q: QueryFilter>(
    query: Q,
    from: Option<DateTime<Utc>>,
    to: Option<DateTime<Utc>>,
) -> Q {
    paid_between(query, from, to).filter(order::Column::Status.ne(OrderStatus::Cancelled))
}

fn net(charged: Option<f64>, refunded: Option<f64>) -> f64 {
    round_money(charged.unwrap_or(0.0) - refunded.unwrap_or(0.0))
}

/// Headline numbers for orders created in `[from, to)`; either bound may be open.
///
/// # Errors
/// Returns an error if the database query fails.
pub async fn dashboard_summary(
    db: &DatabaseConnection,
    from: Option<DateTime<Utc>>,
    to: Option<DateTime<Utc>>,
) -> Result<DashboardSummary> {
    let by_status: Vec<(String, i64)> = paid_between(Order::find(), from, to)
        .select_only()
        .column(order::Column::Status)
        .column_as(Expr::col(order::Column::Id).count(), "orders")
        .group_by(order::Column::Status)
        .into_tuple()
        .all(db)
        .await?;
    let orders_by_status = by_status
        .into_iter()
        .map(|(status, count)| (status, count.unsigned_abs()))
        .collect();

    let totals = sales_between(Order::find(), from, to)
        .select_only()
        .column_as(Expr::col(order::Column::Id).count(), "orders")
        .column_as(Expr::col(order::Column::TotalAmount).sum(), "charged")
        .column_as(Expr::col(order::Column::TotalRefunded).sum(), "refunded")
        .into_model::<SalesTotals>()
        .one(db)
        .await?;
    let (order_count, revenue, refunded_total) = totals.map_or((0, 0.0, 0.0), |t| {
        (
            t.orders.unsigned_abs(),
            net(t.charged, t.refunded),
            round_money(t.refunded.unwrap_or(0.0)),
        )
    });
    #[allow(clippy::cast_precision_loss)]
    let average_order_value = if order_count == 0 {
        0.0
    } else {
        round_money(revenue / order_count as f64)
    };

    Ok(DashboardSummary {
        revenue,
        order_count,
        average_order_value,
        refunded_total,
        orders_by_status,
    })
}

/// Revenue and order count for every calendar day (UTC) from `from` to `to` inclusive.
/// Days without sales are reported with zeros.
///
/// # Errors
/// Returns a validation error if `to` precedes `from` or the range is longer than
/// [`MAX_DAILY_RANGE_DAYS`], or a database error.
pub async fn daily_sales(
    db: &DatabaseConnection,
    from: NaiveDate,
    to: NaiveDate,
) -> Result<Vec<DailySales>> {
    if to < from {
        return Err(Error::validation("Range end must not precede its start"));
    }
    let span = (to - from).num_days().unsigned_abs() + 1;
    if span > MAX_DAILY_RANGE_DAYS {
        return Err(Error::validation(format!(
            "Daily sales are limited to {MAX_DAILY_RANGE_DAYS} days"
        )));
    }

    let start = from.and_time(NaiveTime::MIN).and_utc();
    let end = to
        .checked_add_days(Days::new(1))
        .ok_or_else(|| Error::validation("Range end is out of bounds"))?
        .and_time(NaiveTime::MIN)
        .and_utc();

    // Timestamps are stored as RFC 3339 text in UTC
    let day = Expr::cust("date(created_at)");
    let rows = sales_between(Order::find(), Some(start), Some(end))
        .select_only()
        .column_as(day.clone(), "day")
        .column_as(Expr::col(order::Column::Id).count(), "orders")
        .column_as(Expr::col(order::Column::TotalAmount).sum(), "charged")
        .column_as(Expr::col(order::Column::TotalRefunded).sum(), "refunded")
        .group_by(day)
        .into_model::<DayTotals>()
        .all(db)
        .await?;

    let mut by_day: BTreeMap<NaiveDate, DailySales> = from
        .iter_days()
        .take_while(|d| *d <= to)
        .map(|date| {
            (
                date,
                DailySales {
                    date,
                    revenue: 0.0,
                    orders: 0,
                },
            )
        })
        .collect();
    for row in rows {
        let Ok(date) = row.day.parse::<NaiveDate>() else {
            warn!(day = %row.day, "Skipping sales bucket with an unreadable date");
            continue;
        };
        if let Some(slot) = by_day.get_mut(&date) {
            slot.revenue = net(row.charged, row.refunded);
            slot.orders = row.orders.unsigned_abs();
        }
    }
    Ok(by_day.into_values().collect())
}

/// Best sellers by units sold across sales created in `[from, to)`; either bound may be
/// open. Ties go to the higher revenue, then to the name.
///
/// # Errors
/// Returns an error if the database query fails.
pub async fn top_products(
    db: &DatabaseConnection,
    from: Option<DateTime<Utc>>,
    to: Option<DateTime<Utc>>,
    limit: u64,
) -> Result<Vec<TopProduct>> {
    let price = Expr::col((order_item::Entity, order_item::Column::Price));
    let quantity = Expr::col((order_item::Entity, order_item::Column::Quantity));
    let rows = sales_between(OrderItem::find(), from, to)
        .join(JoinType::InnerJoin, order_item::Relation::Order.def())
        .select_only()
        .column(order_item::Column::ProductId)
        .column_as(
            Expr::col((order_item::Entity, order_item::Column::Name)).max(),
            "name",
        )
        .column_as(quantity.clone().sum(), "units_sold")
        .column_as(SimpleExpr::from(Func::sum(price.mul(quantity))), "revenue")
        .group_by(order_item::Column::ProductId)
        .order_by_desc(Expr::cust("units_sold"))
        .order_by_desc(Expr::cust("revenue"))
        .order_by_asc(Expr::cust("name"))
        .limit(limit)
        .into_model::<ProductTotals>()
        .all(db)
        .await?;

    Ok(rows
        .into_iter()
        .map(|row| TopProduct {
            product_id: row.product_id,
            name: row.name,
            units_sold: row.units_sold,
            revenue: round_money(row.revenue),
        })
        .collect())
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    #![allow(clippy::float_cmp)]
    use super::*;
    use crate::test_utils::*;
    use sea_orm::Set;

    async fn set_totals(
        db: &DatabaseConnection,
        order: &order::Model,
        total_refunded: f64,
        created_at: DateTime<Utc>,
    ) -> Result<()> {
        let mut active: order::ActiveModel = order.clone().into();
        active.total_refunded = Set(total_refunded);
        active.created_at = Set(created_at);
        active.update(db).await?;
        Ok(())
    }

    #[tokio::test]
    async fn test_dashboard_summary() -> Result<()> {
        let db = setup_test_db().await?;
        let now = Utc::now();
        let a = create_test_order(&db, "alice", OrderStatus::Delivered).await?;
        let b = create_test_order(&db, "bob", OrderStatus::Processing).await?;
        let c = create_test_order(&db, "carol", OrderStatus::Cancelled).await?;
        set_totals(&db, &a.order, 10.0, now).await?;
        set_totals(&db, &b.order, 0.0, now).await?;
        set_totals(&db, &c.order, 0.0, now).await?;

        let summary = dashboard_summary(&db, None, None).await?;
        // Two sales of 40.00, one with 10.00 refunded
        assert_eq!(summary.order_count, 2);
        assert_eq!(summary.revenue, 70.0);
        assert_eq!(summary.refunded_total, 10.0);
        assert_eq!(summary.average_order_value, 35.0);
        assert_eq!(summary.orders_by_status["cancelled"], 1);
        assert_eq!(summary.orders_by_status["delivered"], 1);

        let future = dashboard_summary(&db, Some(now + chrono::Duration::days(1)), None).await?;
        assert_eq!(future.order_count, 0);
        assert_eq!(future.average_order_value, 0.0);
        Ok(())
    }

    #[tokio::test]
    async fn test_daily_sales_fills_empty_days() -> Result<()> {
        let db = setup_test_db().await?;
        let day = NaiveDate::from_ymd_opt(2025, 5, 2).unwrap();
        let at = day.and_hms_opt(15, 30, 0).unwrap().and_utc();
        let order = create_test_order(&db, "alice", OrderStatus::Delivered).await?;
        set_totals(&db, &order.order, 0.0, at).await?;

        let from = NaiveDate::from_ymd_opt(2025, 5, 1).unwrap();
        let to = NaiveDate::from_ymd_opt(2025, 5, 3).unwrap();
        let rows = daily_sales(&db, from, to).await?;
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[0].orders, 0);
        assert_eq!(rows[1].date, day);
        assert_eq!(rows[1].revenue, 40.0);
        assert_eq!(rows[1].orders, 1);
        assert_eq!(rows[2].revenue, 0.0);

        assert!(daily_sales(&db, to, from).await.is_err());
        Ok(())
    }

    #[tokio::test]
    async fn test_top_products_ranks_by_units() -> Result<()> {
        let db = setup_test_db().await?;
        let first = create_test_order(&db, "alice", OrderStatus::Delivered).await?;
        let cap = create_test_product(&db, "Cap", 12.0, &[("OS", "red", 20)]).await?;
        let cap_order =
            create_test_order_with(&db, "bob", OrderStatus::Processing, &cap.variants[0], 5)
                .await?;
        let cancelled =
            create_test_order_with(&db, "carol", OrderStatus::Cancelled, &cap.variants[0], 50)
                .await?;
        assert_eq!(cancelled.items[0].quantity, 50);

        let top = top_products(&db, None, None, 10).await?;
        assert_eq!(top.len(), 2);
        assert_eq!(top[0].product_id, cap.product.id);
        assert_eq!(top[0].units_sold, 5);
        assert_eq!(top[0].revenue, 60.0);
        assert_eq!(top[1].product_id, first.items[0].product_id);
        assert_eq!(cap_order.items[0].name, "Cap");

        assert_eq!(top_products(&db, None, None, 1).await?.len(), 1);
        Ok(())
    }

    #[tokio::test]
    async fn test_top_products_respects_date_range() -> Result<()> {
        let db = setup_test_db().await?;
        let cap = create_test_product(&db, "Cap", 12.0, &[("OS", "red", 20)]).await?;
        let old =
            create_test_order_with(&db, "alice", OrderStatus::Delivered, &cap.variants[0], 7)
                .await?;
        let recent = create_test_order(&db, "bob", OrderStatus::Delivered).await?;
        let now = Utc::now();
        set_totals(&db, &old.order, 0.0, now - chrono::Duration::days(40)).await?;
        set_totals(&db, &recent.order, 0.0, now).await?;

        let all_time = top_products(&db, None, None, 10).await?;
        assert_eq!(all_time[0].product_id, cap.product.id);
        assert_eq!(all_time[0].units_sold, 7);

        let cutoff = now - chrono::Duration::days(30);
        let last_month = top_products(&db, Some(cutoff), None, 10).await?;
        assert_eq!(last_month.len(), 1);
        assert_eq!(last_month[0].product_id, recent.items[0].product_id);
        assert_eq!(last_month[0].units_sold, 2);
        assert_eq!(last_month[0].revenue, 40.0);

        let before = top_products(&db, None, Some(cutoff), 10).await?;
        assert_eq!(before.len(), 1);
        assert_eq!(before[0].product_id, cap.product.id);
        Ok(())
    }
}
