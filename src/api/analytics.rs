//! Admin dashboard routes.

use super::{AppState, auth::AdminId};
use crate::{
    core::analytics::{self, DailySales, DashboardSummary, TopProduct},
    errors::Result,
};
use axum::{
    Json, Router,
    extract::{Query, State},
    routing::get,
};
use chrono::{DateTime, Days, NaiveDate, Utc};
use serde::Deserialize;

/// Default window for the daily chart, ending today.
const DEFAULT_DAILY_DAYS: u64 = 30;
const DEFAULT_TOP_LIMIT: u64 = 10;

/// Half-open `[from, to)` window over order creation time.
#[derive(Debug, Default, Deserialize)]
pub struct SummaryQuery {
    /// Inclusive start
    pub from: Option<DateTime<Utc>>,
    /// Exclusive end
    pub to: Option<DateTime<Utc>>,
}

/// Inclusive range of UTC days; defaults to the last 30 days.
#[derive(Debug, Default, Deserialize)]
pub struct DailyQuery {
    /// First day
    pub from: Option<NaiveDate>,
    /// Last day, today when omitted
    pub to: Option<NaiveDate>,
}

#[derive(Debug, Default, Deserialize)]
pub struct TopQuery {
    /// Inclusive start of the order window
    pub from: Option<DateTime<Utc>>,
    /// Exclusive end of the order window
    pub to: Option<DateTime<Utc>>,
    /// Number of products, 1 to 100
    pub limit: Option<u64>,
}

pub fn admin_routes() -> Router<AppState> {
    Router::new()
        .route("/analytics/summary", get(summary))
        .route("/analytics/daily", get(daily))
        .route("/analytics/top-products", get(top))
}

/// GET /api/admin/analytics/summary
async fn summary(
    State(state): State<AppState>,
    _admin: AdminId,
    Query(query): Query<SummaryQuery>,
) -> Result<Json<DashboardSummary>> {
    Ok(Json(
        analytics::dashboard_summary(&state.db, query.from, query.to).await?,
    ))
}

/// GET /api/admin/analytics/daily
async fn daily(
    State(state): State<AppState>,
    _admin: AdminId,
    Query(query): Query<DailyQuery>,
) -> Result<Json<Vec<DailySales>>> {
    let to = query.to.unwrap_or_else(|| Utc::now().date_naive());
    let from = query.from.unwrap_or_else(|| {
        to.checked_sub_days(Days::new(DEFAULT_DAILY_DAYS - 1))
            .unwrap_or(to)
    });
    Ok(Json(analytics::daily_sales(&state.db, from, to).await?))
}

/// GET /api/admin/analytics/top-products
async fn top(
    State(state): State<AppState>,
    _admin: AdminId,
    Query(query): Query<TopQuery>,
) -> Result<Json<Vec<TopProduct>>> {
    let limit = query.limit.unwrap_or(DEFAULT_TOP_LIMIT).clamp(1, 100);
    Ok(Json(
        analytics::top_products(&state.db, query.from, query.to, limit).await?,
    ))
}
