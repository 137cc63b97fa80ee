//! Admin inventory routes: manual adjustments, stock log, low-stock report and sync.

use super::{AppState, auth::AdminId};
use crate::{
    core::{
        inventory::{self, Adjustment, InventoryLogFilter, LowStockItem, StockAdjustment},
        sync::{self, SyncSummary},
    },
    entities::inventory_log,
    errors::Result,
};
use axum::{
    Json, Router,
    extract::{Path, Query, State},
    routing::{get, post},
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::instrument;

#[derive(Debug, Deserialize)]
pub struct StockRequest {
    /// How to change the count
    pub adjustment: Adjustment,
    /// Recorded in the inventory log
    #[serde(default)]
    pub reason: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct LowStockQuery {
    /// Defaults to the configured low-stock threshold
    pub threshold: Option<i32>,
}

#[derive(Debug, Serialize)]
pub struct SyncStatus {
    /// End of the last completed sync
    pub last_synced_at: Option<DateTime<Utc>>,
    /// Configured sync interval
    pub interval_secs: u64,
    /// Whether a pass would run now
    pub due: bool,
}

pub fn admin_routes() -> Router<AppState> {
    Router::new()
        .route("/variants/{id}/stock", post(adjust))
        .route("/inventory/logs", get(logs))
        .route("/inventory/low-stock", get(low_stock))
        .route("/inventory/sync", get(sync_status).post(run_sync))
}

/// POST /api/admin/variants/{id}/stock
#[instrument(skip(state))]
async fn adjust(
    State(state): State<AppState>,
    AdminId(admin_id): AdminId,
    Path(id): Path<i64>,
    Json(body): Json<StockRequest>,
) -> Result<Json<StockAdjustment>> {
    Ok(Json(
        inventory::adjust_variant_stock(&state.db, &admin_id, id, body.adjustment, &body.reason)
            .await?,
    ))
}

/// GET /api/admin/inventory/logs
async fn logs(
    State(state): State<AppState>,
    _admin: AdminId,
    Query(filter): Query<InventoryLogFilter>,
) -> Result<Json<Vec<inventory_log::Model>>> {
    Ok(Json(inventory::inventory_logs(&state.db, &filter).await?))
}

/// GET /api/admin/inventory/low-stock
async fn low_stock(
    State(state): State<AppState>,
    _admin: AdminId,
    Query(query): Query<LowStockQuery>,
) -> Result<Json<Vec<LowStockItem>>> {
    let threshold = query
        .threshold
        .unwrap_or(state.config.low_stock_threshold);
    Ok(Json(inventory::low_stock_report(&state.db, threshold).await?))
}

/// GET /api/admin/inventory/sync
async fn sync_status(State(state): State<AppState>, _admin: AdminId) -> Result<Json<SyncStatus>> {
    let interval = state.config.sync_interval();
    Ok(Json(SyncStatus {
        last_synced_at: sync::last_sync_time(&state.db).await?,
        interval_secs: state.config.inventory_sync_interval_secs,
        due: sync::is_sync_due(&state.db, interval).await?,
    }))
}

/// POST /api/admin/inventory/sync
#[instrument(skip(state))]
async fn run_sync(
    State(state): State<AppState>,
    AdminId(admin_id): AdminId,
) -> Result<Json<SyncSummary>> {
    Ok(Json(sync::trigger_sync(&state.db, &admin_id).await?))
}
