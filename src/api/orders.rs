//! Order and refund-request routes for shoppers, order management for admins.

use super::{
    AppState,
    auth::{AdminId, ShopperId},
};
use crate::{
    core::{
        order::{self, OrderDetails, OrderFilter, OrderPage},
        refund,
    },
    entities::{OrderStatus, order as order_entity, refund as refund_entity},
    errors::Result,
};
use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, patch, post},
};
use serde::Deserialize;
use tracing::instrument;

#[derive(Debug, Deserialize)]
pub struct RefundRequest {
    /// Line being returned
    pub order_item_id: i64,
    /// Units to refund
    pub quantity: i32,
    /// Shopper-supplied reason
    pub reason: String,
}

#[derive(Debug, Deserialize)]
pub struct StatusUpdate {
    /// Target status
    pub status: OrderStatus,
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/orders", get(list_mine))
        .route("/orders/{id}", get(get_mine))
        .route("/orders/{id}/refunds", post(request_refund))
}

pub fn admin_routes() -> Router<AppState> {
    Router::new()
        .route("/orders", get(admin_list))
        .route("/orders/{id}", get(admin_get))
        .route("/orders/{id}/status", patch(update_status))
}

/// GET /api/orders
async fn list_mine(
    State(state): State<AppState>,
    ShopperId(user_id): ShopperId,
) -> Result<Json<Vec<OrderDetails>>> {
    Ok(Json(order::list_user_orders(&state.db, &user_id).await?))
}

/// GET /api/orders/{id}
async fn get_mine(
    State(state): State<AppState>,
    ShopperId(user_id): ShopperId,
    Path(id): Path<i64>,
) -> Result<Json<OrderDetails>> {
    Ok(Json(order::get_user_order(&state.db, &user_id, id).await?))
}

/// POST /api/orders/{id}/refunds
#[instrument(skip(state))]
async fn request_refund(
    State(state): State<AppState>,
    ShopperId(user_id): ShopperId,
    Path(id): Path<i64>,
    Json(body): Json<RefundRequest>,
) -> Result<(StatusCode, Json<refund_entity::Model>)> {
    let created = refund::request_refund(
        &state.db,
        &user_id,
        id,
        body.order_item_id,
        body.quantity,
        &body.reason,
    )
    .await?;
    Ok((StatusCode::CREATED, Json(created)))
}

/// GET /api/admin/orders
async fn admin_list(
    State(state): State<AppState>,
    _admin: AdminId,
    Query(filter): Query<OrderFilter>,
) -> Result<Json<OrderPage>> {
    Ok(Json(order::list_orders(&state.db, &filter).await?))
}

/// GET /api/admin/orders/{id}
async fn admin_get(
    State(state): State<AppState>,
    _admin: AdminId,
    Path(id): Path<i64>,
) -> Result<Json<OrderDetails>> {
    Ok(Json(order::get_order(&state.db, id).await?))
}

/// PATCH /api/admin/orders/{id}/status
#[instrument(skip(state))]
async fn update_status(
    State(state): State<AppState>,
    AdminId(admin_id): AdminId,
    Path(id): Path<i64>,
    Json(body): Json<StatusUpdate>,
) -> Result<Json<order_entity::Model>> {
    Ok(Json(
        order::update_order_status(&state.db, &admin_id, id, body.status).await?,
    ))
}
