//! Shopper cart routes.

use super::{AppState, auth::ShopperId};
use crate::{
    core::cart::{self, Cart},
    errors::Result,
};
use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    routing::{get, patch},
};
use serde::Deserialize;
use tracing::instrument;

#[derive(Debug, Deserialize)]
pub struct AddItem {
    /// Variant to add
    pub variant_id: i64,
    /// Units; must be positive
    #[serde(default = "one")]
    pub quantity: i32,
}

const fn one() -> i32 {
    1
}

#[derive(Debug, Deserialize)]
pub struct SetQuantity {
    /// Units; must be positive
    pub quantity: i32,
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/cart", get(show).post(add).delete(clear))
        .route("/cart/{item_id}", patch(update).delete(remove))
}

/// GET /api/cart
async fn show(State(state): State<AppState>, ShopperId(user_id): ShopperId) -> Result<Json<Cart>> {
    Ok(Json(cart::get_cart(&state.db, &user_id).await?))
}

/// POST /api/cart
#[instrument(skip(state))]
async fn add(
    State(state): State<AppState>,
    ShopperId(user_id): ShopperId,
    Json(body): Json<AddItem>,
) -> Result<(StatusCode, Json<Cart>)> {
    cart::add_to_cart(&state.db, &user_id, body.variant_id, body.quantity).await?;
    Ok((
        StatusCode::CREATED,
        Json(cart::get_cart(&state.db, &user_id).await?),
    ))
}

/// PATCH /api/cart/{item_id}
#[instrument(skip(state))]
async fn update(
    State(state): State<AppState>,
    ShopperId(user_id): ShopperId,
    Path(item_id): Path<i64>,
    Json(body): Json<SetQuantity>,
) -> Result<Json<Cart>> {
    cart::update_cart_item(&state.db, &user_id, item_id, body.quantity).await?;
    Ok(Json(cart::get_cart(&state.db, &user_id).await?))
}

/// DELETE /api/cart/{item_id}
async fn remove(
    State(state): State<AppState>,
    ShopperId(user_id): ShopperId,
    Path(item_id): Path<i64>,
) -> Result<Json<Cart>> {
    cart::remove_cart_item(&state.db, &user_id, item_id).await?;
    Ok(Json(cart::get_cart(&state.db, &user_id).await?))
}

/// DELETE /api/cart
async fn clear(State(state): State<AppState>, ShopperId(user_id): ShopperId) -> Result<StatusCode> {
    cart::clear_cart(state.db.as_ref(), &user_id).await?;
    Ok(StatusCode::NO_CONTENT)
}
