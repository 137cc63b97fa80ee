//! Checkout routes.

use super::{AppState, auth::ShopperId};
use crate::{
    core::checkout::{self, CheckoutStarted, ConfirmedOrder},
    errors::Result,
};
use axum::{Json, Router, extract::State, http::StatusCode, routing::post};
use serde::Deserialize;
use tracing::instrument;

#[derive(Debug, Deserialize)]
pub struct StartCheckout {
    /// Optional coupon to apply
    pub coupon_code: Option<String>,
    /// Free-form delivery address
    pub shipping_address: String,
}

#[derive(Debug, Deserialize)]
pub struct ConfirmCheckout {
    /// Session id returned by the gateway
    pub session_id: String,
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/checkout", post(start))
        .route("/checkout/confirm", post(confirm))
}

/// POST /api/checkout
#[instrument(skip(state))]
async fn start(
    State(state): State<AppState>,
    ShopperId(user_id): ShopperId,
    Json(body): Json<StartCheckout>,
) -> Result<(StatusCode, Json<CheckoutStarted>)> {
    let started = checkout::start_checkout(
        &state.db,
        state.gateway.as_ref(),
        &state.config.store_base_url,
        &user_id,
        body.coupon_code.as_deref(),
        &body.shipping_address,
    )
    .await?;
    Ok((StatusCode::CREATED, Json(started)))
}

/// POST /api/checkout/confirm
#[instrument(skip(state))]
async fn confirm(
    State(state): State<AppState>,
    ShopperId(user_id): ShopperId,
    Json(body): Json<ConfirmCheckout>,
) -> Result<Json<ConfirmedOrder>> {
    let confirmed = checkout::confirm_checkout(
        &state.db,
        state.gateway.as_ref(),
        state.mailer.as_ref(),
        &state.config.reward_policy(),
        Some(&user_id),
        &body.session_id,
    )
    .await?;
    Ok(Json(confirmed))
}
