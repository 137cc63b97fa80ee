//! Coupon routes.

use super::{
    AppState,
    auth::{AdminId, ShopperId},
};
use crate::{
    core::{
        cart,
        coupon::{self, NewCoupon, discount_for},
    },
    email,
    entities::coupon as coupon_entity,
    errors::Result,
};
use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post},
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::instrument;

#[derive(Debug, Deserialize)]
pub struct ValidateCoupon {
    /// Coupon code, case-insensitive
    pub code: String,
}

/// What a valid coupon is worth against the shopper's current cart.
#[derive(Debug, Serialize)]
pub struct CouponQuote {
    /// Coupon code, case-insensitive
    pub code: String,
    /// Percent off the subtotal
    pub discount_percentage: i32,
    /// Last moment the coupon can be used
    pub expiration_date: DateTime<Utc>,
    /// Current cart subtotal
    pub cart_subtotal: f64,
    /// Amount the coupon would take off
    pub discount_amount: f64,
}

#[derive(Debug, Default, Deserialize)]
pub struct CouponQuery {
    /// Restrict to one user
    pub user_id: Option<String>,
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/coupons/validate", post(validate))
        .route("/coupons/mine", get(mine))
}

pub fn admin_routes() -> Router<AppState> {
    Router::new()
        .route("/coupons", get(list).post(create))
        .route("/coupons/{code}/deactivate", post(deactivate))
}

/// POST /api/coupons/validate
async fn validate(
    State(state): State<AppState>,
    ShopperId(user_id): ShopperId,
    Json(body): Json<ValidateCoupon>,
) -> Result<Json<CouponQuote>> {
    let valid = coupon::validate_coupon(state.db.as_ref(), &body.code, &user_id).await?;
    let cart_subtotal = cart::get_cart(&state.db, &user_id).await?.subtotal;
    Ok(Json(CouponQuote {
        discount_amount: discount_for(cart_subtotal, valid.discount_percentage),
        code: valid.code,
        discount_percentage: valid.discount_percentage,
        expiration_date: valid.expiration_date,
        cart_subtotal,
    }))
}

/// GET /api/coupons/mine
async fn mine(
    State(state): State<AppState>,
    ShopperId(user_id): ShopperId,
) -> Result<Json<Option<coupon_entity::Model>>> {
    Ok(Json(
        coupon::active_coupon_for_user(&state.db, &user_id).await?,
    ))
}

/// GET /api/admin/coupons
async fn list(
    State(state): State<AppState>,
    _admin: AdminId,
    Query(query): Query<CouponQuery>,
) -> Result<Json<Vec<coupon_entity::Model>>> {
    Ok(Json(
        coupon::list_coupons(&state.db, query.user_id.as_deref()).await?,
    ))
}

/// POST /api/admin/coupons
#[instrument(skip(state))]
async fn create(
    State(state): State<AppState>,
    AdminId(admin_id): AdminId,
    Json(body): Json<NewCoupon>,
) -> Result<(StatusCode, Json<coupon_entity::Model>)> {
    let created = coupon::issue_coupon(&state.db, &admin_id, &body).await?;
    if let Some(message) = email::coupon_issued(&created) {
        email::deliver(state.mailer.as_ref(), message).await;
    }
    Ok((StatusCode::CREATED, Json(created)))
}

/// POST /api/admin/coupons/{code}/deactivate
#[instrument(skip(state))]
async fn deactivate(
    State(state): State<AppState>,
    AdminId(admin_id): AdminId,
    Path(code): Path<String>,
) -> Result<Json<coupon_entity::Model>> {
    Ok(Json(
        coupon::deactivate_coupon(&state.db, &admin_id, &code).await?,
    ))
}
