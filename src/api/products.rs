//! Catalog routes.

use super::{AppState, auth::AdminId};
use crate::{
    core::product::{
        self, NewProduct, NewVariant, ProductDetails, ProductFilter, ProductPatch, VariantPatch,
    },
    entities::{price_change, product as product_entity, variant},
    errors::Result,
};
use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, patch, post},
};
use tracing::instrument;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/products", get(list))
        .route("/products/featured", get(featured))
        .route("/products/{id}", get(get_by_id))
}

pub fn admin_routes() -> Router<AppState> {
    Router::new()
        .route("/products", get(admin_list).post(create))
        .route("/products/{id}", get(admin_get).patch(update))
        .route("/products/{id}/archive", post(archive))
        .route("/products/{id}/restore", post(restore))
        .route("/products/{id}/price-history", get(price_history))
        .route("/products/{id}/variants", post(add_variant))
        .route("/variants/{id}", patch(update_variant))
}

/// GET /api/products
async fn list(
    State(state): State<AppState>,
    Query(mut filter): Query<ProductFilter>,
) -> Result<Json<Vec<ProductDetails>>> {
    filter.include_archived = false;
    Ok(Json(product::list_products(&state.db, &filter).await?))
}

/// GET /api/products/featured
async fn featured(State(state): State<AppState>) -> Result<Json<Vec<ProductDetails>>> {
    Ok(Json(product::featured_products(&state.db).await?))
}

/// GET /api/products/{id}
async fn get_by_id(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<ProductDetails>> {
    Ok(Json(product::get_product(&state.db, id, false).await?))
}

/// GET /api/admin/products
async fn admin_list(
    State(state): State<AppState>,
    _admin: AdminId,
    Query(filter): Query<ProductFilter>,
) -> Result<Json<Vec<ProductDetails>>> {
    Ok(Json(product::list_products(&state.db, &filter).await?))
}

/// GET /api/admin/products/{id}
async fn admin_get(
    State(state): State<AppState>,
    _admin: AdminId,
    Path(id): Path<i64>,
) -> Result<Json<ProductDetails>> {
    Ok(Json(product::get_product(&state.db, id, true).await?))
}

/// POST /api/admin/products
#[instrument(skip(state, body))]
async fn create(
    State(state): State<AppState>,
    AdminId(admin_id): AdminId,
    Json(body): Json<NewProduct>,
) -> Result<(StatusCode, Json<ProductDetails>)> {
    let created = product::create_product(&state.db, &admin_id, body).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

/// PATCH /api/admin/products/{id}
#[instrument(skip(state))]
async fn update(
    State(state): State<AppState>,
    AdminId(admin_id): AdminId,
    Path(id): Path<i64>,
    Json(patch): Json<ProductPatch>,
) -> Result<Json<ProductDetails>> {
    Ok(Json(
        product::update_product(&state.db, &admin_id, id, patch).await?,
    ))
}

/// POST /api/admin/products/{id}/archive
#[instrument(skip(state))]
async fn archive(
    State(state): State<AppState>,
    AdminId(admin_id): AdminId,
    Path(id): Path<i64>,
) -> Result<Json<product_entity::Model>> {
    Ok(Json(product::archive_product(&state.db, &admin_id, id).await?))
}

/// POST /api/admin/products/{id}/restore
#[instrument(skip(state))]
async fn restore(
    State(state): State<AppState>,
    AdminId(admin_id): AdminId,
    Path(id): Path<i64>,
) -> Result<Json<product_entity::Model>> {
    Ok(Json(product::restore_product(&state.db, &admin_id, id).await?))
}

/// GET /api/admin/products/{id}/price-history
async fn price_history(
    State(state): State<AppState>,
    _admin: AdminId,
    Path(id): Path<i64>,
) -> Result<Json<Vec<price_change::Model>>> {
    Ok(Json(product::price_history(&state.db, id).await?))
}

/// POST /api/admin/products/{id}/variants
#[instrument(skip(state))]
async fn add_variant(
    State(state): State<AppState>,
    AdminId(admin_id): AdminId,
    Path(id): Path<i64>,
    Json(body): Json<NewVariant>,
) -> Result<(StatusCode, Json<variant::Model>)> {
    let created = product::add_variant(&state.db, &admin_id, id, body).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

/// PATCH /api/admin/variants/{id}
#[instrument(skip(state))]
async fn update_variant(
    State(state): State<AppState>,
    AdminId(admin_id): AdminId,
    Path(id): Path<i64>,
    Json(patch): Json<VariantPatch>,
) -> Result<Json<variant::Model>> {
    Ok(Json(
        product::update_variant(&state.db, &admin_id, id, patch).await?,
    ))
}
