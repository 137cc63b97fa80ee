//! Admin refund review routes.

use super::{AppState, auth::AdminId};
use crate::{
    core::refund::{self, RefundOutcome},
    entities::{RefundStatus, refund as refund_entity},
    errors::Result,
};
use axum::{
    Json, Router,
    extract::{Path, Query, State},
    routing::{get, post},
};
use serde::Deserialize;
use tracing::instrument;

#[derive(Debug, Default, Deserialize)]
pub struct RefundQuery {
    /// Only refunds in this state
    pub status: Option<RefundStatus>,
}

#[derive(Debug, Default, Deserialize)]
pub struct Decision {
    /// Admin note kept on the refund
    pub note: Option<String>,
}

pub fn admin_routes() -> Router<AppState> {
    Router::new()
        .route("/refunds", get(list))
        .route("/refunds/{id}/approve", post(approve))
        .route("/refunds/{id}/reject", post(reject))
}

/// GET /api/admin/refunds
async fn list(
    State(state): State<AppState>,
    _admin: AdminId,
    Query(query): Query<RefundQuery>,
) -> Result<Json<Vec<refund_entity::Model>>> {
    Ok(Json(refund::list_refunds(&state.db, query.status).await?))
}

/// POST /api/admin/refunds/{id}/approve
#[instrument(skip(state))]
async fn approve(
    State(state): State<AppState>,
    AdminId(admin_id): AdminId,
    Path(id): Path<i64>,
    Json(body): Json<Decision>,
) -> Result<Json<RefundOutcome>> {
    let outcome = refund::approve_refund(
        &state.db,
        state.gateway.as_ref(),
        state.mailer.as_ref(),
        &admin_id,
        id,
        body.note,
    )
    .await?;
    Ok(Json(outcome))
}

/// POST /api/admin/refunds/{id}/reject
#[instrument(skip(state))]
async fn reject(
    State(state): State<AppState>,
    AdminId(admin_id): AdminId,
    Path(id): Path<i64>,
    Json(body): Json<Decision>,
) -> Result<Json<RefundOutcome>> {
    let outcome =
        refund::reject_refund(&state.db, state.mailer.as_ref(), &admin_id, id, body.note).await?;
    Ok(Json(outcome))
}
