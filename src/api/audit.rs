use super::{AppState, auth::AdminId};
use crate::{
    core::audit::{self, AuditFilter},
    entities::audit_log,
    errors::Result,
};
use axum::{
    Json, Router,
    extract::{Query, State},
    routing::get,
};

pub fn admin_routes() -> Router<AppState> {
    Router::new().route("/audit-logs", get(list))
}

/// GET /api/admin/audit-logs
async fn list(
    State(state): State<AppState>,
    _admin: AdminId,
    Query(filter): Query<AuditFilter>,
) -> Result<Json<Vec<audit_log::Model>>> {
    Ok(Json(audit::list_audit_logs(&state.db, &filter).await?))
}
