//! Audit logging - append-only records of admin-initiated mutations.
//!
//! [`AuditLogger::log`] is generic over the connection so a mutation and its audit row
//! commit in the same database transaction.

use crate::{
    entities::{AuditAction, AuditLog, audit_log},
    errors::Result,
};
use chrono::{DateTime, Utc};
use sea_orm::{QueryOrder, QuerySelect, Set, prelude::*};
use serde::Deserialize;
use tracing::debug;

/// Default number of rows returned by [`list_audit_logs`].
pub const DEFAULT_AUDIT_LIMIT: u64 = 100;

/// Writes audit rows.
pub struct AuditLogger;

impl AuditLogger {
    /// Appends one audit row.
    ///
    /// # Errors
    /// Returns an error if the insert fails.
    pub async fn log<C>(
        conn: &C,
        admin_id: &str,
        action: AuditAction,
        entity_type: &str,
        entity_id: impl ToString,
        changes: Json,
    ) -> Result<audit_log::Model>
    where
        C: ConnectionTrait,
    {
        let entity_id = entity_id.to_string();
        debug!(admin_id, %action, entity_type, %entity_id, "recording audit entry");
        let row = audit_log::ActiveModel {
            admin_id: Set(admin_id.to_string()),
            action: Set(action),
            entity_type: Set(entity_type.to_string()),
            entity_id: Set(entity_id),
            changes: Set(changes),
            created_at: Set(Utc::now()),
            ..Default::default()
        };
        row.insert(conn).await.map_err(Into::into)
    }
}

/// Filters for [`list_audit_logs`]. Every field is optional.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AuditFilter {
    /// Only actions by this admin
    pub admin_id: Option<String>,
    /// Only this action
    pub action: Option<AuditAction>,
    /// Only this kind of entity
    pub entity_type: Option<String>,
    /// Only this entity
    pub entity_id: Option<String>,
    /// Inclusive lower bound
    pub from: Option<DateTime<Utc>>,
    /// Exclusive upper bound
    pub to: Option<DateTime<Utc>>,
    /// Maximum rows, newest first
    pub limit: Option<u64>,
}

/// Lists audit rows matching `filter`, newest first.
///
/// # Errors
/// Returns an error if the database query fails.
pub async fn list_audit_logs(
    db: &DatabaseConnection,
    filter: &AuditFilter,
) -> Result<Vec<audit_log::Model>> {
    let mut query = AuditLog::find();
    if let Some(admin_id) = &filter.admin_id {
        query = query.filter(audit_log::Column::AdminId.eq(admin_id.as_str()));
    }
    if let Some(action) = filter.action {
        query = query.filter(audit_log::Column::Action.eq(action));
    }
    if let Some(entity_type) = &filter.entity_type {
        query = query.filter(audit_log::Column::EntityType.eq(entity_type.as_str()));
    }
    if let Some(entity_id) = &filter.entity_id {
        query = query.filter(audit_log::Column::EntityId.eq(entity_id.as_str()));
    }
    if let Some(from) = filter.from {
        query = query.filter(audit_log::Column::CreatedAt.gte(from));
    }
    if let Some(to) = filter.to {
        query = query.filter(audit_log::Column::CreatedAt.lte(to));
    }

    query
        .order_by_desc(audit_log::Column::CreatedAt)
        .order_by_desc(audit_log::Column::Id)
        .limit(filter.limit.unwrap_or(DEFAULT_AUDIT_LIMIT))
        .all(db)
        .await
        .map_err(Into::into)
}
