//! Database connection and schema setup.
//!
//! Tables are generated from the entity definitions with `Schema::create_table_from_entity`,
//! so the schema always matches the Rust models. Creation is idempotent and runs on every
//! start.

use crate::entities::{
    AuditLog, CartItem, Coupon, InventoryLog, Order, OrderItem, PriceChange, Product, Refund,
    SystemState, Variant, audit_log, cart_item, inventory_log, order,
};
use crate::errors::Result;
use sea_orm::{
    ConnectionTrait, Database, DatabaseConnection, EntityTrait, Schema,
    sea_query::{Index, IndexCreateStatement},
};
use std::path::Path;
use tracing::info;

/// Makes sure the directory of a file-backed `SQLite` URL exists.
fn ensure_sqlite_dir(database_url: &str) -> Result<()> {
    let Some(rest) = database_url.strip_prefix("sqlite://") else {
        return Ok(());
    };
    let file = rest.split('?').next().unwrap_or_default();
    if let Some(parent) = Path::new(file).parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    Ok(())
}

/// Connects to `database_url`.
///
/// # Errors
/// Returns an error if the data directory cannot be created or the connection fails.
pub async fn create_connection(database_url: &str) -> Result<DatabaseConnection> {
    ensure_sqlite_dir(database_url)?;
    let db = Database::connect(database_url).await?;
    info!("Connected to database");
    Ok(db)
}

async fn create_table<E>(db: &DatabaseConnection, schema: &Schema, entity: E) -> Result<()>
where
    E: EntityTrait,
{
    let builder = db.get_database_backend();
    let mut statement = schema.create_table_from_entity(entity);
    statement.if_not_exists();
    db.execute(builder.build(&statement)).await?;
    Ok(())
}

fn indexes() -> Vec<IndexCreateStatement> {
    vec![
        Index::create()
            .name("idx_audit_logs_entity")
            .table(AuditLog)
            .col(audit_log::Column::EntityType)
            .col(audit_log::Column::EntityId)
            .if_not_exists()
            .to_owned(),
        Index::create()
            .name("idx_audit_logs_admin_created")
            .table(AuditLog)
            .col(audit_log::Column::AdminId)
            .col(audit_log::Column::CreatedAt)
            .if_not_exists()
            .to_owned(),
        Index::create()
            .name("idx_inventory_logs_variant_created")
            .table(InventoryLog)
            .col(inventory_log::Column::VariantId)
            .col(inventory_log::Column::CreatedAt)
            .if_not_exists()
            .to_owned(),
        Index::create()
            .name("idx_orders_status_processed")
            .table(Order)
            .col(order::Column::Status)
            .col(order::Column::InventoryProcessed)
            .if_not_exists()
            .to_owned(),
        Index::create()
            .name("idx_cart_items_user_variant")
            .table(CartItem)
            .col(cart_item::Column::UserId)
            .col(cart_item::Column::VariantId)
            .unique()
            .if_not_exists()
            .to_owned(),
    ]
}

/// Creates every table and index that does not exist yet.
///
/// # Errors
/// Returns an error if a DDL statement fails.
pub async fn create_tables(db: &DatabaseConnection) -> Result<()> {
    let builder = db.get_database_backend();
    let schema = Schema::new(builder);

    create_table(db, &schema, Product).await?;
    create_table(db, &schema, Variant).await?;
    create_table(db, &schema, PriceChange).await?;
    create_table(db, &schema, CartItem).await?;
    create_table(db, &schema, Order).await?;
    create_table(db, &schema, OrderItem).await?;
    create_table(db, &schema, Refund).await?;
    create_table(db, &schema, Coupon).await?;
    create_table(db, &schema, AuditLog).await?;
    create_table(db, &schema, InventoryLog).await?;
    create_table(db, &schema, SystemState).await?;

    for index in indexes() {
        db.execute(builder.build(&index)).await?;
    }
    Ok(())
}
