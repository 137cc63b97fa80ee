//! Entity module - Contains all SeaORM entity definitions for the database.
//! These entities represent the database tables and their relationships.
//! Each entity has a Model struct for data and an Entity struct for operations.
//!
//! The storefront's document-shaped records (a product with its variants, an order with
//! its lines and refunds) are stored as parent tables with child tables keyed by the parent id.

pub mod audit_log;
pub mod cart_item;
pub mod coupon;
pub mod inventory_log;
pub mod order;
pub mod order_item;
pub mod price_change;
pub mod product;
pub mod refund;
pub mod system_state;
pub mod variant;

// Re-export specific types to avoid conflicts
pub use audit_log::{AuditAction, Entity as AuditLog, Model as AuditLogModel};
pub use cart_item::{Entity as CartItem, Model as CartItemModel};
pub use coupon::{Entity as Coupon, Model as CouponModel};
pub use inventory_log::{AdjustmentType, Entity as InventoryLog, Model as InventoryLogModel};
pub use order::{Entity as Order, Model as OrderModel, OrderStatus, PaymentStatus};
pub use order_item::{Entity as OrderItem, Model as OrderItemModel};
pub use price_change::{Entity as PriceChange, Model as PriceChangeModel};
pub use product::{Entity as Product, Model as ProductModel};
pub use refund::{Entity as Refund, Model as RefundModel, RefundStatus};
pub use system_state::{
    Column as SystemStateColumn, Entity as SystemState, Model as SystemStateModel,
};
pub use variant::{Entity as Variant, Model as VariantModel};
