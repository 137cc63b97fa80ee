//! Shared test utilities.
//!
//! Helpers for setting up an in-memory database and seeding products and orders with
//! sensible defaults.

use crate::{
    core::{
        coupon::generate_code,
        order::{OrderDetails, load_details},
        product::{self, NewProduct, NewVariant, ProductDetails},
    },
    email::{EmailMessage, Mailer},
    entities::{OrderStatus, PaymentStatus, Product, order, order_item, variant},
    errors::{Error, Result},
    payments::{CheckoutLine, CheckoutRequest, OfflineGateway, PaymentGateway},
};
use async_trait::async_trait;
use chrono::Utc;
use sea_orm::{ActiveModelTrait, DatabaseConnection, EntityTrait, Set};
use std::sync::Mutex;

/// Creates an in-memory `SQLite` database with all tables initialized.
/// This is the standard setup for all integration tests.
pub async fn setup_test_db() -> Result<DatabaseConnection> {
    let db = sea_orm::Database::connect("sqlite::memory:").await?;
    crate::config::database::create_tables(&db).await?;
    Ok(db)
}

/// Routes tracing output to the test harness. Safe to call from every test.
pub fn init_test_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("storefront=debug")
        .with_test_writer()
        .try_init();
}

/// Creates a product through the catalog with one variant per `(size, color, stock)`.
///
/// # Defaults
/// * `category`: "general"
/// * `description`: "Test product"
/// * SKUs are generated from the name
pub async fn create_test_product(
    db: &DatabaseConnection,
    name: &str,
    price: f64,
    variants: &[(&str, &str, i32)],
) -> Result<ProductDetails> {
    product::create_product(
        db,
        "admin",
        NewProduct {
            name: name.to_string(),
            description: "Test product".to_string(),
            category: "general".to_string(),
            price,
            images: Vec::new(),
            is_featured: false,
            variants: variants
                .iter()
                .map(|(size, color, stock)| NewVariant {
                    size: (*size).to_string(),
                    color: (*color).to_string(),
                    count_in_stock: *stock,
                    price: None,
                    sku: None,
                })
                .collect(),
        },
    )
    .await
}

/// An unsaved order model for pure calculations.
pub fn sample_order_model(total_amount: f64) -> order::Model {
    let now = Utc::now();
    order::Model {
        id: 1,
        user_id: "test_user".to_string(),
        status: OrderStatus::Delivered,
        total_amount,
        total_refunded: 0.0,
        discount_amount: 0.0,
        coupon_code: None,
        payment_session_id: None,
        payment_status: PaymentStatus::Paid,
        shipping_address: "1 Test Street".to_string(),
        inventory_processed: false,
        created_at: now,
        updated_at: now,
    }
}

async fn insert_order(
    db: &DatabaseConnection,
    user_id: &str,
    status: OrderStatus,
    variant: &variant::Model,
    quantity: i32,
    session_id: Option<String>,
) -> Result<OrderDetails> {
    let product = Product::find_by_id(variant.product_id)
        .one(db)
        .await?
        .ok_or(Error::ProductNotFound {
            id: variant.product_id,
        })?;
    let price = variant.effective_price(product.price);
    let now = Utc::now();

    let created = order::ActiveModel {
        user_id: Set(user_id.to_string()),
        status: Set(status),
        total_amount: Set(price * f64::from(quantity)),
        total_refunded: Set(0.0),
        discount_amount: Set(0.0),
        coupon_code: Set(None),
        payment_session_id: Set(session_id),
        payment_status: Set(PaymentStatus::Paid),
        shipping_address: Set("1 Test Street".to_string()),
        inventory_processed: Set(false),
        created_at: Set(now),
        updated_at: Set(now),
        ..Default::default()
    }
    .insert(db)
    .await?;
    order_item::ActiveModel {
        order_id: Set(created.id),
        product_id: Set(product.id),
        variant_id: Set(variant.id),
        name: Set(product.name.clone()),
        size: Set(variant.size.clone()),
        color: Set(variant.color.clone()),
        quantity: Set(quantity),
        price: Set(price),
        ..Default::default()
    }
    .insert(db)
    .await?;

    load_details(db, created).await
}

/// Creates a paid order in `status` for two units of a fresh $20.00 product
/// (size "M", color "black", 10 in stock).
pub async fn create_test_order(
    db: &DatabaseConnection,
    user_id: &str,
    status: OrderStatus,
) -> Result<OrderDetails> {
    let tee = create_test_product(
        db,
        &format!("Test Tee {}", generate_code()),
        20.0,
        &[("M", "black", 10)],
    )
    .await?;
    insert_order(db, user_id, status, &tee.variants[0], 2, None).await
}

/// Creates a paid order in `status` for `quantity` units of an existing variant.
pub async fn create_test_order_with(
    db: &DatabaseConnection,
    user_id: &str,
    status: OrderStatus,
    variant: &variant::Model,
    quantity: i32,
) -> Result<OrderDetails> {
    insert_order(db, user_id, status, variant, quantity, None).await
}

/// Like [`create_test_order`], but the order carries a session known to `gateway` so it
/// can be refunded.
pub async fn create_paid_test_order(
    db: &DatabaseConnection,
    gateway: &OfflineGateway,
    user_id: &str,
    status: OrderStatus,
) -> Result<OrderDetails> {
    let tee = create_test_product(
        db,
        &format!("Test Tee {}", generate_code()),
        20.0,
        &[("M", "black", 10)],
    )
    .await?;
    let session = gateway
        .create_checkout_session(&CheckoutRequest {
            user_id: user_id.to_string(),
            lines: vec![CheckoutLine {
                name: tee.product.name.clone(),
                unit_amount: 2000,
                quantity: 2,
            }],
            discount_percentage: None,
            coupon_code: None,
            success_url: "http://shop.test/success".to_string(),
            cancel_url: "http://shop.test/cart".to_string(),
        })
        .await?;
    insert_order(db, user_id, status, &tee.variants[0], 2, Some(session.id)).await
}

/// Mailer that keeps every message for later assertions.
#[derive(Default)]
pub struct RecordingMailer {
    sent: Mutex<Vec<EmailMessage>>,
}

impl RecordingMailer {
    pub fn sent(&self) -> Vec<EmailMessage> {
        self.sent.lock().map(|s| s.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl Mailer for RecordingMailer {
    async fn send(&self, message: &EmailMessage) -> Result<()> {
        if let Ok(mut sent) = self.sent.lock() {
            sent.push(message.clone());
        }
        Ok(())
    }
}
