//! REST surface for the storefront and its back office.
//!
//! Shopper routes live under `/api`, admin routes under `/api/admin`. Every handler is a
//! thin wrapper over `crate::core`; errors turn into JSON bodies via [`IntoResponse`] on
//! [`crate::errors::Error`].

mod analytics;
mod audit;
pub mod auth;
mod cart;
mod checkout;
mod coupons;
mod error;
mod inventory;
mod orders;
mod products;
mod refunds;

use crate::{config::AppConfig, email::Mailer, payments::PaymentGateway};
use axum::{
    Json, Router,
    http::{HeaderValue, Method},
    routing::get,
};
use sea_orm::DatabaseConnection;
use serde_json::{Value, json};
use std::sync::Arc;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::warn;

/// Shared handles passed to every handler.
#[derive(Clone)]
pub struct AppState {
    /// Shared connection pool
    pub db: Arc<DatabaseConnection>,
    /// Payment provider
    pub gateway: Arc<dyn PaymentGateway>,
    /// Outgoing mail
    pub mailer: Arc<dyn Mailer>,
    /// Loaded settings
    pub config: Arc<AppConfig>,
}

/// Builds the full application router.
pub fn router(state: AppState) -> Router {
    let admin = Router::new()
        .merge(products::admin_routes())
        .merge(inventory::admin_routes())
        .merge(orders::admin_routes())
        .merge(refunds::admin_routes())
        .merge(coupons::admin_routes())
        .merge(audit::admin_routes())
        .merge(analytics::admin_routes());

    let storefront = Router::new()
        .merge(products::routes())
        .merge(cart::routes())
        .merge(checkout::routes())
        .merge(orders::routes())
        .merge(coupons::routes())
        .nest("/admin", admin);

    let cors = cors_layer(&state.config);
    Router::new()
        .route("/health", get(health))
        .nest("/api", storefront)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

fn cors_layer(config: &AppConfig) -> CorsLayer {
    let layer = CorsLayer::new()
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PATCH,
            Method::DELETE,
        ])
        .allow_headers(Any);
    match HeaderValue::from_str(config.store_base_url.trim_end_matches('/')) {
        Ok(origin) => layer.allow_origin(origin),
        Err(e) => {
            warn!(origin = %config.store_base_url, "Ignoring unusable CORS origin: {}", e);
            layer
        }
    }
}

async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    #![allow(clippy::float_cmp)]
    use super::*;
    use crate::{
        errors::Result,
        payments::OfflineGateway,
        test_utils::{RecordingMailer, create_test_product, setup_test_db},
    };
    use axum::{
        body::Body,
        http::{Request, StatusCode},
    };
    use http_body_util::BodyExt;
    use tower::ServiceExt;

    async fn test_state() -> Result<AppState> {
        Ok(AppState {
            db: Arc::new(setup_test_db().await?),
            gateway: Arc::new(OfflineGateway::new()),
            mailer: Arc::new(RecordingMailer::default()),
            config: Arc::new(AppConfig {
                admin_ids: vec!["boss".to_string()],
                ..Default::default()
            }),
        })
    }

    async fn send(
        app: &Router,
        method: &str,
        uri: &str,
        headers: &[(&str, &str)],
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut request = Request::builder().method(method).uri(uri);
        for (name, value) in headers {
            request = request.header(*name, *value);
        }
        let request = match body {
            Some(body) => request
                .header("content-type", "application/json")
                .body(Body::from(body.to_string())),
            None => request.body(Body::empty()),
        }
        .unwrap();

        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, value)
    }

    #[tokio::test]
    async fn test_health() -> Result<()> {
        let app = router(test_state().await?);
        let (status, body) = send(&app, "GET", "/health", &[], None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
        Ok(())
    }

    #[tokio::test]
    async fn test_identity_headers_are_enforced() -> Result<()> {
        let app = router(test_state().await?);

        let (status, body) = send(&app, "GET", "/api/cart", &[], None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert!(body["error"].as_str().unwrap().contains("X-User-Id"));

        let (status, _) = send(
            &app,
            "GET",
            "/api/admin/orders",
            &[("x-admin-id", "mallory")],
            None,
        )
        .await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        let (status, body) = send(
            &app,
            "GET",
            "/api/admin/orders",
            &[("x-admin-id", "boss")],
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["total"], 0);
        Ok(())
    }

    #[tokio::test]
    async fn test_unknown_product_is_404() -> Result<()> {
        let app = router(test_state().await?);
        let (status, body) = send(&app, "GET", "/api/products/999", &[], None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert!(body["error"].is_string());
        Ok(())
    }

    #[tokio::test]
    async fn test_cart_to_order_flow() -> Result<()> {
        let state = test_state().await?;
        let details = create_test_product(&state.db, "Hoodie", 50.0, &[("L", "grey", 3)]).await?;
        let variant_id = details.variants[0].id;
        let app = router(state);
        let shopper = [("x-user-id", "alice")];

        let (status, cart) = send(
            &app,
            "POST",
            "/api/cart",
            &shopper,
            Some(json!({ "variant_id": variant_id, "quantity": 2 })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(cart["subtotal"], 100.0);

        let (status, _) = send(
            &app,
            "POST",
            "/api/cart",
            &shopper,
            Some(json!({ "variant_id": variant_id, "quantity": 5 })),
        )
        .await;
        assert_eq!(status, StatusCode::CONFLICT);

        let (status, started) = send(
            &app,
            "POST",
            "/api/checkout",
            &shopper,
            Some(json!({ "shipping_address": "1 Main St" })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        let session_id = started["session_id"].as_str().unwrap().to_string();

        let (status, confirmed) = send(
            &app,
            "POST",
            "/api/checkout/confirm",
            &shopper,
            Some(json!({ "session_id": session_id })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(confirmed["order"]["status"], "processing");
        assert_eq!(confirmed["order"]["payment_status"], "paid");

        let (status, orders) = send(&app, "GET", "/api/orders", &shopper, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(orders.as_array().unwrap().len(), 1);

        let (status, cart) = send(&app, "GET", "/api/cart", &shopper, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(cart["item_count"], 0);

        let (status, _) = send(
            &app,
            "GET",
            "/api/orders",
            &[("x-user-id", "bob")],
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        Ok(())
    }

    #[tokio::test]
    async fn test_admin_stock_adjustment_is_audited() -> Result<()> {
        let state = test_state().await?;
        let details = create_test_product(&state.db, "Cap", 15.0, &[("OS", "red", 2)]).await?;
        let variant_id = details.variants[0].id;
        let app = router(state);
        let admin = [("x-admin-id", "boss")];

        let (status, adjusted) = send(
            &app,
            "POST",
            &format!("/api/admin/variants/{variant_id}/stock"),
            &admin,
            Some(json!({
                "adjustment": { "mode": "increase", "quantity": 8 },
                "reason": "delivery"
            })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(adjusted["variant"]["count_in_stock"], 10);

        let (status, logs) = send(
            &app,
            "GET",
            "/api/admin/audit-logs?action=stock_adjusted",
            &admin,
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(logs.as_array().unwrap().len(), 1);

        let (status, low) = send(
            &app,
            "GET",
            "/api/admin/inventory/low-stock?threshold=20",
            &admin,
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(low[0]["variant_id"], variant_id);
        Ok(())
    }
}
