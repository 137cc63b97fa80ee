//! Checkout - turns a cart into a pending order backed by a gateway session, and confirms
//! it once the gateway reports payment.
//!
//! Gateway calls never run inside a database transaction.

use crate::{
    core::{
        cart::{clear_cart, get_cart},
        coupon::{
            NewCoupon, RewardPolicy, create_coupon, discount_for, redeem_coupon, validate_coupon,
        },
        order::{OrderDetails, load_details},
        round_money, to_cents,
    },
    email::{self, Mailer},
    entities::{Order, OrderStatus, PaymentStatus, coupon, order, order_item},
    errors::{Error, Result},
    payments::{CheckoutLine, CheckoutRequest, PaymentGateway, SESSION_PLACEHOLDER},
};
use chrono::Utc;
use sea_orm::{Set, TransactionTrait, prelude::*};
use serde::Serialize;
use tracing::{error, info, instrument, warn};

#[derive(Debug, Clone, Serialize)]
pub struct CheckoutStarted {
    /// Pending order created for the session
    pub order_id: i64,
    /// Gateway session id
    pub session_id: String,
    /// Where to send the shopper to pay
    pub url: String,
    /// Sum of line totals
    pub subtotal: f64,
    /// Coupon discount
    pub discount_amount: f64,
    /// Amount the gateway will charge
    pub total_amount: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct ConfirmedOrder {
    /// The order after confirmation
    pub order: OrderDetails,
    /// Coupon earned by this order, if any
    pub reward_coupon: Option<coupon::Model>,
    /// True when an earlier call had already confirmed the order
    pub already_confirmed: bool,
}

/// Validates the shopper's cart and opens a payment session for it.
///
/// # Errors
/// Returns an error if:
/// - The cart is empty or the shipping address is blank
/// - Any line asks for more than the variant has in stock
/// - The coupon is unknown or unavailable to this shopper
/// - The discounted total is not positive
/// - The gateway call or a database operation fails
#[instrument(skip(db, gateway))]
pub async fn start_checkout(
    db: &DatabaseConnection,
    gateway: &dyn PaymentGateway,
    store_base_url: &str,
    user_id: &str,
    coupon_code: Option<&str>,
    shipping_address: &str,
) -> Result<CheckoutStarted> {
    let cart = get_cart(db, user_id).await?;
    if cart.is_empty() {
        return Err(Error::EmptyCart);
    }
    let shipping_address = shipping_address.trim();
    if shipping_address.is_empty() {
        return Err(Error::validation("Shipping address is required"));
    }
    for line in &cart.lines {
        if line.quantity > line.available_stock {
            return Err(Error::InsufficientStock {
                variant_id: line.variant_id,
                requested: line.quantity,
                available: line.available_stock,
            });
        }
    }

    let coupon = match coupon_code.map(str::trim).filter(|c| !c.is_empty()) {
        Some(code) => Some(validate_coupon(db, code, user_id).await?),
        None => None,
    };
    let discount_amount = coupon
        .as_ref()
        .map_or(0.0, |c| discount_for(cart.subtotal, c.discount_percentage));
    let total_amount = round_money(cart.subtotal - discount_amount);
    if total_amount <= 0.0 {
        return Err(Error::InvalidAmount {
            amount: total_amount,
        });
    }

    let base = store_base_url.trim_end_matches('/');
    let request = CheckoutRequest {
        user_id: user_id.to_string(),
        lines: cart
            .lines
            .iter()
            .map(|l| CheckoutLine {
                name: format!("{} ({} / {})", l.name, l.size, l.color),
                unit_amount: to_cents(l.unit_price),
                quantity: l.quantity,
            })
            .collect(),
        discount_percentage: coupon.as_ref().map(|c| c.discount_percentage),
        coupon_code: coupon.as_ref().map(|c| c.code.clone()),
        success_url: format!("{base}/purchase-success?session_id={SESSION_PLACEHOLDER}"),
        cancel_url: format!("{base}/purchase-cancel"),
    };
    let session = gateway.create_checkout_session(&request).await?;

    let now = Utc::now();
    let txn = db.begin().await?;
    let order = order::ActiveModel {
        user_id: Set(user_id.to_string()),
        status: Set(OrderStatus::Pending),
        total_amount: Set(total_amount),
        total_refunded: Set(0.0),
        discount_amount: Set(discount_amount),
        coupon_code: Set(coupon.map(|c| c.code)),
        payment_session_id: Set(Some(session.id.clone())),
        payment_status: Set(PaymentStatus::Unpaid),
        shipping_address: Set(shipping_address.to_string()),
        inventory_processed: Set(false),
        created_at: Set(now),
        updated_at: Set(now),
        ..Default::default()
    }
    .insert(&txn)
    .await?;
    for line in &cart.lines {
        order_item::ActiveModel {
            order_id: Set(order.id),
            product_id: Set(line.product_id),
            variant_id: Set(line.variant_id),
            name: Set(line.name.clone()),
            size: Set(line.size.clone()),
            color: Set(line.color.clone()),
            quantity: Set(line.quantity),
            price: Set(line.unit_price),
            ..Default::default()
        }
        .insert(&txn)
        .await?;
    }
    txn.commit().await?;

    info!(
        order_id = order.id,
        session_id = %session.id,
        total_amount,
        "Checkout started"
    );
    Ok(CheckoutStarted {
        order_id: order.id,
        session_id: session.id,
        url: session.url,
        subtotal: cart.subtotal,
        discount_amount,
        total_amount,
    })
}

fn paid_but_closed(order_id: i64, status: OrderStatus) -> Error {
    Error::conflict(format!(
        "Order #{order_id} is {status}; its payment was recorded and must be refunded"
    ))
}

/// Confirms the order behind a paid checkout session. Safe to call more than once.
///
/// When `user_id` is given the session must belong to that shopper.
///
/// # Errors
/// Returns `SessionNotFound` for an unknown session, `PaymentIncomplete` when the gateway
/// has not collected the payment, `Conflict` when the order was cancelled before the payment
/// arrived (the payment is still recorded), or a gateway or database error.
#[instrument(skip(db, gateway, mailer, reward))]
pub async fn confirm_checkout(
    db: &DatabaseConnection,
    gateway: &dyn PaymentGateway,
    mailer: &dyn Mailer,
    reward: &RewardPolicy,
    user_id: Option<&str>,
    session_id: &str,
) -> Result<ConfirmedOrder> {
    let not_found = || Error::SessionNotFound {
        session_id: session_id.to_string(),
    };
    let existing = Order::find()
        .filter(order::Column::PaymentSessionId.eq(session_id))
        .one(db)
        .await?
        .filter(|o| user_id.is_none_or(|u| u == o.user_id))
        .ok_or_else(not_found)?;

    if existing.payment_status == PaymentStatus::Paid {
        if existing.status == OrderStatus::Cancelled {
            return Err(paid_but_closed(existing.id, existing.status));
        }
        return Ok(ConfirmedOrder {
            order: load_details(db, existing).await?,
            reward_coupon: None,
            already_confirmed: true,
        });
    }

    if gateway.retrieve_session(session_id).await? != PaymentStatus::Paid {
        return Err(Error::PaymentIncomplete {
            session_id: session_id.to_string(),
        });
    }

    let txn = db.begin().await?;
    // Re-read inside the transaction; a concurrent confirmation may have won
    let current = Order::find_by_id(existing.id)
        .one(&txn)
        .await?
        .ok_or_else(not_found)?;
    if current.payment_status == PaymentStatus::Paid {
        let order = load_details(&txn, current).await?;
        txn.commit().await?;
        return Ok(ConfirmedOrder {
            order,
            reward_coupon: None,
            already_confirmed: true,
        });
    }

    if !current.status.can_transition_to(OrderStatus::Processing) {
        // Keep the captured payment on record so it can be refunded
        let order_id = current.id;
        let status = current.status;
        let mut active: order::ActiveModel = current.into();
        active.payment_status = Set(PaymentStatus::Paid);
        active.updated_at = Set(Utc::now());
        active.update(&txn).await?;
        txn.commit().await?;
        error!(order_id, %status, session_id, "Payment captured for an order that can no longer be fulfilled");
        return Err(paid_but_closed(order_id, status));
    }

    let buyer = current.user_id.clone();
    let coupon_code = current.coupon_code.clone();
    let mut active: order::ActiveModel = current.into();
    active.payment_status = Set(PaymentStatus::Paid);
    active.status = Set(OrderStatus::Processing);
    active.updated_at = Set(Utc::now());
    let confirmed = active.update(&txn).await?;

    if let Some(code) = coupon_code {
        match redeem_coupon(&txn, &code, &buyer).await {
            Ok(_) => {}
            Err(Error::Database(e)) => return Err(e.into()),
            // The shopper already paid the discounted price
            Err(e) => warn!(order_id = confirmed.id, %code, "Coupon not redeemed: {}", e),
        }
    }
    clear_cart(&txn, &buyer).await?;

    let reward_coupon = if reward.earns_reward(confirmed.total_amount) {
        Some(
            create_coupon(
                &txn,
                &NewCoupon {
                    user_id: Some(buyer.clone()),
                    discount_percentage: reward.discount_percentage,
                    valid_for_days: reward.valid_for_days,
                },
            )
            .await?,
        )
    } else {
        None
    };

    let details = load_details(&txn, confirmed).await?;
    txn.commit().await?;
    info!(order_id = details.order.id, user_id = %buyer, "Order paid");

    email::deliver(mailer, email::order_confirmation(&details.order, &details.items)).await;
    if let Some(message) = reward_coupon.as_ref().and_then(email::coupon_issued) {
        email::deliver(mailer, message).await;
    }

    Ok(ConfirmedOrder {
        order: details,
        reward_coupon,
        already_confirmed: false,
    })
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    #![allow(clippy::float_cmp)]
    use super::*;
    use crate::core::cart::add_to_cart;
    use crate::core::coupon::active_coupon_for_user;
    use crate::entities::Coupon;
    use crate::payments::OfflineGateway;
    use crate::test_utils::*;

    const BASE: &str = "http://shop.test";

    fn no_reward() -> RewardPolicy {
        RewardPolicy {
            threshold: 1_000_000.0,
            discount_percentage: 10,
            valid_for_days: 30,
        }
    }

    #[tokio::test]
    async fn test_empty_cart_is_rejected() -> Result<()> {
        let db = setup_test_db().await?;
        let gateway = OfflineGateway::new();
        let result = start_checkout(&db, &gateway, BASE, "alice", None, "1 Main St").await;
        assert!(matches!(result.unwrap_err(), Error::EmptyCart));
        Ok(())
    }

    #[tokio::test]
    async fn test_checkout_revalidates_stock() -> Result<()> {
        let db = setup_test_db().await?;
        let gateway = OfflineGateway::new();
        let tee = create_test_product(&db, "Tee", 20.0, &[("M", "black", 3)]).await?;
        add_to_cart(&db, "alice", tee.variants[0].id, 3).await?;

        // Stock sold elsewhere after the item was carted
        crate::core::inventory::adjust_variant_stock(
            &db,
            "admin",
            tee.variants[0].id,
            crate::core::inventory::Adjustment::Set(1),
            "recount",
        )
        .await?;

        let result = start_checkout(&db, &gateway, BASE, "alice", None, "1 Main St").await;
        assert!(matches!(
            result.unwrap_err(),
            Error::InsufficientStock { available: 1, .. }
        ));
        assert_eq!(Order::find().count(&db).await?, 0);
        Ok(())
    }

    #[tokio::test]
    async fn test_full_checkout_with_coupon_and_reward() -> Result<()> {
        let db = setup_test_db().await?;
        let gateway = OfflineGateway::new();
        let mailer = RecordingMailer::default();
        let tee = create_test_product(&db, "Tee", 20.0, &[("M", "black", 5)]).await?;
        add_to_cart(&db, "alice", tee.variants[0].id, 2).await?;
        let coupon = create_coupon(
            &db,
            &NewCoupon {
                user_id: Some("alice".to_string()),
                discount_percentage: 10,
                valid_for_days: 30,
            },
        )
        .await?;

        let started = start_checkout(
            &db,
            &gateway,
            BASE,
            "alice",
            Some(&coupon.code),
            "1 Main St",
        )
        .await?;
        assert_eq!(started.subtotal, 40.0);
        assert_eq!(started.discount_amount, 4.0);
        assert_eq!(started.total_amount, 36.0);
        assert!(started.url.contains(&started.session_id));

        let pending = crate::core::order::get_order(&db, started.order_id).await?;
        assert_eq!(pending.order.status, OrderStatus::Pending);
        assert_eq!(pending.items[0].price, 20.0);

        let reward = RewardPolicy {
            threshold: 30.0,
            discount_percentage: 15,
            valid_for_days: 30,
        };
        let confirmed = confirm_checkout(
            &db,
            &gateway,
            &mailer,
            &reward,
            Some("alice"),
            &started.session_id,
        )
        .await?;
        assert!(!confirmed.already_confirmed);
        assert_eq!(confirmed.order.order.status, OrderStatus::Processing);
        assert_eq!(confirmed.order.order.payment_status, PaymentStatus::Paid);

        let used = Coupon::find_by_id(coupon.id).one(&db).await?.unwrap();
        assert!(used.used_at.is_some());
        assert!(crate::core::cart::get_cart(&db, "alice").await?.is_empty());

        let earned = confirmed.reward_coupon.unwrap();
        assert_eq!(earned.discount_percentage, 15);
        assert_eq!(
            active_coupon_for_user(&db, "alice").await?.unwrap().code,
            earned.code
        );

        let sent = mailer.sent();
        assert_eq!(sent.len(), 2);
        assert!(sent[0].subject.contains("confirmed"));

        // Confirming again changes nothing
        let again = confirm_checkout(
            &db,
            &gateway,
            &mailer,
            &reward,
            Some("alice"),
            &started.session_id,
        )
        .await?;
        assert!(again.already_confirmed);
        assert!(again.reward_coupon.is_none());
        assert_eq!(mailer.sent().len(), 2);
        Ok(())
    }

    #[tokio::test]
    async fn test_unpaid_session_leaves_order_pending() -> Result<()> {
        let db = setup_test_db().await?;
        let gateway = OfflineGateway::declining();
        let mailer = RecordingMailer::default();
        let tee = create_test_product(&db, "Tee", 20.0, &[("M", "black", 5)]).await?;
        add_to_cart(&db, "alice", tee.variants[0].id, 1).await?;

        let started = start_checkout(&db, &gateway, BASE, "alice", None, "1 Main St").await?;
        let result = confirm_checkout(
            &db,
            &gateway,
            &mailer,
            &no_reward(),
            None,
            &started.session_id,
        )
        .await;
        assert!(matches!(
            result.unwrap_err(),
            Error::PaymentIncomplete { .. }
        ));

        let order = crate::core::order::get_order(&db, started.order_id).await?;
        assert_eq!(order.order.status, OrderStatus::Pending);
        assert!(!crate::core::cart::get_cart(&db, "alice").await?.is_empty());
        assert!(mailer.sent().is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn test_payment_for_cancelled_order_does_not_revive_it() -> Result<()> {
        let db = setup_test_db().await?;
        let gateway = OfflineGateway::new();
        let mailer = RecordingMailer::default();
        let tee = create_test_product(&db, "Tee", 20.0, &[("M", "black", 5)]).await?;
        add_to_cart(&db, "alice", tee.variants[0].id, 1).await?;
        let coupon = create_coupon(
            &db,
            &NewCoupon {
                user_id: Some("alice".to_string()),
                discount_percentage: 10,
                valid_for_days: 30,
            },
        )
        .await?;
        let started = start_checkout(
            &db,
            &gateway,
            BASE,
            "alice",
            Some(&coupon.code),
            "1 Main St",
        )
        .await?;

        crate::core::order::update_order_status(
            &db,
            "admin",
            started.order_id,
            OrderStatus::Cancelled,
        )
        .await?;

        let result = confirm_checkout(
            &db,
            &gateway,
            &mailer,
            &no_reward(),
            Some("alice"),
            &started.session_id,
        )
        .await;
        assert!(matches!(result.unwrap_err(), Error::Conflict { .. }));

        let order = crate::core::order::get_order(&db, started.order_id).await?;
        assert_eq!(order.order.status, OrderStatus::Cancelled);
        assert_eq!(order.order.payment_status, PaymentStatus::Paid);
        let coupon = Coupon::find_by_id(coupon.id).one(&db).await?.unwrap();
        assert!(coupon.used_at.is_none());
        assert!(!crate::core::cart::get_cart(&db, "alice").await?.is_empty());
        assert!(mailer.sent().is_empty());

        let again = confirm_checkout(
            &db,
            &gateway,
            &mailer,
            &no_reward(),
            Some("alice"),
            &started.session_id,
        )
        .await;
        assert!(matches!(again.unwrap_err(), Error::Conflict { .. }));
        Ok(())
    }

    #[tokio::test]
    async fn test_session_of_another_shopper_is_not_found() -> Result<()> {
        let db = setup_test_db().await?;
        let gateway = OfflineGateway::new();
        let mailer = RecordingMailer::default();
        let tee = create_test_product(&db, "Tee", 20.0, &[("M", "black", 5)]).await?;
        add_to_cart(&db, "alice", tee.variants[0].id, 1).await?;
        let started = start_checkout(&db, &gateway, BASE, "alice", None, "1 Main St").await?;

        let result = confirm_checkout(
            &db,
            &gateway,
            &mailer,
            &no_reward(),
            Some("bob"),
            &started.session_id,
        )
        .await;
        assert!(matches!(result.unwrap_err(), Error::SessionNotFound { .. }));
        Ok(())
    }
}
