//! Transactional email: plain-text templates and the [`Mailer`] seam.
//!
//! Customers are addressed by their user id; resolving that to a mailbox is the job of the
//! `Mailer` implementation.

use crate::{
    entities::{coupon, order, order_item},
    errors::Result,
};
use async_trait::async_trait;
use serde::Serialize;
use std::fmt::Write as _;
use tracing::{info, warn};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EmailMessage {
    /// User id the message is for
    pub recipient: String,
    /// Subject line
    pub subject: String,
    /// Plain-text body
    pub body: String,
}

#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, message: &EmailMessage) -> Result<()>;
}

/// Writes every message to the tracing log instead of sending it.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogMailer;

#[async_trait]
impl Mailer for LogMailer {
    async fn send(&self, message: &EmailMessage) -> Result<()> {
        info!(
            recipient = %message.recipient,
            subject = %message.subject,
            "email:\n{}",
            message.body
        );
        Ok(())
    }
}

/// Sends `message`, logging instead of failing when the mailer errors.
pub async fn deliver(mailer: &dyn Mailer, message: EmailMessage) {
    if let Err(e) = mailer.send(&message).await {
        warn!(
            recipient = %message.recipient,
            subject = %message.subject,
            "Failed to send email: {}",
            e
        );
    }
}

pub fn order_confirmation(order: &order::Model, items: &[order_item::Model]) -> EmailMessage {
    let mut body = format!("Thank you for your order #{}!\n\n", order.id);
    for item in items {
        let _ = writeln!(
            body,
            "  {} x {} ({} / {}) @ ${:.2} = ${:.2}",
            item.quantity,
            item.name,
            item.size,
            item.color,
            item.price,
            item.line_total()
        );
    }
    if order.discount_amount > 0.0 {
        let _ = writeln!(
            body,
            "\nDiscount ({}): -${:.2}",
            order.coupon_code.as_deref().unwrap_or("coupon"),
            order.discount_amount
        );
    }
    let _ = write!(
        body,
        "\nTotal charged: ${:.2}\nShipping to: {}\n",
        order.total_amount, order.shipping_address
    );

    EmailMessage {
        recipient: order.user_id.clone(),
        subject: format!("Order #{} confirmed", order.id),
        body,
    }
}

pub fn refund_approved(
    user_id: &str,
    order_id: i64,
    item_name: &str,
    amount: f64,
    note: Option<&str>,
) -> EmailMessage {
    let mut body = format!(
        "Your refund request for {item_name} on order #{order_id} was approved.\n\
         ${amount:.2} will be returned to your original payment method.\n"
    );
    if let Some(note) = note {
        let _ = writeln!(body, "\nNote from our team: {note}");
    }
    EmailMessage {
        recipient: user_id.to_string(),
        subject: format!("Refund approved for order #{order_id}"),
        body,
    }
}

pub fn refund_rejected(
    user_id: &str,
    order_id: i64,
    item_name: &str,
    note: Option<&str>,
) -> EmailMessage {
    let mut body =
        format!("Your refund request for {item_name} on order #{order_id} was not approved.\n");
    if let Some(note) = note {
        let _ = writeln!(body, "\nReason: {note}");
    }
    EmailMessage {
        recipient: user_id.to_string(),
        subject: format!("Refund request for order #{order_id}"),
        body,
    }
}

pub fn coupon_issued(coupon: &coupon::Model) -> Option<EmailMessage> {
    let recipient = coupon.user_id.clone()?;
    Some(EmailMessage {
        recipient,
        subject: format!("{}% off your next order", coupon.discount_percentage),
        body: format!(
            "Use code {} at checkout for {}% off. Valid until {}.\n",
            coupon.code,
            coupon.discount_percentage,
            coupon.expiration_date.format("%Y-%m-%d")
        ),
    })
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;
    use crate::entities::{OrderStatus, PaymentStatus};
    use crate::errors::Error;
    use chrono::{TimeZone, Utc};

    fn sample_order() -> order::Model {
        let at = Utc.with_ymd_and_hms(2025, 3, 1, 12, 0, 0).unwrap();
        order::Model {
            id: 42,
            user_id: "alice".to_string(),
            status: OrderStatus::Processing,
            total_amount: 36.0,
            total_refunded: 0.0,
            discount_amount: 4.0,
            coupon_code: Some("SAVE10AB".to_string()),
            payment_session_id: Some("cs_1".to_string()),
            payment_status: PaymentStatus::Paid,
            shipping_address: "1 Main St".to_string(),
            inventory_processed: false,
            created_at: at,
            updated_at: at,
        }
    }

    #[test]
    fn test_order_confirmation_lists_lines_and_discount() {
        let item = order_item::Model {
            id: 1,
            order_id: 42,
            product_id: 7,
            variant_id: 9,
            name: "Tee".to_string(),
            size: "M".to_string(),
            color: "black".to_string(),
            quantity: 2,
            price: 20.0,
        };
        let message = order_confirmation(&sample_order(), &[item]);
        assert_eq!(message.recipient, "alice");
        assert_eq!(message.subject, "Order #42 confirmed");
        assert!(message.body.contains("2 x Tee (M / black) @ $20.00 = $40.00"));
        assert!(message.body.contains("Discount (SAVE10AB): -$4.00"));
        assert!(message.body.contains("Total charged: $36.00"));
    }

    #[test]
    fn test_refund_templates() {
        let approved = refund_approved("alice", 42, "Tee", 18.0, Some("Sorry!"));
        assert!(approved.body.contains("$18.00"));
        assert!(approved.body.contains("Sorry!"));
        let rejected = refund_rejected("alice", 42, "Tee", None);
        assert!(rejected.subject.contains("#42"));
        assert!(!rejected.body.contains("Reason"));
    }

    #[test]
    fn test_coupon_email_requires_owner() {
        let at = Utc.with_ymd_and_hms(2025, 3, 31, 0, 0, 0).unwrap();
        let mut coupon = coupon::Model {
            id: 1,
            code: "ABCD1234".to_string(),
            discount_percentage: 10,
            expiration_date: at,
            user_id: Some("alice".to_string()),
            is_active: true,
            used_at: None,
            created_at: at,
        };
        let message = coupon_issued(&coupon).unwrap();
        assert!(message.body.contains("ABCD1234"));
        assert!(message.body.contains("2025-03-31"));

        coupon.user_id = None;
        assert!(coupon_issued(&coupon).is_none());
    }

    struct BrokenMailer;

    #[async_trait]
    impl Mailer for BrokenMailer {
        async fn send(&self, _message: &EmailMessage) -> Result<()> {
            Err(Error::validation("smtp down"))
        }
    }

    #[tokio::test]
    async fn test_deliver_swallows_failures() {
        let message = refund_rejected("alice", 1, "Tee", None);
        deliver(&BrokenMailer, message.clone()).await;
        deliver(&LogMailer, message).await;
    }
}
