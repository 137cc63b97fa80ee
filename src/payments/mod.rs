//! Payment gateway integration.
//!
//! [`StripeGateway`] talks to the Stripe REST API directly with form-encoded requests.
//! [`OfflineGateway`] is used for local development and tests.

use crate::{
    core::to_cents,
    entities::PaymentStatus,
    errors::{Error, Result},
};
use async_trait::async_trait;
use rand::{Rng, distributions::Alphanumeric};
use serde::Serialize;
use serde_json::Value;
use std::sync::Mutex;
use tracing::{debug, info, warn};

/// Placeholder the gateway substitutes with the session id in redirect URLs.
pub const SESSION_PLACEHOLDER: &str = "{CHECKOUT_SESSION_ID}";

const STRIPE_API: &str = "https://api.stripe.com/v1";

/// A single purchasable line sent to the gateway.
#[derive(Debug, Clone, Serialize)]
pub struct CheckoutLine {
    /// Line label shown to the payer
    pub name: String,
    /// Unit price in the smallest currency unit
    pub unit_amount: i64,
    /// Units
    pub quantity: i32,
}

#[derive(Debug, Clone, Serialize)]
pub struct CheckoutRequest {
    /// Paying shopper
    pub user_id: String,
    /// What is being bought
    pub lines: Vec<CheckoutLine>,
    /// Percent off the whole session, from a coupon
    pub discount_percentage: Option<i32>,
    /// Coupon already applied to the total
    pub coupon_code: Option<String>,
    /// Redirect after payment
    pub success_url: String,
    /// Redirect when the shopper gives up
    pub cancel_url: String,
}

impl CheckoutRequest {
    /// Sum of all lines in the smallest currency unit, before discount.
    #[must_use]
    pub fn subtotal_amount(&self) -> i64 {
        self.lines
            .iter()
            .map(|l| l.unit_amount * i64::from(l.quantity))
            .sum()
    }
}

/// A hosted payment page created by the gateway.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CheckoutSession {
    /// Gateway-assigned id
    pub id: String,
    /// Hosted payment page
    pub url: String,
}

/// Gateway acknowledgement of a refund.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GatewayRefund {
    /// Gateway-assigned id
    pub id: String,
    /// Amount refunded
    pub amount: f64,
}

#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Creates a hosted checkout session for the request.
    async fn create_checkout_session(&self, request: &CheckoutRequest) -> Result<CheckoutSession>;

    /// Reports whether the session has been paid.
    async fn retrieve_session(&self, session_id: &str) -> Result<PaymentStatus>;

    /// Refunds `amount` of the payment collected by the session.
    async fn refund(&self, session_id: &str, amount: f64) -> Result<GatewayRefund>;
}

/// Stripe Checkout over plain REST calls.
pub struct StripeGateway {
    client: reqwest::Client,
    secret_key: String,
    currency: String,
}

impl StripeGateway {
    #[must_use]
    pub fn new(secret_key: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            secret_key: secret_key.into(),
            currency: "usd".to_string(),
        }
    }

    async fn post_form(&self, path: &str, form: &[(String, String)]) -> Result<Value> {
        let resp: Value = self
            .client
            .post(format!("{STRIPE_API}/{path}"))
            .basic_auth(&self.secret_key, None::<&str>)
            .form(form)
            .send()
            .await?
            .json()
            .await?;
        stripe_result(resp)
    }

    async fn get(&self, path: &str) -> Result<Value> {
        let resp: Value = self
            .client
            .get(format!("{STRIPE_API}/{path}"))
            .basic_auth(&self.secret_key, None::<&str>)
            .send()
            .await?
            .json()
            .await?;
        stripe_result(resp)
    }

    /// Creates a one-off Stripe coupon so the hosted page shows the discount.
    async fn create_discount(&self, percentage: i32, code: Option<&str>) -> Result<String> {
        let mut form = vec![
            ("percent_off".to_string(), percentage.to_string()),
            ("duration".to_string(), "once".to_string()),
        ];
        if let Some(code) = code {
            form.push(("name".to_string(), code.to_string()));
        }
        let resp = self.post_form("coupons", &form).await?;
        string_field(&resp, "id")
    }
}

/// Turns a Stripe error body into [`Error::Payment`].
fn stripe_result(resp: Value) -> Result<Value> {
    if let Some(message) = resp["error"]["message"].as_str() {
        warn!(%message, "Stripe request failed");
        return Err(Error::Payment {
            message: message.to_string(),
        });
    }
    Ok(resp)
}

fn string_field(resp: &Value, field: &str) -> Result<String> {
    resp[field]
        .as_str()
        .map(String::from)
        .ok_or_else(|| Error::Payment {
            message: format!("Stripe response is missing '{field}': {resp}"),
        })
}

/// Form fields for a Stripe checkout session in `payment` mode.
fn session_form(
    request: &CheckoutRequest,
    currency: &str,
    discount_id: Option<&str>,
) -> Vec<(String, String)> {
    let mut form = vec![
        ("mode".to_string(), "payment".to_string()),
        ("success_url".to_string(), request.success_url.clone()),
        ("cancel_url".to_string(), request.cancel_url.clone()),
        ("client_reference_id".to_string(), request.user_id.clone()),
        ("metadata[user_id]".to_string(), request.user_id.clone()),
    ];
    for (i, line) in request.lines.iter().enumerate() {
        let prefix = format!("line_items[{i}]");
        form.push((
            format!("{prefix}[price_data][currency]"),
            currency.to_string(),
        ));
        form.push((
            format!("{prefix}[price_data][product_data][name]"),
            line.name.clone(),
        ));
        form.push((
            format!("{prefix}[price_data][unit_amount]"),
            line.unit_amount.to_string(),
        ));
        form.push((format!("{prefix}[quantity]"), line.quantity.to_string()));
    }
    if let Some(code) = &request.coupon_code {
        form.push(("metadata[coupon_code]".to_string(), code.clone()));
    }
    if let Some(id) = discount_id {
        form.push(("discounts[0][coupon]".to_string(), id.to_string()));
    }
    form
}

#[async_trait]
impl PaymentGateway for StripeGateway {
    async fn create_checkout_session(&self, request: &CheckoutRequest) -> Result<CheckoutSession> {
        let discount_id = match request.discount_percentage {
            Some(pct) if pct > 0 => Some(
                self.create_discount(pct, request.coupon_code.as_deref())
                    .await?,
            ),
            _ => None,
        };
        let form = session_form(request, &self.currency, discount_id.as_deref());
        let resp = self.post_form("checkout/sessions", &form).await?;
        let session = CheckoutSession {
            id: string_field(&resp, "id")?,
            url: string_field(&resp, "url")?,
        };
        info!(session_id = %session.id, user_id = %request.user_id, "Created Stripe checkout session");
        Ok(session)
    }

    async fn retrieve_session(&self, session_id: &str) -> Result<PaymentStatus> {
        let resp = self.get(&format!("checkout/sessions/{session_id}")).await?;
        let status = if resp["payment_status"].as_str() == Some("paid") {
            PaymentStatus::Paid
        } else {
            PaymentStatus::Unpaid
        };
        debug!(session_id, ?status, "Retrieved Stripe session");
        Ok(status)
    }

    async fn refund(&self, session_id: &str, amount: f64) -> Result<GatewayRefund> {
        let session = self.get(&format!("checkout/sessions/{session_id}")).await?;
        let payment_intent = string_field(&session, "payment_intent")?;
        let form = [
            ("payment_intent".to_string(), payment_intent),
            ("amount".to_string(), to_cents(amount).to_string()),
        ];
        let resp = self.post_form("refunds", &form).await?;
        let refund = GatewayRefund {
            id: string_field(&resp, "id")?,
            amount,
        };
        info!(session_id, refund_id = %refund.id, amount, "Created Stripe refund");
        Ok(refund)
    }
}

/// In-process gateway for development and tests.
///
/// Every session it creates is paid immediately unless built with [`OfflineGateway::declining`].
/// Sessions are kept in memory for the life of the value, so a restarted process cannot
/// refund orders paid before the restart.
pub struct OfflineGateway {
    pays: bool,
    sessions: Mutex<Vec<String>>,
    refunds: Mutex<Vec<GatewayRefund>>,
}

impl Default for OfflineGateway {
    fn default() -> Self {
        Self::new()
    }
}

impl OfflineGateway {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            pays: true,
            sessions: Mutex::new(Vec::new()),
            refunds: Mutex::new(Vec::new()),
        }
    }

    /// A gateway whose sessions never get paid.
    #[must_use]
    pub const fn declining() -> Self {
        Self {
            pays: false,
            sessions: Mutex::new(Vec::new()),
            refunds: Mutex::new(Vec::new()),
        }
    }

    /// Refunds issued so far.
    #[must_use]
    pub fn refunds(&self) -> Vec<GatewayRefund> {
        self.refunds
            .lock()
            .map(|refunds| refunds.clone())
            .unwrap_or_default()
    }

    fn knows(&self, session_id: &str) -> Result<()> {
        let sessions = self.sessions.lock().map_err(|_| Error::Payment {
            message: "offline gateway state is poisoned".to_string(),
        })?;
        if sessions.iter().any(|s| s == session_id) {
            Ok(())
        } else {
            Err(Error::Payment {
                message: format!("Unknown checkout session {session_id}"),
            })
        }
    }
}

fn random_suffix() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(16)
        .map(char::from)
        .collect()
}

#[async_trait]
impl PaymentGateway for OfflineGateway {
    async fn create_checkout_session(&self, request: &CheckoutRequest) -> Result<CheckoutSession> {
        let id = format!("cs_offline_{}", random_suffix());
        self.sessions
            .lock()
            .map_err(|_| Error::Payment {
                message: "offline gateway state is poisoned".to_string(),
            })?
            .push(id.clone());
        let url = request.success_url.replace(SESSION_PLACEHOLDER, &id);
        debug!(session_id = %id, "Created offline checkout session");
        Ok(CheckoutSession { id, url })
    }

    async fn retrieve_session(&self, session_id: &str) -> Result<PaymentStatus> {
        self.knows(session_id)?;
        Ok(if self.pays {
            PaymentStatus::Paid
        } else {
            PaymentStatus::Unpaid
        })
    }

    async fn refund(&self, session_id: &str, amount: f64) -> Result<GatewayRefund> {
        self.knows(session_id)?;
        let refund = GatewayRefund {
            id: format!("re_offline_{}", random_suffix()),
            amount,
        };
        self.refunds
            .lock()
            .map_err(|_| Error::Payment {
                message: "offline gateway state is poisoned".to_string(),
            })?
            .push(refund.clone());
        Ok(refund)
    }
}
