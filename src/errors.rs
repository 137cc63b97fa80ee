//! Unified error types and result handling.
//!
//! Every core operation returns [`Result`]. The HTTP layer maps each variant to a status
//! code in `api::error`.

use thiserror::Error;

/// Errors produced by the storefront.
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration could not be loaded or is inconsistent
    #[error("Configuration error: {message}")]
    Config {
        /// What went wrong
        message: String,
    },

    /// A request field failed validation
    #[error("Validation error: {message}")]
    Validation {
        /// What was wrong with the input
        message: String,
    },

    /// A price or money amount is negative or not finite
    #[error("Invalid amount: {amount}")]
    InvalidAmount {
        /// The rejected amount
        amount: f64,
    },

    /// A quantity is zero, negative, or larger than allowed
    #[error("Invalid quantity: {quantity}")]
    InvalidQuantity {
        /// The rejected quantity
        quantity: i32,
    },

    #[error("Product not found: {id}")]
    ProductNotFound {
        /// The missing product
        id: i64,
    },

    #[error("Variant not found: {id}")]
    VariantNotFound {
        /// The missing variant
        id: i64,
    },

    /// No such order, or it belongs to another shopper
    #[error("Order not found: {id}")]
    OrderNotFound {
        /// The requested order
        id: i64,
    },

    #[error("Order item not found: {id}")]
    OrderItemNotFound {
        /// The missing order line
        id: i64,
    },

    #[error("Refund not found: {id}")]
    RefundNotFound {
        /// The missing refund
        id: i64,
    },

    #[error("Cart item not found: {id}")]
    CartItemNotFound {
        /// The missing cart line
        id: i64,
    },

    #[error("No order for checkout session {session_id}")]
    SessionNotFound {
        /// Gateway session id supplied by the caller
        session_id: String,
    },

    /// The gateway has not collected the payment yet
    #[error("Payment for checkout session {session_id} is not complete")]
    PaymentIncomplete {
        /// The unpaid session
        session_id: String,
    },

    #[error("Coupon not found: {code}")]
    CouponNotFound {
        /// Normalized coupon code
        code: String,
    },

    /// The coupon exists but cannot be applied
    #[error("Coupon {code} cannot be used: {reason}")]
    CouponUnavailable {
        /// Normalized coupon code
        code: String,
        /// Why it was refused, e.g. "expired"
        reason: String,
    },

    /// A requested quantity exceeds the variant's stock
    #[error("Insufficient stock for variant {variant_id}: requested {requested}, available {available}")]
    InsufficientStock {
        /// Variant that ran short
        variant_id: i64,
        /// Units asked for
        requested: i32,
        /// Units on hand
        available: i32,
    },

    /// The order status table does not allow this move
    #[error("Invalid order status transition from {from} to {to}")]
    InvalidTransition {
        /// Current status
        from: String,
        /// Requested status
        to: String,
    },

    /// The operation conflicts with the current state of a record
    #[error("Conflict: {message}")]
    Conflict {
        /// What conflicted
        message: String,
    },

    /// Checkout was attempted with nothing in the cart
    #[error("Cart is empty")]
    EmptyCart,

    /// The caller did not identify itself
    #[error("Unauthorized: {message}")]
    Unauthorized {
        /// Which identity was missing
        message: String,
    },

    /// The caller is known but not allowed
    #[error("Forbidden: {message}")]
    Forbidden {
        /// Why access was refused
        message: String,
    },

    /// The payment gateway rejected or failed a call
    #[error("Payment gateway error: {message}")]
    Payment {
        /// Gateway error message
        message: String,
    },

    /// A sea-orm query or transaction failed
    #[error("Database error: {0}")]
    Database(#[from] sea_orm::DbErr),

    /// Filesystem access failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The HTTP client could not reach the gateway
    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON (de)serialization failed
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

// Convenience `Result` type
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Shorthand for a [`Error::Validation`] error.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    /// Shorthand for a [`Error::Conflict`] error.
    pub fn conflict(message: impl Into<String>) -> Self {
        Self::Conflict {
            message: message.into(),
        }
    }
}
