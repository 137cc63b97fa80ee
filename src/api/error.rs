//! Maps [`Error`] onto HTTP responses.

use crate::errors::Error;
use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use tracing::error;

impl Error {
    /// HTTP status for this error.
    #[must_use]
    pub const fn status_code(&self) -> StatusCode {
        match self {
            Self::Validation { .. }
            | Self::InvalidAmount { .. }
            | Self::InvalidQuantity { .. }
            | Self::CouponUnavailable { .. }
            | Self::EmptyCart => StatusCode::BAD_REQUEST,
            Self::Unauthorized { .. } => StatusCode::UNAUTHORIZED,
            Self::PaymentIncomplete { .. } => StatusCode::PAYMENT_REQUIRED,
            Self::Forbidden { .. } => StatusCode::FORBIDDEN,
            Self::ProductNotFound { .. }
            | Self::VariantNotFound { .. }
            | Self::OrderNotFound { .. }
            | Self::OrderItemNotFound { .. }
            | Self::RefundNotFound { .. }
            | Self::CartItemNotFound { .. }
            | Self::SessionNotFound { .. }
            | Self::CouponNotFound { .. } => StatusCode::NOT_FOUND,
            Self::InsufficientStock { .. }
            | Self::InvalidTransition { .. }
            | Self::Conflict { .. } => StatusCode::CONFLICT,
            Self::Payment { .. } | Self::Http(_) => StatusCode::BAD_GATEWAY,
            Self::Config { .. }
            | Self::Database(_)
            | Self::Io(_)
            | Self::Json(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let message = if status.is_server_error() {
            error!(status = status.as_u16(), "Request failed: {}", self);
            match status {
                StatusCode::BAD_GATEWAY => "Payment provider error".to_string(),
                _ => "Internal server error".to_string(),
            }
        } else {
            self.to_string()
        };
        (status, Json(json!({ "error": message }))).into_response()
    }
}
