//! Caller identity extractors.
//!
//! Shoppers identify themselves with `X-User-Id`. Admin routes additionally require an
//! `X-Admin-Id` that is listed in the configured `admin_ids`.

use super::AppState;
use crate::errors::Error;
use axum::{extract::FromRequestParts, http::request::Parts};
use tracing::warn;

pub const USER_HEADER: &str = "x-user-id";
pub const ADMIN_HEADER: &str = "x-admin-id";

/// The shopper making the request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShopperId(pub String);

/// A configured admin making the request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdminId(pub String);

fn header_value(parts: &Parts, name: &str) -> Option<String> {
    parts
        .headers
        .get(name)
        .and_then(|h| h.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(String::from)
}

impl FromRequestParts<AppState> for ShopperId {
    type Rejection = Error;

    async fn from_request_parts(
        parts: &mut Parts,
        _state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        header_value(parts, USER_HEADER)
            .map(Self)
            .ok_or_else(|| Error::Unauthorized {
                message: "X-User-Id header is required".to_string(),
            })
    }
}

impl FromRequestParts<AppState> for AdminId {
    type Rejection = Error;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let Some(admin_id) = header_value(parts, ADMIN_HEADER) else {
            return Err(Error::Unauthorized {
                message: "X-Admin-Id header is required".to_string(),
            });
        };
        if !state.config.is_admin(&admin_id) {
            warn!(%admin_id, uri = %parts.uri, "rejected admin request");
            return Err(Error::Forbidden {
                message: "Not an admin".to_string(),
            });
        }
        Ok(Self(admin_id))
    }
}
