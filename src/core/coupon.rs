//! Coupon business logic - code generation, validation, redemption and rewards.
//!
//! A coupon is a plain flag-based record: `is_active` and `used_at` say whether it can
//! still be applied. A shopper holds at most one active personal coupon.

use crate::{
    core::{audit::AuditLogger, round_money},
    entities::{AuditAction, Coupon, coupon},
    errors::{Error, Result},
};
use chrono::{Duration, Utc};
use rand::{Rng, distributions::Alphanumeric};
use sea_orm::{QueryOrder, Set, TransactionTrait, prelude::*, sea_query::Expr};
use serde::Deserialize;
use serde_json::json;
use tracing::{info, instrument};

/// Length of generated coupon codes.
pub const CODE_LENGTH: usize = 8;

const MAX_CODE_ATTEMPTS: usize = 5;

/// Input for issuing a coupon.
#[derive(Debug, Clone, Deserialize)]
pub struct NewCoupon {
    /// Owner; `None` creates a coupon anyone may use
    pub user_id: Option<String>,
    /// Percent off, 1 to 100
    pub discount_percentage: i32,
    /// Days until expiry
    pub valid_for_days: i64,
}

/// When an order earns its buyer a follow-up coupon.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RewardPolicy {
    /// Charged order total that must be exceeded
    pub threshold: f64,
    /// Percent off, 1 to 100
    pub discount_percentage: i32,
    /// Days until expiry
    pub valid_for_days: i64,
}

impl RewardPolicy {
    #[must_use]
    pub fn earns_reward(&self, order_total: f64) -> bool {
        self.discount_percentage > 0 && order_total > self.threshold
    }
}

/// Generates a random upper-case alphanumeric coupon code.
#[must_use]
pub fn generate_code() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(CODE_LENGTH)
        .map(|b| char::from(b).to_ascii_uppercase())
        .collect()
}

/// Discount granted by `percentage` percent off `subtotal`, rounded to cents.
#[must_use]
pub fn discount_for(subtotal: f64, percentage: i32) -> f64 {
    round_money(subtotal * f64::from(percentage.clamp(0, 100)) / 100.0)
}

fn normalize(code: &str) -> String {
    code.trim().to_uppercase()
}

/// Creates a coupon on the caller's connection.
///
/// Any active coupon already held by the same shopper is deactivated first.
///
/// # Errors
/// Returns an error if the percentage is outside 1..=100, the validity is not positive,
/// no unique code could be generated, or a database operation fails.
pub async fn create_coupon<C>(conn: &C, new_coupon: &NewCoupon) -> Result<coupon::Model>
where
    C: ConnectionTrait,
{
    if !(1..=100).contains(&new_coupon.discount_percentage) {
        return Err(Error::validation(
            "Discount percentage must be between 1 and 100",
        ));
    }
    if new_coupon.valid_for_days < 1 {
        return Err(Error::validation("Coupon validity must be at least one day"));
    }

    let mut code = None;
    for _ in 0..MAX_CODE_ATTEMPTS {
        let candidate = generate_code();
        let taken = Coupon::find()
            .filter(coupon::Column::Code.eq(candidate.as_str()))
            .one(conn)
            .await?
            .is_some();
        if !taken {
            code = Some(candidate);
            break;
        }
    }
    let code = code.ok_or_else(|| Error::conflict("Could not generate a unique coupon code"))?;

    if let Some(user_id) = &new_coupon.user_id {
        Coupon::update_many()
            .col_expr(coupon::Column::IsActive, Expr::value(false))
            .filter(coupon::Column::UserId.eq(user_id.as_str()))
            .filter(coupon::Column::IsActive.eq(true))
            .exec(conn)
            .await?;
    }

    let now = Utc::now();
    let created = coupon::ActiveModel {
        code: Set(code),
        discount_percentage: Set(new_coupon.discount_percentage),
        expiration_date: Set(now + Duration::days(new_coupon.valid_for_days)),
        user_id: Set(new_coupon.user_id.clone()),
        is_active: Set(true),
        used_at: Set(None),
        created_at: Set(now),
        ..Default::default()
    }
    .insert(conn)
    .await?;
    info!(code = %created.code, user_id = ?created.user_id, "Issued coupon");
    Ok(created)
}

/// Issues a coupon on behalf of an admin and records a `coupon_created` audit row.
///
/// # Errors
/// See [`create_coupon`].
#[instrument(skip(db))]
pub async fn issue_coupon(
    db: &DatabaseConnection,
    admin_id: &str,
    new_coupon: &NewCoupon,
) -> Result<coupon::Model> {
    let txn = db.begin().await?;
    let created = create_coupon(&txn, new_coupon).await?;
    AuditLogger::log(
        &txn,
        admin_id,
        AuditAction::CouponCreated,
        "coupon",
        &created.code,
        json!({
            "user_id": created.user_id,
            "discount_percentage": created.discount_percentage,
            "expiration_date": created.expiration_date,
        }),
    )
    .await?;
    txn.commit().await?;
    Ok(created)
}

/// Checks that `code` can be applied by `user_id` right now.
///
/// # Errors
/// Returns `CouponNotFound` for an unknown code and `CouponUnavailable` if the coupon is
/// inactive, already used, expired, or owned by someone else.
pub async fn validate_coupon<C>(conn: &C, code: &str, user_id: &str) -> Result<coupon::Model>
where
    C: ConnectionTrait,
{
    let code = normalize(code);
    let found = Coupon::find()
        .filter(coupon::Column::Code.eq(code.as_str()))
        .one(conn)
        .await?
        .ok_or_else(|| Error::CouponNotFound { code: code.clone() })?;

    let unavailable = |reason: &str| Error::CouponUnavailable {
        code: code.clone(),
        reason: reason.to_string(),
    };
    if found.used_at.is_some() {
        return Err(unavailable("already used"));
    }
    if !found.is_active {
        return Err(unavailable("inactive"));
    }
    if found.expiration_date <= Utc::now() {
        return Err(unavailable("expired"));
    }
    if found.user_id.as_deref().is_some_and(|owner| owner != user_id) {
        return Err(unavailable("issued to another customer"));
    }
    Ok(found)
}

/// Marks a coupon used. Runs on the caller's connection so it commits with the order.
///
/// # Errors
/// Returns the same errors as [`validate_coupon`], or a database error.
pub async fn redeem_coupon<C>(conn: &C, code: &str, user_id: &str) -> Result<coupon::Model>
where
    C: ConnectionTrait,
{
    let valid = validate_coupon(conn, code, user_id).await?;
    let mut active: coupon::ActiveModel = valid.into();
    active.used_at = Set(Some(Utc::now()));
    active.is_active = Set(false);
    active.update(conn).await.map_err(Into::into)
}

/// Deactivates a coupon and records a `coupon_deactivated` audit row.
///
/// # Errors
/// Returns an error if the coupon does not exist, is already inactive, or a database
/// operation fails.
pub async fn deactivate_coupon(
    db: &DatabaseConnection,
    admin_id: &str,
    code: &str,
) -> Result<coupon::Model> {
    let code = normalize(code);
    let txn = db.begin().await?;
    let found = Coupon::find()
        .filter(coupon::Column::Code.eq(code.as_str()))
        .one(&txn)
        .await?
        .ok_or_else(|| Error::CouponNotFound { code: code.clone() })?;
    if !found.is_active {
        return Err(Error::conflict(format!("Coupon {code} is already inactive")));
    }

    let mut active: coupon::ActiveModel = found.into();
    active.is_active = Set(false);
    let updated = active.update(&txn).await?;
    AuditLogger::log(
        &txn,
        admin_id,
        AuditAction::CouponDeactivated,
        "coupon",
        &code,
        json!({ "user_id": updated.user_id }),
    )
    .await?;
    txn.commit().await?;
    Ok(updated)
}

/// The shopper's currently usable personal coupon, if any.
///
/// # Errors
/// Returns an error if the database query fails.
pub async fn active_coupon_for_user(
    db: &DatabaseConnection,
    user_id: &str,
) -> Result<Option<coupon::Model>> {
    Coupon::find()
        .filter(coupon::Column::UserId.eq(user_id))
        .filter(coupon::Column::IsActive.eq(true))
        .filter(coupon::Column::UsedAt.is_null())
        .filter(coupon::Column::ExpirationDate.gt(Utc::now()))
        .order_by_desc(coupon::Column::CreatedAt)
        .one(db)
        .await
        .map_err(Into::into)
}

/// Lists coupons, optionally only those of one shopper, newest first.
///
/// # Errors
/// Returns an error if the database query fails.
pub async fn list_coupons(
    db: &DatabaseConnection,
    user_id: Option<&str>,
) -> Result<Vec<coupon::Model>> {
    let mut query = Coupon::find();
    if let Some(user_id) = user_id {
        query = query.filter(coupon::Column::UserId.eq(user_id));
    }
    query
        .order_by_desc(coupon::Column::CreatedAt)
        .order_by_desc(coupon::Column::Id)
        .all(db)
        .await
        .map_err(Into::into)
}
