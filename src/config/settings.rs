//! Application settings loaded from `config.toml` with environment overrides.
//!
//! Every field has a development default, so a missing `config.toml` is not an error.
//! Environment variables (usually from `.env`) win over the file.

use crate::{
    core::coupon::RewardPolicy,
    errors::{Error, Result},
};
use serde::Deserialize;
use std::path::Path;
use tracing::info;

pub const DEFAULT_DATABASE_URL: &str = "sqlite://data/storefront.sqlite?mode=rwc";

/// Runtime settings for the server and background jobs.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// sea-orm connection string
    pub database_url: String,
    /// Port the API listens on
    pub http_port: u16,
    /// Without a key the offline gateway is used
    pub stripe_secret_key: Option<String>,
    /// Storefront origin used for payment redirect URLs
    pub store_base_url: String,
    /// Values accepted in the `X-Admin-Id` header
    pub admin_ids: Vec<String>,
    /// Seconds between inventory sync passes
    pub inventory_sync_interval_secs: u64,
    /// Default threshold for the low-stock report
    pub low_stock_threshold: i32,
    /// Orders charged above this earn a reward coupon
    pub reward_coupon_threshold: f64,
    /// Discount on reward coupons
    pub reward_coupon_percentage: i32,
    /// Lifetime of reward coupons
    pub reward_coupon_valid_days: i64,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database_url: DEFAULT_DATABASE_URL.to_string(),
            http_port: 5000,
            stripe_secret_key: None,
            store_base_url: "http://localhost:5173".to_string(),
            admin_ids: Vec::new(),
            inventory_sync_interval_secs: 3600,
            low_stock_threshold: 5,
            reward_coupon_threshold: 200.0,
            reward_coupon_percentage: 10,
            reward_coupon_valid_days: 30,
        }
    }
}

impl AppConfig {
    /// Parses settings from TOML text; absent keys keep their defaults.
    ///
    /// # Errors
    /// Returns a `Config` error if the TOML is malformed.
    pub fn from_toml_str(contents: &str) -> Result<Self> {
        toml::from_str(contents).map_err(|e| Error::Config {
            message: format!("Failed to parse config.toml: {e}"),
        })
    }

    /// Loads settings from `path`, or the defaults if the file does not exist.
    ///
    /// # Errors
    /// Returns a `Config` error if the file exists but cannot be read or parsed.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            info!("No {} found, using default settings", path.display());
            return Ok(Self::default());
        }
        let contents = std::fs::read_to_string(path).map_err(|e| Error::Config {
            message: format!("Failed to read config file: {e}"),
        })?;
        Self::from_toml_str(&contents)
    }

    /// Applies `DATABASE_URL`, `HTTP_PORT`, `STRIPE_SECRET_KEY`, `ADMIN_IDS` and
    /// `STORE_BASE_URL` as returned by `lookup`.
    ///
    /// # Errors
    /// Returns a `Config` error if `HTTP_PORT` is not a port number.
    pub fn with_env_overrides<F>(mut self, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = lookup("DATABASE_URL") {
            self.database_url = url;
        }
        if let Some(port) = lookup("HTTP_PORT") {
            self.http_port = port.trim().parse().map_err(|e| Error::Config {
                message: format!("HTTP_PORT must be a port number: {e}"),
            })?;
        }
        if let Some(key) = lookup("STRIPE_SECRET_KEY").filter(|k| !k.trim().is_empty()) {
            self.stripe_secret_key = Some(key);
        }
        if let Some(ids) = lookup("ADMIN_IDS") {
            self.admin_ids = ids
                .split(',')
                .map(str::trim)
                .filter(|id| !id.is_empty())
                .map(String::from)
                .collect();
        }
        if let Some(url) = lookup("STORE_BASE_URL") {
            self.store_base_url = url;
        }
        Ok(self)
    }

    /// Loads `path` and applies overrides from the process environment.
    ///
    /// # Errors
    /// See [`AppConfig::load`] and [`AppConfig::validate`].
    pub fn from_file_and_env<P: AsRef<Path>>(path: P) -> Result<Self> {
        let config = Self::load(path)?.with_env_overrides(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Rejects settings the server cannot run with.
    ///
    /// # Errors
    /// Returns a `Config` error describing the first invalid setting.
    pub fn validate(&self) -> Result<()> {
        let invalid = |message: &str| {
            Err(Error::Config {
                message: message.to_string(),
            })
        };
        if self.inventory_sync_interval_secs == 0 {
            return invalid("inventory_sync_interval_secs must be positive");
        }
        if !(0..=100).contains(&self.reward_coupon_percentage) {
            return invalid("reward_coupon_percentage must be between 0 and 100");
        }
        if self.reward_coupon_percentage > 0 && self.reward_coupon_valid_days < 1 {
            return invalid("reward_coupon_valid_days must be at least 1");
        }
        if self.low_stock_threshold < 0 {
            return invalid("low_stock_threshold must not be negative");
        }
        Ok(())
    }

    #[must_use]
    pub fn is_admin(&self, id: &str) -> bool {
        self.admin_ids.iter().any(|admin| admin == id)
    }

    /// How long after the last pass the inventory sync becomes due.
    #[must_use]
    pub fn sync_interval(&self) -> chrono::Duration {
        i64::try_from(self.inventory_sync_interval_secs)
            .ok()
            .and_then(chrono::Duration::try_seconds)
            .unwrap_or(chrono::Duration::MAX)
    }

    #[must_use]
    pub const fn reward_policy(&self) -> RewardPolicy {
        RewardPolicy {
            threshold: self.reward_coupon_threshold,
            discount_percentage: self.reward_coupon_percentage,
            valid_for_days: self.reward_coupon_valid_days,
        }
    }
}
