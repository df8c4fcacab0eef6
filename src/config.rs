use std::env;
use std::time::Duration;

use dotenvy::dotenv;

use crate::checkout::CouponRegistry;
use crate::{EcommerceError, Result};

pub const DEFAULT_PORT: u16 = 8083;
pub const DEFAULT_CURRENCY: &str = "INR";
pub const DEFAULT_COUPON_CODES: &str = "WELCOME20=0.20,SAVE10=0.10";
const DEFAULT_PAYMENT_DELAY_MS: u64 = 1500;
const DEFAULT_DB_MAX_CONNECTIONS: u32 = 10;
const DEFAULT_SESSION_TTL_SECS: u64 = 30 * 60;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub port: u16,
    pub database_url: Option<String>,
    pub db_max_connections: u32,
    pub nats_url: Option<String>,
    pub currency: String,
    pub payment_delay: Duration,
    /// Idle time after which a checkout session is dropped.
    pub session_ttl: Duration,
    pub coupons: CouponRegistry,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            database_url: None,
            db_max_connections: DEFAULT_DB_MAX_CONNECTIONS,
            nats_url: None,
            currency: DEFAULT_CURRENCY.to_string(),
            payment_delay: Duration::from_millis(DEFAULT_PAYMENT_DELAY_MS),
            session_ttl: Duration::from_secs(DEFAULT_SESSION_TTL_SECS),
            coupons: CouponRegistry::standard(),
        }
    }
}

impl AppConfig {
    pub fn from_env() -> Result<Self> {
        dotenv().ok();
        let config = Self::from_lookup(|key| env::var(key).ok())?;
        tracing::info!(port = config.port, currency = %config.currency, coupons = config.coupons.len(),
            postgres = config.database_url.is_some(), nats = config.nats_url.is_some(), "configuration loaded");
        Ok(config)
    }

    /// Builds the config from any key lookup. Empty values count as unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let port = parse_or(get("PORT"), "PORT", DEFAULT_PORT)?;
        let db_max_connections = parse_or(get("DB_MAX_CONNECTIONS"), "DB_MAX_CONNECTIONS", DEFAULT_DB_MAX_CONNECTIONS)?;
        let delay_ms = parse_or(get("PAYMENT_PROCESSING_DELAY_MS"), "PAYMENT_PROCESSING_DELAY_MS", DEFAULT_PAYMENT_DELAY_MS)?;
        let ttl_secs = parse_or(get("CHECKOUT_SESSION_TTL_SECS"), "CHECKOUT_SESSION_TTL_SECS", DEFAULT_SESSION_TTL_SECS)?;

        let currency = get("CURRENCY").unwrap_or_else(|| DEFAULT_CURRENCY.to_string()).to_uppercase();
        if currency.len() != 3 || !currency.chars().all(|c| c.is_ascii_alphabetic()) {
            return Err(EcommerceError::Config(format!("Invalid CURRENCY: {currency}")));
        }

        let coupons = CouponRegistry::parse(&get("COUPON_CODES").unwrap_or_else(|| DEFAULT_COUPON_CODES.to_string()))?;

        Ok(Self {
            port,
            database_url: get("DATABASE_URL"),
            db_max_connections,
            nats_url: get("NATS_URL"),
            currency,
            payment_delay: Duration::from_millis(delay_ms),
            session_ttl: Duration::from_secs(ttl_secs),
            coupons,
        })
    }
}

fn parse_or<T>(value: Option<String>, key: &str, default: T) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match value {
        Some(v) => v.parse().map_err(|e| EcommerceError::Config(format!("Invalid {key}: {e}"))),
        None => Ok(default),
    }
}
