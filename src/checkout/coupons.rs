//! Coupon registry.
//!
//! The table is injected configuration. Codes are matched exactly.

use std::collections::HashMap;

use rust_decimal::Decimal;
use serde::Serialize;

use crate::domain::value_objects::DiscountRate;
use crate::{EcommerceError, Result};

pub const INVALID_COUPON_MESSAGE: &str = "Invalid coupon code.";

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Coupon {
    pub code: String,
    pub discount_rate: DiscountRate,
}

/// Outcome of applying a code. Unknown codes are a normal result, not an error.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct CouponApplication {
    pub success: bool,
    pub discount_rate: DiscountRate,
    pub message: String,
}

#[derive(Clone, Debug, Default)]
pub struct CouponRegistry {
    coupons: HashMap<String, DiscountRate>,
}

impl CouponRegistry {
    pub fn new(coupons: impl IntoIterator<Item = Coupon>) -> Self {
        Self { coupons: coupons.into_iter().map(|c| (c.code, c.discount_rate)).collect() }
    }

    /// `WELCOME20` (20% off) and `SAVE10` (10% off).
    pub fn standard() -> Self {
        Self::new([
            Coupon { code: "WELCOME20".into(), discount_rate: DiscountRate::new(Decimal::new(20, 2)) },
            Coupon { code: "SAVE10".into(), discount_rate: DiscountRate::new(Decimal::new(10, 2)) },
        ])
    }

    /// Parses `CODE=rate,CODE=rate`. Rates must lie in `[0, 1]`.
    pub fn parse(table: &str) -> Result<Self> {
        let mut coupons = Vec::new();
        for entry in table.split(',').map(str::trim).filter(|e| !e.is_empty()) {
            let (code, rate) = entry.split_once('=')
                .ok_or_else(|| EcommerceError::Config(format!("Coupon entry '{entry}' must be CODE=rate")))?;
            let code = code.trim();
            if code.is_empty() { return Err(EcommerceError::Config(format!("Coupon entry '{entry}' has no code"))); }
            let rate: Decimal = rate.trim().parse()
                .map_err(|e| EcommerceError::Config(format!("Invalid rate for coupon {code}: {e}")))?;
            if rate < Decimal::ZERO || rate > Decimal::ONE {
                return Err(EcommerceError::Config(format!("Rate for coupon {code} must be between 0 and 1")));
            }
            coupons.push(Coupon { code: code.to_string(), discount_rate: DiscountRate::new(rate) });
        }
        Ok(Self::new(coupons))
    }

    pub fn len(&self) -> usize { self.coupons.len() }
    pub fn is_empty(&self) -> bool { self.coupons.is_empty() }

    pub fn lookup(&self, code: &str) -> Option<Coupon> {
        self.coupons.get(code).map(|rate| Coupon { code: code.to_string(), discount_rate: *rate })
    }

    pub fn apply(&self, code: &str) -> CouponApplication {
        match self.lookup(code) {
            Some(coupon) => CouponApplication {
                success: true,
                discount_rate: coupon.discount_rate,
                message: format!("Coupon {} applied: {} off.", coupon.code, coupon.discount_rate),
            },
            None => CouponApplication { success: false, discount_rate: DiscountRate::NONE, message: INVALID_COUPON_MESSAGE.to_string() },
        }
    }
}
