//! Value Objects for the marketplace

use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Money value object.
///
/// Amounts are kept unrounded so sums stay exact; round with
/// [`Money::rounded`] only when presenting a value. Arithmetic saturates at
/// the bounds of [`Decimal`] instead of panicking.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Money { amount: Decimal, currency: String }

impl Money {
    pub fn new(amount: Decimal, currency: &str) -> Self { Self { amount, currency: currency.to_uppercase() } }
    pub fn inr(amount: Decimal) -> Self { Self::new(amount, "INR") }
    pub fn zero(currency: &str) -> Self { Self::new(Decimal::ZERO, currency) }
    pub fn amount(&self) -> Decimal { self.amount }
    pub fn currency(&self) -> &str { &self.currency }
    pub fn is_negative(&self) -> bool { self.amount.is_sign_negative() && !self.amount.is_zero() }

    /// Largest price a catalog row can hold (`NUMERIC(14, 2)`).
    pub fn max_price() -> Decimal { Decimal::new(99_999_999_999_999, 2) }

    /// Whether this is a valid catalog price: non-negative and storable.
    pub fn is_valid_price(&self) -> bool { !self.is_negative() && self.amount <= Self::max_price() }

    pub fn add(&self, other: &Money) -> Result<Money, MoneyError> {
        if self.currency != other.currency { return Err(MoneyError::CurrencyMismatch); }
        Ok(Money::new(self.amount.saturating_add(other.amount), &self.currency))
    }

    pub fn subtract(&self, other: &Money) -> Result<Money, MoneyError> {
        if self.currency != other.currency { return Err(MoneyError::CurrencyMismatch); }
        Ok(Money::new(self.amount.saturating_sub(other.amount), &self.currency))
    }

    pub fn multiply(&self, qty: u32) -> Money { Money::new(self.amount.saturating_mul(Decimal::from(qty)), &self.currency) }

    pub fn scale(&self, rate: DiscountRate) -> Money { Money::new(self.amount.saturating_mul(rate.value()), &self.currency) }

    /// Clamps negative amounts to zero.
    pub fn non_negative(self) -> Money {
        if self.is_negative() { Money::zero(&self.currency) } else { self }
    }

    /// Rounded to the smallest currency unit (two decimal places, half away from zero).
    pub fn rounded(&self) -> Money {
        Money::new(self.amount.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero), &self.currency)
    }
}

impl Default for Money { fn default() -> Self { Self::zero("INR") } }

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {:.2}", self.currency, self.rounded().amount)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MoneyError {
    #[error("Currency mismatch")]
    CurrencyMismatch,
}

/// Quantity value object
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Quantity(u32);

impl Quantity {
    pub fn new(value: u32) -> Self { Self(value) }
    pub fn value(&self) -> u32 { self.0 }
    pub fn add(&self, other: u32) -> Self { Self(self.0.saturating_add(other)) }
    pub fn subtract(&self, other: u32) -> Option<Self> {
        if other > self.0 { None } else { Some(Self(self.0 - other)) }
    }
    pub fn is_zero(&self) -> bool { self.0 == 0 }
}

/// Fraction of the subtotal taken off by a coupon, always within `[0, 1]`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DiscountRate(Decimal);

impl DiscountRate {
    pub const NONE: DiscountRate = DiscountRate(Decimal::ZERO);

    /// Out-of-range input is clamped rather than rejected.
    pub fn new(value: Decimal) -> Self { Self(value.clamp(Decimal::ZERO, Decimal::ONE)) }
    pub fn value(&self) -> Decimal { self.0 }
    pub fn is_zero(&self) -> bool { self.0.is_zero() }
    pub fn percent(&self) -> Decimal { (self.0 * Decimal::ONE_HUNDRED).normalize() }
}

impl fmt::Display for DiscountRate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { write!(f, "{}%", self.percent()) }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_money_add() {
        let a = Money::inr(dec!(100));
        let b = Money::inr(dec!(50));
        assert_eq!(a.add(&b).unwrap().amount(), dec!(150));
    }

    #[test]
    fn test_money_currency_mismatch() {
        let a = Money::inr(dec!(100));
        let b = Money::new(dec!(1), "usd");
        assert_eq!(a.subtract(&b), Err(MoneyError::CurrencyMismatch));
    }

    #[test]
    fn test_money_rounding_and_clamp() {
        assert_eq!(Money::inr(dec!(10.005)).rounded().amount(), dec!(10.01));
        assert_eq!(Money::inr(dec!(-3)).non_negative().amount(), Decimal::ZERO);
        assert_eq!(Money::inr(dec!(1234.5)).to_string(), "INR 1234.50");
    }

    #[test]
    fn test_money_saturates_instead_of_overflowing() {
        let huge = Money::inr(dec!(50000000000000000000000000000));
        assert_eq!(huge.multiply(2).amount(), Decimal::MAX);
        assert_eq!(huge.add(&huge).unwrap().amount(), Decimal::MAX);
        assert!(!huge.is_valid_price());
        assert!(Money::inr(dec!(999999999999.99)).is_valid_price());
        assert!(!Money::inr(dec!(1000000000000)).is_valid_price());
    }

    #[test]
    fn test_discount_rate_clamps() {
        assert_eq!(DiscountRate::new(dec!(1.5)).value(), Decimal::ONE);
        assert_eq!(DiscountRate::new(dec!(-0.2)).value(), Decimal::ZERO);
        assert_eq!(DiscountRate::new(dec!(0.20)).to_string(), "20%");
    }
}
