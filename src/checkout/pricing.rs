//! Pricing engine: subtotal, discount and total for a cart.

use rust_decimal::Decimal;
use serde::Serialize;

use crate::domain::aggregates::{Cart, OrderTotals};
use crate::domain::value_objects::{DiscountRate, Money};

/// Derived from a cart and a discount rate; recomputed on every change.
///
/// Values are unrounded. Use [`PriceQuote::rounded`] for display.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct PriceQuote {
    pub subtotal: Money,
    pub discount_rate: DiscountRate,
    pub discount_amount: Money,
    pub total: Money,
}

impl PriceQuote {
    pub fn rounded(&self) -> PriceQuote {
        PriceQuote {
            subtotal: self.subtotal.rounded(),
            discount_rate: self.discount_rate,
            discount_amount: self.discount_amount.rounded(),
            total: self.total.rounded(),
        }
    }
}

impl From<&PriceQuote> for OrderTotals {
    fn from(q: &PriceQuote) -> Self {
        OrderTotals { subtotal: q.subtotal.clone(), discount_amount: q.discount_amount.clone(), total: q.total.clone() }
    }
}

/// `total = max(0, subtotal - subtotal * rate)`. An empty cart quotes zero everywhere.
pub fn quote(cart: &Cart, discount_rate: DiscountRate) -> PriceQuote {
    let subtotal_amount = cart.items().iter().fold(Decimal::ZERO, |sum, i| sum.saturating_add(i.line_total().amount()));
    let subtotal = Money::new(subtotal_amount, cart.currency());
    let discount_amount = subtotal.scale(discount_rate);
    let total = Money::new(subtotal.amount().saturating_sub(discount_amount.amount()), cart.currency()).non_negative();
    PriceQuote { subtotal, discount_rate, discount_amount, total }
}
