//! One customer's checkout: cart, coupon, address and payment attempt.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;
use validator::Validate;

use super::coupons::{Coupon, CouponApplication, CouponRegistry};
use super::payment::{PaymentAttempt, PaymentError, PaymentOutcome, PaymentResult, PaymentState, ProcessingTicket, SimulatedGateway};
use super::pricing::{quote, PriceQuote};
use crate::domain::aggregates::{Cart, CartItem, PaymentMethod, ShippingAddress};
use crate::domain::value_objects::DiscountRate;
use crate::{EcommerceError, Result};

/// Where the session stands after a payment method is chosen.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "step", rename_all = "snake_case")]
pub enum PaymentStep {
    Authorizing { state: PaymentState },
    ReadyToPlace,
}

#[derive(Debug)]
pub struct CheckoutSession {
    id: Uuid,
    customer_id: String,
    cart: Cart,
    coupon: Option<Coupon>,
    address: Option<ShippingAddress>,
    payment: Option<PaymentAttempt>,
    authorized: Option<PaymentResult>,
    created_at: DateTime<Utc>,
    last_active: DateTime<Utc>,
}

impl CheckoutSession {
    pub fn new(customer_id: impl Into<String>, currency: &str) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(), customer_id: customer_id.into(), cart: Cart::new(currency),
            coupon: None, address: None, payment: None, authorized: None, created_at: now, last_active: now,
        }
    }

    pub fn id(&self) -> Uuid { self.id }
    pub fn customer_id(&self) -> &str { &self.customer_id }
    pub fn cart(&self) -> &Cart { &self.cart }
    pub fn coupon(&self) -> Option<&Coupon> { self.coupon.as_ref() }
    pub fn address(&self) -> Option<&ShippingAddress> { self.address.as_ref() }
    pub fn payment(&self) -> Option<&PaymentAttempt> { self.payment.as_ref() }
    pub fn authorized(&self) -> Option<&PaymentResult> { self.authorized.as_ref() }
    pub fn created_at(&self) -> DateTime<Utc> { self.created_at }
    pub fn last_active(&self) -> DateTime<Utc> { self.last_active }

    /// Records customer activity; idle time is measured from here.
    pub fn touch(&mut self) { self.last_active = Utc::now(); }

    /// True once the session has been idle for at least `ttl`.
    pub fn is_expired(&self, ttl: Duration, now: DateTime<Utc>) -> bool {
        let idle = (now - self.last_active).to_std().unwrap_or_default();
        idle >= ttl
    }

    pub fn discount_rate(&self) -> DiscountRate {
        self.coupon.as_ref().map_or(DiscountRate::NONE, |c| c.discount_rate)
    }

    pub fn quote(&self) -> PriceQuote { quote(&self.cart, self.discount_rate()) }

    fn payment_in_flight(&self) -> bool {
        self.payment.as_ref().is_some_and(|p| !p.state().is_terminal())
    }

    /// The quote is frozen once payment has started or been authorized.
    fn ensure_editable(&self) -> Result<()> {
        if self.payment_in_flight() || self.authorized.is_some() {
            return Err(EcommerceError::Validation("Checkout cannot change while payment is in progress".into()));
        }
        Ok(())
    }

    pub fn add_item(&mut self, item: CartItem) -> Result<()> {
        self.ensure_editable()?;
        Ok(self.cart.add_item(item)?)
    }

    pub fn update_quantity(&mut self, product_id: Uuid, quantity: u32) -> Result<()> {
        self.ensure_editable()?;
        Ok(self.cart.update_quantity(product_id, quantity)?)
    }

    pub fn remove_item(&mut self, product_id: Uuid) -> Result<()> {
        self.ensure_editable()?;
        Ok(self.cart.remove_item(product_id)?)
    }

    /// A valid code replaces any previous coupon. An invalid one leaves no coupon applied.
    /// Codes match exactly, surrounding whitespace included.
    pub fn apply_coupon(&mut self, registry: &CouponRegistry, code: &str) -> Result<CouponApplication> {
        self.ensure_editable()?;
        let application = registry.apply(code);
        self.coupon = registry.lookup(code).filter(|_| application.success);
        Ok(application)
    }

    pub fn remove_coupon(&mut self) -> Result<()> {
        self.ensure_editable()?;
        self.coupon = None;
        Ok(())
    }

    pub fn set_address(&mut self, address: ShippingAddress) -> Result<()> {
        self.ensure_editable()?;
        address.validate().map_err(|e| EcommerceError::InvalidAddress(e.to_string()))?;
        self.address = Some(address);
        Ok(())
    }

    pub fn begin_payment(&mut self, method: PaymentMethod) -> Result<PaymentStep> {
        self.begin_payment_with(PaymentAttempt::new(), method)
    }

    /// Like [`Self::begin_payment`] with a caller-built attempt (e.g. one carrying a callback).
    pub fn begin_payment_with(&mut self, attempt: PaymentAttempt, method: PaymentMethod) -> Result<PaymentStep> {
        self.ensure_editable()?;
        if self.cart.is_empty() { return Err(EcommerceError::EmptyCart); }
        if self.address.is_none() { return Err(EcommerceError::MissingAddress); }
        if !method.is_online() {
            self.payment = None;
            self.authorized = Some(PaymentResult::cash_on_delivery());
            return Ok(PaymentStep::ReadyToPlace);
        }
        let mut attempt = attempt;
        let state = attempt.select(method)?;
        self.payment = Some(attempt);
        Ok(PaymentStep::Authorizing { state })
    }

    fn attempt_mut(&mut self) -> Result<&mut PaymentAttempt> {
        self.payment.as_mut().ok_or(EcommerceError::NoPaymentInProgress)
    }

    pub fn mark_paid(&mut self) -> Result<PaymentState> { Ok(self.attempt_mut()?.mark_paid()?) }

    pub fn back_to_selection(&mut self) -> Result<()> {
        self.attempt_mut()?.back_to_selection()?;
        self.payment = None;
        Ok(())
    }

    pub fn processing_ticket(&self) -> Result<ProcessingTicket> {
        Ok(self.payment.as_ref().ok_or(EcommerceError::NoPaymentInProgress)?.processing_ticket()?)
    }

    pub fn finish_processing(&mut self, ticket: &ProcessingTicket) -> Result<PaymentState> {
        Ok(self.attempt_mut()?.finish_processing(ticket)?)
    }

    pub async fn process_payment(&mut self, gateway: &SimulatedGateway) -> Result<PaymentState> {
        Ok(self.attempt_mut()?.process(gateway).await?)
    }

    /// A captured result authorizes the order. A failed one leaves the cart as is
    /// and lets the customer choose a method again.
    pub fn commit_payment(&mut self, outcome: PaymentOutcome) -> Result<Option<PaymentResult>> {
        let result = self.attempt_mut()?.commit(outcome)?;
        if let Some(result) = result.as_ref().filter(|r| r.is_captured()) {
            self.authorized = Some(result.clone());
        }
        Ok(result)
    }

    /// Closes the payment dialog. Nothing is charged and no order follows.
    pub fn cancel_payment(&mut self) -> Result<()> {
        if let Some(attempt) = self.payment.as_mut() {
            if self.authorized.as_ref().is_some_and(PaymentResult::is_captured) {
                return Err(PaymentError::InvalidTransition { action: "cancel", state: attempt.state() }.into());
            }
            if !attempt.state().is_terminal() { attempt.abort()?; }
        }
        self.payment = None;
        // cash on delivery holds no attempt
        self.authorized = None;
        Ok(())
    }

    /// Clears everything after the order is persisted.
    pub(crate) fn complete(&mut self) {
        self.cart.clear();
        self.coupon = None;
        self.payment = None;
        self.authorized = None;
    }
}
