//! Order Aggregate
//!
//! An order never holds a live product. Each [`OrderLine`] carries a weak
//! `product_id` back-reference plus the name, image and price copied at
//! placement time, so the order stays renderable after the product is gone.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;
use uuid::Uuid;
use validator::Validate;
use crate::domain::value_objects::Money;
use crate::domain::events::{DomainEvent, OrderEvent};

#[derive(Clone, Debug, Serialize)]
pub struct Order {
    pub(crate) id: Uuid,
    pub(crate) customer_id: String,
    pub(crate) seller_ids: Vec<String>,
    pub(crate) items: Vec<OrderLine>,
    pub(crate) subtotal: Money,
    pub(crate) discount_amount: Money,
    pub(crate) total: Money,
    pub(crate) coupon_code: Option<String>,
    pub(crate) payment: PaymentInfo,
    pub(crate) status: OrderStatus,
    pub(crate) shipping_address: ShippingAddress,
    pub(crate) created_at: DateTime<Utc>,
    pub(crate) updated_at: DateTime<Utc>,
    #[serde(skip)]
    pub(crate) events: Vec<DomainEvent>,
}

/// Immutable once created: there are no setters.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct OrderLine {
    pub(crate) product_id: Option<Uuid>,
    pub(crate) seller_id: String,
    pub(crate) name: String,
    pub(crate) image_url: Option<String>,
    pub(crate) quantity: u32,
    pub(crate) unit_price: Money,
}

impl OrderLine {
    pub fn snapshot(product_id: Option<Uuid>, seller_id: impl Into<String>, name: impl Into<String>, image_url: Option<String>, quantity: u32, unit_price: Money) -> Self {
        Self { product_id, seller_id: seller_id.into(), name: name.into(), image_url, quantity, unit_price }
    }

    pub fn product_id(&self) -> Option<Uuid> { self.product_id }
    pub fn seller_id(&self) -> &str { &self.seller_id }
    pub fn name(&self) -> &str { &self.name }
    pub fn image_url(&self) -> Option<&str> { self.image_url.as_deref() }
    pub fn quantity(&self) -> u32 { self.quantity }
    pub fn unit_price(&self) -> &Money { &self.unit_price }
    pub fn line_total(&self) -> Money { self.unit_price.multiply(self.quantity) }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize, Validate)]
pub struct ShippingAddress {
    #[validate(length(min = 1, max = 120))]
    pub full_name: String,
    #[validate(length(min = 7, max = 20))]
    pub phone: String,
    #[validate(length(min = 1, max = 200))]
    pub line1: String,
    pub line2: Option<String>,
    #[validate(length(min = 1, max = 100))]
    pub city: String,
    pub state: Option<String>,
    #[validate(length(min = 3, max = 12))]
    pub postal_code: String,
    #[validate(length(equal = 2))]
    pub country: String,
}

/// Pricing figures carried into the order.
#[derive(Clone, Debug, PartialEq)]
pub struct OrderTotals { pub subtotal: Money, pub discount_amount: Money, pub total: Money }

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PaymentMethod {
    Card,
    #[serde(rename = "UPI")]
    Upi,
    Wallet,
    #[serde(rename = "Cash on Delivery")]
    CashOnDelivery,
}

impl PaymentMethod {
    pub fn is_online(&self) -> bool { !matches!(self, Self::CashOnDelivery) }
    pub fn as_str(&self) -> &'static str {
        match self { Self::Card => "Card", Self::Upi => "UPI", Self::Wallet => "Wallet", Self::CashOnDelivery => "Cash on Delivery" }
    }
}

impl fmt::Display for PaymentMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(self.as_str()) }
}

impl FromStr for PaymentMethod {
    type Err = OrderError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Card" | "card" => Ok(Self::Card),
            "UPI" | "upi" => Ok(Self::Upi),
            "Wallet" | "wallet" => Ok(Self::Wallet),
            "Cash on Delivery" | "cod" | "COD" => Ok(Self::CashOnDelivery),
            other => Err(OrderError::UnknownValue(other.to_string())),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus { Captured, Failed, Pending }

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self { Self::Captured => "captured", Self::Failed => "failed", Self::Pending => "pending" }
    }
}

impl FromStr for PaymentStatus {
    type Err = OrderError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "captured" => Ok(Self::Captured),
            "failed" => Ok(Self::Failed),
            "pending" => Ok(Self::Pending),
            other => Err(OrderError::UnknownValue(other.to_string())),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentInfo {
    pub method: PaymentMethod,
    pub status: PaymentStatus,
    pub transaction_id: Option<String>,
}

impl PaymentInfo {
    pub fn cash_on_delivery() -> Self {
        Self { method: PaymentMethod::CashOnDelivery, status: PaymentStatus::Pending, transaction_id: None }
    }

    /// Orders may only be materialized from a captured online payment or COD.
    pub fn permits_order(&self) -> bool {
        match self.method {
            PaymentMethod::CashOnDelivery => true,
            _ => self.status == PaymentStatus::Captured,
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus { #[default] Pending, Confirmed, Shipped, Delivered, Cancelled }

impl OrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self { Self::Pending => "pending", Self::Confirmed => "confirmed", Self::Shipped => "shipped", Self::Delivered => "delivered", Self::Cancelled => "cancelled" }
    }

    pub fn can_transition_to(&self, next: OrderStatus) -> bool {
        use OrderStatus::*;
        matches!((self, next), (Pending, Confirmed) | (Confirmed, Shipped) | (Shipped, Delivered) | (Pending | Confirmed, Cancelled))
    }
}

impl FromStr for OrderStatus {
    type Err = OrderError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "confirmed" => Ok(Self::Confirmed),
            "shipped" => Ok(Self::Shipped),
            "delivered" => Ok(Self::Delivered),
            "cancelled" => Ok(Self::Cancelled),
            other => Err(OrderError::UnknownValue(other.to_string())),
        }
    }
}

/// The actor reading orders, as supplied by the identity layer.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Viewer { Customer(String), Seller(String), Admin }

impl Order {
    pub fn place(customer_id: impl Into<String>, shipping_address: ShippingAddress, items: Vec<OrderLine>, totals: OrderTotals, coupon_code: Option<String>, payment: PaymentInfo) -> Result<Self, OrderError> {
        if items.is_empty() { return Err(OrderError::NoItems); }
        if !payment.permits_order() { return Err(OrderError::PaymentNotCaptured); }
        let mut seller_ids: Vec<String> = Vec::new();
        for line in &items {
            if !seller_ids.iter().any(|s| s == &line.seller_id) { seller_ids.push(line.seller_id.clone()); }
        }
        let id = Uuid::now_v7();
        let now = Utc::now();
        let customer_id = customer_id.into();
        let mut order = Self {
            id, customer_id: customer_id.clone(), seller_ids, items,
            subtotal: totals.subtotal, discount_amount: totals.discount_amount, total: totals.total,
            coupon_code, payment, status: OrderStatus::Pending, shipping_address,
            created_at: now, updated_at: now, events: vec![],
        };
        order.raise_event(DomainEvent::Order(OrderEvent::Placed { order_id: id, customer_id, total: order.total.amount() }));
        Ok(order)
    }

    pub fn id(&self) -> Uuid { self.id }
    pub fn customer_id(&self) -> &str { &self.customer_id }
    pub fn seller_ids(&self) -> &[String] { &self.seller_ids }
    pub fn items(&self) -> &[OrderLine] { &self.items }
    pub fn subtotal(&self) -> &Money { &self.subtotal }
    pub fn discount_amount(&self) -> &Money { &self.discount_amount }
    pub fn total(&self) -> &Money { &self.total }
    pub fn coupon_code(&self) -> Option<&str> { self.coupon_code.as_deref() }
    pub fn payment(&self) -> &PaymentInfo { &self.payment }
    pub fn status(&self) -> OrderStatus { self.status }
    pub fn shipping_address(&self) -> &ShippingAddress { &self.shipping_address }
    pub fn created_at(&self) -> DateTime<Utc> { self.created_at }
    pub fn updated_at(&self) -> DateTime<Utc> { self.updated_at }

    pub fn is_visible_to(&self, viewer: &Viewer) -> bool {
        match viewer {
            Viewer::Admin => true,
            Viewer::Customer(id) => &self.customer_id == id,
            Viewer::Seller(id) => self.seller_ids.iter().any(|s| s == id),
        }
    }

    pub fn transition(&mut self, next: OrderStatus) -> Result<(), OrderError> {
        if !self.status.can_transition_to(next) {
            return Err(OrderError::InvalidTransition { from: self.status, to: next });
        }
        let from = self.status;
        self.status = next;
        self.touch();
        self.raise_event(DomainEvent::Order(OrderEvent::StatusChanged { order_id: self.id, from, to: next }));
        Ok(())
    }

    pub fn confirm(&mut self) -> Result<(), OrderError> { self.transition(OrderStatus::Confirmed) }
    pub fn ship(&mut self) -> Result<(), OrderError> { self.transition(OrderStatus::Shipped) }
    pub fn deliver(&mut self) -> Result<(), OrderError> { self.transition(OrderStatus::Delivered) }
    pub fn cancel(&mut self) -> Result<(), OrderError> { self.transition(OrderStatus::Cancelled) }

    pub fn take_events(&mut self) -> Vec<DomainEvent> { std::mem::take(&mut self.events) }
    fn raise_event(&mut self, e: DomainEvent) { self.events.push(e); }
    fn touch(&mut self) { self.updated_at = Utc::now(); }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum OrderError {
    #[error("Order has no items")]
    NoItems,
    #[error("Payment must be captured or cash on delivery")]
    PaymentNotCaptured,
    #[error("Cannot move order from {} to {}", from.as_str(), to.as_str())]
    InvalidTransition { from: OrderStatus, to: OrderStatus },
    #[error("Unknown value: {0}")]
    UnknownValue(String),
}
