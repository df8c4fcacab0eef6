//! Cart Aggregate

use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;
use uuid::Uuid;
use crate::domain::value_objects::Money;

#[derive(Clone, Debug, Serialize)]
pub struct Cart {
    id: Uuid,
    currency: String,
    items: Vec<CartItem>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

/// A cart line. `unit_price` is the catalog price captured when the line was
/// added and is not re-read at checkout. Name, image and seller are the
/// last-known catalog values.
#[derive(Clone, Debug, Serialize)]
pub struct CartItem {
    pub product_id: Uuid,
    pub seller_id: String,
    pub name: String,
    pub image_url: Option<String>,
    pub quantity: u32,
    pub unit_price: Money,
}

impl CartItem {
    /// Upper bound on a single line's quantity.
    pub const MAX_QUANTITY: u32 = 10_000;

    pub fn line_total(&self) -> Money { self.unit_price.multiply(self.quantity) }
}

impl Cart {
    pub fn new(currency: &str) -> Self {
        let now = Utc::now();
        Self { id: Uuid::new_v4(), currency: currency.to_uppercase(), items: vec![], created_at: now, updated_at: now }
    }

    pub fn id(&self) -> Uuid { self.id }
    pub fn currency(&self) -> &str { &self.currency }
    pub fn items(&self) -> &[CartItem] { &self.items }
    pub fn item_count(&self) -> usize { self.items.len() }
    pub fn is_empty(&self) -> bool { self.items.is_empty() }

    pub fn add_item(&mut self, item: CartItem) -> Result<(), CartError> {
        if item.quantity == 0 { return Err(CartError::InvalidQuantity); }
        if item.unit_price.currency() != self.currency { return Err(CartError::CurrencyMismatch); }
        if item.unit_price.is_negative() { return Err(CartError::NegativePrice); }
        if !item.unit_price.is_valid_price() { return Err(CartError::PriceTooHigh); }
        if let Some(existing) = self.items.iter_mut().find(|i| i.product_id == item.product_id) {
            let merged = existing.quantity.saturating_add(item.quantity);
            if merged > CartItem::MAX_QUANTITY { return Err(CartError::QuantityTooLarge); }
            existing.quantity = merged;
        } else {
            if item.quantity > CartItem::MAX_QUANTITY { return Err(CartError::QuantityTooLarge); }
            self.items.push(item);
        }
        self.touch();
        Ok(())
    }

    pub fn update_quantity(&mut self, product_id: Uuid, quantity: u32) -> Result<(), CartError> {
        let item = self.items.iter_mut().find(|i| i.product_id == product_id).ok_or(CartError::ItemNotFound)?;
        if quantity > CartItem::MAX_QUANTITY { return Err(CartError::QuantityTooLarge); }
        if quantity == 0 { self.items.retain(|i| i.product_id != product_id); }
        else { item.quantity = quantity; }
        self.touch();
        Ok(())
    }

    pub fn remove_item(&mut self, product_id: Uuid) -> Result<(), CartError> {
        let before = self.items.len();
        self.items.retain(|i| i.product_id != product_id);
        if self.items.len() == before { return Err(CartError::ItemNotFound); }
        self.touch();
        Ok(())
    }

    pub fn clear(&mut self) { self.items.clear(); self.touch(); }

    fn touch(&mut self) { self.updated_at = Utc::now(); }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CartError {
    #[error("Item not found in cart")]
    ItemNotFound,
    #[error("Quantity must be at least 1")]
    InvalidQuantity,
    #[error("Item currency does not match cart currency")]
    CurrencyMismatch,
    #[error("Unit price cannot be negative")]
    NegativePrice,
    #[error("Unit price exceeds the maximum of 999999999999.99")]
    PriceTooHigh,
    #[error("Quantity cannot exceed 10000 per line")]
    QuantityTooLarge,
}
