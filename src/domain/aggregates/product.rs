//! Product Aggregate
//!
//! Products are owned by sellers. Deleting one only flips its status to
//! [`ProductStatus::Deleted`]; orders that reference it keep their own snapshot.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use thiserror::Error;
use uuid::Uuid;
use crate::domain::value_objects::{Money, Quantity};
use crate::domain::events::{DomainEvent, ProductEvent};

#[derive(Clone, Debug, Serialize)]
pub struct Product {
    pub(crate) id: Uuid,
    pub(crate) seller_id: String,
    pub(crate) name: String,
    pub(crate) description: String,
    pub(crate) image_url: Option<String>,
    pub(crate) price: Money,
    pub(crate) stock: Quantity,
    pub(crate) status: ProductStatus,
    pub(crate) created_at: DateTime<Utc>,
    pub(crate) updated_at: DateTime<Utc>,
    #[serde(skip)]
    pub(crate) events: Vec<DomainEvent>,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProductStatus { #[default] Draft, Active, Archived, Deleted }

impl ProductStatus {
    pub fn as_str(&self) -> &'static str {
        match self { Self::Draft => "draft", Self::Active => "active", Self::Archived => "archived", Self::Deleted => "deleted" }
    }
}

impl FromStr for ProductStatus {
    type Err = ProductError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "draft" => Ok(Self::Draft),
            "active" => Ok(Self::Active),
            "archived" => Ok(Self::Archived),
            "deleted" => Ok(Self::Deleted),
            other => Err(ProductError::UnknownStatus(other.to_string())),
        }
    }
}

impl Product {
    pub fn create(seller_id: impl Into<String>, name: impl Into<String>, price: Money) -> Self {
        let id = Uuid::now_v7();
        let now = Utc::now();
        let seller_id = seller_id.into();
        let mut product = Self {
            id, seller_id: seller_id.clone(), name: name.into(), description: String::new(), image_url: None,
            price, stock: Quantity::default(), status: ProductStatus::Draft,
            created_at: now, updated_at: now, events: vec![],
        };
        product.raise_event(DomainEvent::Product(ProductEvent::Created { product_id: id, seller_id }));
        product
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self { self.description = description.into(); self }
    pub fn with_image(mut self, url: impl Into<String>) -> Self { self.image_url = Some(url.into()); self }

    pub fn id(&self) -> Uuid { self.id }
    pub fn seller_id(&self) -> &str { &self.seller_id }
    pub fn name(&self) -> &str { &self.name }
    pub fn description(&self) -> &str { &self.description }
    pub fn image_url(&self) -> Option<&str> { self.image_url.as_deref() }
    pub fn price(&self) -> &Money { &self.price }
    pub fn stock(&self) -> Quantity { self.stock }
    pub fn status(&self) -> ProductStatus { self.status }
    pub fn is_active(&self) -> bool { self.status == ProductStatus::Active }
    pub fn is_in_stock(&self) -> bool { !self.stock.is_zero() }

    pub fn publish(&mut self) -> Result<(), ProductError> {
        if self.status == ProductStatus::Deleted { return Err(ProductError::Deleted); }
        if self.name.trim().is_empty() { return Err(ProductError::MissingName); }
        Self::check_price(&self.price)?;
        self.status = ProductStatus::Active;
        self.touch();
        Ok(())
    }

    pub fn archive(&mut self) { self.status = ProductStatus::Archived; self.touch(); }

    /// Soft delete: the record stays so order back-references stay resolvable as ids.
    pub fn delete(&mut self) {
        if self.status == ProductStatus::Deleted { return; }
        self.status = ProductStatus::Deleted;
        self.touch();
        self.raise_event(DomainEvent::Product(ProductEvent::Deleted { product_id: self.id }));
    }

    pub fn update_details(&mut self, name: impl Into<String>, description: impl Into<String>, image_url: Option<String>) -> Result<(), ProductError> {
        let name = name.into();
        if name.trim().is_empty() { return Err(ProductError::MissingName); }
        self.name = name;
        self.description = description.into();
        self.image_url = image_url;
        self.touch();
        Ok(())
    }

    pub fn update_price(&mut self, new_price: Money) -> Result<(), ProductError> {
        Self::check_price(&new_price)?;
        if new_price == self.price { return Ok(()); }
        self.price = new_price;
        self.touch();
        self.raise_event(DomainEvent::Product(ProductEvent::PriceChanged { product_id: self.id, price: self.price.amount() }));
        Ok(())
    }

    pub fn set_stock(&mut self, qty: u32) {
        self.stock = Quantity::new(qty);
        self.touch();
        self.raise_event(DomainEvent::Product(ProductEvent::StockAdjusted { product_id: self.id, stock: qty }));
    }

    pub fn remove_stock(&mut self, qty: u32) -> Result<(), ProductError> {
        self.stock = self.stock.subtract(qty).ok_or(ProductError::InsufficientStock)?;
        self.touch();
        self.raise_event(DomainEvent::Product(ProductEvent::StockAdjusted { product_id: self.id, stock: self.stock.value() }));
        Ok(())
    }

    pub fn take_events(&mut self) -> Vec<DomainEvent> { std::mem::take(&mut self.events) }

    fn check_price(price: &Money) -> Result<(), ProductError> {
        if price.is_negative() { return Err(ProductError::NegativePrice); }
        if !price.is_valid_price() { return Err(ProductError::PriceTooHigh); }
        Ok(())
    }

    fn raise_event(&mut self, e: DomainEvent) { self.events.push(e); }
    fn touch(&mut self) { self.updated_at = Utc::now(); }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProductError {
    #[error("Product name is required")]
    MissingName,
    #[error("Price cannot be negative")]
    NegativePrice,
    #[error("Price exceeds the maximum of 999999999999.99")]
    PriceTooHigh,
    #[error("Insufficient stock")]
    InsufficientStock,
    #[error("Product has been deleted")]
    Deleted,
    #[error("Unknown product status: {0}")]
    UnknownStatus(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_product_create() {
        let mut p = Product::create("S1", "Test Product", Money::inr(dec!(19.99)));
        assert_eq!(p.name(), "Test Product");
        assert!(!p.is_active());
        p.publish().unwrap();
        assert!(p.is_active());
        assert_eq!(p.take_events().len(), 1);
    }

    #[test]
    fn test_price_must_fit_catalog_column() {
        let mut p = Product::create("S1", "P", Money::inr(dec!(50000000000000000000000000000)));
        assert_eq!(p.publish(), Err(ProductError::PriceTooHigh));
        assert!(!p.is_active());

        let mut p = Product::create("S1", "P", Money::inr(dec!(10)));
        p.publish().unwrap();
        assert_eq!(p.update_price(Money::inr(dec!(1000000000000))), Err(ProductError::PriceTooHigh));
        assert_eq!(p.update_price(Money::inr(dec!(-1))), Err(ProductError::NegativePrice));
        assert_eq!(p.price().amount(), dec!(10));
        p.update_price(Money::inr(dec!(999999999999.99))).unwrap();
    }

    #[test]
    fn test_stock() {
        let mut p = Product::create("S1", "P", Money::inr(dec!(10)));
        p.set_stock(10);
        assert!(p.is_in_stock());
        p.remove_stock(5).unwrap();
        assert_eq!(p.stock().value(), 5);
        assert_eq!(p.remove_stock(6), Err(ProductError::InsufficientStock));
    }

    #[test]
    fn test_soft_delete_is_final() {
        let mut p = Product::create("S1", "P", Money::inr(dec!(10)));
        p.publish().unwrap();
        p.delete();
        assert_eq!(p.status(), ProductStatus::Deleted);
        assert_eq!(p.publish(), Err(ProductError::Deleted));
        assert_eq!("deleted".parse::<ProductStatus>().unwrap(), ProductStatus::Deleted);
    }
}
