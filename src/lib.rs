//! OpenSASE Marketplace
//!
//! Direct-to-consumer marketplace checkout and order fulfillment.
//!
//! ## Features
//! - Cart pricing with coupon discounts
//! - Simulated payment authorization (Card, UPI, Wallet, Cash on Delivery)
//! - Order materialization with catalog snapshots
//! - Seller notifications on new orders
//! - Soft-deletable catalog that never breaks historical orders

pub mod api;
pub mod checkout;
pub mod config;
pub mod domain;
pub mod store;

use axum::http::StatusCode;
use thiserror::Error;

use crate::domain::aggregates::{CartError, OrderError, ProductError};
use crate::checkout::payment::PaymentError;
use crate::store::StoreError;

// =============================================================================
// Error Types
// =============================================================================

#[derive(Error, Debug)]
pub enum EcommerceError {
    #[error("Product not found")]
    ProductNotFound,

    #[error("Order not found")]
    OrderNotFound,

    #[error("Notification not found")]
    NotificationNotFound,

    #[error("Checkout session not found")]
    SessionNotFound,

    #[error("Cart is empty")]
    EmptyCart,

    #[error("Shipping address required")]
    MissingAddress,

    #[error("Invalid address: {0}")]
    InvalidAddress(String),

    #[error("Payment has not been captured")]
    PaymentNotCaptured,

    #[error("No payment in progress")]
    NoPaymentInProgress,

    #[error("Not permitted for this user")]
    Forbidden,

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error(transparent)]
    Cart(#[from] CartError),

    #[error(transparent)]
    Order(#[from] OrderError),

    #[error(transparent)]
    Product(#[from] ProductError),

    #[error(transparent)]
    Payment(#[from] PaymentError),

    #[error("Storage error: {0}")]
    Store(#[from] StoreError),
}

impl EcommerceError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::ProductNotFound | Self::OrderNotFound | Self::NotificationNotFound | Self::SessionNotFound => StatusCode::NOT_FOUND,
            Self::EmptyCart | Self::MissingAddress | Self::InvalidAddress(_) | Self::Validation(_) | Self::Cart(_) | Self::Product(_) => StatusCode::BAD_REQUEST,
            Self::PaymentNotCaptured => StatusCode::PAYMENT_REQUIRED,
            Self::NoPaymentInProgress | Self::Payment(PaymentError::InvalidTransition { .. } | PaymentError::Cancelled | PaymentError::StaleTicket) | Self::Order(_) => StatusCode::CONFLICT,
            Self::Payment(_) => StatusCode::PAYMENT_REQUIRED,
            Self::Forbidden => StatusCode::FORBIDDEN,
            Self::Store(StoreError::NotFound) => StatusCode::NOT_FOUND,
            Self::Store(StoreError::Corrupt(_)) | Self::Config(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Store(_) => StatusCode::SERVICE_UNAVAILABLE,
        }
    }

    /// Persistence failures can be retried without re-entering checkout data.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Store(StoreError::Database(_) | StoreError::Unavailable(_)))
    }
}

pub type Result<T> = std::result::Result<T, EcommerceError>;
