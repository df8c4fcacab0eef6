//! Persistence contracts for the catalog, orders and notifications.
//!
//! Orders are read without joining products: an order's lines are complete
//! on their own, whatever happened to the catalog since.

pub mod memory;
pub mod postgres;

use async_trait::async_trait;
use thiserror::Error;
use uuid::Uuid;

use crate::domain::aggregates::{Notification, Order, Product};

pub use memory::{MemoryCatalog, MemoryNotificationStore, MemoryOrderStore};
pub use postgres::PgStore;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("store unavailable: {0}")]
    Unavailable(String),

    #[error("corrupt record: {0}")]
    Corrupt(String),

    #[error("record not found")]
    NotFound,
}

pub type Result<T> = std::result::Result<T, StoreError>;

#[async_trait]
pub trait Catalog: Send + Sync {
    /// Lookup used at checkout. Soft-deleted and unpublished products are `None`.
    async fn get_product(&self, id: Uuid) -> Result<Option<Product>>;

    /// Any product regardless of status, for its seller.
    async fn find_product(&self, id: Uuid) -> Result<Option<Product>>;

    /// Inserts or replaces the product.
    async fn save_product(&self, product: &Product) -> Result<()>;

    async fn list_active_products(&self) -> Result<Vec<Product>>;

    async fn list_products_for_seller(&self, seller_id: &str) -> Result<Vec<Product>>;
}

#[async_trait]
pub trait OrderStore: Send + Sync {
    /// Persists the order and all its lines, or nothing.
    async fn create_order(&self, order: &Order) -> Result<Uuid>;

    async fn get_order(&self, id: Uuid) -> Result<Option<Order>>;

    /// Persists a status change. Lines are never rewritten.
    async fn update_order(&self, order: &Order) -> Result<()>;

    async fn list_orders_for_seller(&self, seller_id: &str) -> Result<Vec<Order>>;

    async fn list_orders_for_customer(&self, customer_id: &str) -> Result<Vec<Order>>;

    async fn list_all_orders(&self) -> Result<Vec<Order>>;
}

#[async_trait]
pub trait NotificationStore: Send + Sync {
    async fn create_notification(&self, notification: &Notification) -> Result<Uuid>;

    async fn get_notification(&self, id: Uuid) -> Result<Option<Notification>>;

    async fn mark_read(&self, id: Uuid) -> Result<()>;

    async fn mark_unread(&self, id: Uuid) -> Result<()>;

    /// Newest first.
    async fn list_for_recipient(&self, recipient_id: &str) -> Result<Vec<Notification>>;
}
