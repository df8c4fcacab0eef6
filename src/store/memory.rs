//! In-memory stores, used when no database is configured and in tests.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{Catalog, NotificationStore, OrderStore, Result, StoreError};
use crate::domain::aggregates::{Notification, Order, Product};

#[derive(Default)]
pub struct MemoryCatalog {
    products: RwLock<HashMap<Uuid, Product>>,
    fail_on_get: RwLock<bool>,
}

impl MemoryCatalog {
    pub fn new() -> Self { Self::default() }

    pub async fn set_fail_on_get(&self, fail: bool) { *self.fail_on_get.write().await = fail; }

    /// Physically removes a product, as an external actor might.
    pub async fn purge(&self, id: Uuid) { self.products.write().await.remove(&id); }
}

fn newest_first(mut products: Vec<Product>) -> Vec<Product> {
    products.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    products
}

#[async_trait]
impl Catalog for MemoryCatalog {
    async fn get_product(&self, id: Uuid) -> Result<Option<Product>> {
        if *self.fail_on_get.read().await {
            return Err(StoreError::Unavailable("catalog lookup disabled".into()));
        }
        Ok(self.products.read().await.get(&id).filter(|p| p.is_active()).cloned())
    }

    async fn find_product(&self, id: Uuid) -> Result<Option<Product>> {
        Ok(self.products.read().await.get(&id).cloned())
    }

    async fn save_product(&self, product: &Product) -> Result<()> {
        let mut stored = product.clone();
        stored.events.clear();
        self.products.write().await.insert(stored.id, stored);
        Ok(())
    }

    async fn list_active_products(&self) -> Result<Vec<Product>> {
        let products = self.products.read().await;
        Ok(newest_first(products.values().filter(|p| p.is_active()).cloned().collect()))
    }

    async fn list_products_for_seller(&self, seller_id: &str) -> Result<Vec<Product>> {
        let products = self.products.read().await;
        Ok(newest_first(products.values().filter(|p| p.seller_id == seller_id).cloned().collect()))
    }
}

/// Orders are kept in insertion order and listed newest first.
#[derive(Default)]
pub struct MemoryOrderStore {
    orders: RwLock<Vec<Order>>,
    fail_on_create: RwLock<bool>,
}

impl MemoryOrderStore {
    pub fn new() -> Self { Self::default() }

    pub async fn set_fail_on_create(&self, fail: bool) { *self.fail_on_create.write().await = fail; }

    pub async fn len(&self) -> usize { self.orders.read().await.len() }

    pub async fn is_empty(&self) -> bool { self.orders.read().await.is_empty() }

    async fn filtered(&self, keep: impl Fn(&Order) -> bool) -> Vec<Order> {
        self.orders.read().await.iter().rev().filter(|o| keep(o)).cloned().collect()
    }
}

#[async_trait]
impl OrderStore for MemoryOrderStore {
    async fn create_order(&self, order: &Order) -> Result<Uuid> {
        if *self.fail_on_create.read().await {
            return Err(StoreError::Unavailable("order store rejected write".into()));
        }
        let mut stored = order.clone();
        stored.events.clear();
        self.orders.write().await.push(stored);
        Ok(order.id)
    }

    async fn get_order(&self, id: Uuid) -> Result<Option<Order>> {
        Ok(self.orders.read().await.iter().find(|o| o.id == id).cloned())
    }

    async fn update_order(&self, order: &Order) -> Result<()> {
        let mut orders = self.orders.write().await;
        let stored = orders.iter_mut().find(|o| o.id == order.id).ok_or(StoreError::NotFound)?;
        stored.status = order.status;
        stored.updated_at = order.updated_at;
        Ok(())
    }

    async fn list_orders_for_seller(&self, seller_id: &str) -> Result<Vec<Order>> {
        Ok(self.filtered(|o| o.seller_ids.iter().any(|s| s == seller_id)).await)
    }

    async fn list_orders_for_customer(&self, customer_id: &str) -> Result<Vec<Order>> {
        Ok(self.filtered(|o| o.customer_id == customer_id).await)
    }

    async fn list_all_orders(&self) -> Result<Vec<Order>> {
        Ok(self.filtered(|_| true).await)
    }
}

#[derive(Default)]
pub struct MemoryNotificationStore {
    notifications: RwLock<Vec<Notification>>,
    fail_on_create: RwLock<bool>,
}

impl MemoryNotificationStore {
    pub fn new() -> Self { Self::default() }

    pub async fn set_fail_on_create(&self, fail: bool) { *self.fail_on_create.write().await = fail; }

    async fn set_read(&self, id: Uuid, read: bool) -> Result<()> {
        let mut notifications = self.notifications.write().await;
        let n = notifications.iter_mut().find(|n| n.id == id).ok_or(StoreError::NotFound)?;
        if read { n.mark_read() } else { n.mark_unread() }
        Ok(())
    }
}

#[async_trait]
impl NotificationStore for MemoryNotificationStore {
    async fn create_notification(&self, notification: &Notification) -> Result<Uuid> {
        if *self.fail_on_create.read().await {
            return Err(StoreError::Unavailable("notification store rejected write".into()));
        }
        self.notifications.write().await.push(notification.clone());
        Ok(notification.id)
    }

    async fn get_notification(&self, id: Uuid) -> Result<Option<Notification>> {
        Ok(self.notifications.read().await.iter().find(|n| n.id == id).cloned())
    }

    async fn mark_read(&self, id: Uuid) -> Result<()> { self.set_read(id, true).await }

    async fn mark_unread(&self, id: Uuid) -> Result<()> { self.set_read(id, false).await }

    async fn list_for_recipient(&self, recipient_id: &str) -> Result<Vec<Notification>> {
        Ok(self.notifications.read().await.iter().rev().filter(|n| n.recipient_id == recipient_id).cloned().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::aggregates::{OrderLine, OrderTotals, PaymentInfo, ShippingAddress};
    use crate::domain::value_objects::Money;
    use rust_decimal_macros::dec;

    #[tokio::test]
    async fn test_catalog_hides_deleted_products() {
        let catalog = MemoryCatalog::new();
        let mut p = Product::create("S1", "Lamp", Money::inr(dec!(500)));
        p.publish().unwrap();
        catalog.save_product(&p).await.unwrap();
        assert!(catalog.get_product(p.id()).await.unwrap().is_some());

        p.delete();
        catalog.save_product(&p).await.unwrap();
        assert!(catalog.get_product(p.id()).await.unwrap().is_none());
        assert!(catalog.find_product(p.id()).await.unwrap().is_some());
        assert_eq!(catalog.list_products_for_seller("S1").await.unwrap().len(), 1);
        assert!(catalog.list_active_products().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_order_store_failure_leaves_nothing() {
        let store = MemoryOrderStore::new();
        let totals = OrderTotals { subtotal: Money::inr(dec!(5)), discount_amount: Money::inr(dec!(0)), total: Money::inr(dec!(5)) };
        let line = OrderLine::snapshot(None, "S1", "Pen", None, 1, Money::inr(dec!(5)));
        let order = Order::place("C1", ShippingAddress::default(), vec![line], totals, None, PaymentInfo::cash_on_delivery()).unwrap();

        store.set_fail_on_create(true).await;
        assert!(store.create_order(&order).await.is_err());
        assert!(store.is_empty().await);

        store.set_fail_on_create(false).await;
        store.create_order(&order).await.unwrap();
        assert_eq!(store.list_orders_for_seller("S1").await.unwrap().len(), 1);
        assert!(store.list_orders_for_customer("C2").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_notification_read_toggle() {
        let store = MemoryNotificationStore::new();
        let n = Notification::new("S1", "New Order Received", "/seller/orders/1");
        let id = store.create_notification(&n).await.unwrap();
        store.mark_read(id).await.unwrap();
        assert!(store.get_notification(id).await.unwrap().unwrap().is_read());
        store.mark_unread(id).await.unwrap();
        assert!(!store.list_for_recipient("S1").await.unwrap()[0].is_read());
        assert!(matches!(store.mark_read(Uuid::new_v4()).await, Err(StoreError::NotFound)));
    }
}
