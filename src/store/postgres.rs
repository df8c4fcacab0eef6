//! PostgreSQL-backed stores.
//!
//! `order_lines.product_id` is a plain nullable column with no foreign key,
//! so deleting or purging a product can never cascade into order history.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::types::Json;
use uuid::Uuid;

use super::{Catalog, NotificationStore, OrderStore, Result, StoreError};
use crate::domain::aggregates::{Notification, Order, OrderLine, PaymentInfo, Product, ShippingAddress};
use crate::domain::value_objects::{Money, Quantity};

#[derive(Clone)]
pub struct PgStore { pool: PgPool }

impl PgStore {
    pub fn new(pool: PgPool) -> Self { Self { pool } }

    /// Connects and runs pending migrations.
    pub async fn connect(database_url: &str, max_connections: u32) -> Result<Self> {
        let pool = PgPoolOptions::new().max_connections(max_connections).connect(database_url).await?;
        sqlx::migrate!("./migrations").run(&pool).await.map_err(|e| StoreError::Unavailable(e.to_string()))?;
        Ok(Self { pool })
    }

    async fn fetch_orders(&self, rows: Vec<OrderRow>) -> Result<Vec<Order>> {
        let ids: Vec<Uuid> = rows.iter().map(|r| r.id).collect();
        let lines = sqlx::query_as::<_, OrderLineRow>("SELECT * FROM order_lines WHERE order_id = ANY($1) ORDER BY order_id, position")
            .bind(&ids).fetch_all(&self.pool).await?;
        let mut by_order: HashMap<Uuid, Vec<OrderLineRow>> = HashMap::new();
        for line in lines { by_order.entry(line.order_id).or_default().push(line); }
        rows.into_iter().map(|row| {
            let lines = by_order.remove(&row.id).unwrap_or_default();
            row.into_order(lines)
        }).collect()
    }
}

fn to_i32(value: u32, field: &str) -> Result<i32> {
    i32::try_from(value).map_err(|_| StoreError::Corrupt(format!("{field} out of range: {value}")))
}

fn to_u32(value: i32, field: &str) -> Result<u32> {
    u32::try_from(value).map_err(|_| StoreError::Corrupt(format!("{field} out of range: {value}")))
}

fn corrupt(e: impl std::fmt::Display) -> StoreError { StoreError::Corrupt(e.to_string()) }

#[derive(sqlx::FromRow)]
struct ProductRow {
    id: Uuid, seller_id: String, name: String, description: String, image_url: Option<String>,
    price: Decimal, currency: String, stock: i32, status: String,
    created_at: DateTime<Utc>, updated_at: DateTime<Utc>,
}

impl TryFrom<ProductRow> for Product {
    type Error = StoreError;
    fn try_from(r: ProductRow) -> Result<Self> {
        Ok(Product {
            id: r.id, seller_id: r.seller_id, name: r.name, description: r.description, image_url: r.image_url,
            price: Money::new(r.price, &r.currency), stock: Quantity::new(to_u32(r.stock, "stock")?),
            status: r.status.parse().map_err(corrupt)?, created_at: r.created_at, updated_at: r.updated_at, events: vec![],
        })
    }
}

#[derive(sqlx::FromRow)]
struct OrderRow {
    id: Uuid, customer_id: String, seller_ids: Vec<String>,
    subtotal: Decimal, discount_amount: Decimal, total: Decimal, currency: String, coupon_code: Option<String>,
    payment_method: String, payment_status: String, transaction_id: Option<String>, status: String,
    shipping_address: Json<ShippingAddress>, created_at: DateTime<Utc>, updated_at: DateTime<Utc>,
}

#[derive(sqlx::FromRow)]
struct OrderLineRow {
    order_id: Uuid, product_id: Option<Uuid>, seller_id: String, name: String,
    image_url: Option<String>, quantity: i32, unit_price: Decimal,
}

impl OrderRow {
    fn into_order(self, lines: Vec<OrderLineRow>) -> Result<Order> {
        let currency = self.currency;
        let items = lines.into_iter().map(|l| -> Result<OrderLine> {
            Ok(OrderLine::snapshot(l.product_id, l.seller_id, l.name, l.image_url, to_u32(l.quantity, "quantity")?, Money::new(l.unit_price, &currency)))
        }).collect::<Result<Vec<_>>>()?;
        Ok(Order {
            id: self.id, customer_id: self.customer_id, seller_ids: self.seller_ids, items,
            subtotal: Money::new(self.subtotal, &currency), discount_amount: Money::new(self.discount_amount, &currency), total: Money::new(self.total, &currency),
            coupon_code: self.coupon_code,
            payment: PaymentInfo { method: self.payment_method.parse().map_err(corrupt)?, status: self.payment_status.parse().map_err(corrupt)?, transaction_id: self.transaction_id },
            status: self.status.parse().map_err(corrupt)?, shipping_address: self.shipping_address.0,
            created_at: self.created_at, updated_at: self.updated_at, events: vec![],
        })
    }
}

#[derive(sqlx::FromRow)]
struct NotificationRow { id: Uuid, recipient_id: String, message: String, link: String, read: bool, created_at: DateTime<Utc> }

impl From<NotificationRow> for Notification {
    fn from(r: NotificationRow) -> Self {
        Notification { id: r.id, recipient_id: r.recipient_id, message: r.message, link: r.link, read: r.read, created_at: r.created_at }
    }
}

#[async_trait]
impl Catalog for PgStore {
    async fn get_product(&self, id: Uuid) -> Result<Option<Product>> {
        sqlx::query_as::<_, ProductRow>("SELECT * FROM products WHERE id = $1 AND status = 'active'")
            .bind(id).fetch_optional(&self.pool).await?.map(Product::try_from).transpose()
    }

    async fn find_product(&self, id: Uuid) -> Result<Option<Product>> {
        sqlx::query_as::<_, ProductRow>("SELECT * FROM products WHERE id = $1")
            .bind(id).fetch_optional(&self.pool).await?.map(Product::try_from).transpose()
    }

    async fn save_product(&self, p: &Product) -> Result<()> {
        sqlx::query("INSERT INTO products (id, seller_id, name, description, image_url, price, currency, stock, status, created_at, updated_at) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11) \
                     ON CONFLICT (id) DO UPDATE SET name = EXCLUDED.name, description = EXCLUDED.description, image_url = EXCLUDED.image_url, price = EXCLUDED.price, currency = EXCLUDED.currency, stock = EXCLUDED.stock, status = EXCLUDED.status, updated_at = EXCLUDED.updated_at")
            .bind(p.id).bind(&p.seller_id).bind(&p.name).bind(&p.description).bind(&p.image_url)
            .bind(p.price.amount()).bind(p.price.currency()).bind(to_i32(p.stock.value(), "stock")?).bind(p.status.as_str())
            .bind(p.created_at).bind(p.updated_at)
            .execute(&self.pool).await?;
        Ok(())
    }

    async fn list_active_products(&self) -> Result<Vec<Product>> {
        sqlx::query_as::<_, ProductRow>("SELECT * FROM products WHERE status = 'active' ORDER BY created_at DESC")
            .fetch_all(&self.pool).await?.into_iter().map(Product::try_from).collect()
    }

    async fn list_products_for_seller(&self, seller_id: &str) -> Result<Vec<Product>> {
        sqlx::query_as::<_, ProductRow>("SELECT * FROM products WHERE seller_id = $1 ORDER BY created_at DESC")
            .bind(seller_id).fetch_all(&self.pool).await?.into_iter().map(Product::try_from).collect()
    }
}

#[async_trait]
impl OrderStore for PgStore {
    async fn create_order(&self, o: &Order) -> Result<Uuid> {
        let mut tx = self.pool.begin().await?;
        sqlx::query("INSERT INTO orders (id, customer_id, seller_ids, subtotal, discount_amount, total, currency, coupon_code, payment_method, payment_status, transaction_id, status, shipping_address, created_at, updated_at) \
                     VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15)")
            .bind(o.id).bind(&o.customer_id).bind(&o.seller_ids)
            .bind(o.subtotal.amount()).bind(o.discount_amount.amount()).bind(o.total.amount()).bind(o.total.currency()).bind(&o.coupon_code)
            .bind(o.payment.method.as_str()).bind(o.payment.status.as_str()).bind(&o.payment.transaction_id).bind(o.status.as_str())
            .bind(Json(&o.shipping_address)).bind(o.created_at).bind(o.updated_at)
            .execute(&mut *tx).await?;
        for (position, line) in o.items.iter().enumerate() {
            let position = i32::try_from(position).map_err(corrupt)?;
            sqlx::query("INSERT INTO order_lines (order_id, position, product_id, seller_id, name, image_url, quantity, unit_price) VALUES ($1, $2, $3, $4, $5, $6, $7, $8)")
                .bind(o.id).bind(position).bind(line.product_id).bind(&line.seller_id).bind(&line.name).bind(&line.image_url)
                .bind(to_i32(line.quantity, "quantity")?).bind(line.unit_price.amount())
                .execute(&mut *tx).await?;
        }
        tx.commit().await?;
        Ok(o.id)
    }

    async fn get_order(&self, id: Uuid) -> Result<Option<Order>> {
        let Some(row) = sqlx::query_as::<_, OrderRow>("SELECT * FROM orders WHERE id = $1").bind(id).fetch_optional(&self.pool).await? else {
            return Ok(None);
        };
        Ok(self.fetch_orders(vec![row]).await?.pop())
    }

    async fn update_order(&self, o: &Order) -> Result<()> {
        let done = sqlx::query("UPDATE orders SET status = $2, updated_at = $3 WHERE id = $1")
            .bind(o.id).bind(o.status.as_str()).bind(o.updated_at).execute(&self.pool).await?;
        if done.rows_affected() == 0 { return Err(StoreError::NotFound); }
        Ok(())
    }

    async fn list_orders_for_seller(&self, seller_id: &str) -> Result<Vec<Order>> {
        let rows = sqlx::query_as::<_, OrderRow>("SELECT * FROM orders WHERE $1 = ANY(seller_ids) ORDER BY created_at DESC")
            .bind(seller_id).fetch_all(&self.pool).await?;
        self.fetch_orders(rows).await
    }

    async fn list_orders_for_customer(&self, customer_id: &str) -> Result<Vec<Order>> {
        let rows = sqlx::query_as::<_, OrderRow>("SELECT * FROM orders WHERE customer_id = $1 ORDER BY created_at DESC")
            .bind(customer_id).fetch_all(&self.pool).await?;
        self.fetch_orders(rows).await
    }

    async fn list_all_orders(&self) -> Result<Vec<Order>> {
        let rows = sqlx::query_as::<_, OrderRow>("SELECT * FROM orders ORDER BY created_at DESC").fetch_all(&self.pool).await?;
        self.fetch_orders(rows).await
    }
}

#[async_trait]
impl NotificationStore for PgStore {
    async fn create_notification(&self, n: &Notification) -> Result<Uuid> {
        sqlx::query("INSERT INTO notifications (id, recipient_id, message, link, read, created_at) VALUES ($1, $2, $3, $4, $5, $6)")
            .bind(n.id).bind(&n.recipient_id).bind(&n.message).bind(&n.link).bind(n.read).bind(n.created_at)
            .execute(&self.pool).await?;
        Ok(n.id)
    }

    async fn get_notification(&self, id: Uuid) -> Result<Option<Notification>> {
        Ok(sqlx::query_as::<_, NotificationRow>("SELECT * FROM notifications WHERE id = $1")
            .bind(id).fetch_optional(&self.pool).await?.map(Notification::from))
    }

    async fn mark_read(&self, id: Uuid) -> Result<()> {
        let done = sqlx::query("UPDATE notifications SET read = TRUE WHERE id = $1").bind(id).execute(&self.pool).await?;
        if done.rows_affected() == 0 { return Err(StoreError::NotFound); }
        Ok(())
    }

    async fn mark_unread(&self, id: Uuid) -> Result<()> {
        let done = sqlx::query("UPDATE notifications SET read = FALSE WHERE id = $1").bind(id).execute(&self.pool).await?;
        if done.rows_affected() == 0 { return Err(StoreError::NotFound); }
        Ok(())
    }

    async fn list_for_recipient(&self, recipient_id: &str) -> Result<Vec<Notification>> {
        Ok(sqlx::query_as::<_, NotificationRow>("SELECT * FROM notifications WHERE recipient_id = $1 ORDER BY created_at DESC")
            .bind(recipient_id).fetch_all(&self.pool).await?.into_iter().map(Notification::from).collect())
    }
}
