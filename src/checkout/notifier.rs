//! Seller notifications for newly placed orders.

use std::sync::Arc;

use rust_decimal::Decimal;
use tracing::{error, info, instrument, warn};

use crate::domain::aggregates::{Notification, Order};
use crate::domain::value_objects::Money;
use crate::store::NotificationStore;

pub const NEW_ORDER_MESSAGE: &str = "New Order Received";

/// Best effort: failures are logged and never reach the caller.
#[derive(Clone)]
pub struct NotificationDispatcher {
    store: Arc<dyn NotificationStore>,
    nats: Option<async_nats::Client>,
}

impl NotificationDispatcher {
    pub fn new(store: Arc<dyn NotificationStore>) -> Self { Self { store, nats: None } }

    pub fn with_nats(mut self, client: async_nats::Client) -> Self { self.nats = Some(client); self }

    /// One notification per seller with lines in the order.
    #[instrument(skip_all, fields(order_id = %order.id()))]
    pub async fn notify_sellers(&self, order: &Order) {
        for seller_id in order.seller_ids() {
            let notification = new_order_notification(order, seller_id);
            match self.store.create_notification(&notification).await {
                Ok(id) => info!(notification_id = %id, %seller_id, "seller notified"),
                Err(e) => {
                    error!(%seller_id, error = %e, "failed to store seller notification");
                    continue;
                }
            }
            self.publish(&notification).await;
        }
    }

    async fn publish(&self, notification: &Notification) {
        let Some(client) = &self.nats else { return };
        let subject = format!("marketplace.notifications.{}", notification.recipient_id());
        let payload = match serde_json::to_vec(notification) {
            Ok(p) => p,
            Err(e) => { warn!(%subject, error = %e, "failed to encode notification"); return; }
        };
        if let Err(e) = client.publish(subject.clone(), payload.into()).await {
            warn!(%subject, error = %e, "failed to publish notification");
        }
    }
}

fn new_order_notification(order: &Order, seller_id: &str) -> Notification {
    let lines: Vec<_> = order.items().iter().filter(|l| l.seller_id() == seller_id).collect();
    let units: u32 = lines.iter().map(|l| l.quantity()).sum();
    let amount: Decimal = lines.iter().map(|l| l.line_total().amount()).sum();
    let seller_total = Money::new(amount, order.total().currency());
    let short_id = order.id().simple().to_string();
    let message = format!(
        "{NEW_ORDER_MESSAGE}: order #{} for {} unit(s) of your products ({})",
        &short_id[short_id.len().saturating_sub(8)..], units, seller_total,
    );
    Notification::new(seller_id, message, format!("/seller/orders/{}", order.id()))
}
