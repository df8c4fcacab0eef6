//! Domain events
use rust_decimal::Decimal;
use serde::Serialize;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::domain::aggregates::OrderStatus;

/// Publishes drained aggregate events. Without a NATS client the events are only traced.
pub async fn publish(nats: Option<&async_nats::Client>, events: Vec<DomainEvent>) {
    for event in events {
        let subject = event.subject();
        debug!(%subject, ?event, "domain event");
        let Some(client) = nats else { continue };
        let payload = match serde_json::to_vec(&event) {
            Ok(p) => p,
            Err(e) => { warn!(%subject, error = %e, "failed to encode domain event"); continue; }
        };
        if let Err(e) = client.publish(subject.clone(), payload.into()).await {
            warn!(%subject, error = %e, "failed to publish domain event");
        }
    }
}

#[derive(Clone, Debug, Serialize)]
#[serde(tag = "aggregate", content = "event")]
pub enum DomainEvent {
    Product(ProductEvent),
    Order(OrderEvent),
}

impl DomainEvent {
    /// NATS subject the event is published under.
    pub fn subject(&self) -> String {
        match self {
            Self::Product(e) => format!("marketplace.events.product.{}", e.name()),
            Self::Order(e) => format!("marketplace.events.order.{}", e.name()),
        }
    }
}

#[derive(Clone, Debug, Serialize)]
pub enum ProductEvent {
    Created { product_id: Uuid, seller_id: String },
    PriceChanged { product_id: Uuid, price: Decimal },
    StockAdjusted { product_id: Uuid, stock: u32 },
    Deleted { product_id: Uuid },
}

impl ProductEvent {
    fn name(&self) -> &'static str {
        match self {
            Self::Created { .. } => "created",
            Self::PriceChanged { .. } => "price_changed",
            Self::StockAdjusted { .. } => "stock_adjusted",
            Self::Deleted { .. } => "deleted",
        }
    }
}

#[derive(Clone, Debug, Serialize)]
pub enum OrderEvent {
    Placed { order_id: Uuid, customer_id: String, total: Decimal },
    StatusChanged { order_id: Uuid, from: OrderStatus, to: OrderStatus },
}

impl OrderEvent {
    fn name(&self) -> &'static str {
        match self {
            Self::Placed { .. } => "placed",
            Self::StatusChanged { .. } => "status_changed",
        }
    }
}
