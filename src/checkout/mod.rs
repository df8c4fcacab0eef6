//! Checkout: pricing, coupons, payment authorization and order placement.

pub mod coupons;
pub mod materializer;
pub mod notifier;
pub mod payment;
pub mod pricing;
pub mod session;

use std::sync::Arc;

use tracing::{info, instrument};
use uuid::Uuid;

pub use coupons::{Coupon, CouponApplication, CouponRegistry};
pub use materializer::OrderMaterializer;
pub use notifier::NotificationDispatcher;
pub use payment::{PaymentAttempt, PaymentError, PaymentOutcome, PaymentResult, PaymentState, SimulatedGateway};
pub use pricing::{quote, PriceQuote};
pub use session::{CheckoutSession, PaymentStep};

use crate::domain::aggregates::{CartItem, Order};
use crate::store::Catalog;
use crate::{EcommerceError, Result};

#[derive(Clone)]
pub struct CheckoutService {
    catalog: Arc<dyn Catalog>,
    materializer: OrderMaterializer,
    notifier: NotificationDispatcher,
    coupons: Arc<CouponRegistry>,
    gateway: SimulatedGateway,
    currency: String,
}

impl CheckoutService {
    pub fn new(catalog: Arc<dyn Catalog>, materializer: OrderMaterializer, notifier: NotificationDispatcher, coupons: CouponRegistry, gateway: SimulatedGateway, currency: impl Into<String>) -> Self {
        Self { catalog, materializer, notifier, coupons: Arc::new(coupons), gateway, currency: currency.into() }
    }

    pub fn coupons(&self) -> &CouponRegistry { &self.coupons }
    pub fn gateway(&self) -> &SimulatedGateway { &self.gateway }
    pub fn currency(&self) -> &str { &self.currency }

    pub fn open_session(&self, customer_id: impl Into<String>) -> CheckoutSession {
        CheckoutSession::new(customer_id, &self.currency)
    }

    /// Adds a published product to the cart at its current price.
    pub async fn add_product(&self, session: &mut CheckoutSession, product_id: Uuid, quantity: u32) -> Result<()> {
        let product = self.catalog.get_product(product_id).await?.ok_or(EcommerceError::ProductNotFound)?;
        session.add_item(CartItem {
            product_id: product.id(),
            seller_id: product.seller_id().to_string(),
            name: product.name().to_string(),
            image_url: product.image_url().map(String::from),
            quantity,
            unit_price: product.price().clone(),
        })
    }

    pub fn apply_coupon(&self, session: &mut CheckoutSession, code: &str) -> Result<CouponApplication> {
        session.apply_coupon(&self.coupons, code)
    }

    /// Places the order for an authorized session.
    ///
    /// The session is cleared only once the order is persisted; on error it
    /// is left as it was so the call can be retried. A session that already
    /// produced an order has no authorization left and is rejected.
    #[instrument(skip_all, fields(session_id = %session.id(), customer_id = %session.customer_id()))]
    pub async fn place_order(&self, session: &mut CheckoutSession) -> Result<Order> {
        let payment = session.authorized().cloned().ok_or(EcommerceError::PaymentNotCaptured)?;
        if session.cart().is_empty() { return Err(EcommerceError::EmptyCart); }
        let address = session.address().cloned().ok_or(EcommerceError::MissingAddress)?;

        let quote = session.quote().rounded();
        let coupon_code = session.coupon().map(|c| c.code.clone());
        let order = self.materializer
            .materialize(session.cart(), &quote, coupon_code.as_deref(), &payment, session.customer_id(), &address)
            .await?;

        session.complete();
        info!(order_id = %order.id(), "checkout completed");
        self.notifier.notify_sellers(&order).await;
        Ok(order)
    }
}
