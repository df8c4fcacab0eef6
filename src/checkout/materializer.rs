//! Order materializer: turns a priced cart and a payment result into a persisted order.

use std::sync::Arc;

use tracing::{info, instrument, warn};

use super::payment::PaymentResult;
use super::pricing::PriceQuote;
use crate::domain::aggregates::{Cart, CartItem, Order, OrderLine, OrderTotals, ShippingAddress};
use crate::store::{Catalog, OrderStore};
use crate::{EcommerceError, Result};

#[derive(Clone)]
pub struct OrderMaterializer {
    catalog: Arc<dyn Catalog>,
    orders: Arc<dyn OrderStore>,
}

impl OrderMaterializer {
    pub fn new(catalog: Arc<dyn Catalog>, orders: Arc<dyn OrderStore>) -> Self { Self { catalog, orders } }

    /// Copies current product data into each line, then persists the order.
    ///
    /// Lines whose product can no longer be found keep the cart's last-known
    /// values and lose their back-reference. Nothing is written if the store
    /// fails, and the cart is never touched here.
    #[instrument(skip_all, fields(customer_id = %customer_id, lines = cart.item_count()))]
    pub async fn materialize(&self, cart: &Cart, quote: &PriceQuote, coupon_code: Option<&str>, payment: &PaymentResult, customer_id: &str, address: &ShippingAddress) -> Result<Order> {
        if !payment.info().permits_order() { return Err(EcommerceError::PaymentNotCaptured); }
        if cart.is_empty() { return Err(EcommerceError::EmptyCart); }

        let mut lines = Vec::with_capacity(cart.item_count());
        for item in cart.items() {
            lines.push(self.snapshot_line(item).await);
        }

        let order = Order::place(customer_id, address.clone(), lines, OrderTotals::from(quote), coupon_code.map(String::from), payment.info())?;
        self.orders.create_order(&order).await?;
        info!(order_id = %order.id(), total = %order.total(), method = %order.payment().method, "order placed");
        Ok(order)
    }

    async fn snapshot_line(&self, item: &CartItem) -> OrderLine {
        match self.catalog.get_product(item.product_id).await {
            Ok(Some(product)) => OrderLine::snapshot(
                Some(product.id()), product.seller_id(), product.name(), product.image_url().map(String::from),
                item.quantity, item.unit_price.clone(),
            ),
            Ok(None) => {
                warn!(product_id = %item.product_id, "product no longer in catalog; using cart snapshot");
                OrderLine::snapshot(None, item.seller_id.clone(), item.name.clone(), item.image_url.clone(), item.quantity, item.unit_price.clone())
            }
            Err(e) => {
                warn!(product_id = %item.product_id, error = %e, "catalog lookup failed; using cart snapshot");
                OrderLine::snapshot(Some(item.product_id), item.seller_id.clone(), item.name.clone(), item.image_url.clone(), item.quantity, item.unit_price.clone())
            }
        }
    }
}
