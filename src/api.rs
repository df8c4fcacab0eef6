//! HTTP API.
//!
//! Identity is taken as given from the `x-user-id` and `x-user-role`
//! headers; authentication happens upstream.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use axum::{extract::{Path, Query, State}, http::{HeaderMap, StatusCode}, routing::{get, post, put}, Json, Router};
use chrono::Utc;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tokio::sync::{Mutex, RwLock};
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{debug, error, info};
use uuid::Uuid;
use validator::Validate;

use crate::checkout::{
    CheckoutService, CheckoutSession, Coupon, CouponApplication, NotificationDispatcher, OrderMaterializer,
    PaymentOutcome, PaymentResult, PaymentState, PaymentStep, PriceQuote, SimulatedGateway,
};
use crate::config::AppConfig;
use crate::domain::aggregates::{
    Cart, Notification, Order, OrderStatus, PaymentMethod, Product, ProductError, ProductStatus, ShippingAddress, Viewer,
};
use crate::domain::events;
use crate::domain::value_objects::Money;
use crate::store::{Catalog, MemoryCatalog, MemoryNotificationStore, MemoryOrderStore, NotificationStore, OrderStore};
use crate::EcommerceError;

pub const USER_ID_HEADER: &str = "x-user-id";
pub const USER_ROLE_HEADER: &str = "x-user-role";

type ApiError = (StatusCode, String);
type SessionHandle = Arc<Mutex<CheckoutSession>>;

#[derive(Clone)]
pub struct AppState {
    pub catalog: Arc<dyn Catalog>,
    pub orders: Arc<dyn OrderStore>,
    pub notifications: Arc<dyn NotificationStore>,
    pub checkout: CheckoutService,
    pub sessions: Arc<RwLock<HashMap<Uuid, SessionHandle>>>,
    pub session_ttl: Duration,
    pub currency: String,
    pub nats: Option<async_nats::Client>,
}

impl AppState {
    pub fn new(catalog: Arc<dyn Catalog>, orders: Arc<dyn OrderStore>, notifications: Arc<dyn NotificationStore>, config: &AppConfig, nats: Option<async_nats::Client>) -> Self {
        let mut notifier = NotificationDispatcher::new(notifications.clone());
        if let Some(client) = nats.clone() { notifier = notifier.with_nats(client); }
        let checkout = CheckoutService::new(
            catalog.clone(),
            OrderMaterializer::new(catalog.clone(), orders.clone()),
            notifier,
            config.coupons.clone(),
            SimulatedGateway::new(config.payment_delay),
            config.currency.clone(),
        );
        Self {
            catalog, orders, notifications, checkout, sessions: Arc::default(),
            session_ttl: config.session_ttl, currency: config.currency.clone(), nats,
        }
    }

    pub fn in_memory(config: &AppConfig) -> Self {
        Self::new(Arc::new(MemoryCatalog::new()), Arc::new(MemoryOrderStore::new()), Arc::new(MemoryNotificationStore::new()), config, None)
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(|| async { Json(serde_json::json!({"status": "healthy", "service": "opensase-marketplace"})) }))
        .route("/api/v1/products", get(list_products).post(create_product))
        .route("/api/v1/products/:id", get(get_product).put(update_product).delete(delete_product))
        .route("/api/v1/coupons/validate", post(validate_coupon))
        .route("/api/v1/checkout", post(open_session))
        .route("/api/v1/checkout/:id", get(get_session))
        .route("/api/v1/checkout/:id/items", post(add_item))
        .route("/api/v1/checkout/:id/items/:product_id", put(update_item).delete(remove_item))
        .route("/api/v1/checkout/:id/coupon", put(apply_coupon).delete(remove_coupon))
        .route("/api/v1/checkout/:id/address", put(set_address))
        .route("/api/v1/checkout/:id/payment", post(begin_payment).delete(cancel_payment))
        .route("/api/v1/checkout/:id/payment/scan-complete", post(scan_complete))
        .route("/api/v1/checkout/:id/payment/outcome", post(commit_outcome))
        .route("/api/v1/checkout/:id/place", post(place_order))
        .route("/api/v1/orders", get(list_orders))
        .route("/api/v1/orders/:id", get(get_order))
        .route("/api/v1/orders/:id/status", put(update_order_status))
        .route("/api/v1/notifications", get(list_notifications))
        .route("/api/v1/notifications/:id/read", post(mark_read))
        .route("/api/v1/notifications/:id/unread", post(mark_unread))
        .layer(TraceLayer::new_for_http()).layer(CorsLayer::permissive()).with_state(state)
}

fn err(e: impl Into<EcommerceError>) -> ApiError {
    let e = e.into();
    let status = e.status_code();
    if status.is_server_error() { error!(error = %e, "request failed"); }
    (status, e.to_string())
}

fn header<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|v| v.to_str().ok()).map(str::trim).filter(|v| !v.is_empty())
}

fn viewer(headers: &HeaderMap) -> Result<Viewer, ApiError> {
    let role = header(headers, USER_ROLE_HEADER).unwrap_or("customer").to_ascii_lowercase();
    let id = header(headers, USER_ID_HEADER).map(String::from);
    match (role.as_str(), id) {
        ("admin", _) => Ok(Viewer::Admin),
        ("seller", Some(id)) => Ok(Viewer::Seller(id)),
        ("customer", Some(id)) => Ok(Viewer::Customer(id)),
        ("seller" | "customer", None) => Err((StatusCode::UNAUTHORIZED, format!("Missing {USER_ID_HEADER} header"))),
        (other, _) => Err((StatusCode::BAD_REQUEST, format!("Unknown role: {other}"))),
    }
}

fn user_id(headers: &HeaderMap) -> Result<String, ApiError> {
    header(headers, USER_ID_HEADER).map(String::from).ok_or((StatusCode::UNAUTHORIZED, format!("Missing {USER_ID_HEADER} header")))
}

fn customer_id(headers: &HeaderMap) -> Result<String, ApiError> {
    match viewer(headers)? {
        Viewer::Customer(id) => Ok(id),
        _ => Err(err(EcommerceError::Forbidden)),
    }
}

fn owns(viewer: &Viewer, product: &Product) -> bool {
    match viewer {
        Viewer::Admin => true,
        Viewer::Seller(id) => id == product.seller_id(),
        Viewer::Customer(_) => false,
    }
}

// ---------------------------------------------------------------------------
// Products
// ---------------------------------------------------------------------------

#[derive(Debug, Default, Deserialize)]
pub struct ListParams {
    pub page: Option<u32>,
    pub per_page: Option<u32>,
    pub seller_id: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct PaginatedResponse<T> { pub data: Vec<T>, pub total: usize, pub page: u32, pub per_page: u32 }

impl ListParams {
    pub fn paginate<T>(&self, items: Vec<T>) -> PaginatedResponse<T> {
        let page = self.page.unwrap_or(1).max(1);
        let per_page = self.per_page.unwrap_or(20).clamp(1, 100);
        let total = items.len();
        let skip = (page as usize - 1).saturating_mul(per_page as usize);
        let data = items.into_iter().skip(skip).take(per_page as usize).collect();
        PaginatedResponse { data, total, page, per_page }
    }
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateProductRequest {
    #[validate(length(min = 1, max = 200))]
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub image_url: Option<String>,
    pub price: Decimal,
    #[serde(default)]
    pub stock: u32,
}

#[derive(Debug, Deserialize)]
pub struct UpdateProductRequest {
    pub name: Option<String>,
    pub description: Option<String>,
    pub image_url: Option<String>,
    pub price: Option<Decimal>,
    pub stock: Option<u32>,
}

async fn list_products(State(s): State<AppState>, headers: HeaderMap, Query(p): Query<ListParams>) -> Result<Json<PaginatedResponse<Product>>, ApiError> {
    let products: Vec<Product> = match p.seller_id.as_deref() {
        Some(seller_id) => {
            let own = match viewer(&headers).ok() {
                Some(Viewer::Admin) => true,
                Some(Viewer::Seller(id)) => id == seller_id,
                _ => false,
            };
            let all = s.catalog.list_products_for_seller(seller_id).await.map_err(err)?;
            all.into_iter().filter(|p| own || p.is_active()).collect()
        }
        None => s.catalog.list_active_products().await.map_err(err)?,
    };
    Ok(Json(p.paginate(products)))
}

async fn create_product(State(s): State<AppState>, headers: HeaderMap, Json(req): Json<CreateProductRequest>) -> Result<(StatusCode, Json<Product>), ApiError> {
    let Viewer::Seller(seller_id) = viewer(&headers)? else { return Err(err(EcommerceError::Forbidden)) };
    req.validate().map_err(|e| err(EcommerceError::Validation(e.to_string())))?;
    let mut product = Product::create(seller_id, req.name, Money::new(req.price, &s.currency)).with_description(req.description);
    if let Some(url) = req.image_url { product = product.with_image(url); }
    if req.stock > 0 { product.set_stock(req.stock); }
    product.publish().map_err(err)?;
    s.catalog.save_product(&product).await.map_err(err)?;
    info!(product_id = %product.id(), seller_id = %product.seller_id(), "product created");
    events::publish(s.nats.as_ref(), product.take_events()).await;
    Ok((StatusCode::CREATED, Json(product)))
}

async fn get_product(State(s): State<AppState>, headers: HeaderMap, Path(id): Path<Uuid>) -> Result<Json<Product>, ApiError> {
    let product = s.catalog.find_product(id).await.map_err(err)?.ok_or_else(|| err(EcommerceError::ProductNotFound))?;
    let visible = product.is_active() || viewer(&headers).is_ok_and(|v| owns(&v, &product));
    if !visible { return Err(err(EcommerceError::ProductNotFound)); }
    Ok(Json(product))
}

async fn owned_product(s: &AppState, headers: &HeaderMap, id: Uuid) -> Result<Product, ApiError> {
    let viewer = viewer(headers)?;
    let product = s.catalog.find_product(id).await.map_err(err)?.ok_or_else(|| err(EcommerceError::ProductNotFound))?;
    if !owns(&viewer, &product) { return Err(err(EcommerceError::Forbidden)); }
    Ok(product)
}

async fn update_product(State(s): State<AppState>, headers: HeaderMap, Path(id): Path<Uuid>, Json(req): Json<UpdateProductRequest>) -> Result<Json<Product>, ApiError> {
    let mut product = owned_product(&s, &headers, id).await?;
    if product.status() == ProductStatus::Deleted { return Err(err(ProductError::Deleted)); }
    if req.name.is_some() || req.description.is_some() || req.image_url.is_some() {
        let name = req.name.unwrap_or_else(|| product.name().to_string());
        let description = req.description.unwrap_or_else(|| product.description().to_string());
        let image_url = req.image_url.or_else(|| product.image_url().map(String::from));
        product.update_details(name, description, image_url).map_err(err)?;
    }
    if let Some(price) = req.price { product.update_price(Money::new(price, &s.currency)).map_err(err)?; }
    if let Some(stock) = req.stock { product.set_stock(stock); }
    s.catalog.save_product(&product).await.map_err(err)?;
    events::publish(s.nats.as_ref(), product.take_events()).await;
    Ok(Json(product))
}

/// Soft delete. Orders that reference the product keep their snapshots.
async fn delete_product(State(s): State<AppState>, headers: HeaderMap, Path(id): Path<Uuid>) -> Result<StatusCode, ApiError> {
    let mut product = owned_product(&s, &headers, id).await?;
    product.delete();
    s.catalog.save_product(&product).await.map_err(err)?;
    info!(product_id = %id, "product deleted");
    events::publish(s.nats.as_ref(), product.take_events()).await;
    Ok(StatusCode::NO_CONTENT)
}

// ---------------------------------------------------------------------------
// Checkout
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
pub struct SessionView {
    pub id: Uuid,
    pub customer_id: String,
    pub cart: Cart,
    pub coupon: Option<Coupon>,
    pub quote: PriceQuote,
    pub shipping_address: Option<ShippingAddress>,
    pub payment_state: Option<PaymentState>,
    pub payment_method: Option<PaymentMethod>,
    pub payment_result: Option<PaymentResult>,
    pub ready_to_place: bool,
}

impl From<&CheckoutSession> for SessionView {
    fn from(s: &CheckoutSession) -> Self {
        let attempt = s.payment();
        Self {
            id: s.id(),
            customer_id: s.customer_id().to_string(),
            cart: s.cart().clone(),
            coupon: s.coupon().cloned(),
            quote: s.quote().rounded(),
            shipping_address: s.address().cloned(),
            payment_state: attempt.map(|a| a.state()),
            payment_method: s.authorized().map(|r| r.method).or_else(|| attempt.and_then(|a| a.method())),
            payment_result: s.authorized().or_else(|| attempt.and_then(|a| a.result())).cloned(),
            ready_to_place: s.authorized().is_some(),
        }
    }
}

#[derive(Debug, Deserialize)] pub struct CouponRequest { pub code: String }
#[derive(Debug, Serialize)] pub struct CouponResponse { #[serde(flatten)] pub application: CouponApplication, pub session: SessionView }
#[derive(Debug, Deserialize)] pub struct AddItemRequest { pub product_id: Uuid, #[serde(default = "one")] pub quantity: u32 }
#[derive(Debug, Deserialize)] pub struct QuantityRequest { pub quantity: u32 }
#[derive(Debug, Deserialize)] pub struct PaymentRequest { pub method: PaymentMethod }
#[derive(Debug, Deserialize)] pub struct OutcomeRequest { pub success: bool, pub reason: Option<String> }

fn one() -> u32 { 1 }

async fn validate_coupon(State(s): State<AppState>, Json(req): Json<CouponRequest>) -> Json<CouponApplication> {
    Json(s.checkout.coupons().apply(&req.code))
}

/// Looks up the caller's session. An idle-expired session is dropped and reported as missing.
async fn session_for(s: &AppState, headers: &HeaderMap, id: Uuid) -> Result<SessionHandle, ApiError> {
    let customer = customer_id(headers)?;
    let handle = s.sessions.read().await.get(&id).cloned().ok_or_else(|| err(EcommerceError::SessionNotFound))?;
    let mut session = handle.lock().await;
    if session.customer_id() != customer { return Err(err(EcommerceError::SessionNotFound)); }
    if session.is_expired(s.session_ttl, Utc::now()) {
        drop(session);
        s.sessions.write().await.remove(&id);
        info!(session_id = %id, "checkout session expired");
        return Err(err(EcommerceError::SessionNotFound));
    }
    session.touch();
    drop(session);
    Ok(handle)
}

/// Drops idle sessions. Sessions locked by an in-flight request are kept.
async fn sweep_expired_sessions(s: &AppState) {
    let now = Utc::now();
    let mut sessions = s.sessions.write().await;
    let before = sessions.len();
    sessions.retain(|_, handle| handle.try_lock().map_or(true, |session| !session.is_expired(s.session_ttl, now)));
    let swept = before - sessions.len();
    if swept > 0 { debug!(swept, remaining = sessions.len(), "expired checkout sessions dropped"); }
}

/// Waits out the gateway latency without holding the session lock.
async fn run_processing(s: &AppState, handle: &SessionHandle) -> Result<(), ApiError> {
    let ticket = handle.lock().await.processing_ticket().map_err(err)?;
    s.checkout.gateway().settle(&ticket).await.map_err(err)?;
    handle.lock().await.finish_processing(&ticket).map_err(err)?;
    Ok(())
}

async fn open_session(State(s): State<AppState>, headers: HeaderMap) -> Result<(StatusCode, Json<SessionView>), ApiError> {
    let session = s.checkout.open_session(customer_id(&headers)?);
    let view = SessionView::from(&session);
    sweep_expired_sessions(&s).await;
    s.sessions.write().await.insert(session.id(), Arc::new(Mutex::new(session)));
    info!(session_id = %view.id, customer_id = %view.customer_id, "checkout opened");
    Ok((StatusCode::CREATED, Json(view)))
}

async fn get_session(State(s): State<AppState>, headers: HeaderMap, Path(id): Path<Uuid>) -> Result<Json<SessionView>, ApiError> {
    let handle = session_for(&s, &headers, id).await?;
    let session = handle.lock().await;
    Ok(Json(SessionView::from(&*session)))
}

async fn add_item(State(s): State<AppState>, headers: HeaderMap, Path(id): Path<Uuid>, Json(req): Json<AddItemRequest>) -> Result<Json<SessionView>, ApiError> {
    let handle = session_for(&s, &headers, id).await?;
    let mut session = handle.lock().await;
    s.checkout.add_product(&mut session, req.product_id, req.quantity).await.map_err(err)?;
    Ok(Json(SessionView::from(&*session)))
}

async fn update_item(State(s): State<AppState>, headers: HeaderMap, Path((id, product_id)): Path<(Uuid, Uuid)>, Json(req): Json<QuantityRequest>) -> Result<Json<SessionView>, ApiError> {
    let handle = session_for(&s, &headers, id).await?;
    let mut session = handle.lock().await;
    session.update_quantity(product_id, req.quantity).map_err(err)?;
    Ok(Json(SessionView::from(&*session)))
}

async fn remove_item(State(s): State<AppState>, headers: HeaderMap, Path((id, product_id)): Path<(Uuid, Uuid)>) -> Result<Json<SessionView>, ApiError> {
    let handle = session_for(&s, &headers, id).await?;
    let mut session = handle.lock().await;
    session.remove_item(product_id).map_err(err)?;
    Ok(Json(SessionView::from(&*session)))
}

async fn apply_coupon(State(s): State<AppState>, headers: HeaderMap, Path(id): Path<Uuid>, Json(req): Json<CouponRequest>) -> Result<Json<CouponResponse>, ApiError> {
    let handle = session_for(&s, &headers, id).await?;
    let mut session = handle.lock().await;
    let application = s.checkout.apply_coupon(&mut session, &req.code).map_err(err)?;
    Ok(Json(CouponResponse { application, session: SessionView::from(&*session) }))
}

async fn remove_coupon(State(s): State<AppState>, headers: HeaderMap, Path(id): Path<Uuid>) -> Result<Json<SessionView>, ApiError> {
    let handle = session_for(&s, &headers, id).await?;
    let mut session = handle.lock().await;
    session.remove_coupon().map_err(err)?;
    Ok(Json(SessionView::from(&*session)))
}

async fn set_address(State(s): State<AppState>, headers: HeaderMap, Path(id): Path<Uuid>, Json(address): Json<ShippingAddress>) -> Result<Json<SessionView>, ApiError> {
    let handle = session_for(&s, &headers, id).await?;
    let mut session = handle.lock().await;
    session.set_address(address).map_err(err)?;
    Ok(Json(SessionView::from(&*session)))
}

async fn begin_payment(State(s): State<AppState>, headers: HeaderMap, Path(id): Path<Uuid>, Json(req): Json<PaymentRequest>) -> Result<Json<SessionView>, ApiError> {
    let handle = session_for(&s, &headers, id).await?;
    let step = handle.lock().await.begin_payment(req.method).map_err(err)?;
    if step == (PaymentStep::Authorizing { state: PaymentState::Processing }) {
        run_processing(&s, &handle).await?;
    }
    let session = handle.lock().await;
    Ok(Json(SessionView::from(&*session)))
}

/// UPI: the customer has paid the displayed code.
async fn scan_complete(State(s): State<AppState>, headers: HeaderMap, Path(id): Path<Uuid>) -> Result<Json<SessionView>, ApiError> {
    let handle = session_for(&s, &headers, id).await?;
    handle.lock().await.mark_paid().map_err(err)?;
    run_processing(&s, &handle).await?;
    let session = handle.lock().await;
    Ok(Json(SessionView::from(&*session)))
}

async fn commit_outcome(State(s): State<AppState>, headers: HeaderMap, Path(id): Path<Uuid>, Json(req): Json<OutcomeRequest>) -> Result<Json<SessionView>, ApiError> {
    let handle = session_for(&s, &headers, id).await?;
    let outcome = if req.success {
        PaymentOutcome::Success
    } else {
        PaymentOutcome::Failure { reason: req.reason.unwrap_or_else(|| "Payment declined".to_string()) }
    };
    let mut session = handle.lock().await;
    session.commit_payment(outcome).map_err(err)?;
    Ok(Json(SessionView::from(&*session)))
}

async fn cancel_payment(State(s): State<AppState>, headers: HeaderMap, Path(id): Path<Uuid>) -> Result<Json<SessionView>, ApiError> {
    let handle = session_for(&s, &headers, id).await?;
    let mut session = handle.lock().await;
    session.cancel_payment().map_err(err)?;
    Ok(Json(SessionView::from(&*session)))
}

async fn place_order(State(s): State<AppState>, headers: HeaderMap, Path(id): Path<Uuid>) -> Result<(StatusCode, Json<Order>), ApiError> {
    let handle = session_for(&s, &headers, id).await?;
    let mut order = {
        let mut session = handle.lock().await;
        s.checkout.place_order(&mut session).await.map_err(err)?
    };
    s.sessions.write().await.remove(&id);
    events::publish(s.nats.as_ref(), order.take_events()).await;
    Ok((StatusCode::CREATED, Json(order)))
}

// ---------------------------------------------------------------------------
// Orders
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)] pub struct StatusRequest { pub status: OrderStatus }

async fn list_orders(State(s): State<AppState>, headers: HeaderMap, Query(p): Query<ListParams>) -> Result<Json<PaginatedResponse<Order>>, ApiError> {
    let orders = match viewer(&headers)? {
        Viewer::Customer(id) => s.orders.list_orders_for_customer(&id).await,
        Viewer::Seller(id) => s.orders.list_orders_for_seller(&id).await,
        Viewer::Admin => s.orders.list_all_orders().await,
    };
    Ok(Json(p.paginate(orders.map_err(err)?)))
}

async fn visible_order(s: &AppState, viewer: &Viewer, id: Uuid) -> Result<Order, ApiError> {
    let order = s.orders.get_order(id).await.map_err(err)?.ok_or_else(|| err(EcommerceError::OrderNotFound))?;
    if !order.is_visible_to(viewer) { return Err(err(EcommerceError::Forbidden)); }
    Ok(order)
}

async fn get_order(State(s): State<AppState>, headers: HeaderMap, Path(id): Path<Uuid>) -> Result<Json<Order>, ApiError> {
    let viewer = viewer(&headers)?;
    Ok(Json(visible_order(&s, &viewer, id).await?))
}

async fn update_order_status(State(s): State<AppState>, headers: HeaderMap, Path(id): Path<Uuid>, Json(req): Json<StatusRequest>) -> Result<Json<Order>, ApiError> {
    let viewer = viewer(&headers)?;
    if matches!(viewer, Viewer::Customer(_)) { return Err(err(EcommerceError::Forbidden)); }
    let mut order = visible_order(&s, &viewer, id).await?;
    order.transition(req.status).map_err(err)?;
    s.orders.update_order(&order).await.map_err(err)?;
    info!(order_id = %id, status = order.status().as_str(), "order status updated");
    events::publish(s.nats.as_ref(), order.take_events()).await;
    Ok(Json(order))
}

// ---------------------------------------------------------------------------
// Notifications
// ---------------------------------------------------------------------------

async fn list_notifications(State(s): State<AppState>, headers: HeaderMap, Query(p): Query<ListParams>) -> Result<Json<PaginatedResponse<Notification>>, ApiError> {
    let recipient = user_id(&headers)?;
    Ok(Json(p.paginate(s.notifications.list_for_recipient(&recipient).await.map_err(err)?)))
}

async fn set_read(s: &AppState, headers: &HeaderMap, id: Uuid, read: bool) -> Result<Json<Notification>, ApiError> {
    let recipient = user_id(headers)?;
    let mut notification = s.notifications.get_notification(id).await.map_err(err)?
        .filter(|n| n.recipient_id() == recipient)
        .ok_or_else(|| err(EcommerceError::NotificationNotFound))?;
    if read {
        s.notifications.mark_read(id).await.map_err(err)?;
        notification.mark_read();
    } else {
        s.notifications.mark_unread(id).await.map_err(err)?;
        notification.mark_unread();
    }
    Ok(Json(notification))
}

async fn mark_read(State(s): State<AppState>, headers: HeaderMap, Path(id): Path<Uuid>) -> Result<Json<Notification>, ApiError> {
    set_read(&s, &headers, id, true).await
}

async fn mark_unread(State(s): State<AppState>, headers: HeaderMap, Path(id): Path<Uuid>) -> Result<Json<Notification>, ApiError> {
    set_read(&s, &headers, id, false).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn headers(pairs: &[(&'static str, &'static str)]) -> HeaderMap {
        let mut map = HeaderMap::new();
        for (k, v) in pairs { map.insert(*k, HeaderValue::from_static(v)); }
        map
    }

    #[test]
    fn test_viewer_from_headers() {
        assert_eq!(viewer(&headers(&[(USER_ID_HEADER, "C1")])).unwrap(), Viewer::Customer("C1".into()));
        assert_eq!(viewer(&headers(&[(USER_ID_HEADER, "S1"), (USER_ROLE_HEADER, "Seller")])).unwrap(), Viewer::Seller("S1".into()));
        assert_eq!(viewer(&headers(&[(USER_ROLE_HEADER, "admin")])).unwrap(), Viewer::Admin);
        assert_eq!(viewer(&headers(&[])).unwrap_err().0, StatusCode::UNAUTHORIZED);
        assert_eq!(viewer(&headers(&[(USER_ID_HEADER, "X"), (USER_ROLE_HEADER, "root")])).unwrap_err().0, StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_error_status_mapping() {
        assert_eq!(err(EcommerceError::EmptyCart).0, StatusCode::BAD_REQUEST);
        assert_eq!(err(EcommerceError::PaymentNotCaptured).0, StatusCode::PAYMENT_REQUIRED);
        assert_eq!(err(EcommerceError::Forbidden).0, StatusCode::FORBIDDEN);
        assert_eq!(err(EcommerceError::SessionNotFound).0, StatusCode::NOT_FOUND);
        assert_eq!(err(crate::store::StoreError::Unavailable("down".into())).0, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(err(ProductError::PriceTooHigh).0, StatusCode::BAD_REQUEST);
        assert_eq!(err(crate::domain::aggregates::CartError::QuantityTooLarge).0, StatusCode::BAD_REQUEST);
        assert_eq!(err(crate::checkout::PaymentError::StaleTicket).0, StatusCode::CONFLICT);
    }

    #[test]
    fn test_corrupt_record_is_not_retryable() {
        let corrupt = EcommerceError::from(crate::store::StoreError::Corrupt("quantity out of range".into()));
        assert!(!corrupt.is_retryable());
        assert_eq!(err(corrupt).0, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(EcommerceError::from(crate::store::StoreError::Unavailable("down".into())).is_retryable());
    }

    #[test]
    fn test_pagination_bounds() {
        let items: Vec<u32> = (1..=250).collect();
        let first = ListParams::default().paginate(items.clone());
        assert_eq!((first.data.len(), first.total, first.page, first.per_page), (20, 250, 1, 20));

        let capped = ListParams { page: Some(2), per_page: Some(1000), seller_id: None }.paginate(items.clone());
        assert_eq!(capped.per_page, 100);
        assert_eq!(capped.data.first(), Some(&101));

        let zero = ListParams { page: Some(0), per_page: Some(0), seller_id: None }.paginate(items.clone());
        assert_eq!((zero.page, zero.per_page, zero.data), (1, 1, vec![1]));

        let past_end = ListParams { page: Some(u32::MAX), per_page: Some(100), seller_id: None }.paginate(items);
        assert!(past_end.data.is_empty());
        assert_eq!(past_end.total, 250);
    }
}
