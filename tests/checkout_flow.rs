//! End-to-end checkout tests against the in-memory backend.
//!
//! Covers:
//! - Pricing and coupons through the HTTP API
//! - Card and UPI payment flows, including a declined payment
//! - Catalog soft delete with existing orders
//! - Seller notifications and order visibility
//! - Repeated payment commits
//! - Input limits, idle session expiry and list pagination

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use axum::{body::{self, Body}, http::{Method, Request, StatusCode}, response::Response, Router};
use opensase_marketplace::api::{self, AppState, USER_ID_HEADER, USER_ROLE_HEADER};
use opensase_marketplace::checkout::{CheckoutService, CouponRegistry, NotificationDispatcher, OrderMaterializer, PaymentAttempt, PaymentOutcome, SimulatedGateway};
use opensase_marketplace::config::AppConfig;
use opensase_marketplace::domain::aggregates::{PaymentMethod, Product, ShippingAddress};
use opensase_marketplace::domain::value_objects::Money;
use opensase_marketplace::store::{Catalog, MemoryCatalog, MemoryNotificationStore, MemoryOrderStore, NotificationStore};
use opensase_marketplace::EcommerceError;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde_json::{json, Value};
use tower::ServiceExt;

struct TestApp {
    router: Router,
    state: AppState,
}

impl TestApp {
    fn new() -> Self {
        Self::with_config(AppConfig { payment_delay: Duration::ZERO, ..AppConfig::default() })
    }

    fn with_config(config: AppConfig) -> Self {
        let state = AppState::in_memory(&config);
        Self { router: api::router(state.clone()), state }
    }

    async fn request(&self, method: Method, uri: &str, user: Option<(&str, &str)>, body: Option<Value>) -> Response {
        let mut builder = Request::builder().method(method).uri(uri).header("content-type", "application/json");
        if let Some((role, id)) = user {
            builder = builder.header(USER_ROLE_HEADER, role).header(USER_ID_HEADER, id);
        }
        let body = body.map(|b| Body::from(b.to_string())).unwrap_or_else(Body::empty);
        self.router.clone().oneshot(builder.body(body).unwrap()).await.unwrap()
    }

    async fn json(&self, method: Method, uri: &str, user: Option<(&str, &str)>, body: Option<Value>) -> (StatusCode, Value) {
        let response = self.request(method, uri, user, body).await;
        let status = response.status();
        let bytes = body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let value = if bytes.is_empty() { Value::Null } else { serde_json::from_slice(&bytes).unwrap_or(Value::String(String::from_utf8_lossy(&bytes).into())) };
        (status, value)
    }

    async fn create_product(&self, seller: &str, name: &str, price: u32) -> String {
        let (status, body) = self.json(Method::POST, "/api/v1/products", Some(("seller", seller)),
            Some(json!({"name": name, "price": price, "image_url": format!("/img/{name}.png"), "stock": 10}))).await;
        assert_eq!(status, StatusCode::CREATED, "{body}");
        body["id"].as_str().unwrap().to_string()
    }

    /// Opens a session with `quantity` of the product and a valid address.
    async fn ready_checkout(&self, customer: &str, product_id: &str, quantity: u32) -> String {
        let user = Some(("customer", customer));
        let (status, body) = self.json(Method::POST, "/api/v1/checkout", user, None).await;
        assert_eq!(status, StatusCode::CREATED);
        let id = body["id"].as_str().unwrap().to_string();
        let (status, _) = self.json(Method::POST, &format!("/api/v1/checkout/{id}/items"), user, Some(json!({"product_id": product_id, "quantity": quantity}))).await;
        assert_eq!(status, StatusCode::OK);
        let (status, body) = self.json(Method::PUT, &format!("/api/v1/checkout/{id}/address"), user, Some(address())).await;
        assert_eq!(status, StatusCode::OK, "{body}");
        id
    }
}

fn address() -> Value {
    json!({"full_name": "Asha Rao", "phone": "9876543210", "line1": "12 MG Road", "city": "Bengaluru", "state": "KA", "postal_code": "560001", "country": "IN"})
}

fn amount(money: &Value) -> Decimal {
    money["amount"].as_str().unwrap().parse().unwrap()
}

#[tokio::test]
async fn test_health() {
    let app = TestApp::new();
    let (status, body) = app.json(Method::GET, "/health", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
}

#[tokio::test]
async fn test_coupon_validation_endpoint() {
    let app = TestApp::new();
    let (_, welcome) = app.json(Method::POST, "/api/v1/coupons/validate", None, Some(json!({"code": "WELCOME20"}))).await;
    assert_eq!(welcome["success"], true);
    assert_eq!(welcome["discount_rate"].as_str().unwrap().parse::<Decimal>().unwrap(), dec!(0.20));

    let (_, bogus) = app.json(Method::POST, "/api/v1/coupons/validate", None, Some(json!({"code": "BOGUS"}))).await;
    assert_eq!(bogus["success"], false);
    assert_eq!(bogus["message"], "Invalid coupon code.");

    let (_, padded) = app.json(Method::POST, "/api/v1/coupons/validate", None, Some(json!({"code": " WELCOME20 "}))).await;
    assert_eq!(padded["success"], false);
}

#[tokio::test]
async fn test_card_checkout_with_coupon() {
    let app = TestApp::new();
    let product = app.create_product("S1", "Silk Saree", 5000).await;
    let id = app.ready_checkout("C1", &product, 2).await;
    let customer = Some(("customer", "C1"));

    let (_, session) = app.json(Method::GET, &format!("/api/v1/checkout/{id}"), customer, None).await;
    assert_eq!(amount(&session["quote"]["subtotal"]), dec!(10000));
    assert_eq!(amount(&session["quote"]["total"]), dec!(10000));

    let (status, applied) = app.json(Method::PUT, &format!("/api/v1/checkout/{id}/coupon"), customer, Some(json!({"code": "WELCOME20"}))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(applied["success"], true);
    assert_eq!(amount(&applied["session"]["quote"]["discount_amount"]), dec!(2000));
    assert_eq!(amount(&applied["session"]["quote"]["total"]), dec!(8000));

    let (status, session) = app.json(Method::POST, &format!("/api/v1/checkout/{id}/payment"), customer, Some(json!({"method": "Card"}))).await;
    assert_eq!(status, StatusCode::OK, "{session}");
    assert_eq!(session["payment_state"]["state"], "awaiting_outcome");

    let (_, session) = app.json(Method::POST, &format!("/api/v1/checkout/{id}/payment/outcome"), customer, Some(json!({"success": true}))).await;
    assert_eq!(session["ready_to_place"], true);
    assert_eq!(session["payment_result"]["status"], "captured");

    let (status, order) = app.json(Method::POST, &format!("/api/v1/checkout/{id}/place"), customer, None).await;
    assert_eq!(status, StatusCode::CREATED, "{order}");
    assert_eq!(amount(&order["total"]), dec!(8000));
    assert_eq!(order["coupon_code"], "WELCOME20");
    assert_eq!(order["payment"]["method"], "Card");
    assert_eq!(order["status"], "pending");

    let (status, _) = app.json(Method::POST, &format!("/api/v1/checkout/{id}/place"), customer, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (_, orders) = app.json(Method::GET, "/api/v1/orders", customer, None).await;
    assert_eq!(orders["data"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_upi_decline_places_no_order() {
    let app = TestApp::new();
    let product = app.create_product("S1", "Copper Bottle", 900).await;
    let id = app.ready_checkout("C1", &product, 1).await;
    let customer = Some(("customer", "C1"));

    let (_, session) = app.json(Method::POST, &format!("/api/v1/checkout/{id}/payment"), customer, Some(json!({"method": "UPI"}))).await;
    assert_eq!(session["payment_state"]["state"], "scanning");
    let (_, session) = app.json(Method::POST, &format!("/api/v1/checkout/{id}/payment/scan-complete"), customer, None).await;
    assert_eq!(session["payment_state"]["state"], "awaiting_outcome");
    let (_, session) = app.json(Method::POST, &format!("/api/v1/checkout/{id}/payment/outcome"), customer, Some(json!({"success": false, "reason": "insufficient funds"}))).await;
    assert_eq!(session["ready_to_place"], false);
    assert_eq!(session["payment_result"]["failure_reason"], "insufficient funds");

    let (status, _) = app.json(Method::POST, &format!("/api/v1/checkout/{id}/place"), customer, None).await;
    assert_eq!(status, StatusCode::PAYMENT_REQUIRED);

    let (_, session) = app.json(Method::GET, &format!("/api/v1/checkout/{id}"), customer, None).await;
    assert_eq!(session["cart"]["items"].as_array().unwrap().len(), 1);
    let (_, orders) = app.json(Method::GET, "/api/v1/orders", customer, None).await;
    assert!(orders["data"].as_array().unwrap().is_empty());
    let (_, inbox) = app.json(Method::GET, "/api/v1/notifications", Some(("seller", "S1")), None).await;
    assert!(inbox["data"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_soft_deleted_product_keeps_order_history() {
    let app = TestApp::new();
    let seller = Some(("seller", "S1"));
    let product = app.create_product("S1", "Brass Diya", 450).await;
    let id = app.ready_checkout("C1", &product, 3).await;
    let customer = Some(("customer", "C1"));
    app.json(Method::POST, &format!("/api/v1/checkout/{id}/payment"), customer, Some(json!({"method": "Cash on Delivery"}))).await;
    let (status, order) = app.json(Method::POST, &format!("/api/v1/checkout/{id}/place"), customer, None).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(order["payment"]["status"], "pending");

    let (status, _) = app.json(Method::DELETE, &format!("/api/v1/products/{product}"), seller, None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    let (status, _) = app.json(Method::GET, &format!("/api/v1/products/{product}"), customer, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (_, active) = app.json(Method::GET, "/api/v1/products", None, None).await;
    assert!(active["data"].as_array().unwrap().is_empty());

    let (_, orders) = app.json(Method::GET, "/api/v1/orders", seller, None).await;
    let orders = orders["data"].as_array().unwrap();
    assert_eq!(orders.len(), 1);
    assert_eq!(orders[0]["id"], order["id"]);
    let line = &orders[0]["items"][0];
    assert_eq!(line["name"], "Brass Diya");
    assert_eq!(line["image_url"], "/img/Brass Diya.png");
    assert_eq!(line["quantity"], 3);
}

#[tokio::test]
async fn test_seller_notified_once_per_order() {
    let app = TestApp::new();
    let product = app.create_product("S1", "Teak Stool", 2500).await;
    let id = app.ready_checkout("C1", &product, 1).await;
    let customer = Some(("customer", "C1"));
    app.json(Method::POST, &format!("/api/v1/checkout/{id}/payment"), customer, Some(json!({"method": "Wallet"}))).await;
    app.json(Method::POST, &format!("/api/v1/checkout/{id}/payment/outcome"), customer, Some(json!({"success": true}))).await;
    app.json(Method::POST, &format!("/api/v1/checkout/{id}/payment/outcome"), customer, Some(json!({"success": true}))).await;
    let (status, _) = app.json(Method::POST, &format!("/api/v1/checkout/{id}/place"), customer, None).await;
    assert_eq!(status, StatusCode::CREATED);

    let seller = Some(("seller", "S1"));
    let (_, inbox) = app.json(Method::GET, "/api/v1/notifications", seller, None).await;
    let inbox = inbox["data"].as_array().unwrap();
    assert_eq!(inbox.len(), 1);
    assert!(inbox[0]["message"].as_str().unwrap().contains("New Order Received"));
    assert_eq!(inbox[0]["read"], false);

    let notification = inbox[0]["id"].as_str().unwrap();
    let (_, read) = app.json(Method::POST, &format!("/api/v1/notifications/{notification}/read"), seller, None).await;
    assert_eq!(read["read"], true);
    let (_, unread) = app.json(Method::POST, &format!("/api/v1/notifications/{notification}/unread"), seller, None).await;
    assert_eq!(unread["read"], false);
    let (status, _) = app.json(Method::POST, &format!("/api/v1/notifications/{notification}/read"), Some(("seller", "S2")), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_order_visibility_and_status() {
    let app = TestApp::new();
    let product = app.create_product("S1", "Jute Rug", 1200).await;
    let id = app.ready_checkout("C1", &product, 1).await;
    let customer = Some(("customer", "C1"));
    app.json(Method::POST, &format!("/api/v1/checkout/{id}/payment"), customer, Some(json!({"method": "Cash on Delivery"}))).await;
    let (_, order) = app.json(Method::POST, &format!("/api/v1/checkout/{id}/place"), customer, None).await;
    let order_uri = format!("/api/v1/orders/{}", order["id"].as_str().unwrap());

    assert_eq!(app.json(Method::GET, &order_uri, customer, None).await.0, StatusCode::OK);
    assert_eq!(app.json(Method::GET, &order_uri, Some(("customer", "C2")), None).await.0, StatusCode::FORBIDDEN);
    assert_eq!(app.json(Method::GET, &order_uri, Some(("seller", "S2")), None).await.0, StatusCode::FORBIDDEN);
    assert_eq!(app.json(Method::GET, &order_uri, Some(("admin", "ops")), None).await.0, StatusCode::OK);

    let status_uri = format!("{order_uri}/status");
    let (status, _) = app.json(Method::PUT, &status_uri, customer, Some(json!({"status": "confirmed"}))).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    let (status, updated) = app.json(Method::PUT, &status_uri, Some(("seller", "S1")), Some(json!({"status": "confirmed"}))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(updated["status"], "confirmed");
    let (status, _) = app.json(Method::PUT, &status_uri, Some(("seller", "S1")), Some(json!({"status": "delivered"}))).await;
    assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_repeated_commit_yields_one_order_and_one_callback() {
    let catalog = Arc::new(MemoryCatalog::new());
    let orders = Arc::new(MemoryOrderStore::new());
    let notifications = Arc::new(MemoryNotificationStore::new());
    let mut product = Product::create("S1", "Clay Pot", Money::inr(dec!(300)));
    product.publish().unwrap();
    catalog.save_product(&product).await.unwrap();
    let service = CheckoutService::new(
        catalog.clone(),
        OrderMaterializer::new(catalog.clone(), orders.clone()),
        NotificationDispatcher::new(notifications.clone()),
        CouponRegistry::standard(),
        SimulatedGateway::instant(),
        "INR",
    );

    let mut session = service.open_session("C1");
    service.add_product(&mut session, product.id(), 1).await.unwrap();
    session.set_address(ShippingAddress {
        full_name: "Asha Rao".into(), phone: "9876543210".into(), line1: "12 MG Road".into(), line2: None,
        city: "Bengaluru".into(), state: None, postal_code: "560001".into(), country: "IN".into(),
    }).unwrap();

    let fired = Arc::new(AtomicUsize::new(0));
    let counter = fired.clone();
    let attempt = PaymentAttempt::new().on_resolved(move |_| { counter.fetch_add(1, Ordering::SeqCst); });
    session.begin_payment_with(attempt, PaymentMethod::Card).unwrap();
    session.process_payment(service.gateway()).await.unwrap();
    assert!(session.commit_payment(PaymentOutcome::Success).unwrap().is_some());
    assert!(session.commit_payment(PaymentOutcome::Success).unwrap().is_none());

    service.place_order(&mut session).await.unwrap();
    let err = service.place_order(&mut session).await.unwrap_err();
    assert!(matches!(err, EcommerceError::PaymentNotCaptured));

    assert_eq!(fired.load(Ordering::SeqCst), 1);
    assert_eq!(orders.len().await, 1);
    assert_eq!(notifications.list_for_recipient("S1").await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_oversized_price_and_quantity_are_rejected() {
    let app = TestApp::new();
    let seller = Some(("seller", "S1"));
    let (status, body) = app.json(Method::POST, "/api/v1/products", seller,
        Some(json!({"name": "Gold Throne", "price": "50000000000000000000000000000"}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST, "{body}");

    let product = app.create_product("S1", "Tea Cup", 200).await;
    let (status, _) = app.json(Method::PUT, &format!("/api/v1/products/{product}"), seller, Some(json!({"price": "1000000000000"}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let customer = Some(("customer", "C1"));
    let (_, session) = app.json(Method::POST, "/api/v1/checkout", customer, None).await;
    let id = session["id"].as_str().unwrap().to_string();
    let (status, _) = app.json(Method::POST, &format!("/api/v1/checkout/{id}/items"), customer, Some(json!({"product_id": product, "quantity": 4_000_000_000u32}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let (status, _) = app.json(Method::POST, &format!("/api/v1/checkout/{id}/items"), customer, Some(json!({"product_id": product, "quantity": 2}))).await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = app.json(Method::PUT, &format!("/api/v1/checkout/{id}/items/{product}"), customer, Some(json!({"quantity": 10_001}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, session) = app.json(Method::GET, &format!("/api/v1/checkout/{id}"), customer, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(amount(&session["quote"]["total"]), dec!(400));
}

#[tokio::test]
async fn test_idle_session_expires() {
    let app = TestApp::with_config(AppConfig { payment_delay: Duration::ZERO, session_ttl: Duration::ZERO, ..AppConfig::default() });
    let customer = Some(("customer", "C1"));
    let (status, first) = app.json(Method::POST, "/api/v1/checkout", customer, None).await;
    assert_eq!(status, StatusCode::CREATED);
    let first = first["id"].as_str().unwrap().to_string();

    let (status, _) = app.json(Method::POST, "/api/v1/checkout", customer, None).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(app.state.sessions.read().await.len(), 1);

    let (status, _) = app.json(Method::GET, &format!("/api/v1/checkout/{first}"), customer, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_active_session_survives_ttl() {
    let app = TestApp::with_config(AppConfig { payment_delay: Duration::ZERO, session_ttl: Duration::from_secs(3600), ..AppConfig::default() });
    let product = app.create_product("S1", "Cane Basket", 700).await;
    let id = app.ready_checkout("C1", &product, 1).await;
    app.json(Method::POST, "/api/v1/checkout", Some(("customer", "C2")), None).await;
    assert_eq!(app.state.sessions.read().await.len(), 2);
    let (status, _) = app.json(Method::GET, &format!("/api/v1/checkout/{id}"), Some(("customer", "C1")), None).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_lists_are_paginated() {
    let app = TestApp::new();
    for name in ["Lamp", "Mat", "Vase"] {
        app.create_product("S1", name, 100).await;
    }
    let (status, page) = app.json(Method::GET, "/api/v1/products?per_page=2", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(page["data"].as_array().unwrap().len(), 2);
    assert_eq!(page["total"], 3);
    assert_eq!(page["page"], 1);

    let (_, page) = app.json(Method::GET, "/api/v1/products?page=2&per_page=2", None, None).await;
    assert_eq!(page["data"].as_array().unwrap().len(), 1);

    let (_, page) = app.json(Method::GET, "/api/v1/products?seller_id=S1&per_page=500", Some(("seller", "S1")), None).await;
    assert_eq!(page["per_page"], 100);
    assert_eq!(page["data"].as_array().unwrap().len(), 3);

    let (status, orders) = app.json(Method::GET, "/api/v1/orders?page=3", Some(("admin", "ops")), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(orders["page"], 3);
    assert!(orders["data"].as_array().unwrap().is_empty());
}
