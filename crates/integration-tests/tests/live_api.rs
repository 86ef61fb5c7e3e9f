//! End-to-end tests against a running server.
//!
//! These tests require:
//! - A migrated `PostgreSQL` database (`cartwheel migrate`)
//! - The API server running (`cargo run -p cartwheel-api`)
//! - `CARTWHEEL_ADMIN_EMAIL` / `CARTWHEEL_ADMIN_PASSWORD` for an account
//!   promoted with `cartwheel admin promote` (admin tests only)
//! - `CARTWHEEL_WEBHOOK_SECRET` matching the server's `STRIPE_WEBHOOK_SECRET`
//!   (webhook tests only)
//!
//! Run with: `cargo test -p cartwheel-integration-tests -- --ignored`

#![allow(clippy::expect_used, clippy::unwrap_used)]

use reqwest::{Client, StatusCode};
use serde_json::{Value, json};
use uuid::Uuid;

use cartwheel_integration_tests::sign_webhook_with;

/// Base URL for the API (configurable via environment).
fn base_url() -> String {
    std::env::var("CARTWHEEL_BASE_URL").unwrap_or_else(|_| "http://localhost:5000".to_string())
}

/// Register a fresh customer and return their token.
async fn register(client: &Client) -> String {
    let email = format!("test-{}@example.com", Uuid::new_v4());
    let resp = client
        .post(format!("{}/api/auth/register", base_url()))
        .json(&json!({
            "name": "Test Customer",
            "email": email,
            "password": "correct horse battery staple",
        }))
        .send()
        .await
        .expect("Failed to register");

    assert_eq!(resp.status(), StatusCode::CREATED);
    let body: Value = resp.json().await.expect("Invalid JSON");
    assert_eq!(body["user"]["email"], email);
    assert_eq!(body["user"]["role"], "customer");
    body["token"].as_str().expect("token").to_string()
}

/// Log in as the configured admin, if one is configured.
async fn admin_token(client: &Client) -> Option<String> {
    let email = std::env::var("CARTWHEEL_ADMIN_EMAIL").ok()?;
    let password = std::env::var("CARTWHEEL_ADMIN_PASSWORD").ok()?;
    let resp = client
        .post(format!("{}/api/auth/login", base_url()))
        .json(&json!({ "email": email, "password": password }))
        .send()
        .await
        .expect("Failed to log in");
    assert_eq!(resp.status(), StatusCode::OK);
    let body: Value = resp.json().await.expect("Invalid JSON");
    body["token"].as_str().map(String::from)
}

/// Create an in-stock product as admin and return its ID.
async fn create_product(client: &Client, admin: &str, stock: i64) -> i64 {
    let resp = client
        .post(format!("{}/api/products", base_url()))
        .bearer_auth(admin)
        .json(&json!({
            "name": format!("Test product {}", Uuid::new_v4()),
            "price": "20.00",
            "category": "home",
            "stock": stock,
        }))
        .send()
        .await
        .expect("Failed to create product");
    assert_eq!(resp.status(), StatusCode::CREATED);
    let body: Value = resp.json().await.expect("Invalid JSON");
    body["id"].as_i64().expect("product id")
}

fn address() -> Value {
    json!({
        "street": "1 Main St",
        "city": "Springfield",
        "state": "IL",
        "postal_code": "62701",
        "country": "US",
    })
}

/// Fetch a product's current stock.
async fn stock_of(client: &Client, product_id: i64) -> i64 {
    let product: Value = client
        .get(format!("{}/api/products/{product_id}", base_url()))
        .send()
        .await
        .expect("Request failed")
        .json()
        .await
        .expect("Invalid JSON");
    product["stock"].as_i64().expect("stock")
}

/// Place an order for explicit lines and return the response.
async fn place_order(
    client: &Client,
    token: &str,
    product_id: i64,
    quantity: i64,
    payment_method: &str,
) -> reqwest::Response {
    client
        .post(format!("{}/api/orders", base_url()))
        .bearer_auth(token)
        .json(&json!({
            "items": [{ "product_id": product_id, "quantity": quantity }],
            "shipping_address": address(),
            "payment_method": payment_method,
        }))
        .send()
        .await
        .expect("Failed to place order")
}

/// Fetch an order as the given user.
async fn get_order(client: &Client, token: &str, order_id: i64) -> Value {
    let resp = client
        .get(format!("{}/api/orders/{order_id}", base_url()))
        .bearer_auth(token)
        .send()
        .await
        .expect("Request failed");
    assert_eq!(resp.status(), StatusCode::OK);
    resp.json().await.expect("Invalid JSON")
}

/// Move an order to a new status as admin.
async fn set_status(client: &Client, admin: &str, order_id: i64, status: &str) -> StatusCode {
    client
        .put(format!("{}/api/admin/orders/{order_id}/status", base_url()))
        .bearer_auth(admin)
        .json(&json!({ "status": status }))
        .send()
        .await
        .expect("Request failed")
        .status()
}

/// Deliver a signed `payment_intent.*` event for an order.
async fn send_payment_event(client: &Client, secret: &str, event_type: &str, order_id: i64) {
    let payload = json!({
        "id": format!("evt_{}", Uuid::new_v4().simple()),
        "type": event_type,
        "data": { "object": {
            "id": format!("pi_test_{order_id}"),
            "amount": 0,
            "currency": "usd",
            "metadata": { "order_id": order_id.to_string() },
        }},
    })
    .to_string();
    let signature = sign_webhook_with(secret, payload.as_bytes(), chrono::Utc::now().timestamp());

    let resp = client
        .post(format!("{}/api/payment/webhook", base_url()))
        .header("content-type", "application/json")
        .header("stripe-signature", signature)
        .body(payload)
        .send()
        .await
        .expect("Webhook delivery failed");
    assert_eq!(resp.status(), StatusCode::OK);
    let body: Value = resp.json().await.expect("Invalid JSON");
    assert_eq!(body["received"], true);
}

// ============================================================================
// Account
// ============================================================================

#[tokio::test]
#[ignore = "Requires running API server and database"]
async fn test_register_login_and_profile() {
    let client = Client::new();
    let token = register(&client).await;

    let resp = client
        .get(format!("{}/api/auth/me", base_url()))
        .bearer_auth(&token)
        .send()
        .await
        .expect("Failed to fetch profile");
    assert_eq!(resp.status(), StatusCode::OK);
    let body: Value = resp.json().await.expect("Invalid JSON");
    assert!(body.get("password_hash").is_none());

    let resp = client
        .put(format!("{}/api/auth/me", base_url()))
        .bearer_auth(&token)
        .json(&json!({ "phone": "+1 555 0100", "address": address() }))
        .send()
        .await
        .expect("Failed to update profile");
    assert_eq!(resp.status(), StatusCode::OK);
    let body: Value = resp.json().await.expect("Invalid JSON");
    assert_eq!(body["address"]["city"], "Springfield");
}

#[tokio::test]
#[ignore = "Requires running API server and database"]
async fn test_customer_cannot_reach_admin_routes() {
    let client = Client::new();
    let token = register(&client).await;

    let resp = client
        .get(format!("{}/api/admin/dashboard", base_url()))
        .bearer_auth(&token)
        .send()
        .await
        .expect("Request failed");
    assert_eq!(resp.status(), StatusCode::FORBIDDEN);
}

// ============================================================================
// Catalog
// ============================================================================

#[tokio::test]
#[ignore = "Requires running API server and database"]
async fn test_product_listing_pagination() {
    let client = Client::new();
    let resp = client
        .get(format!("{}/api/products?page=1&limit=5&sort=price_asc", base_url()))
        .send()
        .await
        .expect("Failed to list products");
    assert_eq!(resp.status(), StatusCode::OK);

    let body: Value = resp.json().await.expect("Invalid JSON");
    assert_eq!(body["page"], 1);
    assert!(body["items"].as_array().expect("items").len() <= 5);
    assert!(body["pages"].as_u64().expect("pages") >= 1);
}

// ============================================================================
// Cart & Orders
// ============================================================================

#[tokio::test]
#[ignore = "Requires running API server, database and admin credentials"]
async fn test_order_from_cart_then_cancel_restores_stock() {
    let client = Client::new();
    let Some(admin) = admin_token(&client).await else {
        return;
    };
    let product_id = create_product(&client, &admin, 3).await;
    let token = register(&client).await;

    // Over-stock add is rejected
    let resp = client
        .post(format!("{}/api/cart/items", base_url()))
        .bearer_auth(&token)
        .json(&json!({ "product_id": product_id, "quantity": 4 }))
        .send()
        .await
        .expect("Request failed");
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    let resp = client
        .post(format!("{}/api/cart/items", base_url()))
        .bearer_auth(&token)
        .json(&json!({ "product_id": product_id, "quantity": 2 }))
        .send()
        .await
        .expect("Request failed");
    assert_eq!(resp.status(), StatusCode::OK);
    let cart: Value = resp.json().await.expect("Invalid JSON");
    assert_eq!(cart["item_count"], 2);

    let resp = client
        .post(format!("{}/api/orders", base_url()))
        .bearer_auth(&token)
        .json(&json!({ "shipping_address": address(), "payment_method": "card" }))
        .send()
        .await
        .expect("Failed to place order");
    assert_eq!(resp.status(), StatusCode::CREATED);
    let order: Value = resp.json().await.expect("Invalid JSON");
    assert_eq!(order["status"], "pending");
    assert_eq!(order["items_price"], "40.00");
    let order_id = order["id"].as_i64().expect("order id");

    // Ordering from the cart empties it
    let cart: Value = client
        .get(format!("{}/api/cart", base_url()))
        .bearer_auth(&token)
        .send()
        .await
        .expect("Request failed")
        .json()
        .await
        .expect("Invalid JSON");
    assert_eq!(cart["item_count"], 0);

    let product: Value = client
        .get(format!("{}/api/products/{product_id}", base_url()))
        .send()
        .await
        .expect("Request failed")
        .json()
        .await
        .expect("Invalid JSON");
    assert_eq!(product["stock"], 1);

    let resp = client
        .post(format!("{}/api/orders/{order_id}/cancel", base_url()))
        .bearer_auth(&token)
        .send()
        .await
        .expect("Request failed");
    assert_eq!(resp.status(), StatusCode::OK);

    let product: Value = client
        .get(format!("{}/api/products/{product_id}", base_url()))
        .send()
        .await
        .expect("Request failed")
        .json()
        .await
        .expect("Invalid JSON");
    assert_eq!(product["stock"], 3);

    // Cancelling twice is an invalid transition
    let resp = client
        .post(format!("{}/api/orders/{order_id}/cancel", base_url()))
        .bearer_auth(&token)
        .send()
        .await
        .expect("Request failed");
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
#[ignore = "Requires running API server and database"]
async fn test_other_customers_order_is_hidden() {
    let client = Client::new();
    let Some(admin) = admin_token(&client).await else {
        return;
    };
    let product_id = create_product(&client, &admin, 5).await;
    let owner = register(&client).await;
    let stranger = register(&client).await;

    let order: Value = client
        .post(format!("{}/api/orders", base_url()))
        .bearer_auth(&owner)
        .json(&json!({
            "items": [{ "product_id": product_id, "quantity": 1 }],
            "shipping_address": address(),
        }))
        .send()
        .await
        .expect("Request failed")
        .json()
        .await
        .expect("Invalid JSON");
    let order_id = order["id"].as_i64().expect("order id");

    let resp = client
        .get(format!("{}/api/orders/{order_id}", base_url()))
        .bearer_auth(&stranger)
        .send()
        .await
        .expect("Request failed");
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);

    let resp = client
        .get(format!("{}/api/orders/{order_id}", base_url()))
        .bearer_auth(&admin)
        .send()
        .await
        .expect("Request failed");
    assert_eq!(resp.status(), StatusCode::OK);
}

#[tokio::test]
#[ignore = "Requires running API server, database and admin credentials"]
async fn test_order_above_stock_rejected_without_side_effects() {
    let client = Client::new();
    let Some(admin) = admin_token(&client).await else {
        return;
    };
    let product_id = create_product(&client, &admin, 2).await;
    let token = register(&client).await;

    let resp = place_order(&client, &token, product_id, 3, "card").await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    assert_eq!(stock_of(&client, product_id).await, 2);

    let orders: Value = client
        .get(format!("{}/api/orders", base_url()))
        .bearer_auth(&token)
        .send()
        .await
        .expect("Request failed")
        .json()
        .await
        .expect("Invalid JSON");
    assert!(orders.as_array().expect("array").is_empty());
}

#[tokio::test]
#[ignore = "Requires running API server, database and admin credentials"]
async fn test_explicit_order_leaves_cart_alone() {
    let client = Client::new();
    let Some(admin) = admin_token(&client).await else {
        return;
    };
    let in_cart = create_product(&client, &admin, 5).await;
    let ordered = create_product(&client, &admin, 5).await;
    let token = register(&client).await;

    let resp = client
        .post(format!("{}/api/cart/items", base_url()))
        .bearer_auth(&token)
        .json(&json!({ "product_id": in_cart, "quantity": 1 }))
        .send()
        .await
        .expect("Request failed");
    assert_eq!(resp.status(), StatusCode::OK);

    let resp = place_order(&client, &token, ordered, 1, "card").await;
    assert_eq!(resp.status(), StatusCode::CREATED);

    let cart: Value = client
        .get(format!("{}/api/cart", base_url()))
        .bearer_auth(&token)
        .send()
        .await
        .expect("Request failed")
        .json()
        .await
        .expect("Invalid JSON");
    assert_eq!(cart["item_count"], 1);
}

#[tokio::test]
#[ignore = "Requires running API server, database and admin credentials"]
async fn test_admin_transitions() {
    let client = Client::new();
    let Some(admin) = admin_token(&client).await else {
        return;
    };
    let product_id = create_product(&client, &admin, 5).await;
    let token = register(&client).await;

    let order: Value = place_order(&client, &token, product_id, 1, "cash_on_delivery")
        .await
        .json()
        .await
        .expect("Invalid JSON");
    let order_id = order["id"].as_i64().expect("order id");
    assert_eq!(order["payment_status"], "pending");

    // Skipping a step is rejected
    assert_eq!(set_status(&client, &admin, order_id, "shipped").await, StatusCode::BAD_REQUEST);

    for status in ["confirmed", "shipped", "delivered"] {
        assert_eq!(set_status(&client, &admin, order_id, status).await, StatusCode::OK, "{status}");
    }

    // Cash on delivery is settled on delivery
    let order = get_order(&client, &token, order_id).await;
    assert_eq!(order["status"], "delivered");
    assert_eq!(order["payment_status"], "paid");
    assert!(order["paid_at"].is_string());
    assert!(order["delivered_at"].is_string());

    // Delivered is terminal
    assert_eq!(set_status(&client, &admin, order_id, "shipped").await, StatusCode::BAD_REQUEST);
    assert_eq!(
        set_status(&client, &admin, order_id, "cancelled").await,
        StatusCode::BAD_REQUEST
    );
}

// ============================================================================
// Payments
// ============================================================================

#[tokio::test]
#[ignore = "Requires running API server, database, admin credentials and webhook secret"]
async fn test_payment_events_settle_order_once() {
    let client = Client::new();
    let Some(admin) = admin_token(&client).await else {
        return;
    };
    let Ok(secret) = std::env::var("CARTWHEEL_WEBHOOK_SECRET") else {
        return;
    };
    let product_id = create_product(&client, &admin, 5).await;
    let token = register(&client).await;

    let order: Value = place_order(&client, &token, product_id, 1, "card")
        .await
        .json()
        .await
        .expect("Invalid JSON");
    let order_id = order["id"].as_i64().expect("order id");

    send_payment_event(&client, &secret, "payment_intent.succeeded", order_id).await;
    let order = get_order(&client, &token, order_id).await;
    assert_eq!(order["payment_status"], "paid");
    assert_eq!(order["status"], "confirmed");
    let paid_at = order["paid_at"].clone();
    assert!(paid_at.is_string());

    // A late failure does not undo the payment
    send_payment_event(&client, &secret, "payment_intent.payment_failed", order_id).await;
    let order = get_order(&client, &token, order_id).await;
    assert_eq!(order["payment_status"], "paid");

    // Duplicate success leaves the order untouched
    send_payment_event(&client, &secret, "payment_intent.succeeded", order_id).await;
    let order = get_order(&client, &token, order_id).await;
    assert_eq!(order["paid_at"], paid_at);
}

#[tokio::test]
#[ignore = "Requires running API server, database, admin credentials and webhook secret"]
async fn test_success_after_cancel_keeps_refund() {
    let client = Client::new();
    let Some(admin) = admin_token(&client).await else {
        return;
    };
    let Ok(secret) = std::env::var("CARTWHEEL_WEBHOOK_SECRET") else {
        return;
    };
    let product_id = create_product(&client, &admin, 5).await;
    let token = register(&client).await;

    let order: Value = place_order(&client, &token, product_id, 2, "card")
        .await
        .json()
        .await
        .expect("Invalid JSON");
    let order_id = order["id"].as_i64().expect("order id");

    send_payment_event(&client, &secret, "payment_intent.succeeded", order_id).await;

    let resp = client
        .post(format!("{}/api/orders/{order_id}/cancel", base_url()))
        .bearer_auth(&token)
        .send()
        .await
        .expect("Request failed");
    assert_eq!(resp.status(), StatusCode::OK);
    let order: Value = resp.json().await.expect("Invalid JSON");
    assert_eq!(order["payment_status"], "refunded");
    assert_eq!(stock_of(&client, product_id).await, 5);

    // Stripe re-delivers the success after the cancellation
    send_payment_event(&client, &secret, "payment_intent.succeeded", order_id).await;
    let order = get_order(&client, &token, order_id).await;
    assert_eq!(order["status"], "cancelled");
    assert_eq!(order["payment_status"], "refunded");
    assert_eq!(stock_of(&client, product_id).await, 5);
}

// ============================================================================
// Admin
// ============================================================================

#[tokio::test]
#[ignore = "Requires running API server, database and admin credentials"]
async fn test_admin_dashboard_and_analytics() {
    let client = Client::new();
    let Some(admin) = admin_token(&client).await else {
        return;
    };

    let resp = client
        .get(format!("{}/api/admin/dashboard", base_url()))
        .bearer_auth(&admin)
        .send()
        .await
        .expect("Request failed");
    assert_eq!(resp.status(), StatusCode::OK);
    let body: Value = resp.json().await.expect("Invalid JSON");
    assert!(body["total_users"].as_i64().expect("total_users") >= 1);

    let resp = client
        .get(format!("{}/api/analytics/sales?days=400", base_url()))
        .bearer_auth(&admin)
        .send()
        .await
        .expect("Request failed");
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    // One point per UTC day, ending today
    let resp = client
        .get(format!("{}/api/analytics/sales?days=7", base_url()))
        .bearer_auth(&admin)
        .send()
        .await
        .expect("Request failed");
    assert_eq!(resp.status(), StatusCode::OK);
    let body: Value = resp.json().await.expect("Invalid JSON");
    let points = body.as_array().expect("array");
    assert_eq!(points.len(), 7);
    let today = chrono::Utc::now().date_naive().to_string();
    assert_eq!(points.last().map(|p| p["date"].clone()), Some(Value::String(today)));

    let resp = client
        .get(format!("{}/api/analytics/top-products?limit=3", base_url()))
        .bearer_auth(&admin)
        .send()
        .await
        .expect("Request failed");
    assert_eq!(resp.status(), StatusCode::OK);
    let body: Value = resp.json().await.expect("Invalid JSON");
    assert!(body.as_array().expect("array").len() <= 3);
}
