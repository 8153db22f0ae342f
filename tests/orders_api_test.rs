mod common;

use axum::http::{Method, StatusCode};
use rust_decimal::Decimal;
use sea_orm::{EntityTrait, PaginatorTrait};
use serde_json::{json, Value};
use std::str::FromStr;
use storefront_api::entities::{order, order_item};
use uuid::Uuid;

use common::{read_json, TestApp};

fn decimal_field(value: &Value) -> Decimal {
    Decimal::from_str(value.as_str().expect("decimal serialized as string")).unwrap()
}

#[tokio::test]
async fn order_endpoints_require_authentication() {
    let app = TestApp::new().await;

    let list = app.request(Method::GET, "/order/", None).await;
    assert_eq!(list.status(), StatusCode::UNAUTHORIZED);

    let create = app
        .request(Method::POST, "/order/", Some(json!({ "items": [] })))
        .await;
    assert_eq!(create.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn create_order_computes_live_price_subtotals() {
    let app = TestApp::new().await;
    let token = app
        .register_and_login("buyer", "buyer@example.com", "password123")
        .await;
    let product_a = app.seed_product("Product A", "10.00", 50).await;
    let product_b = app.seed_product("Product B", "3.50", 50).await;

    let response = app
        .request_with_token(
            Method::POST,
            "/order/",
            Some(&token),
            Some(json!({
                "items": [
                    { "product_id": product_a, "quantity": 2 },
                    { "product_id": product_b, "quantity": 3 },
                ]
            })),
        )
        .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    let order = read_json(response).await;

    assert_eq!(order["status"], "pending");
    let items = order["items"].as_array().unwrap();
    assert_eq!(items.len(), 2);
    assert_eq!(
        decimal_field(&items[0]["item_subtotal"]),
        Decimal::from_str("20.00").unwrap()
    );
    assert_eq!(
        decimal_field(&items[1]["item_subtotal"]),
        Decimal::from_str("10.50").unwrap()
    );
    assert_eq!(
        decimal_field(&order["total"]),
        Decimal::from_str("30.50").unwrap()
    );
}

#[tokio::test]
async fn create_order_is_atomic_when_an_item_is_invalid() {
    let app = TestApp::new().await;
    let token = app
        .register_and_login("buyer", "buyer@example.com", "password123")
        .await;
    let product_a = app.seed_product("Product A", "10.00", 50).await;

    let response = app
        .request_with_token(
            Method::POST,
            "/order/",
            Some(&token),
            Some(json!({
                "items": [
                    { "product_id": product_a, "quantity": 1 },
                    { "product_id": Uuid::new_v4(), "quantity": 1 },
                ]
            })),
        )
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    // Neither the order header nor the first (valid) item was persisted.
    let orders = order::Entity::find().count(&*app.state.db).await.unwrap();
    let items = order_item::Entity::find()
        .count(&*app.state.db)
        .await
        .unwrap();
    assert_eq!(orders, 0);
    assert_eq!(items, 0);
}

#[tokio::test]
async fn create_order_rejects_non_positive_quantity() {
    let app = TestApp::new().await;
    let token = app
        .register_and_login("buyer", "buyer@example.com", "password123")
        .await;
    let product = app.seed_product("Product", "10.00", 50).await;

    let response = app
        .request_with_token(
            Method::POST,
            "/order/",
            Some(&token),
            Some(json!({ "items": [{ "product_id": product, "quantity": 0 }] })),
        )
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn owner_is_forced_to_the_caller() {
    let app = TestApp::new().await;
    let token = app
        .register_and_login("buyer", "buyer@example.com", "password123")
        .await;
    let product = app.seed_product("Product", "10.00", 50).await;

    // A spoofed owner field in the body is ignored.
    let response = app
        .request_with_token(
            Method::POST,
            "/order/",
            Some(&token),
            Some(json!({
                "user_id": Uuid::new_v4(),
                "items": [{ "product_id": product, "quantity": 1 }]
            })),
        )
        .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    let created = read_json(response).await;

    // The caller can read it back, so it is owned by them.
    let id = created["id"].as_str().unwrap();
    let response = app
        .request_with_token(Method::GET, &format!("/order/{id}"), Some(&token), None)
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let fetched = read_json(response).await;
    assert_eq!(fetched["user_id"], created["user_id"]);
}

#[tokio::test]
async fn visibility_is_scoped_to_owner_unless_admin() {
    let app = TestApp::new().await;
    let owner_token = app
        .register_and_login("owner", "owner@example.com", "password123")
        .await;
    let other_token = app
        .register_and_login("other", "other@example.com", "password123")
        .await;
    let admin_token = app
        .register_admin("boss", "boss@example.com", "password123")
        .await;
    let product = app.seed_product("Product", "10.00", 50).await;

    let response = app
        .request_with_token(
            Method::POST,
            "/order/",
            Some(&owner_token),
            Some(json!({ "items": [{ "product_id": product, "quantity": 1 }] })),
        )
        .await;
    let order_id = read_json(response).await["id"].as_str().unwrap().to_string();

    // Another user sees an empty list and a 404 for the specific order.
    let listing = read_json(
        app.request_with_token(Method::GET, "/order/", Some(&other_token), None)
            .await,
    )
    .await;
    assert_eq!(listing.as_array().unwrap().len(), 0);

    let response = app
        .request_with_token(
            Method::GET,
            &format!("/order/{order_id}"),
            Some(&other_token),
            None,
        )
        .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    // The owner sees exactly their order.
    let listing = read_json(
        app.request_with_token(Method::GET, "/order/", Some(&owner_token), None)
            .await,
    )
    .await;
    assert_eq!(listing.as_array().unwrap().len(), 1);

    // An admin sees all orders and can fetch any of them.
    let listing = read_json(
        app.request_with_token(Method::GET, "/order/", Some(&admin_token), None)
            .await,
    )
    .await;
    assert_eq!(listing.as_array().unwrap().len(), 1);

    let response = app
        .request_with_token(
            Method::GET,
            &format!("/order/{order_id}"),
            Some(&admin_token),
            None,
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn status_transitions_follow_the_table() {
    let app = TestApp::new().await;
    let token = app
        .register_and_login("buyer", "buyer@example.com", "password123")
        .await;
    let product = app.seed_product("Product", "10.00", 50).await;

    let response = app
        .request_with_token(
            Method::POST,
            "/order/",
            Some(&token),
            Some(json!({ "items": [{ "product_id": product, "quantity": 1 }] })),
        )
        .await;
    let order_id = read_json(response).await["id"].as_str().unwrap().to_string();
    let path = format!("/order/{order_id}");

    // pending -> delivered is not allowed
    let response = app
        .request_with_token(
            Method::PATCH,
            &path,
            Some(&token),
            Some(json!({ "status": "delivered" })),
        )
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    // pending -> confirmed -> shipped -> delivered walks the table
    for status in ["confirmed", "shipped", "delivered"] {
        let response = app
            .request_with_token(
                Method::PATCH,
                &path,
                Some(&token),
                Some(json!({ "status": status })),
            )
            .await;
        assert_eq!(response.status(), StatusCode::OK, "transition to {status}");
        let body = read_json(response).await;
        assert_eq!(body["status"], status);
    }

    // delivered is terminal
    let response = app
        .request_with_token(
            Method::PATCH,
            &path,
            Some(&token),
            Some(json!({ "status": "cancelled" })),
        )
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn update_replaces_items_atomically() {
    let app = TestApp::new().await;
    let token = app
        .register_and_login("buyer", "buyer@example.com", "password123")
        .await;
    let product_a = app.seed_product("Product A", "10.00", 50).await;
    let product_b = app.seed_product("Product B", "5.00", 50).await;

    let response = app
        .request_with_token(
            Method::POST,
            "/order/",
            Some(&token),
            Some(json!({ "items": [{ "product_id": product_a, "quantity": 2 }] })),
        )
        .await;
    let order_id = read_json(response).await["id"].as_str().unwrap().to_string();

    let response = app
        .request_with_token(
            Method::PUT,
            &format!("/order/{order_id}"),
            Some(&token),
            Some(json!({ "items": [{ "product_id": product_b, "quantity": 3 }] })),
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = read_json(response).await;
    let items = body["items"].as_array().unwrap();
    assert_eq!(items.len(), 1);
    assert_eq!(items[0]["product_id"], product_b.to_string());
    assert_eq!(
        decimal_field(&body["total"]),
        Decimal::from_str("15.00").unwrap()
    );

    // A failed replacement leaves the previous items in place.
    let response = app
        .request_with_token(
            Method::PUT,
            &format!("/order/{order_id}"),
            Some(&token),
            Some(json!({ "items": [{ "product_id": Uuid::new_v4(), "quantity": 1 }] })),
        )
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let body = read_json(
        app.request_with_token(
            Method::GET,
            &format!("/order/{order_id}"),
            Some(&token),
            None,
        )
        .await,
    )
    .await;
    assert_eq!(body["items"].as_array().unwrap().len(), 1);
    assert_eq!(body["items"][0]["product_id"], product_b.to_string());
}

#[tokio::test]
async fn delete_order_removes_items() {
    let app = TestApp::new().await;
    let token = app
        .register_and_login("buyer", "buyer@example.com", "password123")
        .await;
    let product = app.seed_product("Product", "10.00", 50).await;

    let response = app
        .request_with_token(
            Method::POST,
            "/order/",
            Some(&token),
            Some(json!({ "items": [{ "product_id": product, "quantity": 1 }] })),
        )
        .await;
    let order_id = read_json(response).await["id"].as_str().unwrap().to_string();

    let response = app
        .request_with_token(
            Method::DELETE,
            &format!("/order/{order_id}"),
            Some(&token),
            None,
        )
        .await;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let response = app
        .request_with_token(
            Method::GET,
            &format!("/order/{order_id}"),
            Some(&token),
            None,
        )
        .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let items = order_item::Entity::find()
        .count(&*app.state.db)
        .await
        .unwrap();
    assert_eq!(items, 0);
}

#[tokio::test]
async fn subtotals_track_current_product_price() {
    let app = TestApp::new().await;
    let token = app
        .register_and_login("buyer", "buyer@example.com", "password123")
        .await;
    let product = app.seed_product("Volatile", "10.00", 50).await;

    let response = app
        .request_with_token(
            Method::POST,
            "/order/",
            Some(&token),
            Some(json!({ "items": [{ "product_id": product, "quantity": 2 }] })),
        )
        .await;
    let order_id = read_json(response).await["id"].as_str().unwrap().to_string();

    // Reprice the product; the order total follows the live price.
    app.state
        .services
        .catalog
        .update_product(
            product,
            storefront_api::services::catalog::UpdateProductInput {
                price: Some(Decimal::from_str("12.00").unwrap()),
                ..Default::default()
            },
        )
        .await
        .unwrap();

    let body = read_json(
        app.request_with_token(
            Method::GET,
            &format!("/order/{order_id}"),
            Some(&token),
            None,
        )
        .await,
    )
    .await;
    assert_eq!(
        decimal_field(&body["total"]),
        Decimal::from_str("24.00").unwrap()
    );
}
