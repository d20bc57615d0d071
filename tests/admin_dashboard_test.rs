mod common;

use axum::http::StatusCode;
use common::{decimal, location, response_json, TestApp, STAFF_PASSWORD};
use rust_decimal_macros::dec;
use serde_json::json;

const CHECKOUT_FORM: &[(&str, &str)] = &[
    ("customer_name", "Omar Saleh"),
    ("phone", "0790000000"),
    ("address", "3 Garden Lane"),
];

/// Places an order for `quantity` units from a fresh session, returning the
/// order number.
async fn place_order(app: &TestApp, product_id: i32, quantity: u32) -> String {
    app.forget_session();
    app.add_to_cart(product_id, quantity).await;
    let response = app.post_form("/checkout", CHECKOUT_FORM).await;
    let number = location(&response)
        .strip_prefix("/order-success/")
        .expect("order placed")
        .to_string();
    app.forget_session();
    number
}

async fn order_id(app: &TestApp, order_number: &str) -> i64 {
    let body = response_json(app.get(&format!("/order-success/{order_number}")).await).await;
    body["order"]["id"].as_i64().expect("order id")
}

#[tokio::test]
async fn dashboard_requires_a_staff_token() {
    let app = TestApp::new().await;

    let response = app.get("/admin-dashboard").await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let response = app.get_with_token("/admin-dashboard", "not-a-jwt").await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let customer = app.token_for("shopper", false).await;
    let response = app.get_with_token("/admin-dashboard", &customer).await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let staff = app.token_for("manager", true).await;
    let response = app.get_with_token("/admin-dashboard", &staff).await;
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn login_issues_tokens_for_valid_credentials_only() {
    let app = TestApp::new().await;
    app.create_user("manager", true).await;

    let response = app
        .post_json(
            "/auth/login",
            json!({ "username": "manager", "password": "wrong" }),
        )
        .await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let response = app
        .post_json(
            "/auth/login",
            json!({ "username": "manager", "password": STAFF_PASSWORD }),
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = response_json(response).await;
    assert_eq!(body["token_type"], "Bearer");
    let token = body["access_token"].as_str().unwrap().to_string();

    let response = app.get_with_token("/admin-dashboard", &token).await;
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn dashboard_reports_order_counts_and_revenue() {
    let app = TestApp::new().await;
    let kitchen = app.seed_category("Kitchen", true).await;
    let mug = app.seed_product(kitchen.id, "Mug", dec!(30.00), 20).await;
    let plate = app.seed_product(kitchen.id, "Plate", dec!(5.00), 20).await;

    let delivered = place_order(&app, mug.id, 2).await;
    place_order(&app, plate.id, 1).await;

    let staff = app.token_for("manager", true).await;
    let id = order_id(&app, &delivered).await;
    let response = app
        .post_form_with_token(
            &format!("/admin-dashboard/order/{id}/update"),
            &[("status", "delivered")],
            &staff,
        )
        .await;
    assert_eq!(location(&response), "/admin-dashboard");

    let body = response_json(app.get_with_token("/admin-dashboard", &staff).await).await;
    assert_eq!(body["orders_today"], 2);
    assert_eq!(body["orders_this_week"], 2);
    assert_eq!(body["pending_orders_count"], 1);
    assert_eq!(body["successful_orders_count"], 1);
    // 2 × 30.00 with free shipping.
    assert_eq!(decimal(&body["total_revenue"]), dec!(60.00));
    assert_eq!(body["recent_orders"].as_array().unwrap().len(), 2);
    assert_eq!(body["best_sellers"][0]["name"], "Mug");
    assert_eq!(body["status_choices"].as_array().unwrap().len(), 5);
    assert_eq!(body["messages"][0]["level"], "success");
    assert_eq!(
        body["messages"][0]["text"],
        format!("Order #{delivered} updated to delivered.")
    );
}

#[tokio::test]
async fn status_changes_keep_the_order_number() {
    let app = TestApp::new().await;
    let kitchen = app.seed_category("Kitchen", true).await;
    let mug = app.seed_product(kitchen.id, "Mug", dec!(30.00), 20).await;
    let number = place_order(&app, mug.id, 1).await;
    let id = order_id(&app, &number).await;

    let staff = app.token_for("manager", true).await;
    for status in ["confirmed", "shipped", "delivered"] {
        let response = app
            .post_form_with_token(
                &format!("/admin-dashboard/order/{id}/update"),
                &[("status", status)],
                &staff,
            )
            .await;
        assert_eq!(location(&response), "/admin-dashboard");

        let body = response_json(
            app.get_with_token(&format!("/admin-dashboard/order/{id}"), &staff)
                .await,
        )
        .await;
        assert_eq!(body["order"]["status"], status);
        assert_eq!(body["order"]["order_number"], number.as_str());
    }

    let response = app.get(&format!("/order-success/{number}")).await;
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn unknown_status_leaves_the_order_unchanged() {
    let app = TestApp::new().await;
    let kitchen = app.seed_category("Kitchen", true).await;
    let mug = app.seed_product(kitchen.id, "Mug", dec!(30.00), 20).await;
    let number = place_order(&app, mug.id, 1).await;
    let id = order_id(&app, &number).await;

    let staff = app.token_for("manager", true).await;
    let response = app
        .post_form_with_token(
            &format!("/admin-dashboard/order/{id}/update"),
            &[("status", "teleported")],
            &staff,
        )
        .await;
    assert_eq!(location(&response), "/admin-dashboard");

    let body = response_json(
        app.get_with_token(&format!("/admin-dashboard/order/{id}"), &staff)
            .await,
    )
    .await;
    assert_eq!(body["order"]["status"], "pending");
    assert_eq!(body["items"][0]["product_name"], "Mug");
    assert_eq!(body["status_choices"][3]["value"], "delivered");

    let body = response_json(app.get_with_token("/admin-dashboard", &staff).await).await;
    assert_eq!(body["messages"][0]["level"], "error");
    assert_eq!(body["messages"][0]["text"], "Invalid status.");
}

#[tokio::test]
async fn missing_orders_are_not_found() {
    let app = TestApp::new().await;
    let staff = app.token_for("manager", true).await;

    let response = app.get_with_token("/admin-dashboard/order/404", &staff).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let response = app
        .post_form_with_token("/admin-dashboard/order/404/update", &[("status", "shipped")], &staff)
        .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn health_and_status_endpoints_respond() {
    let app = TestApp::new().await;

    let body = response_json(app.get("/health").await).await;
    assert_eq!(body["status"], "ok");

    let body = response_json(app.get("/status").await).await;
    assert_eq!(body["name"], "storefront-api");
    assert_eq!(body["environment"], "test");
}
