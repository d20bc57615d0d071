mod common;

use assert_matches::assert_matches;
use axum::http::StatusCode;
use common::{decimal, location, response_json, TestApp};
use rust_decimal_macros::dec;
use sea_orm::Set;

#[tokio::test]
async fn adding_a_product_redirects_and_updates_totals() {
    let app = TestApp::new().await;
    let kitchen = app.seed_category("Kitchen", true).await;
    let mug = app.seed_product(kitchen.id, "Mug", dec!(12.50), 10).await;

    let response = app.add_to_cart(mug.id, 2).await;
    assert_eq!(location(&response), "/cart");
    assert!(app.session_cookie().is_some(), "session cookie should be issued");

    let body = response_json(app.get("/cart").await).await;
    assert_eq!(body["is_empty"], false);
    assert_eq!(body["item_count"], 2);
    assert_eq!(body["items"][0]["product"]["name"], "Mug");
    assert_eq!(body["items"][0]["quantity"], 2);
    assert_eq!(decimal(&body["items"][0]["total_price"]), dec!(25.00));
    assert_eq!(decimal(&body["subtotal"]), dec!(25.00));
    assert_eq!(decimal(&body["shipping"]), dec!(5.99));
    assert_eq!(decimal(&body["total"]), dec!(30.99));
}

#[tokio::test]
async fn adding_twice_increments_and_override_replaces() {
    let app = TestApp::new().await;
    let kitchen = app.seed_category("Kitchen", true).await;
    let mug = app.seed_product(kitchen.id, "Mug", dec!(5.00), 10).await;

    app.add_to_cart(mug.id, 2).await;
    app.add_to_cart(mug.id, 3).await;
    let body = response_json(app.get("/cart").await).await;
    assert_eq!(body["items"][0]["quantity"], 5);

    app.post_form(
        &format!("/cart/add/{}", mug.id),
        &[("quantity", "1"), ("override", "true")],
    )
    .await;
    let body = response_json(app.get("/cart").await).await;
    assert_eq!(body["items"][0]["quantity"], 1);
}

#[tokio::test]
async fn quantity_is_clamped_to_stock() {
    let app = TestApp::new().await;
    let kitchen = app.seed_category("Kitchen", true).await;
    let pan = app.seed_product(kitchen.id, "Pan", dec!(30.00), 3).await;

    app.add_to_cart(pan.id, 5).await;
    let body = response_json(app.get("/cart").await).await;
    assert_eq!(body["items"][0]["quantity"], 3);

    app.post_form(&format!("/cart/update/{}", pan.id), &[("quantity", "9")])
        .await;
    let body = response_json(app.get("/cart").await).await;
    assert_eq!(body["items"][0]["quantity"], 3);
}

#[tokio::test]
async fn redirect_prefers_next_then_referer() {
    let app = TestApp::new().await;
    let kitchen = app.seed_category("Kitchen", true).await;
    let mug = app.seed_product(kitchen.id, "Mug", dec!(5.00), 10).await;

    let response = app
        .post_form(
            &format!("/cart/add/{}", mug.id),
            &[("quantity", "1"), ("next", "/product/mug")],
        )
        .await;
    assert_eq!(location(&response), "/product/mug");

    let response = app
        .post_form(
            &format!("/cart/add/{}", mug.id),
            &[("next", "https://elsewhere.example/")],
        )
        .await;
    assert_eq!(location(&response), "/cart");
}

#[tokio::test]
async fn out_of_stock_products_queue_an_error_message() {
    let app = TestApp::new().await;
    let kitchen = app.seed_category("Kitchen", true).await;
    let kettle = app.seed_product(kitchen.id, "Kettle", dec!(40.00), 0).await;

    let response = app.add_to_cart(kettle.id, 1).await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);

    let body = response_json(app.get("/cart").await).await;
    assert_eq!(body["is_empty"], true);
    assert_eq!(body["messages"][0]["level"], "error");
    assert_eq!(body["messages"][0]["text"], "Kettle is out of stock.");

    // Messages are shown once.
    let body = response_json(app.get("/cart").await).await;
    assert!(body["messages"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn out_of_stock_message_shows_on_the_product_page() {
    let app = TestApp::new().await;
    let kitchen = app.seed_category("Kitchen", true).await;
    let kettle = app.seed_product(kitchen.id, "Kettle", dec!(40.00), 0).await;
    let product_page = format!("/product/{}", kettle.slug);

    let response = app
        .post_form(
            &format!("/cart/add/{}", kettle.id),
            &[("quantity", "1"), ("next", product_page.as_str())],
        )
        .await;
    assert_eq!(location(&response), product_page);

    let body = response_json(app.get(&product_page).await).await;
    assert_eq!(body["messages"][0]["level"], "error");
    assert_eq!(body["messages"][0]["text"], "Kettle is out of stock.");

    let body = response_json(app.get("/products").await).await;
    assert!(body["messages"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn unknown_or_inactive_products_are_not_found() {
    let app = TestApp::new().await;
    let kitchen = app.seed_category("Kitchen", true).await;
    let mug = app.seed_product(kitchen.id, "Mug", dec!(5.00), 10).await;
    app.update_product(mug.id, |p| p.is_active = Set(false)).await;

    assert_eq!(app.add_to_cart(mug.id, 1).await.status(), StatusCode::NOT_FOUND);
    assert_eq!(app.add_to_cart(9999, 1).await.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn update_without_a_quantity_sets_one() {
    let app = TestApp::new().await;
    let kitchen = app.seed_category("Kitchen", true).await;
    let mug = app.seed_product(kitchen.id, "Mug", dec!(5.00), 10).await;

    app.add_to_cart(mug.id, 3).await;
    let response = app.post_form(&format!("/cart/update/{}", mug.id), &[]).await;
    assert_eq!(location(&response), "/cart");

    let body = response_json(app.get("/cart").await).await;
    assert_eq!(body["is_empty"], false);
    assert_eq!(body["items"][0]["quantity"], 1);
    assert_eq!(decimal(&body["subtotal"]), dec!(5.00));
}

#[tokio::test]
async fn update_to_zero_and_remove_drop_lines() {
    let app = TestApp::new().await;
    let kitchen = app.seed_category("Kitchen", true).await;
    let mug = app.seed_product(kitchen.id, "Mug", dec!(5.00), 10).await;
    let plate = app.seed_product(kitchen.id, "Plate", dec!(3.00), 10).await;

    app.add_to_cart(mug.id, 1).await;
    app.add_to_cart(plate.id, 1).await;

    let response = app
        .post_form(&format!("/cart/update/{}", mug.id), &[("quantity", "0")])
        .await;
    assert_eq!(location(&response), "/cart");

    let response = app.post_form(&format!("/cart/remove/{}", plate.id), &[]).await;
    assert_eq!(location(&response), "/cart");

    let body = response_json(app.get("/cart").await).await;
    assert_eq!(body["is_empty"], true);
    assert_eq!(decimal(&body["shipping"]), dec!(0));
    assert_eq!(decimal(&body["total"]), dec!(0));
}

#[tokio::test]
async fn shipping_is_free_at_the_threshold() {
    let app = TestApp::new().await;
    let kitchen = app.seed_category("Kitchen", true).await;
    let pan = app.seed_product(kitchen.id, "Pan", dec!(25.00), 10).await;

    app.add_to_cart(pan.id, 2).await;
    let body = response_json(app.get("/cart").await).await;
    assert_eq!(decimal(&body["subtotal"]), dec!(50.00));
    assert_eq!(decimal(&body["shipping"]), dec!(0));
    assert_eq!(decimal(&body["total"]), dec!(50.00));
}

#[tokio::test]
async fn deleted_products_are_pruned_from_the_cart() {
    let app = TestApp::new().await;
    let kitchen = app.seed_category("Kitchen", true).await;
    let mug = app.seed_product(kitchen.id, "Mug", dec!(5.00), 10).await;
    let plate = app.seed_product(kitchen.id, "Plate", dec!(3.00), 10).await;

    app.add_to_cart(mug.id, 1).await;
    app.add_to_cart(plate.id, 2).await;
    app.state
        .services
        .catalog
        .delete_product(mug.id)
        .await
        .expect("delete product");

    let body = response_json(app.get("/cart").await).await;
    let items = body["items"].as_array().unwrap();
    assert_eq!(items.len(), 1);
    assert_eq!(items[0]["product"]["name"], "Plate");
    assert_eq!(decimal(&body["subtotal"]), dec!(6.00));
}

#[tokio::test]
async fn carts_are_per_session() {
    let app = TestApp::new().await;
    let kitchen = app.seed_category("Kitchen", true).await;
    let mug = app.seed_product(kitchen.id, "Mug", dec!(5.00), 10).await;

    app.add_to_cart(mug.id, 1).await;
    let first = app.session_cookie();
    assert_matches!(first, Some(ref id) if id.len() == 64);

    app.forget_session();
    let body = response_json(app.get("/cart").await).await;
    assert_eq!(body["is_empty"], true);
    assert!(app.session_cookie().is_none(), "an untouched session is not persisted");
}
