use axum::{
    extract::{Path, State},
    http::HeaderMap,
    response::IntoResponse,
    routing::{get, post},
    Form, Router,
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::ProductView;
use crate::errors::ApiError;
use crate::handlers::common::{flash, form_flag, map_service_error, redirect_target, see_other, success_response};
use crate::i18n::Language;
use crate::services::commerce::cart_service::CartItem;
use crate::session::{messages::FlashMessage, Session};
use crate::AppState;

/// Creates the router for cart endpoints
pub fn carts_routes() -> Router<AppState> {
    Router::new()
        .route("/cart", get(cart_detail))
        .route("/cart/add/:product_id", post(add_to_cart))
        .route("/cart/update/:product_id", post(update_cart_item))
        .route("/cart/remove/:product_id", post(remove_cart_item))
}

#[derive(Debug, Deserialize)]
pub struct AddToCartForm {
    pub quantity: Option<u32>,
    #[serde(rename = "override")]
    pub override_quantity: Option<String>,
    pub next: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateQuantityForm {
    #[serde(default = "default_quantity")]
    pub quantity: i64,
}

fn default_quantity() -> i64 {
    1
}

#[derive(Debug, Serialize)]
pub struct CartItemView {
    pub product: ProductView,
    pub quantity: u32,
    pub price: Decimal,
    pub total_price: Decimal,
}

impl CartItemView {
    pub fn new(item: &CartItem, lang: Language) -> Self {
        Self {
            product: ProductView::new(&item.product, lang),
            quantity: item.quantity,
            price: item.price,
            total_price: item.total_price,
        }
    }
}

#[derive(Debug, Serialize)]
struct CartView {
    items: Vec<CartItemView>,
    item_count: u32,
    subtotal: Decimal,
    shipping: Decimal,
    total: Decimal,
    is_empty: bool,
    messages: Vec<FlashMessage>,
}

async fn cart_detail(
    State(state): State<AppState>,
    lang: Language,
    session: Session,
) -> Result<impl IntoResponse, ApiError> {
    let summary = state
        .services
        .cart
        .summary(&session)
        .await
        .map_err(map_service_error)?;

    Ok(success_response(CartView {
        items: summary.items.iter().map(|i| CartItemView::new(i, lang)).collect(),
        item_count: summary.item_count,
        subtotal: summary.subtotal,
        shipping: summary.shipping,
        total: summary.total,
        is_empty: summary.is_empty,
        messages: flash(&session).await?,
    }))
}

/// Add a product to the session cart, then bounce back to where the
/// shopper came from.
async fn add_to_cart(
    State(state): State<AppState>,
    lang: Language,
    session: Session,
    headers: HeaderMap,
    Path(product_id): Path<i32>,
    Form(form): Form<AddToCartForm>,
) -> Result<impl IntoResponse, ApiError> {
    state
        .services
        .cart
        .add(
            &session,
            product_id,
            form.quantity.unwrap_or(1),
            form_flag(form.override_quantity.as_deref()),
            lang,
        )
        .await
        .map_err(map_service_error)?;

    Ok(see_other(&redirect_target(form.next.as_deref(), &headers, "/cart")))
}

async fn update_cart_item(
    State(state): State<AppState>,
    session: Session,
    Path(product_id): Path<i32>,
    Form(form): Form<UpdateQuantityForm>,
) -> Result<impl IntoResponse, ApiError> {
    state
        .services
        .cart
        .update(&session, product_id, form.quantity)
        .await
        .map_err(map_service_error)?;

    Ok(see_other("/cart"))
}

async fn remove_cart_item(
    State(state): State<AppState>,
    session: Session,
    Path(product_id): Path<i32>,
) -> Result<impl IntoResponse, ApiError> {
    state
        .services
        .cart
        .remove(&session, product_id)
        .await
        .map_err(map_service_error)?;

    Ok(see_other("/cart"))
}
