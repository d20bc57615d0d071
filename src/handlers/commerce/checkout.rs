use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Form, Json, Router,
};
use rust_decimal::Decimal;
use serde::Serialize;

use super::carts::CartItemView;
use crate::errors::{ApiError, ServiceError};
use crate::handlers::common::{flash, map_service_error, see_other, success_response};
use crate::i18n::Language;
use crate::services::commerce::{CheckoutContext, CheckoutForm, FieldErrors};
use crate::session::{messages::FlashMessage, Session};
use crate::AppState;

/// Creates the router for checkout endpoints
pub fn checkout_routes() -> Router<AppState> {
    Router::new()
        .route("/checkout", get(checkout_page).post(place_order))
        .route("/order-success/:order_number", get(order_success))
}

#[derive(Debug, Serialize)]
struct CheckoutView {
    items: Vec<CartItemView>,
    subtotal: Decimal,
    shipping: Decimal,
    total: Decimal,
    redirect_to_home: bool,
    form: CheckoutForm,
    #[serde(skip_serializing_if = "FieldErrors::is_empty")]
    errors: FieldErrors,
    messages: Vec<FlashMessage>,
}

impl CheckoutView {
    fn new(context: CheckoutContext, form: CheckoutForm, errors: FieldErrors, lang: Language) -> Self {
        Self {
            items: context.items.iter().map(|i| CartItemView::new(i, lang)).collect(),
            subtotal: context.subtotal,
            shipping: context.shipping,
            total: context.total,
            redirect_to_home: context.redirect_to_home,
            form,
            errors,
            messages: Vec::new(),
        }
    }
}

async fn checkout_page(
    State(state): State<AppState>,
    lang: Language,
    session: Session,
) -> Result<impl IntoResponse, ApiError> {
    let context = state
        .services
        .checkout
        .checkout_context(&session)
        .await
        .map_err(map_service_error)?;

    let mut view = CheckoutView::new(context, CheckoutForm::default(), FieldErrors::new(), lang);
    view.messages = flash(&session).await?;
    Ok(success_response(view))
}

/// Place the order. An empty cart goes back to the cart page; an invalid
/// form is re-rendered with its errors.
async fn place_order(
    State(state): State<AppState>,
    lang: Language,
    session: Session,
    Form(form): Form<CheckoutForm>,
) -> Result<Response, ApiError> {
    let checkout = &state.services.checkout;
    match checkout.place_order(&session, &form, lang).await {
        Ok(order) => Ok(see_other(&format!("/order-success/{}", order.order_number))),
        Err(ServiceError::InvalidOperation(_)) => Ok(see_other("/cart")),
        Err(ServiceError::ValidationError(_)) => {
            let errors = form.clean().err().unwrap_or_default();
            let context = checkout
                .checkout_context(&session)
                .await
                .map_err(map_service_error)?;
            let view = CheckoutView::new(context, form.normalized(), errors, lang);
            Ok((StatusCode::UNPROCESSABLE_ENTITY, Json(view)).into_response())
        }
        Err(e) => Err(map_service_error(e)),
    }
}

async fn order_success(
    State(state): State<AppState>,
    Path(order_number): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let order = state
        .services
        .checkout
        .order_success(&order_number)
        .await
        .map_err(map_service_error)?;

    Ok(success_response(order))
}
