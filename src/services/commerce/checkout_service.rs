use chrono::Utc;
use metrics::counter;
use rust_decimal::Decimal;
use sea_orm::{
    sea_query::Expr, ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter,
    Set, TransactionTrait,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{error, info, instrument, warn};
use validator::Validate;

use super::cart_service::{CartItem, CartService};
use crate::entities::{order, order_item, product};
use crate::errors::ServiceError;
use crate::events::{Event, EventSender};
use crate::i18n::{self, Language};
use crate::session::{messages, Session};
use crate::services::orders::OrderWithItems;

/// Customer details collected at checkout.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, Validate)]
pub struct CheckoutForm {
    #[serde(default)]
    #[validate(length(min = 1, max = 255, message = "This field is required and must be at most 255 characters."))]
    pub customer_name: String,
    #[serde(default)]
    #[validate(length(min = 1, max = 20, message = "This field is required and must be at most 20 characters."))]
    pub phone: String,
    #[serde(default)]
    #[validate(length(min = 1, message = "This field is required."))]
    pub address: String,
    #[serde(default)]
    pub notes: String,
}

/// Field name to messages, for re-rendering an invalid form.
pub type FieldErrors = BTreeMap<String, Vec<String>>;

impl CheckoutForm {
    /// Trims every field the way form input is cleaned before validation.
    pub fn normalized(&self) -> Self {
        Self {
            customer_name: self.customer_name.trim().to_string(),
            phone: self.phone.trim().to_string(),
            address: self.address.trim().to_string(),
            notes: self.notes.trim().to_string(),
        }
    }

    /// Returns the cleaned form, or the errors for each failing field.
    pub fn clean(&self) -> Result<Self, FieldErrors> {
        let cleaned = self.normalized();
        match cleaned.validate() {
            Ok(()) => Ok(cleaned),
            Err(errors) => Err(errors
                .field_errors()
                .into_iter()
                .map(|(field, errs)| {
                    let messages = errs
                        .iter()
                        .map(|e| {
                            e.message
                                .as_ref()
                                .map(|m| m.to_string())
                                .unwrap_or_else(|| e.code.to_string())
                        })
                        .collect();
                    (field.to_string(), messages)
                })
                .collect()),
        }
    }
}

/// Everything the checkout page shows.
#[derive(Debug, Clone, Serialize)]
pub struct CheckoutContext {
    pub items: Vec<CartItem>,
    pub subtotal: Decimal,
    pub shipping: Decimal,
    pub total: Decimal,
    pub redirect_to_home: bool,
}

/// Turns the session cart into a persisted order.
#[derive(Clone)]
pub struct CheckoutService {
    db: Arc<DatabaseConnection>,
    event_sender: Arc<EventSender>,
    carts: CartService,
}

impl CheckoutService {
    pub fn new(db: Arc<DatabaseConnection>, event_sender: Arc<EventSender>, carts: CartService) -> Self {
        Self {
            db,
            event_sender,
            carts,
        }
    }

    #[instrument(skip(self, session))]
    pub async fn checkout_context(&self, session: &Session) -> Result<CheckoutContext, ServiceError> {
        let summary = self.carts.summary(session).await?;
        Ok(CheckoutContext {
            redirect_to_home: summary.is_empty,
            items: summary.items,
            subtotal: summary.subtotal,
            shipping: summary.shipping,
            total: summary.total,
        })
    }

    /// Places an order for the session cart.
    ///
    /// The order, its items and the stock/sales counter updates commit in one
    /// transaction. The stock decrement is an unguarded column expression, so
    /// concurrent checkouts of the last units can both succeed.
    #[instrument(skip(self, session, form))]
    pub async fn place_order(
        &self,
        session: &Session,
        form: &CheckoutForm,
        lang: Language,
    ) -> Result<order::Model, ServiceError> {
        let mut cart = self.carts.cart(session).await;
        let items = self.carts.items(session, &mut cart).await?;
        if items.is_empty() {
            warn!("Checkout attempted with an empty cart");
            messages::error(session, i18n::cart_empty(lang)).await?;
            return Err(ServiceError::InvalidOperation(i18n::cart_empty(lang).to_string()));
        }

        let form = form.clean().map_err(|errors| {
            let fields: Vec<&str> = errors.keys().map(String::as_str).collect();
            ServiceError::ValidationError(format!("Invalid fields: {}", fields.join(", ")))
        })?;

        let totals = cart.total();
        let txn = self.db.begin().await?;

        let order = order::ActiveModel {
            customer_name: Set(form.customer_name),
            phone: Set(form.phone),
            address: Set(form.address),
            notes: Set(form.notes),
            status: Set(order::OrderStatus::Pending),
            totals: Set(totals),
            ..Default::default()
        }
        .insert(&txn)
        .await
        .map_err(|e| {
            error!(error = %e, "Failed to insert order");
            ServiceError::DatabaseError(e)
        })?;

        let now = Utc::now();
        for item in &items {
            order_item::ActiveModel {
                order_id: Set(order.id),
                product_id: Set(Some(item.product.id)),
                quantity: Set(item.quantity as i32),
                unit_price: Set(item.price),
                ..Default::default()
            }
            .insert(&txn)
            .await?;
        }

        for item in &items {
            let quantity = item.quantity as i32;
            product::Entity::update_many()
                .col_expr(
                    product::Column::Stock,
                    Expr::col(product::Column::Stock).sub(quantity),
                )
                .col_expr(
                    product::Column::SalesCount,
                    Expr::col(product::Column::SalesCount).add(quantity),
                )
                .col_expr(product::Column::UpdatedAt, Expr::value(now))
                .filter(product::Column::Id.eq(item.product.id))
                .exec(&txn)
                .await?;
        }

        txn.commit().await.map_err(|e| {
            error!(error = %e, "Failed to commit order");
            ServiceError::DatabaseError(e)
        })?;

        self.carts.clear(session).await;

        let item_count: u32 = items.iter().map(|i| i.quantity).sum();
        counter!("storefront_orders_placed_total", 1);
        info!(
            order_id = order.id,
            order_number = %order.order_number,
            totals = %order.totals,
            item_count,
            "Order placed"
        );

        self.event_sender
            .send_or_log(Event::OrderCreated {
                order_id: order.id,
                order_number: order.order_number.clone(),
                totals: order.totals,
                item_count,
                created_at: order.created_at,
            })
            .await;
        self.report_depleted_stock(&items).await;

        Ok(order)
    }

    /// The order shown on the confirmation page.
    #[instrument(skip(self))]
    pub async fn order_success(&self, order_number: &str) -> Result<OrderWithItems, ServiceError> {
        let order = order::Entity::find()
            .filter(order::Column::OrderNumber.eq(order_number))
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Order {} not found", order_number)))?;
        OrderWithItems::load(&*self.db, order).await
    }

    async fn report_depleted_stock(&self, items: &[CartItem]) {
        let ids: Vec<i32> = items.iter().map(|i| i.product.id).collect();
        let depleted = product::Entity::find()
            .filter(product::Column::Id.is_in(ids))
            .filter(product::Column::Stock.lte(0))
            .all(&*self.db)
            .await;
        match depleted {
            Ok(products) => {
                for p in products {
                    self.event_sender
                        .send_or_log(Event::StockDepleted {
                            product_id: p.id,
                            remaining: p.stock,
                        })
                        .await;
                }
            }
            Err(e) => warn!(error = %e, "Could not check stock levels after checkout"),
        }
    }
}
