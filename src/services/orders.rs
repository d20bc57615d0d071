use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait, IntoActiveModel,
    QueryFilter, QueryOrder, Set,
};
use serde::Serialize;
use std::sync::Arc;
use tracing::{error, info, instrument, warn};

use crate::entities::{
    order::{self, OrderStatus},
    order_item, product,
};
use crate::errors::ServiceError;
use crate::events::{Event, EventSender};
use crate::i18n::{self, Language};
use crate::session::{messages, Session};

#[derive(Debug, Clone, Serialize)]
pub struct OrderLine {
    #[serde(flatten)]
    pub item: order_item::Model,
    /// `None` once the product has been deleted.
    pub product_name: Option<String>,
    pub product_slug: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct OrderWithItems {
    pub order: order::Model,
    pub items: Vec<OrderLine>,
}

impl OrderWithItems {
    pub async fn load<C: ConnectionTrait>(db: &C, order: order::Model) -> Result<Self, ServiceError> {
        let rows = order_item::Entity::find()
            .filter(order_item::Column::OrderId.eq(order.id))
            .order_by_asc(order_item::Column::Id)
            .find_also_related(product::Entity)
            .all(db)
            .await?;

        let items = rows
            .into_iter()
            .map(|(item, product)| OrderLine {
                item,
                product_name: product.as_ref().map(|p| p.name.clone()),
                product_slug: product.map(|p| p.slug),
            })
            .collect();

        Ok(Self { order, items })
    }
}

/// A `(value, label)` pair for the status picker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatusChoice {
    pub value: &'static str,
    pub label: &'static str,
}

pub fn status_choices(lang: Language) -> Vec<StatusChoice> {
    OrderStatus::ALL
        .iter()
        .map(|status| StatusChoice {
            value: status.as_str(),
            label: i18n::status_label(lang, *status),
        })
        .collect()
}

/// Staff-side order lookups and status changes.
#[derive(Clone)]
pub struct OrderService {
    db: Arc<DatabaseConnection>,
    event_sender: Arc<EventSender>,
}

impl OrderService {
    pub fn new(db: Arc<DatabaseConnection>, event_sender: Arc<EventSender>) -> Self {
        Self { db, event_sender }
    }

    #[instrument(skip(self))]
    pub async fn get_order(&self, order_id: i32) -> Result<OrderWithItems, ServiceError> {
        let order = order::Entity::find_by_id(order_id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Order {} not found", order_id)))?;
        OrderWithItems::load(&*self.db, order).await
    }

    /// Sets an order's status from raw form input, queueing a flash message
    /// describing the outcome.
    #[instrument(skip(self, session))]
    pub async fn update_status(
        &self,
        session: &Session,
        order_id: i32,
        raw_status: Option<&str>,
        lang: Language,
    ) -> Result<order::Model, ServiceError> {
        let order = order::Entity::find_by_id(order_id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Order {} not found", order_id)))?;

        let raw = raw_status.unwrap_or_default();
        let Ok(new_status) = raw.parse::<OrderStatus>() else {
            warn!(order_id, status = %raw, "Rejected unknown order status");
            messages::error(session, i18n::invalid_status(lang)).await?;
            return Err(ServiceError::InvalidStatus(raw.to_string()));
        };

        let old_status = order.status;
        let mut active = order.into_active_model();
        active.status = Set(new_status);
        let updated = active.update(&*self.db).await.map_err(|e| {
            error!(error = %e, order_id, "Failed to update order status");
            ServiceError::DatabaseError(e)
        })?;

        info!(
            order_id,
            old_status = old_status.as_str(),
            new_status = new_status.as_str(),
            "Order status updated"
        );
        messages::success(
            session,
            i18n::order_status_updated(lang, &updated.order_number, new_status),
        )
        .await?;

        self.event_sender
            .send_or_log(Event::OrderStatusChanged {
                order_id,
                old_status,
                new_status,
            })
            .await;

        Ok(updated)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn five_status_choices_in_lifecycle_order() {
        let values: Vec<_> = status_choices(Language::En).iter().map(|c| c.value).collect();
        assert_eq!(
            values,
            vec!["pending", "confirmed", "shipped", "delivered", "cancelled"]
        );
        assert_eq!(status_choices(Language::Ar)[0].label, "قيد الانتظار");
    }
}
