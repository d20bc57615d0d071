use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{info, warn};

use crate::entities::order::OrderStatus;

/// Domain events emitted by the storefront services.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Event {
    OrderCreated {
        order_id: i32,
        order_number: String,
        totals: Decimal,
        item_count: u32,
        created_at: DateTime<Utc>,
    },
    OrderStatusChanged {
        order_id: i32,
        old_status: OrderStatus,
        new_status: OrderStatus,
    },
    CartUpdated {
        session_id: String,
        product_id: i32,
        quantity: u32,
    },
    /// A checkout took a product's stock to zero or below.
    StockDepleted {
        product_id: i32,
        remaining: i32,
    },
}

#[derive(Debug, Clone)]
pub struct EventSender {
    sender: mpsc::Sender<Event>,
}

impl EventSender {
    pub fn new(sender: mpsc::Sender<Event>) -> Self {
        Self { sender }
    }

    /// Creates a sender and the receiving half for [`process_events`].
    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<Event>) {
        let (tx, rx) = mpsc::channel(capacity);
        (Self::new(tx), rx)
    }

    /// Sends an event asynchronously
    pub async fn send(&self, event: Event) -> Result<(), String> {
        self.sender
            .send(event)
            .await
            .map_err(|e| format!("Failed to send event: {}", e))
    }

    /// Logs instead of failing when the processor has gone away.
    pub async fn send_or_log(&self, event: Event) {
        if let Err(e) = self.send(event).await {
            warn!(error = %e, "Dropping storefront event");
        }
    }
}

/// Drains the event channel, logging each event.
pub async fn process_events(mut rx: mpsc::Receiver<Event>) {
    info!("Starting event processing loop");

    while let Some(event) = rx.recv().await {
        match &event {
            Event::OrderCreated {
                order_id,
                order_number,
                totals,
                item_count,
                ..
            } => {
                info!(
                    order_id,
                    order_number = %order_number,
                    totals = %totals,
                    item_count,
                    "Order created"
                );
            }
            Event::OrderStatusChanged {
                order_id,
                old_status,
                new_status,
            } => {
                info!(
                    order_id,
                    old_status = old_status.as_str(),
                    new_status = new_status.as_str(),
                    "Order status changed"
                );
            }
            Event::CartUpdated {
                session_id,
                product_id,
                quantity,
            } => {
                // Session ids are bearer secrets; log a prefix only.
                let prefix: String = session_id.chars().take(8).collect();
                info!(session = %prefix, product_id, quantity, "Cart updated");
            }
            Event::StockDepleted {
                product_id,
                remaining,
            } => {
                warn!(product_id, remaining, "Product stock depleted");
            }
        }
    }

    warn!("Event processing loop has ended");
}
