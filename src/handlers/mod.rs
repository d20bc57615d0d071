pub mod admin;
pub mod auth;
pub mod commerce;
pub mod common;

use sea_orm::DatabaseConnection;
use std::sync::Arc;

use crate::config::AppConfig;
use crate::events::EventSender;
use crate::services::{
    commerce::{CartService, CheckoutService, ProductCatalogService},
    dashboard::DashboardService,
    orders::OrderService,
};

// Re-export AppState so handler modules can import it as crate::handlers::AppState
pub use crate::AppState;

/// Services layer that encapsulates business logic used by HTTP handlers
#[derive(Clone)]
pub struct AppServices {
    pub catalog: Arc<ProductCatalogService>,
    pub cart: Arc<CartService>,
    pub checkout: Arc<CheckoutService>,
    pub orders: Arc<OrderService>,
    pub dashboard: Arc<DashboardService>,
}

impl AppServices {
    pub fn new(db: Arc<DatabaseConnection>, event_sender: Arc<EventSender>, config: &AppConfig) -> Self {
        let cart = CartService::new(db.clone(), event_sender.clone(), config);
        Self {
            catalog: Arc::new(ProductCatalogService::new(db.clone(), config.products_per_page)),
            checkout: Arc::new(CheckoutService::new(db.clone(), event_sender.clone(), cart.clone())),
            cart: Arc::new(cart),
            orders: Arc::new(OrderService::new(db.clone(), event_sender)),
            dashboard: Arc::new(DashboardService::new(db)),
        }
    }
}
