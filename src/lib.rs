//! Storefront API
//!
//! Catalog browsing, a session-backed cart, checkout into persisted orders,
//! and a staff dashboard for order management.
#![forbid(unsafe_code)]
#![deny(rust_2018_idioms)]
#![allow(elided_lifetimes_in_paths)]
#![warn(clippy::all, clippy::perf, clippy::dbg_macro)]

pub mod auth;
pub mod common;
pub mod config;
pub mod db;
pub mod entities;
pub mod errors;
pub mod events;
pub mod handlers;
pub mod i18n;
pub mod migrator;
pub mod services;
pub mod session;
pub mod tracing;

use axum::{
    extract::State,
    http::{HeaderValue, StatusCode},
    response::{IntoResponse, Json},
    routing::get,
    Extension, Router,
};
use chrono::Utc;
use sea_orm::DatabaseConnection;
use serde_json::json;
use std::{sync::Arc, time::Duration};
use tokio::sync::mpsc;
use tower_http::{
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
    timeout::TimeoutLayer,
};

use crate::auth::AuthService;
use crate::config::AppConfig;
use crate::errors::ServiceError;
use crate::events::{Event, EventSender};
use crate::handlers::AppServices;
use crate::session::SessionManager;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

// App state definition
#[derive(Clone)]
pub struct AppState {
    pub db: Arc<DatabaseConnection>,
    pub config: Arc<AppConfig>,
    pub event_sender: Arc<EventSender>,
    pub services: AppServices,
    pub sessions: SessionManager,
    pub auth: Arc<AuthService>,
}

impl AppState {
    /// Wires services, sessions and auth around an open database connection.
    ///
    /// The returned receiver must be drained (see [`events::process_events`])
    /// or event sends will eventually block.
    pub fn build(db: DatabaseConnection, config: AppConfig) -> Result<(Self, mpsc::Receiver<Event>), ServiceError> {
        let db = Arc::new(db);
        let (sender, receiver) = EventSender::channel(config.event_channel_capacity);
        let event_sender = Arc::new(sender);

        let services = AppServices::new(db.clone(), event_sender.clone(), &config);
        let sessions = SessionManager::from_app_config(&config)?;
        let auth = Arc::new(AuthService::new((&config).into(), db.clone()));

        let state = Self {
            db,
            config: Arc::new(config),
            event_sender,
            services,
            sessions,
            auth,
        };
        Ok((state, receiver))
    }
}

/// The full application router with its middleware stack.
pub fn build_router(state: AppState) -> Router {
    let cors = cors_layer(&state.config);

    Router::new()
        .route("/health", get(health))
        .route("/status", get(status))
        .merge(handlers::commerce::commerce_routes())
        .merge(handlers::admin::admin_routes())
        .merge(handlers::auth::auth_routes())
        .layer(axum::middleware::from_fn_with_state(
            state.sessions.clone(),
            session::session_middleware,
        ))
        // Inject AuthService into request extensions for auth middleware
        .layer(Extension(state.auth.clone()))
        .layer(TimeoutLayer::new(REQUEST_TIMEOUT))
        .layer(crate::tracing::configure_http_tracing())
        .layer(CompressionLayer::new())
        .layer(cors)
        .layer(axum::middleware::from_fn(crate::tracing::request_id_middleware))
        .with_state(state)
}

fn cors_layer(cfg: &AppConfig) -> CorsLayer {
    let origins: Vec<HeaderValue> = cfg
        .cors_origins()
        .iter()
        .filter_map(|origin| HeaderValue::from_str(origin).ok())
        .collect();

    if !origins.is_empty() {
        CorsLayer::new()
            .allow_origin(origins)
            .allow_methods(Any)
            .allow_headers(Any)
    } else if cfg.is_development() {
        CorsLayer::permissive()
    } else {
        CorsLayer::new()
    }
}

async fn health(State(state): State<AppState>) -> impl IntoResponse {
    match state.db.ping().await {
        Ok(()) => (
            StatusCode::OK,
            Json(json!({ "status": "ok", "database": "ok" })),
        ),
        Err(e) => {
            ::tracing::error!(error = %e, "Health check failed: database unreachable");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(json!({ "status": "degraded", "database": "unreachable" })),
            )
        }
    }
}

async fn status(State(state): State<AppState>) -> impl IntoResponse {
    Json(json!({
        "name": env!("CARGO_PKG_NAME"),
        "version": env!("CARGO_PKG_VERSION"),
        "environment": state.config.environment,
        "timestamp": Utc::now().to_rfc3339(),
    }))
}
