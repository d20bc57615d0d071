#![allow(dead_code)]

use std::sync::Mutex;

use axum::{
    body::{self, Body},
    http::{header, Method, Request, StatusCode},
    response::Response,
    Router,
};
use rust_decimal::Decimal;
use sea_orm::{ActiveModelTrait, EntityTrait, IntoActiveModel, Set};
use serde_json::Value;
use storefront_api::{
    auth::AuthService,
    build_router,
    config::AppConfig,
    db,
    entities::{category, offer, product, user},
    events,
    services::commerce::product_catalog_service::{CreateCategoryInput, CreateProductInput},
    AppState,
};
use tempfile::TempDir;
use tower::ServiceExt;

pub const TEST_SECRET: &str = "q8Zr3vLk2mNw7tYp4sXc9bHd6fJg1uEa5iOy0lKzRqWvTnMbPxCsDfGhJkLzQwEr";
pub const STAFF_PASSWORD: &str = "correct horse battery staple";

/// Application harness backed by a throwaway SQLite file.
///
/// Requests made through the harness behave like one browser: the session
/// cookie from each response is sent with the next request.
pub struct TestApp {
    router: Router,
    pub state: AppState,
    cookie: Mutex<Option<String>>,
    _db_dir: TempDir,
    _event_task: tokio::task::JoinHandle<()>,
}

impl TestApp {
    pub async fn new() -> Self {
        let db_dir = tempfile::tempdir().expect("temp dir for test database");
        let db_path = db_dir.path().join("storefront_test.db");

        let mut cfg = AppConfig::new(
            format!("sqlite://{}?mode=rwc", db_path.display()),
            TEST_SECRET.to_string(),
            "test".to_string(),
        );
        cfg.db_max_connections = 1;
        cfg.db_min_connections = 1;

        let pool = db::establish_connection_from_app_config(&cfg)
            .await
            .expect("failed to create test database");
        db::run_migrations(&pool)
            .await
            .expect("failed to run migrations in tests");

        let (state, event_rx) = AppState::build(pool, cfg).expect("app state");
        let event_task = tokio::spawn(events::process_events(event_rx));

        Self {
            router: build_router(state.clone()),
            state,
            cookie: Mutex::new(None),
            _db_dir: db_dir,
            _event_task: event_task,
        }
    }

    /// Drops the carried session cookie, as if a new browser arrived.
    pub fn forget_session(&self) {
        *self.cookie.lock().unwrap() = None;
    }

    pub fn session_cookie(&self) -> Option<String> {
        self.cookie.lock().unwrap().clone()
    }

    pub async fn send(&self, mut request: Request<Body>) -> Response {
        if let Some(cookie) = self.session_cookie() {
            request.headers_mut().insert(
                header::COOKIE,
                format!("sessionid={cookie}").parse().unwrap(),
            );
        }

        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("router response");

        if let Some(set_cookie) = response
            .headers()
            .get(header::SET_COOKIE)
            .and_then(|v| v.to_str().ok())
        {
            let mut slot = self.cookie.lock().unwrap();
            if set_cookie.contains("Max-Age=0") {
                *slot = None;
            } else if let Some(value) = set_cookie
                .split(';')
                .next()
                .and_then(|pair| pair.strip_prefix("sessionid="))
            {
                *slot = Some(value.to_string());
            }
        }

        response
    }

    pub async fn get(&self, uri: &str) -> Response {
        self.send(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
    }

    pub async fn get_with_token(&self, uri: &str, token: &str) -> Response {
        self.send(
            Request::builder()
                .uri(uri)
                .header(header::AUTHORIZATION, format!("Bearer {token}"))
                .body(Body::empty())
                .unwrap(),
        )
        .await
    }

    pub async fn post_form(&self, uri: &str, fields: &[(&str, &str)]) -> Response {
        self.send(form_request(uri, fields, None)).await
    }

    pub async fn post_form_with_token(&self, uri: &str, fields: &[(&str, &str)], token: &str) -> Response {
        self.send(form_request(uri, fields, Some(token))).await
    }

    pub async fn post_json(&self, uri: &str, payload: Value) -> Response {
        self.send(
            Request::builder()
                .method(Method::POST)
                .uri(uri)
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(payload.to_string()))
                .unwrap(),
        )
        .await
    }

    pub async fn seed_category(&self, name: &str, is_active: bool) -> category::Model {
        self.state
            .services
            .catalog
            .create_category(CreateCategoryInput {
                name: name.to_string(),
                name_en: None,
                name_ar: None,
                slug: None,
                image: None,
                is_active,
            })
            .await
            .expect("seed category")
    }

    pub async fn seed_product(&self, category_id: i32, name: &str, price: Decimal, stock: i32) -> product::Model {
        self.seed_product_with(category_id, name, price, stock, None).await
    }

    pub async fn seed_product_with(
        &self,
        category_id: i32,
        name: &str,
        price: Decimal,
        stock: i32,
        name_ar: Option<&str>,
    ) -> product::Model {
        self.state
            .services
            .catalog
            .create_product(CreateProductInput {
                category_id,
                name: name.to_string(),
                name_en: None,
                name_ar: name_ar.map(str::to_string),
                slug: None,
                description: format!("{name} description"),
                price,
                compare_at_price: None,
                discount_percentage: None,
                stock,
                is_active: true,
                is_featured: false,
            })
            .await
            .expect("seed product")
    }

    pub async fn update_product(&self, id: i32, change: impl FnOnce(&mut product::ActiveModel)) -> product::Model {
        let mut active = self.product(id).await.into_active_model();
        change(&mut active);
        active.update(&*self.state.db).await.expect("update product")
    }

    pub async fn product(&self, id: i32) -> product::Model {
        product::Entity::find_by_id(id)
            .one(&*self.state.db)
            .await
            .expect("query product")
            .expect("product exists")
    }

    pub async fn seed_offer(&self, offer: offer::ActiveModel) -> offer::Model {
        offer.insert(&*self.state.db).await.expect("seed offer")
    }

    pub async fn create_user(&self, username: &str, is_staff: bool) -> user::Model {
        user::ActiveModel {
            username: Set(username.to_string()),
            email: Set(format!("{username}@example.com")),
            password_hash: Set(AuthService::hash_password(STAFF_PASSWORD).expect("hash")),
            is_staff: Set(is_staff),
            is_active: Set(true),
            ..Default::default()
        }
        .insert(&*self.state.db)
        .await
        .expect("create user")
    }

    /// Creates an account and returns a bearer token for it.
    pub async fn token_for(&self, username: &str, is_staff: bool) -> String {
        let account = self.create_user(username, is_staff).await;
        self.state
            .auth
            .generate_token(&account)
            .expect("token")
            .access_token
    }

    /// Adds `quantity` of `product_id` through the HTTP cart endpoint.
    pub async fn add_to_cart(&self, product_id: i32, quantity: u32) -> Response {
        let quantity = quantity.to_string();
        self.post_form(
            &format!("/cart/add/{product_id}"),
            &[("quantity", quantity.as_str())],
        )
        .await
    }
}

fn form_request(uri: &str, fields: &[(&str, &str)], token: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder()
        .method(Method::POST)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded");
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    builder.body(Body::from(encode_form(fields))).unwrap()
}

fn encode_form(fields: &[(&str, &str)]) -> String {
    fields
        .iter()
        .map(|(k, v)| format!("{}={}", encode_component(k), encode_component(v)))
        .collect::<Vec<_>>()
        .join("&")
}

fn encode_component(raw: &str) -> String {
    raw.bytes()
        .map(|b| match b {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => (b as char).to_string(),
            b' ' => "+".to_string(),
            _ => format!("%{b:02X}"),
        })
        .collect()
}

pub async fn response_json(response: Response) -> Value {
    let bytes = body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("response body bytes");
    serde_json::from_slice(&bytes).expect("json response")
}

pub fn location(response: &Response) -> &str {
    assert_eq!(response.status(), StatusCode::SEE_OTHER, "expected a redirect");
    response
        .headers()
        .get(header::LOCATION)
        .and_then(|v| v.to_str().ok())
        .expect("location header")
}

/// Decimal fields arrive as JSON strings; SQLite may add float noise.
pub fn decimal(value: &Value) -> Decimal {
    let raw = match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    };
    raw.parse::<Decimal>()
        .unwrap_or_else(|_| panic!("not a decimal: {value}"))
        .round_dp(2)
}
