/// Storefront handlers: catalog pages, the session cart and checkout
pub mod carts;
pub mod checkout;
pub mod products;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;

use crate::entities::{category, product};
use crate::i18n::Language;
use crate::AppState;
use axum::Router;

pub use carts::carts_routes;
pub use checkout::checkout_routes;
pub use products::products_routes;

/// All storefront routes, mounted at the root.
pub fn commerce_routes() -> Router<AppState> {
    Router::new()
        .merge(products_routes())
        .merge(carts_routes())
        .merge(checkout_routes())
}

/// A product with its name and description resolved for one language.
#[derive(Debug, Clone, Serialize)]
pub struct ProductView {
    pub id: i32,
    pub category_id: i32,
    pub name: String,
    pub slug: String,
    pub description: String,
    pub price: Decimal,
    pub compare_at_price: Option<Decimal>,
    pub discount_percentage: Option<Decimal>,
    pub on_sale: bool,
    pub stock: i32,
    pub in_stock: bool,
    pub is_featured: bool,
    pub sales_count: i32,
    pub created_at: DateTime<Utc>,
}

impl ProductView {
    pub fn new(product: &product::Model, lang: Language) -> Self {
        Self {
            id: product.id,
            category_id: product.category_id,
            name: product.display_name(lang).to_string(),
            slug: product.slug.clone(),
            description: product.display_description(lang).to_string(),
            price: product.price,
            compare_at_price: product.compare_at_price,
            discount_percentage: product.discount_percentage,
            on_sale: product.on_sale(),
            stock: product.stock,
            in_stock: product.in_stock(),
            is_featured: product.is_featured,
            sales_count: product.sales_count,
            created_at: product.created_at,
        }
    }

    pub fn many(products: &[product::Model], lang: Language) -> Vec<Self> {
        products.iter().map(|p| Self::new(p, lang)).collect()
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct CategoryView {
    pub id: i32,
    pub name: String,
    pub slug: String,
    pub image: Option<String>,
}

impl CategoryView {
    pub fn new(category: &category::Model, lang: Language) -> Self {
        Self {
            id: category.id,
            name: category.display_name(lang).to_string(),
            slug: category.slug.clone(),
            image: category.image.clone(),
        }
    }

    pub fn many(categories: &[category::Model], lang: Language) -> Vec<Self> {
        categories.iter().map(|c| Self::new(c, lang)).collect()
    }
}
