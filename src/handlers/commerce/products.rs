use axum::{
    extract::{Path, Query, State},
    response::IntoResponse,
    routing::get,
    Router,
};
use serde::Serialize;

use super::{CategoryView, ProductView};
use crate::common::PageWindow;
use crate::entities::{offer, product_color, product_image};
use crate::errors::ApiError;
use crate::handlers::common::{flash, map_service_error, success_response};
use crate::i18n::Language;
use crate::services::commerce::{OfferPrice, ProductFilter, ProductSort};
use crate::session::{messages::FlashMessage, Session};
use crate::AppState;

/// Creates the router for catalog pages
pub fn products_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(home))
        .route("/products", get(list_products))
        .route("/category/:slug", get(category_products))
        .route("/product/:slug", get(product_detail))
}

#[derive(Debug, Serialize)]
struct HomeView {
    categories: Vec<CategoryView>,
    best_sellers: Vec<ProductView>,
    offers: Vec<offer::Model>,
    messages: Vec<FlashMessage>,
}

/// Echo of the listing filters as the client sent them.
#[derive(Debug, Serialize)]
struct FilterEcho {
    q: String,
    category: String,
    min_price: String,
    max_price: String,
    sort: ProductSort,
}

/// Category pages only take the search and price filters.
#[derive(Debug, Serialize)]
struct CategoryFilterEcho {
    q: String,
    min_price: String,
    max_price: String,
}

impl CategoryFilterEcho {
    fn new(filter: &ProductFilter) -> Self {
        Self {
            q: filter.search_query().to_string(),
            min_price: filter.min_price.clone().unwrap_or_default(),
            max_price: filter.max_price.clone().unwrap_or_default(),
        }
    }
}

impl FilterEcho {
    fn new(filter: &ProductFilter) -> Self {
        Self {
            q: filter.search_query().to_string(),
            category: filter.selected_category().to_string(),
            min_price: filter.min_price.clone().unwrap_or_default(),
            max_price: filter.max_price.clone().unwrap_or_default(),
            sort: filter.sort(),
        }
    }
}

#[derive(Debug, Serialize)]
struct ProductListView {
    products: Vec<ProductView>,
    page: PageWindow,
    categories: Vec<CategoryView>,
    filters: FilterEcho,
    messages: Vec<FlashMessage>,
}

#[derive(Debug, Serialize)]
struct CategoryPageView {
    category: CategoryView,
    products: Vec<ProductView>,
    page: PageWindow,
    categories: Vec<CategoryView>,
    filters: CategoryFilterEcho,
    messages: Vec<FlashMessage>,
}

#[derive(Debug, Serialize)]
struct ProductDetailView {
    product: ProductView,
    category: Option<CategoryView>,
    images: Vec<product_image::Model>,
    colors: Vec<product_color::Model>,
    offer: Option<OfferPrice>,
    in_stock: bool,
    max_quantity: i32,
    related_products: Vec<ProductView>,
    messages: Vec<FlashMessage>,
}

async fn home(
    State(state): State<AppState>,
    lang: Language,
    session: Session,
) -> Result<impl IntoResponse, ApiError> {
    let home = state
        .services
        .catalog
        .home()
        .await
        .map_err(map_service_error)?;

    Ok(success_response(HomeView {
        categories: CategoryView::many(&home.categories, lang),
        best_sellers: ProductView::many(&home.best_sellers, lang),
        offers: home.offers,
        messages: flash(&session).await?,
    }))
}

async fn list_products(
    State(state): State<AppState>,
    lang: Language,
    session: Session,
    Query(filter): Query<ProductFilter>,
) -> Result<impl IntoResponse, ApiError> {
    let catalog = &state.services.catalog;
    let page = catalog
        .list_products(&filter)
        .await
        .map_err(map_service_error)?;
    let categories = catalog
        .active_categories()
        .await
        .map_err(map_service_error)?;

    Ok(success_response(ProductListView {
        products: ProductView::many(&page.products, lang),
        page: page.page,
        categories: CategoryView::many(&categories, lang),
        filters: FilterEcho::new(&filter),
        messages: flash(&session).await?,
    }))
}

async fn category_products(
    State(state): State<AppState>,
    lang: Language,
    session: Session,
    Path(slug): Path<String>,
    Query(filter): Query<ProductFilter>,
) -> Result<impl IntoResponse, ApiError> {
    let listing = ProductFilter {
        category: None,
        sort: None,
        ..filter
    };
    let catalog = &state.services.catalog;
    let (category, page) = catalog
        .category_products(&slug, &listing)
        .await
        .map_err(map_service_error)?;
    let categories = catalog
        .active_categories()
        .await
        .map_err(map_service_error)?;

    Ok(success_response(CategoryPageView {
        category: CategoryView::new(&category, lang),
        products: ProductView::many(&page.products, lang),
        page: page.page,
        categories: CategoryView::many(&categories, lang),
        filters: CategoryFilterEcho::new(&listing),
        messages: flash(&session).await?,
    }))
}

async fn product_detail(
    State(state): State<AppState>,
    lang: Language,
    session: Session,
    Path(slug): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let detail = state
        .services
        .catalog
        .product_detail(&slug)
        .await
        .map_err(map_service_error)?;

    Ok(success_response(ProductDetailView {
        product: ProductView::new(&detail.product, lang),
        category: detail.category.as_ref().map(|c| CategoryView::new(c, lang)),
        images: detail.images,
        colors: detail.colors,
        offer: detail.offer,
        in_stock: detail.in_stock,
        max_quantity: detail.max_quantity,
        related_products: ProductView::many(&detail.related_products, lang),
        messages: flash(&session).await?,
    }))
}
