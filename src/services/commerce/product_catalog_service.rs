use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::{
    sea_query::{Expr, Func, LikeExpr},
    ActiveModelTrait, ColumnTrait, Condition, DatabaseConnection, EntityTrait, PaginatorTrait,
    QueryFilter, QueryOrder, QuerySelect, Select, Set, TransactionTrait,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use strum::EnumString;
use tracing::{error, info, instrument};

use super::pricing_service::{max_quantity, OfferPrice, PricingService};
use crate::common::{parse_decimal_filter, resolve_page, PageWindow};
use crate::entities::{category, offer, order_item, product, product_color, product_image};
use crate::errors::ServiceError;

const HOME_CATEGORY_LIMIT: u64 = 8;
const HOME_BEST_SELLER_LIMIT: u64 = 8;
const HOME_OFFER_LIMIT: u64 = 4;
const RELATED_PRODUCT_LIMIT: u64 = 4;

/// Listing order for the all-products page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ProductSort {
    PriceLow,
    PriceHigh,
    Name,
    #[default]
    Newest,
}

impl ProductSort {
    /// Unknown values fall back to newest first.
    pub fn parse_lenient(raw: Option<&str>) -> Self {
        raw.and_then(|s| s.trim().parse().ok()).unwrap_or_default()
    }
}

/// Raw listing query parameters. Everything is optional and forgiving.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProductFilter {
    pub q: Option<String>,
    pub category: Option<String>,
    pub min_price: Option<String>,
    pub max_price: Option<String>,
    pub sort: Option<String>,
    pub page: Option<String>,
}

impl ProductFilter {
    pub fn search_query(&self) -> &str {
        self.q.as_deref().map(str::trim).unwrap_or_default()
    }

    pub fn selected_category(&self) -> &str {
        self.category.as_deref().map(str::trim).unwrap_or_default()
    }

    pub fn min_price(&self) -> Option<Decimal> {
        parse_decimal_filter(self.min_price.as_deref())
    }

    pub fn max_price(&self) -> Option<Decimal> {
        parse_decimal_filter(self.max_price.as_deref())
    }

    pub fn sort(&self) -> ProductSort {
        ProductSort::parse_lenient(self.sort.as_deref())
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ProductPage {
    pub products: Vec<product::Model>,
    pub page: PageWindow,
}

#[derive(Debug, Clone, Serialize)]
pub struct HomeCatalog {
    pub categories: Vec<category::Model>,
    pub best_sellers: Vec<product::Model>,
    pub offers: Vec<offer::Model>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ProductDetail {
    pub product: product::Model,
    pub category: Option<category::Model>,
    pub images: Vec<product_image::Model>,
    pub colors: Vec<product_color::Model>,
    pub offer: Option<OfferPrice>,
    pub in_stock: bool,
    pub max_quantity: i32,
    pub related_products: Vec<product::Model>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateCategoryInput {
    pub name: String,
    pub name_en: Option<String>,
    pub name_ar: Option<String>,
    pub slug: Option<String>,
    pub image: Option<String>,
    pub is_active: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateProductInput {
    pub category_id: i32,
    pub name: String,
    pub name_en: Option<String>,
    pub name_ar: Option<String>,
    pub slug: Option<String>,
    pub description: String,
    pub price: Decimal,
    pub compare_at_price: Option<Decimal>,
    pub discount_percentage: Option<Decimal>,
    pub stock: i32,
    pub is_active: bool,
    pub is_featured: bool,
}

/// Read side of the catalog plus the few writes seeding and tests need.
#[derive(Clone)]
pub struct ProductCatalogService {
    db: Arc<DatabaseConnection>,
    pricing: PricingService,
    per_page: u64,
}

impl ProductCatalogService {
    pub fn new(db: Arc<DatabaseConnection>, per_page: u64) -> Self {
        Self {
            pricing: PricingService::new(db.clone()),
            db,
            per_page,
        }
    }

    /// Categories, best sellers and current offers for the home page.
    #[instrument(skip(self))]
    pub async fn home(&self) -> Result<HomeCatalog, ServiceError> {
        let now = Utc::now();
        let db = &*self.db;

        let categories = category::Entity::find()
            .filter(category::Column::IsActive.eq(true))
            .order_by_asc(category::Column::Name)
            .limit(HOME_CATEGORY_LIMIT)
            .all(db)
            .await?;

        let best_sellers = product::Entity::find()
            .filter(product::Column::IsActive.eq(true))
            .order_by_desc(product::Column::SalesCount)
            .order_by_desc(product::Column::CreatedAt)
            .limit(HOME_BEST_SELLER_LIMIT)
            .all(db)
            .await?;

        let offers = offer::Entity::find()
            .filter(offer::Column::IsActive.eq(true))
            .filter(offer::Column::StartDate.lte(now))
            .filter(offer::Column::EndDate.gte(now))
            .order_by_asc(offer::Column::Id)
            .limit(HOME_OFFER_LIMIT)
            .all(db)
            .await?;

        Ok(HomeCatalog {
            categories,
            best_sellers,
            offers,
        })
    }

    #[instrument(skip(self))]
    pub async fn active_categories(&self) -> Result<Vec<category::Model>, ServiceError> {
        category::Entity::find()
            .filter(category::Column::IsActive.eq(true))
            .order_by_asc(category::Column::Name)
            .all(&*self.db)
            .await
            .map_err(ServiceError::from)
    }

    /// The all-products listing with search, category, price and sort filters.
    #[instrument(skip(self))]
    pub async fn list_products(&self, filter: &ProductFilter) -> Result<ProductPage, ServiceError> {
        let mut query = Self::searchable(filter);

        let slug = filter.selected_category();
        if !slug.is_empty() {
            query = query
                .inner_join(category::Entity)
                .filter(category::Column::Slug.eq(slug));
        }

        query = match filter.sort() {
            ProductSort::PriceLow => query.order_by_asc(product::Column::Price),
            ProductSort::PriceHigh => query.order_by_desc(product::Column::Price),
            ProductSort::Name => query.order_by_asc(product::Column::Name),
            ProductSort::Newest => query.order_by_desc(product::Column::CreatedAt),
        }
        .order_by_desc(product::Column::Id);

        self.paginate(query, filter.page.as_deref()).await
    }

    /// Active products of one active category, newest first.
    #[instrument(skip(self))]
    pub async fn category_products(
        &self,
        slug: &str,
        filter: &ProductFilter,
    ) -> Result<(category::Model, ProductPage), ServiceError> {
        let category = category::Entity::find()
            .filter(category::Column::Slug.eq(slug))
            .filter(category::Column::IsActive.eq(true))
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Category '{}' not found", slug)))?;

        let query = Self::searchable(filter)
            .filter(product::Column::CategoryId.eq(category.id))
            .order_by_desc(product::Column::CreatedAt)
            .order_by_desc(product::Column::Id);

        let page = self.paginate(query, filter.page.as_deref()).await?;
        Ok((category, page))
    }

    #[instrument(skip(self))]
    pub async fn product_detail(&self, slug: &str) -> Result<ProductDetail, ServiceError> {
        let db = &*self.db;
        let product = product::Entity::find()
            .filter(product::Column::Slug.eq(slug))
            .filter(product::Column::IsActive.eq(true))
            .one(db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Product '{}' not found", slug)))?;

        let category = category::Entity::find_by_id(product.category_id).one(db).await?;

        let images = product_image::Entity::find()
            .filter(product_image::Column::ProductId.eq(product.id))
            .order_by_asc(product_image::Column::Ordering)
            .order_by_asc(product_image::Column::Id)
            .all(db)
            .await?;

        let colors = product_color::Entity::find()
            .filter(product_color::Column::ProductId.eq(product.id))
            .order_by_asc(product_color::Column::Ordering)
            .order_by_asc(product_color::Column::Id)
            .all(db)
            .await?;

        let offer = self.pricing.offer_for(&product).await?;

        let related_products = product::Entity::find()
            .filter(product::Column::CategoryId.eq(product.category_id))
            .filter(product::Column::IsActive.eq(true))
            .filter(product::Column::Id.ne(product.id))
            .order_by_desc(product::Column::CreatedAt)
            .limit(RELATED_PRODUCT_LIMIT)
            .all(db)
            .await?;

        Ok(ProductDetail {
            in_stock: product.in_stock(),
            max_quantity: max_quantity(product.stock),
            product,
            category,
            images,
            colors,
            offer,
            related_products,
        })
    }

    /// An active product by id; inactive and unknown products are both 404.
    pub async fn active_product(&self, product_id: i32) -> Result<product::Model, ServiceError> {
        product::Entity::find_by_id(product_id)
            .filter(product::Column::IsActive.eq(true))
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Product {} not found", product_id)))
    }

    #[instrument(skip(self, input), fields(name = %input.name))]
    pub async fn create_category(&self, input: CreateCategoryInput) -> Result<category::Model, ServiceError> {
        let model = category::ActiveModel {
            name: Set(input.name),
            name_en: Set(input.name_en),
            name_ar: Set(input.name_ar),
            slug: Set(input.slug.unwrap_or_default()),
            image: Set(input.image),
            is_active: Set(input.is_active),
            ..Default::default()
        };
        let created = model.insert(&*self.db).await.map_err(|e| {
            error!(error = %e, "Failed to create category");
            ServiceError::DatabaseError(e)
        })?;
        info!(category_id = created.id, slug = %created.slug, "Category created");
        Ok(created)
    }

    #[instrument(skip(self, input), fields(name = %input.name))]
    pub async fn create_product(&self, input: CreateProductInput) -> Result<product::Model, ServiceError> {
        if input.stock < 0 {
            return Err(ServiceError::ValidationError("stock must not be negative".into()));
        }
        let model = product::ActiveModel {
            category_id: Set(input.category_id),
            name: Set(input.name),
            name_en: Set(input.name_en),
            name_ar: Set(input.name_ar),
            slug: Set(input.slug.unwrap_or_default()),
            description: Set(input.description),
            price: Set(input.price),
            compare_at_price: Set(input.compare_at_price),
            discount_percentage: Set(input.discount_percentage),
            stock: Set(input.stock),
            is_active: Set(input.is_active),
            is_featured: Set(input.is_featured),
            ..Default::default()
        };
        let created = model.insert(&*self.db).await.map_err(|e| {
            error!(error = %e, "Failed to create product");
            ServiceError::DatabaseError(e)
        })?;
        info!(product_id = created.id, slug = %created.slug, "Product created");
        Ok(created)
    }

    /// Deletes a product and its gallery. Order lines keep their snapshot and
    /// lose the product link.
    #[instrument(skip(self))]
    pub async fn delete_product(&self, product_id: i32) -> Result<(), ServiceError> {
        let txn = self.db.begin().await?;

        order_item::Entity::update_many()
            .col_expr(order_item::Column::ProductId, Expr::value(Option::<i32>::None))
            .filter(order_item::Column::ProductId.eq(product_id))
            .exec(&txn)
            .await?;
        offer::Entity::update_many()
            .col_expr(offer::Column::ProductId, Expr::value(Option::<i32>::None))
            .filter(offer::Column::ProductId.eq(product_id))
            .exec(&txn)
            .await?;
        product_image::Entity::delete_many()
            .filter(product_image::Column::ProductId.eq(product_id))
            .exec(&txn)
            .await?;
        product_color::Entity::delete_many()
            .filter(product_color::Column::ProductId.eq(product_id))
            .exec(&txn)
            .await?;
        let result = product::Entity::delete_by_id(product_id).exec(&txn).await?;

        if result.rows_affected == 0 {
            return Err(ServiceError::NotFound(format!("Product {} not found", product_id)));
        }

        txn.commit().await?;
        info!(product_id, "Product deleted");
        Ok(())
    }

    /// Active products matching the search text and price range.
    fn searchable(filter: &ProductFilter) -> Select<product::Entity> {
        let mut query = product::Entity::find().filter(product::Column::IsActive.eq(true));

        let q = filter.search_query();
        if !q.is_empty() {
            let pattern = format!("%{}%", escape_like(&q.to_lowercase()));
            let mut any_name = Condition::any();
            for column in [
                product::Column::Name,
                product::Column::NameEn,
                product::Column::NameAr,
            ] {
                any_name = any_name.add(
                    Expr::expr(Func::lower(Expr::col((product::Entity, column))))
                        .like(LikeExpr::new(pattern.clone()).escape('\\')),
                );
            }
            query = query.filter(any_name);
        }

        if let Some(min) = filter.min_price() {
            query = query.filter(product::Column::Price.gte(min));
        }
        if let Some(max) = filter.max_price() {
            query = query.filter(product::Column::Price.lte(max));
        }

        query
    }

    async fn paginate(
        &self,
        query: Select<product::Entity>,
        raw_page: Option<&str>,
    ) -> Result<ProductPage, ServiceError> {
        let paginator = query.paginate(&*self.db, self.per_page);
        let total = paginator.num_items().await?;
        let page = resolve_page(raw_page, total, self.per_page);
        let products = paginator.fetch_page(page.index()).await?;
        Ok(ProductPage { products, page })
    }
}

fn escape_like(raw: &str) -> String {
    let mut escaped = String::with_capacity(raw.len());
    for c in raw.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}
