use crate::common::slugify;
use crate::i18n::{pick, Language};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::entity::prelude::*;
use sea_orm::Set;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "products")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub category_id: i32,
    pub name: String,
    pub name_en: Option<String>,
    pub name_ar: Option<String>,
    #[sea_orm(unique)]
    pub slug: String,
    #[sea_orm(column_type = "Text")]
    pub description: String,
    #[sea_orm(column_type = "Text", nullable)]
    pub description_en: Option<String>,
    #[sea_orm(column_type = "Text", nullable)]
    pub description_ar: Option<String>,
    #[sea_orm(column_type = "Decimal(Some((10, 2)))")]
    pub price: Decimal,
    #[sea_orm(column_type = "Decimal(Some((10, 2)))", nullable)]
    pub compare_at_price: Option<Decimal>,
    pub stock: i32,
    pub is_active: bool,
    pub is_featured: bool,
    pub sales_count: i32,
    #[sea_orm(column_type = "Decimal(Some((5, 2)))", nullable)]
    pub discount_percentage: Option<Decimal>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::category::Entity",
        from = "Column::CategoryId",
        to = "super::category::Column::Id",
        on_delete = "Cascade"
    )]
    Category,
    #[sea_orm(has_many = "super::product_image::Entity")]
    Images,
    #[sea_orm(has_many = "super::product_color::Entity")]
    Colors,
    #[sea_orm(has_many = "super::order_item::Entity")]
    OrderItems,
}

impl Related<super::category::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Category.def()
    }
}

impl Related<super::product_image::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Images.def()
    }
}

impl Related<super::product_color::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Colors.def()
    }
}

impl Related<super::order_item::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::OrderItems.def()
    }
}

impl Model {
    /// A product is on sale when its reference price is above the selling price.
    pub fn on_sale(&self) -> bool {
        matches!(self.compare_at_price, Some(compare_at) if compare_at > self.price)
    }

    pub fn in_stock(&self) -> bool {
        self.stock > 0
    }

    pub fn display_name(&self, lang: Language) -> &str {
        pick(lang, &self.name, self.name_en.as_deref(), self.name_ar.as_deref())
    }

    pub fn display_description(&self, lang: Language) -> &str {
        pick(
            lang,
            &self.description,
            self.description_en.as_deref(),
            self.description_ar.as_deref(),
        )
    }
}

/// Applies a percentage discount to a product's prices.
///
/// Returns the new `(price, compare_at_price)`. The compare-at price is
/// backfilled from `price` when absent, and the selling price is always
/// recomputed from it so repeated saves do not compound the discount.
pub fn apply_discount(
    price: Decimal,
    compare_at_price: Option<Decimal>,
    discount_percentage: Decimal,
) -> (Decimal, Decimal) {
    let compare_at = compare_at_price.unwrap_or(price);
    let factor = Decimal::ONE - discount_percentage / Decimal::ONE_HUNDRED;
    ((compare_at * factor).round_dp(2), compare_at)
}

#[async_trait]
impl ActiveModelBehavior for ActiveModel {
    async fn before_save<C>(mut self, _db: &C, insert: bool) -> Result<Self, DbErr>
    where
        C: ConnectionTrait,
    {
        let slug_missing = super::active_value(&self.slug)
            .map(|s| s.trim().is_empty())
            .unwrap_or(true);
        if slug_missing {
            if let Some(name) = super::active_value(&self.name) {
                self.slug = Set(slugify(&name));
            }
        }

        if let Some(stock) = super::active_value(&self.stock) {
            if stock < 0 {
                return Err(DbErr::Custom("stock must not be negative".into()));
            }
        }

        if let Some(Some(discount)) = super::active_value(&self.discount_percentage) {
            if discount < Decimal::ZERO || discount > Decimal::ONE_HUNDRED {
                return Err(DbErr::Custom(
                    "discount_percentage must be between 0 and 100".into(),
                ));
            }
            if discount > Decimal::ZERO {
                if let Some(price) = super::active_value(&self.price) {
                    let compare_at = super::active_value(&self.compare_at_price).flatten();
                    let (price, compare_at) = apply_discount(price, compare_at, discount);
                    self.price = Set(price);
                    self.compare_at_price = Set(Some(compare_at));
                }
            }
        }

        let now = Utc::now();
        if insert {
            if self.created_at.is_not_set() {
                self.created_at = Set(now);
            }
            if self.is_active.is_not_set() {
                self.is_active = Set(true);
            }
            if self.is_featured.is_not_set() {
                self.is_featured = Set(false);
            }
            if self.sales_count.is_not_set() {
                self.sales_count = Set(0);
            }
            if self.stock.is_not_set() {
                self.stock = Set(0);
            }
            if self.description.is_not_set() {
                self.description = Set(String::new());
            }
        }
        self.updated_at = Set(now);

        Ok(self)
    }
}
