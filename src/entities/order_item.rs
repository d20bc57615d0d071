use async_trait::async_trait;
use rust_decimal::Decimal;
use sea_orm::entity::prelude::*;
use sea_orm::Set;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "order_items")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub order_id: i32,
    pub product_id: Option<i32>,
    pub quantity: i32,
    #[sea_orm(column_type = "Decimal(Some((10, 2)))")]
    pub unit_price: Decimal,
    #[sea_orm(column_type = "Decimal(Some((10, 2)))")]
    pub line_total: Decimal,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::order::Entity",
        from = "Column::OrderId",
        to = "super::order::Column::Id",
        on_delete = "Cascade"
    )]
    Order,
    #[sea_orm(
        belongs_to = "super::product::Entity",
        from = "Column::ProductId",
        to = "super::product::Column::Id",
        on_delete = "SetNull"
    )]
    Product,
}

impl Related<super::order::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Order.def()
    }
}

impl Related<super::product::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Product.def()
    }
}

#[async_trait]
impl ActiveModelBehavior for ActiveModel {
    async fn before_save<C>(mut self, db: &C, _insert: bool) -> Result<Self, DbErr>
    where
        C: ConnectionTrait,
    {
        if self.quantity.is_not_set() {
            self.quantity = Set(1);
        }

        if self.unit_price.is_not_set() {
            if let Some(Some(product_id)) = super::active_value(&self.product_id) {
                if let Some(product) = super::product::Entity::find_by_id(product_id).one(db).await? {
                    self.unit_price = Set(product.price);
                }
            }
        }

        let unit_price = super::active_value(&self.unit_price)
            .ok_or_else(|| DbErr::Custom("order item needs a unit price or a product".into()))?;
        let quantity = super::active_value(&self.quantity).unwrap_or(1);
        if quantity < 0 {
            return Err(DbErr::Custom("quantity must not be negative".into()));
        }
        self.line_total = Set(unit_price * Decimal::from(quantity));

        Ok(self)
    }
}
