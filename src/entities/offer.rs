use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::entity::prelude::*;
use sea_orm::Set;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize, Display, EnumString,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(20))")]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum OfferType {
    #[sea_orm(string_value = "percentage")]
    Percentage,
    #[sea_orm(string_value = "fixed")]
    Fixed,
}

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "offers")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub title: String,
    pub offer_type: OfferType,
    #[sea_orm(column_type = "Decimal(Some((10, 2)))")]
    pub value: Decimal,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    pub is_active: bool,
    pub product_id: Option<i32>,
    pub category_id: Option<i32>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::product::Entity",
        from = "Column::ProductId",
        to = "super::product::Column::Id",
        on_delete = "SetNull"
    )]
    Product,
    #[sea_orm(
        belongs_to = "super::category::Entity",
        from = "Column::CategoryId",
        to = "super::category::Column::Id",
        on_delete = "SetNull"
    )]
    Category,
}

impl Related<super::product::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Product.def()
    }
}

impl Related<super::category::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Category.def()
    }
}

impl Model {
    /// Active and inside its `[start_date, end_date]` window, both ends inclusive.
    pub fn is_valid_at(&self, now: DateTime<Utc>) -> bool {
        self.is_active && self.start_date <= now && now <= self.end_date
    }

    pub fn is_valid(&self) -> bool {
        self.is_valid_at(Utc::now())
    }
}

#[async_trait]
impl ActiveModelBehavior for ActiveModel {
    async fn before_save<C>(mut self, _db: &C, insert: bool) -> Result<Self, DbErr>
    where
        C: ConnectionTrait,
    {
        if insert {
            if self.start_date.is_not_set() {
                self.start_date = Set(Utc::now());
            }
            if self.is_active.is_not_set() {
                self.is_active = Set(true);
            }
        }
        if let Some(value) = super::active_value(&self.value) {
            if value < Decimal::ZERO {
                return Err(DbErr::Custom("offer value must not be negative".into()));
            }
        }
        Ok(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use rust_decimal_macros::dec;

    fn offer(active: bool, start: DateTime<Utc>, end: DateTime<Utc>) -> Model {
        Model {
            id: 1,
            title: "Summer".into(),
            offer_type: OfferType::Percentage,
            value: dec!(10),
            start_date: start,
            end_date: end,
            is_active: active,
            product_id: None,
            category_id: None,
        }
    }

    #[test]
    fn validity_window_is_inclusive() {
        let now = Utc::now();
        assert!(offer(true, now, now).is_valid_at(now));
        assert!(offer(true, now - Duration::days(1), now + Duration::days(1)).is_valid_at(now));
        assert!(!offer(true, now + Duration::seconds(1), now + Duration::days(1)).is_valid_at(now));
        assert!(!offer(true, now - Duration::days(2), now - Duration::days(1)).is_valid_at(now));
    }

    #[test]
    fn inactive_offer_is_never_valid() {
        let now = Utc::now();
        assert!(!offer(false, now - Duration::days(1), now + Duration::days(1)).is_valid_at(now));
    }

    #[test]
    fn offer_type_parses_lowercase() {
        assert_eq!("fixed".parse::<OfferType>().unwrap(), OfferType::Fixed);
        assert_eq!(OfferType::Percentage.to_string(), "percentage");
        assert!("bogo".parse::<OfferType>().is_err());
    }
}
