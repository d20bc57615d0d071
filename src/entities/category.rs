use crate::common::slugify;
use crate::i18n::{pick, Language};
use async_trait::async_trait;
use sea_orm::entity::prelude::*;
use sea_orm::Set;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "categories")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub name: String,
    pub name_en: Option<String>,
    pub name_ar: Option<String>,
    #[sea_orm(unique)]
    pub slug: String,
    pub image: Option<String>,
    pub is_active: bool,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::product::Entity")]
    Products,
    #[sea_orm(has_many = "super::offer::Entity")]
    Offers,
}

impl Related<super::product::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Products.def()
    }
}

impl Related<super::offer::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Offers.def()
    }
}

impl Model {
    pub fn display_name(&self, lang: Language) -> &str {
        pick(lang, &self.name, self.name_en.as_deref(), self.name_ar.as_deref())
    }
}

#[async_trait]
impl ActiveModelBehavior for ActiveModel {
    async fn before_save<C>(mut self, _db: &C, _insert: bool) -> Result<Self, DbErr>
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
        if self.is_active.is_not_set() {
            self.is_active = Set(true);
        }
        Ok(self)
    }
}
