use chrono::{DateTime, Duration, NaiveTime, Utc};
use rust_decimal::Decimal;
use sea_orm::{
    ColumnTrait, DatabaseConnection, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder,
    QuerySelect,
};
use serde::Serialize;
use std::sync::Arc;
use tracing::instrument;

use super::orders::{status_choices, StatusChoice};
use crate::entities::{
    order::{self, OrderStatus},
    product,
};
use crate::errors::ServiceError;
use crate::i18n::Language;

const RECENT_ORDER_LIMIT: u64 = 10;
const BEST_SELLER_LIMIT: u64 = 5;
const WEEK_DAYS: i64 = 7;

#[derive(Debug, Clone, Serialize)]
pub struct DashboardSummary {
    pub orders_today: u64,
    pub orders_this_week: u64,
    pub total_revenue: Decimal,
    pub pending_orders_count: u64,
    pub successful_orders_count: u64,
    pub recent_orders: Vec<order::Model>,
    pub best_sellers: Vec<product::Model>,
    pub status_choices: Vec<StatusChoice>,
}

/// UTC midnight of the day containing `now`, and of seven days before it.
pub fn day_boundaries(now: DateTime<Utc>) -> (DateTime<Utc>, DateTime<Utc>) {
    let today = now.date_naive().and_time(NaiveTime::MIN).and_utc();
    (today, today - Duration::days(WEEK_DAYS))
}

#[derive(Clone)]
pub struct DashboardService {
    db: Arc<DatabaseConnection>,
}

impl DashboardService {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    #[instrument(skip(self))]
    pub async fn summary(&self, lang: Language) -> Result<DashboardSummary, ServiceError> {
        self.summary_at(Utc::now(), lang).await
    }

    pub async fn summary_at(&self, now: DateTime<Utc>, lang: Language) -> Result<DashboardSummary, ServiceError> {
        let db = &*self.db;
        let (today, week_start) = day_boundaries(now);
        let tomorrow = today + Duration::days(1);

        let orders_today = order::Entity::find()
            .filter(order::Column::CreatedAt.gte(today))
            .filter(order::Column::CreatedAt.lt(tomorrow))
            .count(db)
            .await?;

        let orders_this_week = order::Entity::find()
            .filter(order::Column::CreatedAt.gte(week_start))
            .count(db)
            .await?;

        let delivered_totals: Vec<Decimal> = order::Entity::find()
            .select_only()
            .column(order::Column::Totals)
            .filter(order::Column::Status.eq(OrderStatus::Delivered))
            .into_tuple()
            .all(db)
            .await?;
        let successful_orders_count = delivered_totals.len() as u64;
        let total_revenue = delivered_totals.into_iter().sum();

        let pending_orders_count = order::Entity::find()
            .filter(order::Column::Status.eq(OrderStatus::Pending))
            .count(db)
            .await?;

        let recent_orders = order::Entity::find()
            .order_by_desc(order::Column::CreatedAt)
            .order_by_desc(order::Column::Id)
            .limit(RECENT_ORDER_LIMIT)
            .all(db)
            .await?;

        let best_sellers = product::Entity::find()
            .order_by_desc(product::Column::SalesCount)
            .order_by_desc(product::Column::Id)
            .limit(BEST_SELLER_LIMIT)
            .all(db)
            .await?;

        Ok(DashboardSummary {
            orders_today,
            orders_this_week,
            total_revenue,
            pending_orders_count,
            successful_orders_count,
            recent_orders,
            best_sellers,
            status_choices: status_choices(lang),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn week_starts_seven_days_before_midnight() {
        let now = Utc.with_ymd_and_hms(2024, 3, 10, 15, 30, 0).unwrap();
        let (today, week_start) = day_boundaries(now);
        assert_eq!(today, Utc.with_ymd_and_hms(2024, 3, 10, 0, 0, 0).unwrap());
        assert_eq!(week_start, Utc.with_ymd_and_hms(2024, 3, 3, 0, 0, 0).unwrap());
    }
}
