use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::{ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder};
use serde::Serialize;
use std::sync::Arc;
use tracing::{error, instrument};

use crate::entities::{
    offer::{self, OfferType},
    product,
};
use crate::errors::ServiceError;

/// Largest quantity a product page offers in its quantity picker.
pub const MAX_QUANTITY_PER_ADD: i32 = 10;

/// An offer applied to a product's current price.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OfferPrice {
    pub offer: offer::Model,
    pub discount_price: Decimal,
    /// Whole-number percentage, absent when the offer takes nothing off.
    pub discount_percent: Option<Decimal>,
}

/// Computes the discounted price for `price` under `offer`.
///
/// Percentage offers take `value`% off; fixed offers subtract `value`, never
/// going below zero. Prices round to cents and percentages to whole numbers,
/// both half-to-even.
pub fn apply_offer(price: Decimal, offer: &offer::Model) -> OfferPrice {
    let (discounted, percent) = match offer.offer_type {
        OfferType::Percentage => {
            let discounted = price * (Decimal::ONE - offer.value / Decimal::ONE_HUNDRED);
            (discounted.max(Decimal::ZERO), Some(offer.value))
        }
        OfferType::Fixed => {
            let discounted = (price - offer.value).max(Decimal::ZERO);
            let percent = (price > Decimal::ZERO)
                .then(|| (price - discounted) / price * Decimal::ONE_HUNDRED);
            (discounted, percent)
        }
    };

    OfferPrice {
        offer: offer.clone(),
        discount_price: discounted.round_dp(2),
        discount_percent: percent.filter(|p| !p.is_zero()).map(|p| p.round()),
    }
}

/// Picks the offer for a product: a valid product-scoped offer first, then a
/// valid offer on its category. Offers scoped to neither never apply.
pub fn select_offer<'a>(
    product: &product::Model,
    offers: &'a [offer::Model],
    now: DateTime<Utc>,
) -> Option<&'a offer::Model> {
    let valid = |o: &&offer::Model| o.is_valid_at(now);
    offers
        .iter()
        .filter(valid)
        .find(|o| o.product_id == Some(product.id))
        .or_else(|| {
            // An offer pinned to some other product never applies here, even
            // when it also names this product's category.
            offers
                .iter()
                .filter(valid)
                .find(|o| o.product_id.is_none() && o.category_id == Some(product.category_id))
        })
}

pub fn max_quantity(stock: i32) -> i32 {
    stock.clamp(0, MAX_QUANTITY_PER_ADD)
}

/// Looks up offers that may apply to a product.
#[derive(Clone)]
pub struct PricingService {
    db: Arc<DatabaseConnection>,
}

impl PricingService {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// The offer price for `product` right now, if any offer applies.
    #[instrument(skip(self, product), fields(product_id = product.id))]
    pub async fn offer_for(&self, product: &product::Model) -> Result<Option<OfferPrice>, ServiceError> {
        let now = Utc::now();
        let candidates = offer::Entity::find()
            .filter(offer::Column::IsActive.eq(true))
            .filter(offer::Column::StartDate.lte(now))
            .filter(offer::Column::EndDate.gte(now))
            .filter(
                offer::Column::ProductId
                    .eq(product.id)
                    .or(offer::Column::CategoryId.eq(product.category_id)),
            )
            .order_by_asc(offer::Column::Id)
            .all(&*self.db)
            .await
            .map_err(|e| {
                error!(error = %e, "Failed to load offers");
                ServiceError::DatabaseError(e)
            })?;

        Ok(select_offer(product, &candidates, now).map(|o| apply_offer(product.price, o)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use proptest::prelude::*;
    use rust_decimal_macros::dec;

    fn offer(id: i32, kind: OfferType, value: Decimal) -> offer::Model {
        let now = Utc::now();
        offer::Model {
            id,
            title: format!("Offer {id}"),
            offer_type: kind,
            value,
            start_date: now - Duration::days(1),
            end_date: now + Duration::days(1),
            is_active: true,
            product_id: None,
            category_id: None,
        }
    }

    fn product(id: i32, category_id: i32, price: Decimal) -> product::Model {
        product::Model {
            id,
            category_id,
            name: "Bag".into(),
            name_en: None,
            name_ar: None,
            slug: "bag".into(),
            description: String::new(),
            description_en: None,
            description_ar: None,
            price,
            compare_at_price: None,
            stock: 3,
            is_active: true,
            is_featured: false,
            sales_count: 0,
            discount_percentage: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn percentage_offer() {
        let priced = apply_offer(dec!(80.00), &offer(1, OfferType::Percentage, dec!(25)));
        assert_eq!(priced.discount_price, dec!(60.00));
        assert_eq!(priced.discount_percent, Some(dec!(25)));
    }

    #[test]
    fn fixed_offer_reports_equivalent_percent() {
        let priced = apply_offer(dec!(30.00), &offer(1, OfferType::Fixed, dec!(10)));
        assert_eq!(priced.discount_price, dec!(20.00));
        assert_eq!(priced.discount_percent, Some(dec!(33)));
    }

    #[test]
    fn fixed_offer_never_goes_negative() {
        let priced = apply_offer(dec!(5.00), &offer(1, OfferType::Fixed, dec!(10)));
        assert_eq!(priced.discount_price, dec!(0));
        assert_eq!(priced.discount_percent, Some(dec!(100)));
    }

    #[test]
    fn zero_value_offer_has_no_percent() {
        let priced = apply_offer(dec!(5.00), &offer(1, OfferType::Percentage, dec!(0)));
        assert_eq!(priced.discount_percent, None);
        let free = apply_offer(dec!(0), &offer(2, OfferType::Fixed, dec!(3)));
        assert_eq!(free.discount_percent, None);
    }

    #[test]
    fn product_offer_beats_category_offer() {
        let item = product(7, 3, dec!(50));
        let mut category_wide = offer(1, OfferType::Percentage, dec!(10));
        category_wide.category_id = Some(3);
        let mut specific = offer(2, OfferType::Fixed, dec!(5));
        specific.product_id = Some(7);

        let offers = vec![category_wide.clone(), specific.clone()];
        assert_eq!(select_offer(&item, &offers, Utc::now()), Some(&specific));

        let offers = vec![category_wide.clone()];
        assert_eq!(select_offer(&item, &offers, Utc::now()), Some(&category_wide));
    }

    #[test]
    fn offers_pinned_to_another_product_skip_the_category_fallback() {
        let item = product(7, 3, dec!(50));
        let mut sibling = offer(1, OfferType::Percentage, dec!(20));
        sibling.product_id = Some(8);
        sibling.category_id = Some(3);

        assert_eq!(select_offer(&item, &[sibling], Utc::now()), None);
    }

    #[test]
    fn expired_and_unscoped_offers_are_ignored() {
        let item = product(7, 3, dec!(50));
        let mut expired = offer(1, OfferType::Percentage, dec!(10));
        expired.product_id = Some(7);
        expired.end_date = Utc::now() - Duration::hours(1);
        let unscoped = offer(2, OfferType::Percentage, dec!(50));

        assert_eq!(select_offer(&item, &[expired, unscoped], Utc::now()), None);
    }

    #[test]
    fn quantity_picker_caps_at_ten() {
        assert_eq!(max_quantity(0), 0);
        assert_eq!(max_quantity(4), 4);
        assert_eq!(max_quantity(250), 10);
    }

    proptest! {
        #[test]
        fn discounted_price_stays_within_bounds(
            cents in 0i64..1_000_000,
            value in 0i64..=100,
            fixed in any::<bool>(),
        ) {
            let price = Decimal::new(cents, 2);
            let kind = if fixed { OfferType::Fixed } else { OfferType::Percentage };
            let priced = apply_offer(price, &offer(1, kind, Decimal::from(value)));
            prop_assert!(priced.discount_price >= Decimal::ZERO);
            prop_assert!(priced.discount_price <= price);
        }
    }
}
