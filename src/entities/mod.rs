//! Database entities for the storefront.

pub mod category;
pub mod offer;
pub mod order;
pub mod order_item;
pub mod product;
pub mod product_color;
pub mod product_image;
pub mod user;

use sea_orm::{ActiveValue, Value};

/// Reads the value an active model will carry, set or loaded.
pub(crate) fn active_value<T>(value: &ActiveValue<T>) -> Option<T>
where
    T: Into<Value> + Clone,
{
    match value {
        ActiveValue::Set(v) | ActiveValue::Unchanged(v) => Some(v.clone()),
        ActiveValue::NotSet => None,
    }
}
