use metrics::counter;
use rust_decimal::Decimal;
use sea_orm::{ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::str::FromStr;
use std::sync::Arc;
use tracing::{info, instrument, warn};

use crate::config::AppConfig;
use crate::entities::product;
use crate::errors::ServiceError;
use crate::events::{Event, EventSender};
use crate::i18n::{self, Language};
use crate::session::{messages, Session};

/// Session key holding the cart object.
pub const CART_SESSION_KEY: &str = "cart";

/// One product's entry in the session cart.
///
/// `price` is the unit price captured when the line was first added, kept as
/// a decimal string.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartLine {
    pub quantity: u32,
    pub price: String,
}

impl CartLine {
    fn unit_price(&self) -> Decimal {
        Decimal::from_str(&self.price).unwrap_or_default()
    }
}

/// Flat-rate shipping with a free-shipping threshold.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShippingPolicy {
    pub flat_fee: Decimal,
    pub free_threshold: Decimal,
}

impl From<&AppConfig> for ShippingPolicy {
    fn from(cfg: &AppConfig) -> Self {
        Self {
            flat_fee: cfg.shipping_flat_fee,
            free_threshold: cfg.free_shipping_threshold,
        }
    }
}

/// The session cart: product id (as a string) to [`CartLine`].
#[derive(Debug, Clone, PartialEq)]
pub struct Cart {
    lines: BTreeMap<String, CartLine>,
    policy: ShippingPolicy,
}

impl Cart {
    pub fn new(policy: ShippingPolicy) -> Self {
        Self {
            lines: BTreeMap::new(),
            policy,
        }
    }

    /// Reads the cart from the session. Lines that cannot be priced are dropped.
    pub async fn load(session: &Session, policy: ShippingPolicy) -> Self {
        let stored = match session.get::<BTreeMap<String, CartLine>>(CART_SESSION_KEY).await {
            Ok(stored) => stored.unwrap_or_default(),
            Err(e) => {
                warn!(error = %e, "Discarding unreadable session cart");
                BTreeMap::new()
            }
        };
        let lines = stored
            .into_iter()
            .filter(|(id, line)| id.parse::<i32>().is_ok() && Decimal::from_str(&line.price).is_ok())
            .collect();
        Self { lines, policy }
    }

    pub async fn save(&self, session: &Session) -> Result<(), ServiceError> {
        session.insert(CART_SESSION_KEY, &self.lines).await
    }

    /// Adds `quantity` units (or sets the quantity when `override_quantity`),
    /// clamped to the product's stock. Returns the resulting quantity; a line
    /// clamped to zero is removed.
    pub fn add(&mut self, product: &product::Model, quantity: u32, override_quantity: bool) -> u32 {
        let key = product.id.to_string();
        let line = self.lines.entry(key.clone()).or_insert_with(|| CartLine {
            quantity: 0,
            price: money_string(product.price),
        });

        line.quantity = if override_quantity {
            quantity
        } else {
            line.quantity.saturating_add(quantity)
        };
        line.quantity = line.quantity.min(stock_of(product));

        let result = line.quantity;
        if result == 0 {
            self.lines.remove(&key);
        }
        result
    }

    /// Sets a line's quantity. Non-positive quantities, or a product that no
    /// longer exists, remove the line. Returns the resulting quantity.
    pub fn update(&mut self, product_id: i32, product: Option<&product::Model>, quantity: i64) -> u32 {
        let key = product_id.to_string();
        if !self.lines.contains_key(&key) {
            return 0;
        }

        let clamped = match product {
            Some(product) if quantity > 0 => {
                u32::try_from(quantity).unwrap_or(u32::MAX).min(stock_of(product))
            }
            _ => 0,
        };

        if clamped == 0 {
            self.lines.remove(&key);
        } else if let Some(line) = self.lines.get_mut(&key) {
            line.quantity = clamped;
        }
        clamped
    }

    pub fn remove(&mut self, product_id: i32) -> bool {
        self.lines.remove(&product_id.to_string()).is_some()
    }

    pub fn line(&self, product_id: i32) -> Option<&CartLine> {
        self.lines.get(&product_id.to_string())
    }

    pub fn product_ids(&self) -> Vec<i32> {
        self.lines.keys().filter_map(|id| id.parse().ok()).collect()
    }

    /// Drops lines whose product is not in `live`. Returns whether anything changed.
    pub fn retain_products(&mut self, live: &[i32]) -> bool {
        let before = self.lines.len();
        self.lines
            .retain(|id, _| id.parse::<i32>().map(|id| live.contains(&id)).unwrap_or(false));
        before != self.lines.len()
    }

    /// Total units across all lines.
    pub fn len(&self) -> u32 {
        self.lines.values().map(|line| line.quantity).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    pub fn subtotal(&self) -> Decimal {
        self.lines
            .values()
            .map(|line| line.unit_price() * Decimal::from(line.quantity))
            .sum()
    }

    pub fn shipping(&self) -> Decimal {
        if self.is_empty() || self.subtotal() >= self.policy.free_threshold {
            Decimal::ZERO
        } else {
            self.policy.flat_fee
        }
    }

    pub fn total(&self) -> Decimal {
        self.subtotal() + self.shipping()
    }
}

/// Two-place string form of a price, e.g. `10` becomes `"10.00"`.
fn money_string(price: Decimal) -> String {
    let mut price = price.round_dp(2);
    price.rescale(2);
    price.to_string()
}

fn stock_of(product: &product::Model) -> u32 {
    u32::try_from(product.stock).unwrap_or(0)
}

/// A cart line joined with its live product.
#[derive(Debug, Clone, Serialize)]
pub struct CartItem {
    pub product: product::Model,
    pub quantity: u32,
    pub price: Decimal,
    pub total_price: Decimal,
}

#[derive(Debug, Clone, Serialize)]
pub struct CartSummary {
    pub items: Vec<CartItem>,
    pub item_count: u32,
    pub subtotal: Decimal,
    pub shipping: Decimal,
    pub total: Decimal,
    pub is_empty: bool,
}

/// What an add-to-cart request did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddOutcome {
    Added { quantity: u32 },
    OutOfStock,
}

/// Session cart operations that need the catalog.
#[derive(Clone)]
pub struct CartService {
    db: Arc<DatabaseConnection>,
    event_sender: Arc<EventSender>,
    policy: ShippingPolicy,
}

impl CartService {
    pub fn new(db: Arc<DatabaseConnection>, event_sender: Arc<EventSender>, config: &AppConfig) -> Self {
        Self {
            db,
            event_sender,
            policy: ShippingPolicy::from(config),
        }
    }

    pub fn policy(&self) -> ShippingPolicy {
        self.policy
    }

    pub async fn cart(&self, session: &Session) -> Cart {
        Cart::load(session, self.policy).await
    }

    /// Adds an active product to the cart. Out-of-stock products leave the
    /// cart untouched and queue an error message instead.
    #[instrument(skip(self, session))]
    pub async fn add(
        &self,
        session: &Session,
        product_id: i32,
        quantity: u32,
        override_quantity: bool,
        lang: Language,
    ) -> Result<AddOutcome, ServiceError> {
        let product = self.active_product(product_id).await?;

        if !product.in_stock() {
            warn!(product_id, "Rejected add of out-of-stock product");
            messages::error(session, i18n::out_of_stock(lang, product.display_name(lang))).await?;
            return Ok(AddOutcome::OutOfStock);
        }

        let mut cart = self.cart(session).await;
        let quantity = cart.add(&product, quantity, override_quantity);
        cart.save(session).await?;

        counter!("storefront_cart_mutations_total", 1, "op" => "add");
        info!(product_id, quantity, "Cart line added");
        self.notify(session, product_id, quantity).await;
        Ok(AddOutcome::Added { quantity })
    }

    /// Sets a line's quantity; `quantity <= 0` removes it.
    #[instrument(skip(self, session))]
    pub async fn update(&self, session: &Session, product_id: i32, quantity: i64) -> Result<u32, ServiceError> {
        let mut cart = self.cart(session).await;
        if cart.line(product_id).is_none() {
            return Ok(0);
        }

        let product = if quantity > 0 {
            product::Entity::find_by_id(product_id).one(&*self.db).await?
        } else {
            None
        };
        let quantity = cart.update(product_id, product.as_ref(), quantity);
        cart.save(session).await?;

        counter!("storefront_cart_mutations_total", 1, "op" => "update");
        info!(product_id, quantity, "Cart line updated");
        self.notify(session, product_id, quantity).await;
        Ok(quantity)
    }

    #[instrument(skip(self, session))]
    pub async fn remove(&self, session: &Session, product_id: i32) -> Result<bool, ServiceError> {
        let mut cart = self.cart(session).await;
        let removed = cart.remove(product_id);
        if removed {
            cart.save(session).await?;
            counter!("storefront_cart_mutations_total", 1, "op" => "remove");
            info!(product_id, "Cart line removed");
            self.notify(session, product_id, 0).await;
        }
        Ok(removed)
    }

    /// Removes the cart from the session entirely.
    pub async fn clear(&self, session: &Session) {
        session.remove(CART_SESSION_KEY).await;
    }

    /// Cart lines joined with live products, newest products first.
    ///
    /// Lines whose product has been deleted are pruned from the session so
    /// the totals always match the listed items.
    #[instrument(skip(self, session))]
    pub async fn summary(&self, session: &Session) -> Result<CartSummary, ServiceError> {
        let mut cart = self.cart(session).await;
        let items = self.items(session, &mut cart).await?;
        Ok(CartSummary {
            item_count: cart.len(),
            subtotal: cart.subtotal(),
            shipping: cart.shipping(),
            total: cart.total(),
            is_empty: cart.is_empty(),
            items,
        })
    }

    pub(crate) async fn items(&self, session: &Session, cart: &mut Cart) -> Result<Vec<CartItem>, ServiceError> {
        let ids = cart.product_ids();
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let products = product::Entity::find()
            .filter(product::Column::Id.is_in(ids))
            .order_by_desc(product::Column::CreatedAt)
            .order_by_desc(product::Column::Id)
            .all(&*self.db)
            .await?;

        let live: Vec<i32> = products.iter().map(|p| p.id).collect();
        if cart.retain_products(&live) {
            info!("Pruned cart lines for deleted products");
            cart.save(session).await?;
        }

        Ok(products
            .into_iter()
            .filter_map(|product| {
                let line = cart.line(product.id)?;
                let price = line.unit_price();
                Some(CartItem {
                    quantity: line.quantity,
                    total_price: price * Decimal::from(line.quantity),
                    price,
                    product,
                })
            })
            .collect())
    }

    async fn active_product(&self, product_id: i32) -> Result<product::Model, ServiceError> {
        product::Entity::find_by_id(product_id)
            .filter(product::Column::IsActive.eq(true))
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Product {} not found", product_id)))
    }

    async fn notify(&self, session: &Session, product_id: i32, quantity: u32) {
        self.event_sender
            .send_or_log(Event::CartUpdated {
                session_id: session.id().to_string(),
                product_id,
                quantity,
            })
            .await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use proptest::prelude::*;
    use rust_decimal_macros::dec;

    fn policy() -> ShippingPolicy {
        ShippingPolicy {
            flat_fee: dec!(5.99),
            free_threshold: dec!(50.00),
        }
    }

    fn product(id: i32, price: Decimal, stock: i32) -> product::Model {
        product::Model {
            id,
            category_id: 1,
            name: format!("Product {id}"),
            name_en: None,
            name_ar: None,
            slug: format!("product-{id}"),
            description: String::new(),
            description_en: None,
            description_ar: None,
            price,
            compare_at_price: None,
            stock,
            is_active: true,
            is_featured: false,
            sales_count: 0,
            discount_percentage: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn add_increments_and_clamps_to_stock() {
        let mut cart = Cart::new(policy());
        let p = product(1, dec!(10.00), 5);
        assert_eq!(cart.add(&p, 2, false), 2);
        assert_eq!(cart.add(&p, 2, false), 4);
        assert_eq!(cart.add(&p, 9, false), 5);
        assert_eq!(cart.add(&p, 1, true), 1);
        assert_eq!(cart.len(), 1);
    }

    #[test]
    fn price_snapshot_survives_price_change() {
        let mut cart = Cart::new(policy());
        let mut p = product(1, dec!(10.00), 5);
        cart.add(&p, 1, false);
        p.price = dec!(99.00);
        cart.add(&p, 1, false);
        assert_eq!(cart.line(1).unwrap().price, "10.00");
        assert_eq!(cart.subtotal(), dec!(20.00));
    }

    #[test]
    fn price_snapshot_keeps_two_places() {
        let mut cart = Cart::new(policy());
        cart.add(&product(1, dec!(10), 5), 1, false);
        cart.add(&product(2, dec!(4.5), 5), 1, false);
        cart.add(&product(3, dec!(2.999), 5), 1, false);
        assert_eq!(cart.line(1).unwrap().price, "10.00");
        assert_eq!(cart.line(2).unwrap().price, "4.50");
        assert_eq!(cart.line(3).unwrap().price, "3.00");
    }

    #[test]
    fn add_of_zero_stock_product_leaves_no_line() {
        let mut cart = Cart::new(policy());
        assert_eq!(cart.add(&product(1, dec!(3), 0), 2, false), 0);
        assert!(cart.is_empty());
    }

    #[test]
    fn update_sets_clamps_and_removes() {
        let mut cart = Cart::new(policy());
        let p = product(4, dec!(2.50), 3);
        cart.add(&p, 1, false);

        assert_eq!(cart.update(4, Some(&p), 2), 2);
        assert_eq!(cart.update(4, Some(&p), 8), 3);
        assert_eq!(cart.update(4, Some(&p), 0), 0);
        assert!(cart.is_empty());

        cart.add(&p, 1, false);
        assert_eq!(cart.update(4, None, 2), 0, "vanished product removes the line");
        assert!(cart.is_empty());
    }

    #[test]
    fn update_of_absent_line_is_a_no_op() {
        let mut cart = Cart::new(policy());
        assert_eq!(cart.update(9, Some(&product(9, dec!(1), 5)), 3), 0);
        assert!(cart.is_empty());
    }

    #[test]
    fn shipping_threshold() {
        let mut cart = Cart::new(policy());
        assert_eq!(cart.shipping(), dec!(0), "empty cart ships free");

        cart.add(&product(1, dec!(49.99), 10), 1, false);
        assert_eq!(cart.shipping(), dec!(5.99));
        assert_eq!(cart.total(), dec!(55.98));

        cart.add(&product(2, dec!(0.01), 10), 1, false);
        assert_eq!(cart.subtotal(), dec!(50.00));
        assert_eq!(cart.shipping(), dec!(0));
        assert_eq!(cart.total(), dec!(50.00));
    }

    #[test]
    fn retain_drops_missing_products() {
        let mut cart = Cart::new(policy());
        cart.add(&product(1, dec!(1), 5), 1, false);
        cart.add(&product(2, dec!(2), 5), 3, false);
        assert!(cart.retain_products(&[2]));
        assert_eq!(cart.product_ids(), vec![2]);
        assert_eq!(cart.len(), 3);
        assert!(!cart.retain_products(&[2]));
    }

    #[tokio::test]
    async fn load_discards_corrupt_lines() {
        let session = Session::fresh();
        session
            .insert(
                CART_SESSION_KEY,
                &serde_json::json!({
                    "1": {"quantity": 2, "price": "4.50"},
                    "2": {"quantity": 1, "price": "lots"},
                    "abc": {"quantity": 1, "price": "1.00"}
                }),
            )
            .await
            .unwrap();
        let cart = Cart::load(&session, policy()).await;
        assert_eq!(cart.product_ids(), vec![1]);
        assert_eq!(cart.subtotal(), dec!(9.00));
    }

    #[tokio::test]
    async fn save_and_load_round_trip() {
        let session = Session::fresh();
        let mut cart = Cart::new(policy());
        cart.add(&product(3, dec!(7.25), 5), 2, false);
        cart.save(&session).await.unwrap();
        assert_eq!(Cart::load(&session, policy()).await, cart);
    }

    proptest! {
        #[test]
        fn quantities_never_exceed_stock(
            stock in 0i32..50,
            adds in proptest::collection::vec((1u32..20, any::<bool>()), 1..10),
        ) {
            let mut cart = Cart::new(policy());
            let p = product(1, dec!(1.00), stock);
            for (qty, over) in adds {
                let result = cart.add(&p, qty, over);
                prop_assert!(result as i32 <= stock);
            }
            prop_assert!(cart.len() as i32 <= stock);
        }
    }
}
