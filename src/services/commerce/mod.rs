/// Storefront services: catalog reads, offer pricing, the session cart and checkout
pub mod cart_service;
pub mod checkout_service;
pub mod pricing_service;
pub mod product_catalog_service;

pub use cart_service::{AddOutcome, Cart, CartLine, CartService, CartSummary, ShippingPolicy};
pub use checkout_service::{CheckoutContext, CheckoutForm, CheckoutService, FieldErrors};
pub use pricing_service::{OfferPrice, PricingService};
pub use product_catalog_service::{ProductCatalogService, ProductFilter, ProductSort};
