//! `storefront-shipping` — weight-tiered shipping tariffs.

pub mod cache;
pub mod tariff;

pub use cache::{Clock, SystemClock, TierCache};
pub use tariff::{quote, DeliveryMethod, ShippingError, ShippingQuote, ShippingTier, TierTable};
