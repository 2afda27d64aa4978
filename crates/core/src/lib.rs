//! `storefront-core` — domain foundation building blocks.
//!
//! This crate contains **pure domain** primitives (no infrastructure concerns).

pub mod country;
pub mod error;
pub mod id;
pub mod money;

pub use country::{CountryCode, CurrencyCode};
pub use error::{DomainError, DomainResult};
pub use id::{OrderId, PaymentEventId, SyncPayloadId};
pub use money::Cents;
