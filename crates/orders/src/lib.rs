//! `storefront-orders` — the order aggregate and its status state machine.
//!
//! The aggregate owns the status field. Decisions (which transitions are
//! legal) are pure and live in [`status`]; the durable store applies them
//! as conditional updates so a late or duplicate provider event can never
//! overwrite a more-advanced state.

pub mod order;
pub mod status;
pub mod tax_meta;
pub mod token;

pub use order::{LineInput, Order, OrderLine, PaymentProvider, PlaceOrder, Totals};
pub use status::OrderStatus;
pub use tax_meta::TaxMeta;
pub use token::{generate_access_token, hash_access_token, verify_access_token};
