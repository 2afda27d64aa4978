//! `storefront-tax` — VAT treatment decisions for orders.
//!
//! The engine is a pure decision ladder plus one optional external call
//! (VAT-id validation). Validation failures degrade conservatively: an
//! unverifiable business claim is charged as a consumer sale, never
//! silently zero-rated.

pub mod decision;
pub mod validator;
pub mod vat_id;

pub use decision::{decide, TaxContext, TaxDecision, TaxMode};
pub use validator::{ValidationOutcome, VatValidator, ViesClient};
pub use vat_id::normalize_vat_id;
