//! `storefront-bookkeeping` — balanced vouchers for the accounting export.
//!
//! Every financial fact (sale, refund, payout settlement) becomes one
//! voucher: a set of debit/credit lines over fixed ledger accounts that
//! must balance to the cent. Unbalanced vouchers are an invariant
//! violation and are never persisted.

pub mod accounts;
pub mod voucher;

pub use voucher::{
    payout_voucher, refund_voucher, sale_voucher, PayoutSettlement, Voucher, VoucherKind,
    VoucherLine,
};
