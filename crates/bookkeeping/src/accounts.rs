//! Fixed ledger account plan (BAS-style numbering).

use storefront_orders::PaymentProvider;

/// Bank account (net payout deposits land here).
pub const BANK: u32 = 1930;

/// Goods sales revenue, ex VAT.
pub const GOODS_SALES: u32 = 3001;

/// Shipping revenue, ex VAT.
pub const SHIPPING_REVENUE: u32 = 3520;

/// Outgoing VAT.
pub const VAT_OUT: u32 = 2611;

/// Payment provider fees.
pub const PROVIDER_FEES: u32 = 6570;

/// Clearing account for funds held by a payment provider.
pub fn clearing(provider: PaymentProvider) -> u32 {
    match provider {
        PaymentProvider::Stripe => 1580,
        PaymentProvider::Klarna => 1581,
    }
}
