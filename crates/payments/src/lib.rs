//! Payment provider adapters.
//!
//! Two integration styles live here. Stripe pushes signed webhook events at
//! us; [`stripe`] verifies the signature and maps event types onto order
//! confirmations. Klarna is pull-based; [`klarna`] polls the provider's
//! order-management API and collapses its status vocabulary into the small
//! canonical set the lifecycle cares about.

pub mod klarna;
pub mod stripe;

use storefront_bookkeeping::PayoutSettlement;
use storefront_orders::OrderStatus;

/// What a verified provider signal asks the lifecycle to do.
#[derive(Debug, Clone, PartialEq)]
pub enum Confirmation {
    /// Capture succeeded; the order should move to `paid`.
    Paid,
    /// The capture attempt failed.
    Failed,
    /// The shopper must complete an extra step (3DS etc.).
    ActionRequired,
    /// A previously captured payment was refunded.
    Refunded,
    /// A settlement batch landed in the bank account. Books a payout
    /// voucher; never touches any single order.
    Payout(PayoutSettlement),
    /// Recognized sender, event type we do not act on.
    Ignored,
}

impl Confirmation {
    /// The order status this confirmation drives toward, if any.
    pub fn target_status(&self) -> Option<OrderStatus> {
        match self {
            Confirmation::Paid => Some(OrderStatus::Paid),
            Confirmation::Failed => Some(OrderStatus::Failed),
            Confirmation::ActionRequired => Some(OrderStatus::AwaitingAction),
            Confirmation::Refunded => Some(OrderStatus::Refunded),
            Confirmation::Payout(_) | Confirmation::Ignored => None,
        }
    }
}

/// Provider order status collapsed to what the lifecycle distinguishes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CanonicalStatus {
    Paid,
    Cancelled,
    Unknown,
}

impl CanonicalStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CanonicalStatus::Paid => "paid",
            CanonicalStatus::Cancelled => "cancelled",
            CanonicalStatus::Unknown => "unknown",
        }
    }
}
