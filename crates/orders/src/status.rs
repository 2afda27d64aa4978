//! Order status lifecycle.

use core::str::FromStr;
use serde::{Deserialize, Serialize};

use storefront_core::DomainError;

/// Persisted order status (wire/DB enum).
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    PendingPayment,
    AwaitingAction,
    Paid,
    Failed,
    Cancelled,
    Refunded,
}

impl OrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::PendingPayment => "pending_payment",
            OrderStatus::AwaitingAction => "awaiting_action",
            OrderStatus::Paid => "paid",
            OrderStatus::Failed => "failed",
            OrderStatus::Cancelled => "cancelled",
            OrderStatus::Refunded => "refunded",
        }
    }

    /// Statuses from which no further payment confirmation is expected.
    ///
    /// Re-verification of a terminal order short-circuits without a
    /// provider call; `failed` is not terminal because a retried payment
    /// may still succeed.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            OrderStatus::Paid | OrderStatus::Cancelled | OrderStatus::Refunded
        )
    }

    /// Source states from which a transition to `target` is legal.
    ///
    /// A transition attempted from any other state is a silent no-op at the
    /// store level: it usually means a late or duplicate provider event.
    pub fn allowed_sources(target: OrderStatus) -> &'static [OrderStatus] {
        use OrderStatus::*;
        match target {
            // Orders are only ever created in pending_payment.
            PendingPayment => &[],
            AwaitingAction => &[PendingPayment, AwaitingAction],
            // A failed payment can be retried and still succeed.
            Paid => &[PendingPayment, AwaitingAction, Failed],
            Failed => &[PendingPayment, AwaitingAction],
            Cancelled => &[PendingPayment, AwaitingAction],
            // Idempotent: refund confirmations may arrive more than once.
            Refunded => &[Paid, Refunded],
        }
    }

    pub fn can_transition(from: OrderStatus, to: OrderStatus) -> bool {
        Self::allowed_sources(to).contains(&from)
    }
}

impl core::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OrderStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending_payment" => Ok(OrderStatus::PendingPayment),
            "awaiting_action" => Ok(OrderStatus::AwaitingAction),
            "paid" => Ok(OrderStatus::Paid),
            "failed" => Ok(OrderStatus::Failed),
            "cancelled" => Ok(OrderStatus::Cancelled),
            "refunded" => Ok(OrderStatus::Refunded),
            other => Err(DomainError::validation(format!(
                "unknown order status: {other:?}"
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use OrderStatus::*;

    #[test]
    fn successful_payment_is_reachable_from_payable_states() {
        assert!(OrderStatus::can_transition(PendingPayment, Paid));
        assert!(OrderStatus::can_transition(AwaitingAction, Paid));
        assert!(OrderStatus::can_transition(Failed, Paid));
    }

    #[test]
    fn duplicate_success_event_is_not_a_legal_transition() {
        // paid -> paid must be rejected by the guard (store treats the
        // zero-row update as a no-op, not an error).
        assert!(!OrderStatus::can_transition(Paid, Paid));
    }

    #[test]
    fn refund_is_idempotent_but_never_reverses() {
        assert!(OrderStatus::can_transition(Paid, Refunded));
        assert!(OrderStatus::can_transition(Refunded, Refunded));
        assert!(!OrderStatus::can_transition(Refunded, Paid));
    }

    #[test]
    fn awaiting_action_is_reentrant() {
        assert!(OrderStatus::can_transition(PendingPayment, AwaitingAction));
        assert!(OrderStatus::can_transition(AwaitingAction, AwaitingAction));
        assert!(!OrderStatus::can_transition(Paid, AwaitingAction));
    }

    #[test]
    fn cancellation_only_from_open_states() {
        assert!(OrderStatus::can_transition(PendingPayment, Cancelled));
        assert!(OrderStatus::can_transition(AwaitingAction, Cancelled));
        assert!(!OrderStatus::can_transition(Paid, Cancelled));
        assert!(!OrderStatus::can_transition(Failed, Cancelled));
    }

    #[test]
    fn nothing_returns_to_pending_payment() {
        for s in [PendingPayment, AwaitingAction, Paid, Failed, Cancelled, Refunded] {
            assert!(!OrderStatus::can_transition(s, PendingPayment));
        }
    }

    #[test]
    fn wire_names_round_trip() {
        for s in [PendingPayment, AwaitingAction, Paid, Failed, Cancelled, Refunded] {
            assert_eq!(s.as_str().parse::<OrderStatus>().unwrap(), s);
        }
        assert!("unknown".parse::<OrderStatus>().is_err());
    }
}
