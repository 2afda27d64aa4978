//! The order aggregate: lines, monetary breakdown, payment linkage.

use chrono::{DateTime, Utc};
use core::str::FromStr;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use storefront_core::{money, Cents, CountryCode, CurrencyCode, DomainError, DomainResult, OrderId};
use storefront_tax::TaxDecision;

use crate::status::OrderStatus;
use crate::tax_meta::TaxMeta;

/// Payment provider handling an order.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentProvider {
    Stripe,
    Klarna,
}

impl PaymentProvider {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentProvider::Stripe => "stripe",
            PaymentProvider::Klarna => "klarna",
        }
    }
}

impl core::fmt::Display for PaymentProvider {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PaymentProvider {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "stripe" => Ok(PaymentProvider::Stripe),
            "klarna" => Ok(PaymentProvider::Klarna),
            other => Err(DomainError::validation(format!(
                "unknown payment provider: {other:?}"
            ))),
        }
    }
}

/// One order line. Immutable once the order leaves `pending_payment`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderLine {
    pub product_ref: String,
    pub quantity: i64,
    pub unit_price_ex_vat: Cents,
    pub vat_rate: Decimal,
    pub line_total_ex_vat: Cents,
    pub line_vat: Cents,
    pub line_total_inc_vat: Cents,
}

impl OrderLine {
    /// Build a line with derived totals.
    ///
    /// VAT is applied to the full line amount (never per unit) and rounded
    /// once, half away from zero.
    pub fn new(
        product_ref: impl Into<String>,
        quantity: i64,
        unit_price_ex_vat: Cents,
        vat_rate: Decimal,
    ) -> DomainResult<Self> {
        if quantity <= 0 {
            return Err(DomainError::validation("quantity must be positive"));
        }
        if unit_price_ex_vat < 0 {
            return Err(DomainError::validation("unit price must not be negative"));
        }

        let line_total_ex_vat = quantity
            .checked_mul(unit_price_ex_vat)
            .ok_or_else(|| DomainError::validation("line total overflows"))?;
        let line_vat = money::apply_rate(line_total_ex_vat, vat_rate)?;

        Ok(Self {
            product_ref: product_ref.into(),
            quantity,
            unit_price_ex_vat,
            vat_rate,
            line_total_ex_vat,
            line_vat,
            line_total_inc_vat: line_total_ex_vat + line_vat,
        })
    }
}

/// Monetary breakdown of an order.
///
/// Invariant: `subtotal_ex_vat + vat_total + shipping_ex_vat + shipping_vat
/// == total_inc_vat`, to the cent.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Totals {
    pub subtotal_ex_vat: Cents,
    pub vat_total: Cents,
    pub shipping_ex_vat: Cents,
    pub shipping_vat: Cents,
    pub total_inc_vat: Cents,
}

impl Totals {
    /// Derive totals from lines plus a shipping amount; the sum invariant
    /// holds by construction.
    pub fn derive(lines: &[OrderLine], shipping_ex_vat: Cents, vat_rate: Decimal) -> DomainResult<Self> {
        if shipping_ex_vat < 0 {
            return Err(DomainError::validation("shipping must not be negative"));
        }

        let subtotal_ex_vat = lines.iter().map(|l| l.line_total_ex_vat).sum();
        let vat_total = lines.iter().map(|l| l.line_vat).sum();
        let shipping_vat = money::apply_rate(shipping_ex_vat, vat_rate)?;

        Ok(Self {
            subtotal_ex_vat,
            vat_total,
            shipping_ex_vat,
            shipping_vat,
            total_inc_vat: subtotal_ex_vat + vat_total + shipping_ex_vat + shipping_vat,
        })
    }

    /// Re-check the sum invariant (used when loading persisted rows).
    pub fn verify(&self) -> DomainResult<()> {
        let expected =
            self.subtotal_ex_vat + self.vat_total + self.shipping_ex_vat + self.shipping_vat;
        if expected != self.total_inc_vat {
            return Err(DomainError::invariant(format!(
                "order totals do not add up: {} + {} + {} + {} != {}",
                self.subtotal_ex_vat,
                self.vat_total,
                self.shipping_ex_vat,
                self.shipping_vat,
                self.total_inc_vat
            )));
        }
        Ok(())
    }
}

/// Line input at checkout (prices come from the catalog upstream).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineInput {
    pub product_ref: String,
    pub quantity: i64,
    pub unit_price_ex_vat: Cents,
}

/// Command: place an order at checkout.
#[derive(Debug, Clone)]
pub struct PlaceOrder {
    pub order_id: OrderId,
    pub order_number: String,
    pub currency: CurrencyCode,
    pub customer_country: CountryCode,
    pub lines: Vec<LineInput>,
    pub shipping_ex_vat: Cents,
    pub tax: TaxDecision,
    pub access_token_hash: String,
    pub placed_at: DateTime<Utc>,
}

/// The persisted order.
///
/// Status is owned by this aggregate but only ever mutated through guarded
/// conditional updates in the store; in-memory instances are snapshots.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    pub id: OrderId,
    pub order_number: String,
    pub currency: CurrencyCode,
    pub status: OrderStatus,
    pub totals: Totals,
    pub customer_country: CountryCode,
    pub provider: Option<PaymentProvider>,
    pub provider_reference: Option<String>,
    pub access_token_hash: String,
    pub tax: TaxMeta,
    pub lines: Vec<OrderLine>,
    pub voucher_id: Option<String>,
    pub placed_at: DateTime<Utc>,
    pub paid_at: Option<DateTime<Utc>>,
    pub failed_at: Option<DateTime<Utc>>,
    pub refunded_at: Option<DateTime<Utc>>,
}

impl Order {
    /// Create a new order in `pending_payment` from checkout inputs.
    pub fn place(cmd: PlaceOrder) -> DomainResult<Self> {
        if cmd.lines.is_empty() {
            return Err(DomainError::validation("order must have at least one line"));
        }
        if cmd.order_number.trim().is_empty() {
            return Err(DomainError::validation("order number must not be empty"));
        }

        let lines = cmd
            .lines
            .iter()
            .map(|l| {
                OrderLine::new(
                    l.product_ref.clone(),
                    l.quantity,
                    l.unit_price_ex_vat,
                    cmd.tax.vat_rate,
                )
            })
            .collect::<DomainResult<Vec<_>>>()?;

        let totals = Totals::derive(&lines, cmd.shipping_ex_vat, cmd.tax.vat_rate)?;

        Ok(Self {
            id: cmd.order_id,
            order_number: cmd.order_number,
            currency: cmd.currency,
            status: OrderStatus::PendingPayment,
            totals,
            customer_country: cmd.customer_country,
            provider: None,
            provider_reference: None,
            access_token_hash: cmd.access_token_hash,
            tax: TaxMeta::from(&cmd.tax),
            lines,
            voucher_id: None,
            placed_at: cmd.placed_at,
            paid_at: None,
            failed_at: None,
            refunded_at: None,
        })
    }

    pub fn is_payable(&self) -> bool {
        OrderStatus::can_transition(self.status, OrderStatus::Paid)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use storefront_tax::{TaxMode, ValidationOutcome};

    fn dec(s: &str) -> Decimal {
        s.parse().unwrap()
    }

    fn place_cmd() -> PlaceOrder {
        PlaceOrder {
            order_id: OrderId::new(),
            order_number: "SO-1001".into(),
            currency: "SEK".parse().unwrap(),
            customer_country: "SE".parse().unwrap(),
            lines: vec![
                LineInput {
                    product_ref: "tee-black-m".into(),
                    quantity: 3,
                    unit_price_ex_vat: 19900,
                },
                LineInput {
                    product_ref: "poster-a2".into(),
                    quantity: 1,
                    unit_price_ex_vat: 9900,
                },
            ],
            shipping_ex_vat: 4900,
            tax: TaxDecision {
                vat_rate: dec("0.25"),
                mode: TaxMode::Domestic,
                vat_number: None,
                validation: None,
            },
            access_token_hash: crate::token::hash_access_token("t"),
            placed_at: Utc::now(),
        }
    }

    #[test]
    fn placed_order_starts_pending_with_consistent_totals() {
        let order = Order::place(place_cmd()).unwrap();
        assert_eq!(order.status, OrderStatus::PendingPayment);

        // 3 * 19900 = 59700, 1 * 9900 = 9900 -> subtotal 69600
        assert_eq!(order.totals.subtotal_ex_vat, 69_600);
        // 25% of each line, rounded per line
        assert_eq!(order.totals.vat_total, 14_925 + 2_475);
        assert_eq!(order.totals.shipping_ex_vat, 4_900);
        assert_eq!(order.totals.shipping_vat, 1_225);
        order.totals.verify().unwrap();
    }

    #[test]
    fn vat_is_applied_to_the_line_total_not_per_unit() {
        // Unit price chosen so per-unit rounding would drift: 3 * 33 = 99,
        // 99 * 0.25 = 24.75 -> 25. Per-unit would give 3 * round(8.25) = 24.
        let line = OrderLine::new("x", 3, 33, dec("0.25")).unwrap();
        assert_eq!(line.line_total_ex_vat, 99);
        assert_eq!(line.line_vat, 25);
        assert_eq!(line.line_total_inc_vat, 124);
    }

    #[test]
    fn rejects_empty_orders_and_bad_lines() {
        let mut cmd = place_cmd();
        cmd.lines.clear();
        assert!(matches!(
            Order::place(cmd),
            Err(DomainError::Validation(_))
        ));

        assert!(OrderLine::new("x", 0, 100, dec("0.25")).is_err());
        assert!(OrderLine::new("x", 1, -1, dec("0.25")).is_err());
    }

    #[test]
    fn zero_rated_order_carries_no_vat() {
        let mut cmd = place_cmd();
        cmd.customer_country = "US".parse().unwrap();
        cmd.tax = TaxDecision {
            vat_rate: Decimal::ZERO,
            mode: TaxMode::Export,
            vat_number: None,
            validation: None,
        };
        let order = Order::place(cmd).unwrap();
        assert_eq!(order.totals.vat_total, 0);
        assert_eq!(order.totals.shipping_vat, 0);
        assert_eq!(order.tax, TaxMeta::Export);
        order.totals.verify().unwrap();
    }

    #[test]
    fn b2c_metadata_retains_invalid_vat_number_for_support() {
        let mut cmd = place_cmd();
        cmd.customer_country = "DE".parse().unwrap();
        cmd.tax = TaxDecision {
            vat_rate: dec("0.19"),
            mode: TaxMode::OssB2c,
            vat_number: Some("DE123456789".into()),
            validation: Some(ValidationOutcome::Invalid),
        };
        let order = Order::place(cmd).unwrap();
        assert_eq!(order.tax.vat_number(), Some("DE123456789"));
    }

    #[test]
    fn verify_catches_tampered_totals() {
        let mut order = Order::place(place_cmd()).unwrap();
        order.totals.total_inc_vat += 1;
        assert!(matches!(
            order.totals.verify(),
            Err(DomainError::InvariantViolation(_))
        ));
    }
}
