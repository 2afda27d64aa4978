//! Voucher construction and the balance invariant.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use storefront_core::{Cents, CurrencyCode, DomainError, DomainResult, OrderId};
use storefront_orders::{Order, PaymentProvider};

use crate::accounts;

/// Which financial fact a voucher represents.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VoucherKind {
    Sale,
    Refund,
    Payout,
}

impl VoucherKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            VoucherKind::Sale => "sale",
            VoucherKind::Refund => "refund",
            VoucherKind::Payout => "payout",
        }
    }
}

impl core::str::FromStr for VoucherKind {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "sale" => Ok(VoucherKind::Sale),
            "refund" => Ok(VoucherKind::Refund),
            "payout" => Ok(VoucherKind::Payout),
            other => Err(DomainError::validation(format!(
                "unknown voucher kind: {other:?}"
            ))),
        }
    }
}

/// One side of a voucher. Exactly one of `debit`/`credit` is non-zero.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoucherLine {
    pub account: u32,
    pub debit: Cents,
    pub credit: Cents,
    pub text: String,
}

impl VoucherLine {
    pub fn debit(account: u32, amount: Cents, text: impl Into<String>) -> Self {
        Self {
            account,
            debit: amount,
            credit: 0,
            text: text.into(),
        }
    }

    pub fn credit(account: u32, amount: Cents, text: impl Into<String>) -> Self {
        Self {
            account,
            debit: 0,
            credit: amount,
            text: text.into(),
        }
    }

    /// Swap sides (used for refunds).
    fn flipped(mut self) -> Self {
        core::mem::swap(&mut self.debit, &mut self.credit);
        self
    }
}

/// A balanced debit/credit entry for one financial fact.
///
/// Field names match the export payload schema.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Voucher {
    pub kind: VoucherKind,
    pub order_id: Option<OrderId>,
    pub currency: CurrencyCode,
    pub date: NaiveDate,
    pub lines: Vec<VoucherLine>,
    pub meta: serde_json::Value,
}

impl Voucher {
    /// Validate and construct a voucher.
    ///
    /// Zero-amount lines are dropped; each remaining line must carry
    /// exactly one positive side; debits must equal credits.
    pub fn new(
        kind: VoucherKind,
        order_id: Option<OrderId>,
        currency: CurrencyCode,
        date: NaiveDate,
        lines: Vec<VoucherLine>,
        meta: serde_json::Value,
    ) -> DomainResult<Self> {
        let lines: Vec<VoucherLine> = lines
            .into_iter()
            .filter(|l| !(l.debit == 0 && l.credit == 0))
            .collect();

        if lines.is_empty() {
            return Err(DomainError::validation("voucher must have lines"));
        }

        let mut debit_total: i128 = 0;
        let mut credit_total: i128 = 0;

        for line in &lines {
            if line.debit < 0 || line.credit < 0 {
                return Err(DomainError::validation("voucher amounts must be positive"));
            }
            if line.debit > 0 && line.credit > 0 {
                return Err(DomainError::validation(
                    "voucher line must be debit or credit, not both",
                ));
            }
            debit_total += line.debit as i128;
            credit_total += line.credit as i128;
        }

        if debit_total != credit_total {
            return Err(DomainError::invariant(format!(
                "voucher does not balance: debit {debit_total} != credit {credit_total}"
            )));
        }

        Ok(Self {
            kind,
            order_id,
            currency,
            date,
            lines,
            meta,
        })
    }

    pub fn debit_total(&self) -> i128 {
        self.lines.iter().map(|l| l.debit as i128).sum()
    }

    pub fn credit_total(&self) -> i128 {
        self.lines.iter().map(|l| l.credit as i128).sum()
    }
}

/// A settled provider payout batch: gross collected, fee retained, net
/// deposited to the bank.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PayoutSettlement {
    pub provider: PaymentProvider,
    pub reference: String,
    pub currency: CurrencyCode,
    pub gross: Cents,
    pub fee: Cents,
    pub net: Cents,
    pub date: NaiveDate,
}

/// Voucher for an order that reached `paid`.
pub fn sale_voucher(order: &Order, date: NaiveDate) -> DomainResult<Voucher> {
    let lines = sale_lines(order)?;
    Voucher::new(
        VoucherKind::Sale,
        Some(order.id),
        order.currency.clone(),
        date,
        lines,
        order_meta(order),
    )
}

/// Voucher for an order that reached `refunded`: the sale entry with
/// every line sign-flipped.
pub fn refund_voucher(order: &Order, date: NaiveDate) -> DomainResult<Voucher> {
    let lines = sale_lines(order)?
        .into_iter()
        .map(VoucherLine::flipped)
        .collect();
    Voucher::new(
        VoucherKind::Refund,
        Some(order.id),
        order.currency.clone(),
        date,
        lines,
        order_meta(order),
    )
}

/// Voucher reconciling a payout settlement: net to the bank, fee to the
/// fee account, gross out of the provider clearing account.
pub fn payout_voucher(settlement: &PayoutSettlement) -> DomainResult<Voucher> {
    if settlement.gross != settlement.fee + settlement.net {
        return Err(DomainError::invariant(format!(
            "payout does not reconcile: gross {} != fee {} + net {}",
            settlement.gross, settlement.fee, settlement.net
        )));
    }

    let clearing = accounts::clearing(settlement.provider);
    let text = format!("payout {}", settlement.reference);

    Voucher::new(
        VoucherKind::Payout,
        None,
        settlement.currency.clone(),
        settlement.date,
        vec![
            VoucherLine::debit(accounts::BANK, settlement.net, text.clone()),
            VoucherLine::debit(accounts::PROVIDER_FEES, settlement.fee, text.clone()),
            VoucherLine::credit(clearing, settlement.gross, text),
        ],
        serde_json::json!({
            "provider": settlement.provider.as_str(),
            "reference": settlement.reference,
            "gross": settlement.gross,
            "fee": settlement.fee,
            "net": settlement.net,
        }),
    )
}

fn sale_lines(order: &Order) -> DomainResult<Vec<VoucherLine>> {
    let provider = order.provider.ok_or_else(|| {
        DomainError::invariant("cannot build a voucher for an order without a payment provider")
    })?;

    // Re-check before deriving financial facts from the row.
    order.totals.verify()?;

    let t = &order.totals;
    let text = format!("order {}", order.order_number);

    Ok(vec![
        VoucherLine::debit(accounts::clearing(provider), t.total_inc_vat, text.clone()),
        VoucherLine::credit(accounts::GOODS_SALES, t.subtotal_ex_vat, text.clone()),
        VoucherLine::credit(accounts::SHIPPING_REVENUE, t.shipping_ex_vat, text.clone()),
        VoucherLine::credit(accounts::VAT_OUT, t.vat_total + t.shipping_vat, text),
    ])
}

fn order_meta(order: &Order) -> serde_json::Value {
    serde_json::json!({
        "order_number": order.order_number,
        "tax_mode": order.tax.mode().as_str(),
    })
}
