//! Tier table validation and tariff lookup.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use storefront_core::Cents;

/// One shipping tier: everything up to `max_grams` costs `amount`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShippingTier {
    pub max_grams: i64,
    pub amount: Cents,
    pub code: String,
}

/// How the order leaves the warehouse.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeliveryMethod {
    Ship,
    Pickup,
}

/// A priced shipping decision.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShippingQuote {
    pub amount: Cents,
    /// Tariff code of the selected tier; `None` for pickup.
    pub code: Option<String>,
}

impl ShippingQuote {
    fn pickup() -> Self {
        Self {
            amount: 0,
            code: None,
        }
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ShippingError {
    /// Weight must be a positive number of grams.
    #[error("invalid cart weight: {0}g")]
    InvalidWeight(i64),

    /// Cart exceeds the heaviest configured tier.
    #[error("cart weight {weight_grams}g exceeds heaviest tier {heaviest_code} ({heaviest_max_grams}g)")]
    Overweight {
        weight_grams: i64,
        heaviest_code: String,
        heaviest_max_grams: i64,
    },

    /// No usable tiers after validation.
    #[error("shipping tier table is empty after validation")]
    EmptyTable,

    /// Configured table is not valid JSON.
    #[error("shipping tier table is malformed: {0}")]
    Malformed(String),
}

/// Validated, ascending-sorted tier table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TierTable {
    tiers: Vec<ShippingTier>,
}

impl TierTable {
    /// Build a table from configured rows.
    ///
    /// Malformed rows (non-positive max, negative amount, empty code) are
    /// discarded; an empty result is a configuration failure.
    pub fn new(rows: impl IntoIterator<Item = ShippingTier>) -> Result<Self, ShippingError> {
        let mut tiers: Vec<ShippingTier> = rows
            .into_iter()
            .filter(|t| t.max_grams > 0 && t.amount >= 0 && !t.code.trim().is_empty())
            .collect();

        if tiers.is_empty() {
            return Err(ShippingError::EmptyTable);
        }

        tiers.sort_by_key(|t| t.max_grams);
        Ok(Self { tiers })
    }

    /// Parse and validate a JSON-encoded table (the configuration format).
    ///
    /// A parse failure is reported as such, distinct from a table that parses
    /// but validates down to nothing.
    pub fn from_json(raw: &str) -> Result<Self, ShippingError> {
        let rows: Vec<ShippingTier> =
            serde_json::from_str(raw).map_err(|e| ShippingError::Malformed(e.to_string()))?;
        Self::new(rows)
    }

    pub fn tiers(&self) -> &[ShippingTier] {
        &self.tiers
    }

    /// Smallest tier that still covers `weight_grams` (boundary inclusive).
    fn select(&self, weight_grams: i64) -> Result<&ShippingTier, ShippingError> {
        self.tiers
            .iter()
            .find(|t| t.max_grams >= weight_grams)
            .ok_or_else(|| {
                // Table is non-empty by construction.
                let heaviest = self.tiers.last().expect("validated table is non-empty");
                ShippingError::Overweight {
                    weight_grams,
                    heaviest_code: heaviest.code.clone(),
                    heaviest_max_grams: heaviest.max_grams,
                }
            })
    }
}

/// Price shipping for a cart.
///
/// Pickup bypasses tariffing entirely and is always a zero-cost,
/// providerless quote; weight is not even validated for it.
pub fn quote(
    table: &TierTable,
    method: DeliveryMethod,
    weight_grams: i64,
) -> Result<ShippingQuote, ShippingError> {
    if method == DeliveryMethod::Pickup {
        return Ok(ShippingQuote::pickup());
    }

    if weight_grams <= 0 {
        return Err(ShippingError::InvalidWeight(weight_grams));
    }

    let tier = table.select(weight_grams)?;
    Ok(ShippingQuote {
        amount: tier.amount,
        code: Some(tier.code.clone()),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tier(max: i64, amount: i64, code: &str) -> ShippingTier {
        ShippingTier {
            max_grams: max,
            amount,
            code: code.to_string(),
        }
    }

    fn table() -> TierTable {
        // Deliberately unsorted input.
        TierTable::new(vec![
            tier(5000, 1200, "L"),
            tier(1000, 490, "S"),
            tier(2000, 790, "M"),
        ])
        .unwrap()
    }

    #[test]
    fn sorts_tiers_ascending() {
        let table = table();
        let codes: Vec<&str> = table.tiers().iter().map(|t| t.code.as_str()).collect();
        assert_eq!(codes, vec!["S", "M", "L"]);
    }

    #[test]
    fn exact_boundary_selects_that_tier_not_the_next() {
        let q = quote(&table(), DeliveryMethod::Ship, 1000).unwrap();
        assert_eq!(q.code.as_deref(), Some("S"));
        let q = quote(&table(), DeliveryMethod::Ship, 1001).unwrap();
        assert_eq!(q.code.as_deref(), Some("M"));
    }

    #[test]
    fn overweight_names_the_heaviest_tier() {
        let err = quote(&table(), DeliveryMethod::Ship, 9000).unwrap_err();
        match err {
            ShippingError::Overweight {
                heaviest_code,
                heaviest_max_grams,
                weight_grams,
            } => {
                assert_eq!(heaviest_code, "L");
                assert_eq!(heaviest_max_grams, 5000);
                assert_eq!(weight_grams, 9000);
            }
            other => panic!("expected Overweight, got {other:?}"),
        }
    }

    #[test]
    fn non_positive_weight_is_a_validation_failure() {
        assert_eq!(
            quote(&table(), DeliveryMethod::Ship, 0).unwrap_err(),
            ShippingError::InvalidWeight(0)
        );
        assert_eq!(
            quote(&table(), DeliveryMethod::Ship, -5).unwrap_err(),
            ShippingError::InvalidWeight(-5)
        );
    }

    #[test]
    fn pickup_bypasses_tariffing() {
        // Zero weight would fail for shipping, but pickup never tariffes.
        let q = quote(&table(), DeliveryMethod::Pickup, 0).unwrap();
        assert_eq!(q.amount, 0);
        assert_eq!(q.code, None);
    }

    #[test]
    fn malformed_rows_are_discarded() {
        let t = TierTable::new(vec![
            tier(0, 100, "bad-max"),
            tier(1000, -1, "bad-amount"),
            tier(1000, 100, "   "),
            tier(2000, 500, "ok"),
        ])
        .unwrap();
        assert_eq!(t.tiers().len(), 1);
        assert_eq!(t.tiers()[0].code, "ok");
    }

    #[test]
    fn all_rows_malformed_is_a_configuration_failure() {
        let err = TierTable::new(vec![tier(-1, 100, "x")]).unwrap_err();
        assert_eq!(err, ShippingError::EmptyTable);
    }

    #[test]
    fn broken_json_is_reported_as_malformed_not_empty() {
        let err = TierTable::from_json("not json").unwrap_err();
        assert!(matches!(err, ShippingError::Malformed(_)));

        // A parseable but worthless table is still the empty-table failure.
        let err = TierTable::from_json("[]").unwrap_err();
        assert_eq!(err, ShippingError::EmptyTable);

        let t = TierTable::from_json(r#"[{"max_grams":1000,"amount":490,"code":"S"}]"#).unwrap();
        assert_eq!(t.tiers().len(), 1);
    }
}
