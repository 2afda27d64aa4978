//! The VAT treatment decision ladder.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use storefront_core::{money, CountryCode};

use crate::validator::{ValidationOutcome, VatValidator};
use crate::vat_id::normalize_vat_id;

/// How an order is taxed.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaxMode {
    /// Customer in the home country: home rate.
    Domestic,
    /// Customer outside the trade bloc: zero-rated export.
    Export,
    /// Verified intra-bloc business buyer: liability shifts, 0% here.
    ReverseCharge,
    /// Intra-bloc consumer sale: destination country's standard rate.
    OssB2c,
}

impl TaxMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaxMode::Domestic => "domestic",
            TaxMode::Export => "export",
            TaxMode::ReverseCharge => "reverse_charge",
            TaxMode::OssB2c => "oss_b2c",
        }
    }
}

/// Seller-side configuration for tax decisions.
#[derive(Debug, Clone)]
pub struct TaxContext {
    pub home_country: CountryCode,
    /// Home standard rate as a fraction (e.g. 0.25).
    pub home_rate: Decimal,
    /// Whether to call the external validation service for VAT-ids.
    pub validate_vat_ids: bool,
}

/// The derived VAT treatment for one order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaxDecision {
    pub vat_rate: Decimal,
    pub mode: TaxMode,
    /// Normalized VAT-id, retained even when validation said invalid so
    /// support can see what the customer claimed.
    pub vat_number: Option<String>,
    pub validation: Option<ValidationOutcome>,
}

/// Derive the VAT treatment for a customer country and optional VAT-id.
///
/// The ladder:
/// 1. home country -> domestic at the home rate
/// 2. outside the bloc -> export at 0
/// 3. intra-bloc without a usable VAT-id -> OSS B2C at the destination rate
/// 4. intra-bloc with a VAT-id -> validate; valid -> reverse charge at 0,
///    invalid or unavailable -> OSS B2C at the destination rate
///
/// Never errors: validation-service trouble is folded into a conservative
/// B2C treatment and must not abort order creation.
pub async fn decide(
    ctx: &TaxContext,
    customer_country: CountryCode,
    vat_id: Option<&str>,
    validator: &dyn VatValidator,
) -> TaxDecision {
    if customer_country == ctx.home_country {
        return TaxDecision {
            vat_rate: money::normalize_rate(ctx.home_rate),
            mode: TaxMode::Domestic,
            vat_number: None,
            validation: None,
        };
    }

    if !customer_country.is_eu() {
        return TaxDecision {
            vat_rate: Decimal::ZERO,
            mode: TaxMode::Export,
            vat_number: None,
            validation: None,
        };
    }

    // Destination standard rate, falling back to the home rate for codes
    // the table does not know.
    let standard_rate = money::normalize_rate(
        customer_country
            .standard_vat_rate()
            .unwrap_or(ctx.home_rate),
    );

    let normalized = vat_id.and_then(|raw| normalize_vat_id(raw, customer_country));

    let Some(vat_number) = normalized else {
        return TaxDecision {
            vat_rate: standard_rate,
            mode: TaxMode::OssB2c,
            vat_number: None,
            validation: None,
        };
    };

    if !ctx.validate_vat_ids {
        // Validation disabled: an unverified claim is still a claim.
        return TaxDecision {
            vat_rate: standard_rate,
            mode: TaxMode::OssB2c,
            vat_number: Some(vat_number),
            validation: None,
        };
    }

    match validator.validate(customer_country, &vat_number).await {
        ValidationOutcome::Valid => TaxDecision {
            vat_rate: Decimal::ZERO,
            mode: TaxMode::ReverseCharge,
            vat_number: Some(vat_number),
            validation: Some(ValidationOutcome::Valid),
        },
        outcome => {
            // Invalid or unavailable: charge VAT at the standard rate.
            // An unverifiable claim is never zero-rated.
            TaxDecision {
                vat_rate: standard_rate,
                mode: TaxMode::OssB2c,
                vat_number: Some(vat_number),
                validation: Some(outcome),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;

    struct FixedValidator(ValidationOutcome);

    #[async_trait]
    impl VatValidator for FixedValidator {
        async fn validate(&self, _country: CountryCode, _vat_number: &str) -> ValidationOutcome {
            self.0
        }
    }

    fn ctx() -> TaxContext {
        TaxContext {
            home_country: "SE".parse().unwrap(),
            home_rate: "0.25".parse().unwrap(),
            validate_vat_ids: true,
        }
    }

    fn cc(s: &str) -> CountryCode {
        s.parse().unwrap()
    }

    #[tokio::test]
    async fn domestic_customer_gets_home_rate() {
        let d = decide(&ctx(), cc("SE"), None, &FixedValidator(ValidationOutcome::Valid)).await;
        assert_eq!(d.mode, TaxMode::Domestic);
        assert_eq!(d.vat_rate, "0.25".parse().unwrap());
        assert_eq!(d.vat_number, None);
    }

    #[tokio::test]
    async fn non_bloc_customer_is_zero_rated_export() {
        let d = decide(&ctx(), cc("US"), Some("12-3456789"), &FixedValidator(ValidationOutcome::Valid)).await;
        assert_eq!(d.mode, TaxMode::Export);
        assert_eq!(d.vat_rate, Decimal::ZERO);
    }

    #[tokio::test]
    async fn bloc_consumer_without_vat_id_pays_destination_rate() {
        let d = decide(&ctx(), cc("DE"), None, &FixedValidator(ValidationOutcome::Valid)).await;
        assert_eq!(d.mode, TaxMode::OssB2c);
        assert_eq!(d.vat_rate, "0.19".parse::<Decimal>().unwrap());
    }

    #[tokio::test]
    async fn valid_vat_id_reverse_charges() {
        let d = decide(
            &ctx(),
            cc("DE"),
            Some("DE 1234567 89"),
            &FixedValidator(ValidationOutcome::Valid),
        )
        .await;
        assert_eq!(d.mode, TaxMode::ReverseCharge);
        assert_eq!(d.vat_rate, Decimal::ZERO);
        assert_eq!(d.vat_number.as_deref(), Some("DE123456789"));
        assert_eq!(d.validation, Some(ValidationOutcome::Valid));
    }

    #[tokio::test]
    async fn invalid_vat_id_falls_back_to_b2c_and_keeps_the_number() {
        let d = decide(
            &ctx(),
            cc("DE"),
            Some("DE123456789"),
            &FixedValidator(ValidationOutcome::Invalid),
        )
        .await;
        assert_eq!(d.mode, TaxMode::OssB2c);
        assert_eq!(d.vat_rate, "0.19".parse::<Decimal>().unwrap());
        assert_eq!(d.vat_number.as_deref(), Some("DE123456789"));
        assert_eq!(d.validation, Some(ValidationOutcome::Invalid));
    }

    #[tokio::test]
    async fn unavailable_validator_charges_vat_never_zero_rates() {
        let d = decide(
            &ctx(),
            cc("DK"),
            Some("DK12345678"),
            &FixedValidator(ValidationOutcome::Unavailable),
        )
        .await;
        assert_eq!(d.mode, TaxMode::OssB2c);
        assert_eq!(d.vat_rate, "0.25".parse::<Decimal>().unwrap());
        assert_eq!(d.validation, Some(ValidationOutcome::Unavailable));
    }

    #[tokio::test]
    async fn malformed_vat_id_is_treated_as_absent() {
        let d = decide(&ctx(), cc("FI"), Some("---"), &FixedValidator(ValidationOutcome::Valid)).await;
        assert_eq!(d.mode, TaxMode::OssB2c);
        assert_eq!(d.vat_number, None);
        assert_eq!(d.validation, None);
    }
}
