//! Country and currency codes, plus the EU VAT reference data the tax
//! engine needs: bloc membership and standard rates per destination.

use core::str::FromStr;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::DomainError;

/// ISO 3166-1 alpha-2 country code, uppercase.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CountryCode([u8; 2]);

impl CountryCode {
    pub fn as_str(&self) -> &str {
        // Validated as ASCII uppercase at construction.
        core::str::from_utf8(&self.0).unwrap_or("??")
    }

    /// Whether this country belongs to the EU VAT area.
    pub fn is_eu(&self) -> bool {
        EU_STANDARD_RATES.iter().any(|(cc, _)| *cc == self.as_str())
    }

    /// Standard VAT rate for an EU destination country, as a fraction.
    ///
    /// `None` for countries outside the bloc (or unknown codes).
    pub fn standard_vat_rate(&self) -> Option<Decimal> {
        EU_STANDARD_RATES
            .iter()
            .find(|(cc, _)| *cc == self.as_str())
            .map(|(_, pct)| Decimal::new(*pct as i64, 3))
    }
}

impl FromStr for CountryCode {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bytes = s.as_bytes();
        if bytes.len() != 2 || !bytes.iter().all(|b| b.is_ascii_alphabetic()) {
            return Err(DomainError::validation(format!(
                "invalid country code: {s:?}"
            )));
        }
        Ok(Self([
            bytes[0].to_ascii_uppercase(),
            bytes[1].to_ascii_uppercase(),
        ]))
    }
}

impl core::fmt::Display for CountryCode {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// ISO 4217 currency code, uppercase. Pass-through only; no conversion.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CurrencyCode(String);

impl CurrencyCode {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl FromStr for CurrencyCode {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.len() != 3 || !s.bytes().all(|b| b.is_ascii_alphabetic()) {
            return Err(DomainError::validation(format!(
                "invalid currency code: {s:?}"
            )));
        }
        Ok(Self(s.to_ascii_uppercase()))
    }
}

impl core::fmt::Display for CurrencyCode {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Standard VAT rates per EU member state, in tenths of a percent
/// (250 = 25.0%). Membership in this table defines the trade bloc.
const EU_STANDARD_RATES: &[(&str, u16)] = &[
    ("AT", 200),
    ("BE", 210),
    ("BG", 200),
    ("CY", 190),
    ("CZ", 210),
    ("DE", 190),
    ("DK", 250),
    ("EE", 220),
    ("ES", 210),
    ("FI", 255),
    ("FR", 200),
    ("GR", 240),
    ("HR", 250),
    ("HU", 270),
    ("IE", 230),
    ("IT", 220),
    ("LT", 210),
    ("LU", 170),
    ("LV", 210),
    ("MT", 180),
    ("NL", 210),
    ("PL", 230),
    ("PT", 230),
    ("RO", 190),
    ("SE", 250),
    ("SI", 220),
    ("SK", 230),
];
