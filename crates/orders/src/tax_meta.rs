//! Tax metadata stored on the order.
//!
//! A tagged variant rather than free-form JSON, so the exact treatment an
//! order received round-trips through persistence.

use serde::{Deserialize, Serialize};

use storefront_tax::{TaxDecision, TaxMode, ValidationOutcome};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum TaxMeta {
    Domestic,
    Export,
    ReverseCharge {
        vat_number: String,
    },
    OssB2c {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        vat_number: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        validation: Option<ValidationOutcome>,
    },
}

impl TaxMeta {
    pub fn mode(&self) -> TaxMode {
        match self {
            TaxMeta::Domestic => TaxMode::Domestic,
            TaxMeta::Export => TaxMode::Export,
            TaxMeta::ReverseCharge { .. } => TaxMode::ReverseCharge,
            TaxMeta::OssB2c { .. } => TaxMode::OssB2c,
        }
    }

    pub fn vat_number(&self) -> Option<&str> {
        match self {
            TaxMeta::ReverseCharge { vat_number } => Some(vat_number),
            TaxMeta::OssB2c { vat_number, .. } => vat_number.as_deref(),
            _ => None,
        }
    }
}

impl From<&TaxDecision> for TaxMeta {
    fn from(decision: &TaxDecision) -> Self {
        match decision.mode {
            TaxMode::Domestic => TaxMeta::Domestic,
            TaxMode::Export => TaxMeta::Export,
            TaxMode::ReverseCharge => TaxMeta::ReverseCharge {
                vat_number: decision.vat_number.clone().unwrap_or_default(),
            },
            TaxMode::OssB2c => TaxMeta::OssB2c {
                vat_number: decision.vat_number.clone(),
                validation: decision.validation,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serializes_with_mode_tag() {
        let meta = TaxMeta::ReverseCharge {
            vat_number: "DE123456789".into(),
        };
        let json = serde_json::to_value(&meta).unwrap();
        assert_eq!(json["mode"], "reverse_charge");
        assert_eq!(json["vat_number"], "DE123456789");
    }

    #[test]
    fn b2c_round_trips_with_optional_fields() {
        let meta = TaxMeta::OssB2c {
            vat_number: Some("DE123456789".into()),
            validation: Some(ValidationOutcome::Invalid),
        };
        let json = serde_json::to_string(&meta).unwrap();
        let back: TaxMeta = serde_json::from_str(&json).unwrap();
        assert_eq!(back, meta);

        let bare: TaxMeta = serde_json::from_str(r#"{"mode":"oss_b2c"}"#).unwrap();
        assert_eq!(
            bare,
            TaxMeta::OssB2c {
                vat_number: None,
                validation: None
            }
        );
    }
}
