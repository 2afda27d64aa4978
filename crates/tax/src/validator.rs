//! External VAT-id validation.
//!
//! The validation service is slow and flaky by nature, so the client carries
//! a hard timeout and every transport failure maps to
//! [`ValidationOutcome::Unavailable`]. Callers treat `Unavailable` as "charge
//! VAT", never as "trust the claim".

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use storefront_core::CountryCode;

/// Outcome of validating a VAT-id against the external registry.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValidationOutcome {
    Valid,
    Invalid,
    Unavailable,
}

/// Capability seam for VAT-id validation.
///
/// Infallible by design: transport errors are folded into
/// [`ValidationOutcome::Unavailable`] inside the implementation so the
/// decision ladder never has to abort order creation.
#[async_trait]
pub trait VatValidator: Send + Sync {
    async fn validate(&self, country: CountryCode, vat_number: &str) -> ValidationOutcome;
}

/// Default request timeout for the validation service.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_millis(4_500);

/// VIES-style REST client.
#[derive(Debug, Clone)]
pub struct ViesClient {
    http: reqwest::Client,
    base_url: String,
}

#[derive(Debug, Deserialize)]
struct ViesResponse {
    #[serde(rename = "isValid", alias = "valid")]
    is_valid: bool,
}

impl ViesClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_timeout(base_url, DEFAULT_TIMEOUT)
    }

    pub fn with_timeout(base_url: impl Into<String>, timeout: Duration) -> Self {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_default();
        Self {
            http,
            base_url: base_url.into(),
        }
    }
}

#[async_trait]
impl VatValidator for ViesClient {
    async fn validate(&self, country: CountryCode, vat_number: &str) -> ValidationOutcome {
        // The normalized number still carries the country prefix; the
        // registry wants them split.
        let national = vat_number
            .strip_prefix(country.as_str())
            .unwrap_or(vat_number);

        let url = format!(
            "{}/check-vat-number/{}/{}",
            self.base_url.trim_end_matches('/'),
            country.as_str(),
            national
        );

        let response = match self.http.get(&url).send().await {
            Ok(r) => r,
            Err(e) => {
                tracing::warn!(country = %country, error = %e, "vat validation request failed");
                return ValidationOutcome::Unavailable;
            }
        };

        if !response.status().is_success() {
            tracing::warn!(country = %country, status = %response.status(), "vat validation service error");
            return ValidationOutcome::Unavailable;
        }

        match response.json::<ViesResponse>().await {
            Ok(body) if body.is_valid => ValidationOutcome::Valid,
            Ok(_) => ValidationOutcome::Invalid,
            Err(e) => {
                tracing::warn!(country = %country, error = %e, "vat validation response unreadable");
                ValidationOutcome::Unavailable
            }
        }
    }
}
