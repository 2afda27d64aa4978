//! Klarna order-status polling.
//!
//! Klarna does not push events; confirmation happens by reading the order
//! back from their order-management API when the shopper returns, or when an
//! operator triggers a re-check. The provider's status vocabulary collapses
//! to [`CanonicalStatus`]: anything authorized or captured counts as paid,
//! anything cancelled, expired or rejected counts as cancelled, and the rest
//! stays unknown so the order keeps waiting.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use storefront_core::{DomainError, DomainResult};

use crate::CanonicalStatus;

const DEFAULT_TIMEOUT: Duration = Duration::from_millis(6_000);

/// Read side of a pull-based payment provider.
#[async_trait]
pub trait ProviderStatusSource: Send + Sync {
    /// Looks up the provider's current status for one of our orders, by the
    /// provider's own reference.
    async fn order_status(&self, provider_reference: &str) -> DomainResult<CanonicalStatus>;
}

pub fn map_klarna_status(status: &str) -> CanonicalStatus {
    match status {
        "AUTHORIZED" | "CAPTURED" | "PART_CAPTURED" => CanonicalStatus::Paid,
        "CANCELLED" | "EXPIRED" | "REJECTED" => CanonicalStatus::Cancelled,
        _ => CanonicalStatus::Unknown,
    }
}

#[derive(Debug, Deserialize)]
struct KlarnaOrder {
    status: String,
}

pub struct KlarnaClient {
    http: reqwest::Client,
    base_url: String,
    username: String,
    password: String,
}

impl KlarnaClient {
    pub fn new(base_url: String, username: String, password: String) -> DomainResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(DEFAULT_TIMEOUT)
            .build()
            .map_err(|e| DomainError::external_unavailable(format!("http client: {e}")))?;
        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            username,
            password,
        })
    }
}

#[async_trait]
impl ProviderStatusSource for KlarnaClient {
    #[tracing::instrument(skip(self))]
    async fn order_status(&self, provider_reference: &str) -> DomainResult<CanonicalStatus> {
        let url = format!(
            "{}/ordermanagement/v1/orders/{}",
            self.base_url, provider_reference
        );
        let response = self
            .http
            .get(&url)
            .basic_auth(&self.username, Some(&self.password))
            .send()
            .await
            .map_err(|e| {
                tracing::warn!(error = %e, "klarna status lookup failed");
                DomainError::external_unavailable("klarna unreachable")
            })?;
        if !response.status().is_success() {
            tracing::warn!(status = %response.status(), "klarna status lookup rejected");
            return Err(DomainError::external_unavailable(format!(
                "klarna returned {}",
                response.status()
            )));
        }
        let order: KlarnaOrder = response
            .json()
            .await
            .map_err(|e| DomainError::external_unavailable(format!("klarna payload: {e}")))?;
        Ok(map_klarna_status(&order.status))
    }
}
