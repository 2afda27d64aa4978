//! Service wiring and the orchestration seams between payment
//! confirmations, the order state machine, and the bookkeeping outbox.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use sqlx::PgPool;

use storefront_bookkeeping::{
    payout_voucher, refund_voucher, sale_voucher, PayoutSettlement, VoucherKind,
};
use storefront_core::{DomainError, OrderId, PaymentEventId, SyncPayloadId};
use storefront_infra::{
    EnqueueResult, NewOutboxEntry, NewPaymentEvent, OrderStore, OutboxStore, PaymentEventLedger,
    StoreError, TransitionResult,
};
use storefront_orders::{Order, OrderStatus, PaymentProvider};
use storefront_payments::klarna::{KlarnaClient, ProviderStatusSource};
use storefront_payments::CanonicalStatus;
use storefront_shipping::{ShippingError, TierCache, TierTable};
use storefront_tax::{TaxContext, VatValidator, ViesClient};

use crate::config::Config;

const TIER_CACHE_TTL_MINUTES: i64 = 10;

#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error(transparent)]
    Domain(#[from] DomainError),
    #[error(transparent)]
    Store(#[from] StoreError),
}

pub struct AppServices {
    pub orders: OrderStore,
    pub ledger: PaymentEventLedger,
    pub outbox: OutboxStore,
    pub tax: TaxContext,
    pub validator: Arc<dyn VatValidator>,
    pub klarna: Arc<dyn ProviderStatusSource>,
    tiers: TierCache,
    config: Config,
}

pub fn build_services(config: Config, pool: PgPool) -> anyhow::Result<AppServices> {
    let tax = TaxContext {
        home_country: config.home_country,
        home_rate: config.home_vat_rate,
        validate_vat_ids: config.validate_vat_ids,
    };
    let klarna = KlarnaClient::new(
        config.klarna_base_url.clone(),
        config.klarna_username.clone(),
        config.klarna_password.clone(),
    )
    .map_err(|e| anyhow::anyhow!("klarna client: {e}"))?;

    Ok(AppServices {
        orders: OrderStore::new(pool.clone()),
        ledger: PaymentEventLedger::new(pool.clone()),
        outbox: OutboxStore::new(pool),
        tax,
        validator: Arc::new(ViesClient::new(config.vies_base_url.clone())),
        klarna: Arc::new(klarna),
        tiers: TierCache::new(Duration::minutes(TIER_CACHE_TTL_MINUTES)),
        config,
    })
}

impl AppServices {
    pub fn stripe_webhook_secret(&self) -> &str {
        &self.config.stripe_webhook_secret
    }

    /// Current shipping tier table, cached with a TTL. A table that parses
    /// to no usable rows is a configuration failure.
    pub fn shipping_table(&self) -> Result<TierTable, ShippingError> {
        self.tiers
            .get(|| TierTable::from_json(&self.config.shipping_tiers))
    }

    /// Applies a guarded status transition and, when an order newly reaches
    /// `paid` or `refunded`, queues the matching voucher.
    ///
    /// Voucher queuing failures are logged and swallowed: the transition is
    /// already durable, the caller must still see success, and the admin
    /// retry-sync operation re-drives a missed insert.
    pub async fn transition_with_bookkeeping(
        &self,
        id: OrderId,
        target: OrderStatus,
        now: DateTime<Utc>,
    ) -> Result<TransitionResult, ServiceError> {
        let result = self.orders.transition(id, target, now).await?;
        if result == TransitionResult::NotApplied {
            tracing::info!(order_id = %id, target = target.as_str(), "transition not applied, late or duplicate event");
            return Ok(result);
        }

        let kind = match target {
            OrderStatus::Paid => Some(VoucherKind::Sale),
            OrderStatus::Refunded => Some(VoucherKind::Refund),
            _ => None,
        };
        if let Some(kind) = kind {
            if let Err(e) = self.enqueue_order_voucher(id, kind, now).await {
                tracing::warn!(order_id = %id, kind = kind.as_str(), error = %e, "voucher enqueue deferred");
            }
        }
        Ok(result)
    }

    /// Builds the sale or refund voucher for an order and queues it. A
    /// conflicting enqueue means the fact is already queued, which is a
    /// non-fatal outcome.
    pub async fn enqueue_order_voucher(
        &self,
        id: OrderId,
        kind: VoucherKind,
        now: DateTime<Utc>,
    ) -> Result<EnqueueResult, ServiceError> {
        let order = self
            .orders
            .get(id)
            .await?
            .ok_or_else(DomainError::not_found)?;
        let voucher = match kind {
            VoucherKind::Sale => sale_voucher(&order, now.date_naive())?,
            VoucherKind::Refund => refund_voucher(&order, now.date_naive())?,
            VoucherKind::Payout => {
                return Err(DomainError::validation("payout vouchers are not order-scoped").into())
            }
        };
        let payload = serde_json::to_value(&voucher)
            .map_err(|e| DomainError::invariant(format!("voucher serialization: {e}")))?;
        let entry = NewOutboxEntry {
            id: SyncPayloadId::new(),
            entity_type: "order".to_string(),
            entity_id: order.id.to_string(),
            kind,
            payload,
        };
        let outcome = self.outbox.enqueue(&entry).await?;
        if outcome == EnqueueResult::AlreadyQueued {
            tracing::info!(order_id = %id, kind = kind.as_str(), "voucher already queued");
        }
        Ok(outcome)
    }

    /// Queues the reconciliation voucher for a settled payout batch.
    pub async fn enqueue_payout_voucher(
        &self,
        settlement: &PayoutSettlement,
    ) -> Result<EnqueueResult, ServiceError> {
        let voucher = payout_voucher(settlement)?;
        let payload = serde_json::to_value(&voucher)
            .map_err(|e| DomainError::invariant(format!("voucher serialization: {e}")))?;
        let entry = NewOutboxEntry {
            id: SyncPayloadId::new(),
            entity_type: "payout".to_string(),
            entity_id: settlement.reference.clone(),
            kind: VoucherKind::Payout,
            payload,
        };
        Ok(self.outbox.enqueue(&entry).await?)
    }

    /// Pull-based settlement check against the provider.
    ///
    /// An already-terminal order short-circuits without a provider call.
    /// Otherwise the provider's answer is recorded in the ledger (keyed by
    /// reference + observed status, so repeated polls of the same answer
    /// dedupe) before driving the guarded transition.
    pub async fn verify_with_provider(
        &self,
        order: &Order,
        now: DateTime<Utc>,
    ) -> Result<OrderStatus, ServiceError> {
        if order.status.is_terminal() {
            return Ok(order.status);
        }
        let Some(reference) = order.provider_reference.as_deref() else {
            return Ok(order.status);
        };
        if order.provider != Some(PaymentProvider::Klarna) {
            // Push providers settle via webhook; nothing to poll.
            return Ok(order.status);
        }

        let canonical = self.klarna.order_status(reference).await?;

        let event = NewPaymentEvent {
            id: PaymentEventId::new(),
            provider: PaymentProvider::Klarna,
            external_event_id: format!("{reference}:{}", canonical.as_str()),
            event_type: format!("pull.{}", canonical.as_str()),
            order_id: Some(order.id),
            payload: serde_json::json!({
                "provider_reference": reference,
                "observed_status": canonical.as_str(),
            }),
        };
        self.ledger.record(&event).await?;

        let target = match canonical {
            CanonicalStatus::Paid => Some(OrderStatus::Paid),
            CanonicalStatus::Cancelled => Some(OrderStatus::Cancelled),
            CanonicalStatus::Unknown => None,
        };
        if let Some(target) = target {
            self.transition_with_bookkeeping(order.id, target, now)
                .await?;
        }

        let refreshed = self
            .orders
            .get(order.id)
            .await?
            .ok_or_else(DomainError::not_found)?;
        Ok(refreshed.status)
    }
}
