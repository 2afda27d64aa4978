//! Idempotency ledger for provider events.
//!
//! One row per provider event, keyed unique on
//! `(provider, external_event_id)`, inserted before any side effect runs.
//! Rows are never updated; hitting the unique constraint is the replay
//! signal, and the caller acknowledges without reprocessing.

use sqlx::PgPool;
use tracing::instrument;

use storefront_core::{OrderId, PaymentEventId};
use storefront_orders::PaymentProvider;

use crate::error::{is_unique_violation, map_sqlx_error, StoreError};

/// Whether the insert recorded a new event or found it already present.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LedgerInsert {
    Recorded,
    Replay,
}

#[derive(Debug, Clone)]
pub struct NewPaymentEvent {
    pub id: PaymentEventId,
    pub provider: PaymentProvider,
    pub external_event_id: String,
    pub event_type: String,
    /// `None` when the event could not be linked to an order; the row is
    /// still recorded for audit.
    pub order_id: Option<OrderId>,
    pub payload: serde_json::Value,
}

#[derive(Debug, Clone)]
pub struct PaymentEventLedger {
    pool: PgPool,
}

impl PaymentEventLedger {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    #[instrument(
        skip(self, event),
        fields(provider = event.provider.as_str(), external_event_id = %event.external_event_id),
        err
    )]
    pub async fn record(&self, event: &NewPaymentEvent) -> Result<LedgerInsert, StoreError> {
        let result = sqlx::query(
            r#"
            INSERT INTO payment_events (id, provider, external_event_id, event_type, order_id, payload)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(event.id.as_uuid())
        .bind(event.provider.as_str())
        .bind(&event.external_event_id)
        .bind(&event.event_type)
        .bind(event.order_id.map(uuid::Uuid::from))
        .bind(&event.payload)
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => Ok(LedgerInsert::Recorded),
            Err(e) if is_unique_violation(&e) => Ok(LedgerInsert::Replay),
            Err(e) => Err(map_sqlx_error("record_payment_event", e)),
        }
    }
}
