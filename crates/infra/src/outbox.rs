//! Durable bookkeeping outbox.
//!
//! Entries are keyed unique on `(entity_type, entity_id, kind)`, so each
//! financial fact can be queued at most once; a conflicting enqueue reports
//! `AlreadyQueued` rather than failing. Hand-out to the consumer is a single
//! atomic claim (`UPDATE ... FOR UPDATE SKIP LOCKED ... RETURNING`) that
//! flips rows to `sent`, so two concurrent polls never share a batch.

use chrono::{DateTime, Utc};
use core::str::FromStr;
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};
use tracing::instrument;

use storefront_bookkeeping::VoucherKind;
use storefront_core::{DomainError, SyncPayloadId};

use crate::error::{corrupt_row, is_unique_violation, map_sqlx_error, StoreError};

/// Delivery state of an outbox entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncStatus {
    Queued,
    Sent,
    Acked,
    Error,
}

impl SyncStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SyncStatus::Queued => "queued",
            SyncStatus::Sent => "sent",
            SyncStatus::Acked => "acked",
            SyncStatus::Error => "error",
        }
    }
}

impl FromStr for SyncStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "queued" => Ok(SyncStatus::Queued),
            "sent" => Ok(SyncStatus::Sent),
            "acked" => Ok(SyncStatus::Acked),
            "error" => Ok(SyncStatus::Error),
            other => Err(DomainError::validation(format!(
                "unknown sync status: {other:?}"
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnqueueResult {
    Queued,
    AlreadyQueued,
}

#[derive(Debug, Clone)]
pub struct NewOutboxEntry {
    pub id: SyncPayloadId,
    pub entity_type: String,
    pub entity_id: String,
    pub kind: VoucherKind,
    /// Serialized voucher, exactly as the consumer will receive it.
    pub payload: serde_json::Value,
}

#[derive(Debug, Clone)]
pub struct OutboxEntry {
    pub id: SyncPayloadId,
    pub entity_type: String,
    pub entity_id: String,
    pub kind: VoucherKind,
    pub payload: serde_json::Value,
    pub status: SyncStatus,
    pub attempts: i32,
    pub voucher_id: Option<String>,
    pub last_error: Option<String>,
    pub queued_at: DateTime<Utc>,
    pub sent_at: Option<DateTime<Utc>>,
    pub acked_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone)]
pub struct OutboxStore {
    pool: PgPool,
}

impl OutboxStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    #[instrument(
        skip(self, entry),
        fields(entity_type = %entry.entity_type, entity_id = %entry.entity_id, kind = entry.kind.as_str()),
        err
    )]
    pub async fn enqueue(&self, entry: &NewOutboxEntry) -> Result<EnqueueResult, StoreError> {
        let result = sqlx::query(
            r#"
            INSERT INTO fu_sync_outbox (id, entity_type, entity_id, kind, payload, status)
            VALUES ($1, $2, $3, $4, $5, 'queued')
            "#,
        )
        .bind(entry.id.as_uuid())
        .bind(&entry.entity_type)
        .bind(&entry.entity_id)
        .bind(entry.kind.as_str())
        .bind(&entry.payload)
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => Ok(EnqueueResult::Queued),
            Err(e) if is_unique_violation(&e) => Ok(EnqueueResult::AlreadyQueued),
            Err(e) => Err(map_sqlx_error("enqueue_sync_payload", e)),
        }
    }

    /// Claims up to `limit` queued entries and flips them to `sent` in the
    /// same statement. `SKIP LOCKED` keeps concurrent consumers from
    /// blocking on (or double-claiming) the same rows.
    #[instrument(skip(self), err)]
    pub async fn claim_batch(
        &self,
        limit: i64,
        now: DateTime<Utc>,
    ) -> Result<Vec<OutboxEntry>, StoreError> {
        let rows = sqlx::query(
            r#"
            UPDATE fu_sync_outbox
            SET status = 'sent', sent_at = $2, attempts = attempts + 1
            WHERE id IN (
                SELECT id FROM fu_sync_outbox
                WHERE status = 'queued'
                ORDER BY queued_at ASC
                LIMIT $1
                FOR UPDATE SKIP LOCKED
            )
            RETURNING *
            "#,
        )
        .bind(limit)
        .bind(now)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("claim_sync_batch", e))?;

        rows.iter().map(decode_entry).collect()
    }

    /// Success acknowledgment from the consumer. Only `sent` entries can be
    /// acked; anything else means a stale or duplicate callback and returns
    /// `None`.
    #[instrument(skip(self), fields(payload_id = %id), err)]
    pub async fn ack(
        &self,
        id: SyncPayloadId,
        voucher_id: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<OutboxEntry>, StoreError> {
        let row = sqlx::query(
            r#"
            UPDATE fu_sync_outbox
            SET status = 'acked', voucher_id = $2, acked_at = $3
            WHERE id = $1 AND status = 'sent'
            RETURNING *
            "#,
        )
        .bind(id.as_uuid())
        .bind(voucher_id)
        .bind(now)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("ack_sync_payload", e))?;

        row.as_ref().map(decode_entry).transpose()
    }

    /// Failure acknowledgment. The entry parks in `error` with the message,
    /// inspectable and re-queueable by an operator.
    #[instrument(skip(self), fields(payload_id = %id), err)]
    pub async fn fail(
        &self,
        id: SyncPayloadId,
        message: &str,
    ) -> Result<Option<OutboxEntry>, StoreError> {
        let row = sqlx::query(
            r#"
            UPDATE fu_sync_outbox
            SET status = 'error', last_error = $2
            WHERE id = $1 AND status = 'sent'
            RETURNING *
            "#,
        )
        .bind(id.as_uuid())
        .bind(message)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("fail_sync_payload", e))?;

        row.as_ref().map(decode_entry).transpose()
    }

    /// Resets an `error` entry back to `queued`, clearing the assigned
    /// voucher id and the error message.
    #[instrument(skip(self), fields(payload_id = %id), err)]
    pub async fn requeue(&self, id: SyncPayloadId) -> Result<bool, StoreError> {
        let result = sqlx::query(
            r#"
            UPDATE fu_sync_outbox
            SET status = 'queued', voucher_id = NULL, last_error = NULL,
                sent_at = NULL, acked_at = NULL
            WHERE id = $1 AND status = 'error'
            "#,
        )
        .bind(id.as_uuid())
        .execute(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("requeue_sync_payload", e))?;
        Ok(result.rows_affected() > 0)
    }

    /// Re-queues every `error` entry for one entity. Used by the admin
    /// retry-sync operation alongside an idempotent re-enqueue.
    #[instrument(skip(self), err)]
    pub async fn requeue_entity(
        &self,
        entity_type: &str,
        entity_id: &str,
    ) -> Result<u64, StoreError> {
        let result = sqlx::query(
            r#"
            UPDATE fu_sync_outbox
            SET status = 'queued', voucher_id = NULL, last_error = NULL,
                sent_at = NULL, acked_at = NULL
            WHERE entity_type = $1 AND entity_id = $2 AND status = 'error'
            "#,
        )
        .bind(entity_type)
        .bind(entity_id)
        .execute(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("requeue_sync_entity", e))?;
        Ok(result.rows_affected())
    }
}

fn decode_entry(row: &PgRow) -> Result<OutboxEntry, StoreError> {
    const OP: &str = "decode_sync_payload";
    let id: uuid::Uuid = row.try_get("id").map_err(|e| corrupt_row(OP, e.to_string()))?;
    let kind: VoucherKind = row
        .try_get::<String, _>("kind")
        .map_err(|e| corrupt_row(OP, e.to_string()))?
        .parse()
        .map_err(|e: DomainError| corrupt_row(OP, e.to_string()))?;
    let status: SyncStatus = row
        .try_get::<String, _>("status")
        .map_err(|e| corrupt_row(OP, e.to_string()))?
        .parse()
        .map_err(|e: DomainError| corrupt_row(OP, e.to_string()))?;
    Ok(OutboxEntry {
        id: SyncPayloadId::from_uuid(id),
        entity_type: row
            .try_get("entity_type")
            .map_err(|e| corrupt_row(OP, e.to_string()))?,
        entity_id: row
            .try_get("entity_id")
            .map_err(|e| corrupt_row(OP, e.to_string()))?,
        kind,
        payload: row
            .try_get("payload")
            .map_err(|e| corrupt_row(OP, e.to_string()))?,
        status,
        attempts: row
            .try_get("attempts")
            .map_err(|e| corrupt_row(OP, e.to_string()))?,
        voucher_id: row
            .try_get("voucher_id")
            .map_err(|e| corrupt_row(OP, e.to_string()))?,
        last_error: row
            .try_get("last_error")
            .map_err(|e| corrupt_row(OP, e.to_string()))?,
        queued_at: row
            .try_get("queued_at")
            .map_err(|e| corrupt_row(OP, e.to_string()))?,
        sent_at: row
            .try_get("sent_at")
            .map_err(|e| corrupt_row(OP, e.to_string()))?,
        acked_at: row
            .try_get("acked_at")
            .map_err(|e| corrupt_row(OP, e.to_string()))?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sync_status_round_trips_wire_names() {
        for status in [
            SyncStatus::Queued,
            SyncStatus::Sent,
            SyncStatus::Acked,
            SyncStatus::Error,
        ] {
            assert_eq!(status.as_str().parse::<SyncStatus>().unwrap(), status);
        }
        assert!("pending".parse::<SyncStatus>().is_err());
    }
}
