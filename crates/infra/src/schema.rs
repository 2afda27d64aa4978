//! Schema bootstrap.
//!
//! Tables are created on startup with `CREATE TABLE IF NOT EXISTS`. The
//! unique constraints are load-bearing: `(provider, external_event_id)` on
//! `payment_events` is the idempotency ledger key, and
//! `(entity_type, entity_id, kind)` on `fu_sync_outbox` guarantees each
//! financial fact is queued for bookkeeping at most once.

use sqlx::PgPool;

use crate::error::{map_sqlx_error, StoreError};

const STATEMENTS: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS orders (
        id                 UUID PRIMARY KEY,
        order_number       TEXT NOT NULL UNIQUE,
        currency           TEXT NOT NULL,
        status             TEXT NOT NULL,
        subtotal_ex_vat    BIGINT NOT NULL,
        vat_total          BIGINT NOT NULL,
        shipping_ex_vat    BIGINT NOT NULL,
        shipping_vat       BIGINT NOT NULL,
        total_inc_vat      BIGINT NOT NULL,
        customer_country   TEXT NOT NULL,
        provider           TEXT NULL,
        provider_reference TEXT NULL,
        access_token_hash  TEXT NOT NULL,
        tax                JSONB NOT NULL,
        voucher_id         TEXT NULL,
        placed_at          TIMESTAMPTZ NOT NULL,
        paid_at            TIMESTAMPTZ NULL,
        failed_at          TIMESTAMPTZ NULL,
        refunded_at        TIMESTAMPTZ NULL
    )
    "#,
    r#"
    CREATE INDEX IF NOT EXISTS idx_orders_provider_reference
        ON orders (provider, provider_reference)
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS order_lines (
        order_id           UUID NOT NULL REFERENCES orders(id) ON DELETE CASCADE,
        position           INT NOT NULL,
        product_ref        TEXT NOT NULL,
        quantity           BIGINT NOT NULL,
        unit_price_ex_vat  BIGINT NOT NULL,
        vat_rate           NUMERIC(8, 4) NOT NULL,
        line_total_ex_vat  BIGINT NOT NULL,
        line_vat           BIGINT NOT NULL,
        line_total_inc_vat BIGINT NOT NULL,
        PRIMARY KEY (order_id, position)
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS payment_events (
        id                UUID PRIMARY KEY,
        provider          TEXT NOT NULL,
        external_event_id TEXT NOT NULL,
        event_type        TEXT NOT NULL,
        order_id          UUID NULL,
        payload           JSONB NOT NULL,
        received_at       TIMESTAMPTZ NOT NULL DEFAULT NOW(),
        UNIQUE (provider, external_event_id)
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS fu_sync_outbox (
        id          UUID PRIMARY KEY,
        entity_type TEXT NOT NULL,
        entity_id   TEXT NOT NULL,
        kind        TEXT NOT NULL,
        payload     JSONB NOT NULL,
        status      TEXT NOT NULL DEFAULT 'queued',
        attempts    INT NOT NULL DEFAULT 0,
        voucher_id  TEXT NULL,
        last_error  TEXT NULL,
        queued_at   TIMESTAMPTZ NOT NULL DEFAULT NOW(),
        sent_at     TIMESTAMPTZ NULL,
        acked_at    TIMESTAMPTZ NULL,
        UNIQUE (entity_type, entity_id, kind)
    )
    "#,
    r#"
    CREATE INDEX IF NOT EXISTS idx_fu_sync_outbox_status
        ON fu_sync_outbox (status, queued_at)
    "#,
];

#[tracing::instrument(skip(pool), err)]
pub async fn ensure_schema(pool: &PgPool) -> Result<(), StoreError> {
    for statement in STATEMENTS {
        sqlx::query(statement)
            .execute(pool)
            .await
            .map_err(|e| map_sqlx_error("ensure_schema", e))?;
    }
    Ok(())
}
