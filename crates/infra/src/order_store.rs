//! Order persistence and guarded status transitions.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};
use tracing::instrument;

use storefront_core::OrderId;
use storefront_orders::{Order, OrderLine, OrderStatus, PaymentProvider, TaxMeta, Totals};

use crate::error::{corrupt_row, map_sqlx_error, StoreError};

/// Outcome of a guarded transition attempt. `NotApplied` means the order was
/// not in an allowed source state, which is the normal signature of a late or
/// duplicate provider event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransitionResult {
    Applied,
    NotApplied,
}

#[derive(Debug, Clone)]
pub struct OrderStore {
    pool: PgPool,
}

impl OrderStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Persists a freshly placed order with its lines in one transaction.
    #[instrument(skip(self, order), fields(order_id = %order.id), err)]
    pub async fn insert(&self, order: &Order) -> Result<(), StoreError> {
        let tax = serde_json::to_value(&order.tax)
            .map_err(|e| corrupt_row("insert_order", e.to_string()))?;

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("insert_order", e))?;

        sqlx::query(
            r#"
            INSERT INTO orders (
                id, order_number, currency, status,
                subtotal_ex_vat, vat_total, shipping_ex_vat, shipping_vat, total_inc_vat,
                customer_country, provider, provider_reference, access_token_hash,
                tax, voucher_id, placed_at, paid_at, failed_at, refunded_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, $18, $19)
            "#,
        )
        .bind(order.id.as_uuid())
        .bind(&order.order_number)
        .bind(order.currency.as_str())
        .bind(order.status.as_str())
        .bind(order.totals.subtotal_ex_vat)
        .bind(order.totals.vat_total)
        .bind(order.totals.shipping_ex_vat)
        .bind(order.totals.shipping_vat)
        .bind(order.totals.total_inc_vat)
        .bind(order.customer_country.as_str())
        .bind(order.provider.map(|p| p.as_str()))
        .bind(order.provider_reference.as_deref())
        .bind(&order.access_token_hash)
        .bind(&tax)
        .bind(order.voucher_id.as_deref())
        .bind(order.placed_at)
        .bind(order.paid_at)
        .bind(order.failed_at)
        .bind(order.refunded_at)
        .execute(&mut *tx)
        .await
        .map_err(|e| map_sqlx_error("insert_order", e))?;

        for (position, line) in order.lines.iter().enumerate() {
            sqlx::query(
                r#"
                INSERT INTO order_lines (
                    order_id, position, product_ref, quantity, unit_price_ex_vat,
                    vat_rate, line_total_ex_vat, line_vat, line_total_inc_vat
                )
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
                "#,
            )
            .bind(order.id.as_uuid())
            .bind(position as i32)
            .bind(&line.product_ref)
            .bind(line.quantity)
            .bind(line.unit_price_ex_vat)
            .bind(line.vat_rate)
            .bind(line.line_total_ex_vat)
            .bind(line.line_vat)
            .bind(line.line_total_inc_vat)
            .execute(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("insert_order_line", e))?;
        }

        tx.commit()
            .await
            .map_err(|e| map_sqlx_error("insert_order", e))?;
        Ok(())
    }

    #[instrument(skip(self), fields(order_id = %id), err)]
    pub async fn get(&self, id: OrderId) -> Result<Option<Order>, StoreError> {
        let row = sqlx::query("SELECT * FROM orders WHERE id = $1")
            .bind(id.as_uuid())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("get_order", e))?;
        match row {
            Some(row) => Ok(Some(self.hydrate(row).await?)),
            None => Ok(None),
        }
    }

    /// Looks an order up by the payment provider's own reference. Used to
    /// resolve webhook events that carry no order id in their metadata.
    #[instrument(skip(self), err)]
    pub async fn get_by_provider_reference(
        &self,
        provider: PaymentProvider,
        reference: &str,
    ) -> Result<Option<Order>, StoreError> {
        let row =
            sqlx::query("SELECT * FROM orders WHERE provider = $1 AND provider_reference = $2")
                .bind(provider.as_str())
                .bind(reference)
                .fetch_optional(&self.pool)
                .await
                .map_err(|e| map_sqlx_error("get_order_by_provider_reference", e))?;
        match row {
            Some(row) => Ok(Some(self.hydrate(row).await?)),
            None => Ok(None),
        }
    }

    /// Applies a status transition guarded by the allowed source-state set.
    ///
    /// The guard rides in the WHERE clause, so a concurrent or stale update
    /// simply matches zero rows and reports `NotApplied`. Timestamp columns
    /// are stamped along with the statuses that own them.
    #[instrument(skip(self), fields(order_id = %id, target = target.as_str()), err)]
    pub async fn transition(
        &self,
        id: OrderId,
        target: OrderStatus,
        now: DateTime<Utc>,
    ) -> Result<TransitionResult, StoreError> {
        let sources: Vec<String> = OrderStatus::allowed_sources(target)
            .iter()
            .map(|s| s.as_str().to_string())
            .collect();
        if sources.is_empty() {
            return Ok(TransitionResult::NotApplied);
        }

        let result = match stamp_column(target) {
            Some(column) => {
                // column names come from the static match below, never input
                let sql = format!(
                    "UPDATE orders SET status = $1, {column} = $2 \
                     WHERE id = $3 AND status = ANY($4)"
                );
                sqlx::query(&sql)
                    .bind(target.as_str())
                    .bind(now)
                    .bind(id.as_uuid())
                    .bind(&sources)
                    .execute(&self.pool)
                    .await
            }
            None => {
                sqlx::query("UPDATE orders SET status = $1 WHERE id = $2 AND status = ANY($3)")
                    .bind(target.as_str())
                    .bind(id.as_uuid())
                    .bind(&sources)
                    .execute(&self.pool)
                    .await
            }
        }
        .map_err(|e| map_sqlx_error("transition_order", e))?;

        if result.rows_affected() > 0 {
            Ok(TransitionResult::Applied)
        } else {
            Ok(TransitionResult::NotApplied)
        }
    }

    /// Records which provider the shopper chose and the provider's reference
    /// for the payment. Set once at checkout hand-off.
    #[instrument(skip(self), fields(order_id = %id), err)]
    pub async fn set_provider(
        &self,
        id: OrderId,
        provider: PaymentProvider,
        reference: &str,
    ) -> Result<(), StoreError> {
        sqlx::query("UPDATE orders SET provider = $1, provider_reference = $2 WHERE id = $3")
            .bind(provider.as_str())
            .bind(reference)
            .bind(id.as_uuid())
            .execute(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("set_provider", e))?;
        Ok(())
    }

    /// Mirrors the external voucher id back onto the order after the
    /// bookkeeping consumer acknowledges the sale.
    #[instrument(skip(self), fields(order_id = %id), err)]
    pub async fn set_voucher_id(&self, id: OrderId, voucher_id: &str) -> Result<(), StoreError> {
        sqlx::query("UPDATE orders SET voucher_id = $1 WHERE id = $2")
            .bind(voucher_id)
            .bind(id.as_uuid())
            .execute(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("set_voucher_id", e))?;
        Ok(())
    }

    async fn hydrate(&self, row: PgRow) -> Result<Order, StoreError> {
        let id: uuid::Uuid = row
            .try_get("id")
            .map_err(|e| corrupt_row("hydrate_order", e.to_string()))?;
        let line_rows = sqlx::query(
            "SELECT * FROM order_lines WHERE order_id = $1 ORDER BY position ASC",
        )
        .bind(id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("get_order_lines", e))?;

        let mut lines = Vec::with_capacity(line_rows.len());
        for line_row in line_rows {
            lines.push(decode_line(&line_row)?);
        }
        decode_order(&row, lines)
    }
}

fn stamp_column(target: OrderStatus) -> Option<&'static str> {
    match target {
        OrderStatus::Paid => Some("paid_at"),
        OrderStatus::Failed => Some("failed_at"),
        OrderStatus::Refunded => Some("refunded_at"),
        _ => None,
    }
}

fn decode_order(row: &PgRow, lines: Vec<OrderLine>) -> Result<Order, StoreError> {
    const OP: &str = "decode_order";
    let get_str = |column: &str| -> Result<String, StoreError> {
        row.try_get::<String, _>(column)
            .map_err(|e| corrupt_row(OP, e.to_string()))
    };

    let id: uuid::Uuid = row.try_get("id").map_err(|e| corrupt_row(OP, e.to_string()))?;
    let status: OrderStatus = get_str("status")?
        .parse()
        .map_err(|e: storefront_core::DomainError| corrupt_row(OP, e.to_string()))?;
    let currency = get_str("currency")?
        .parse()
        .map_err(|e: storefront_core::DomainError| corrupt_row(OP, e.to_string()))?;
    let customer_country = get_str("customer_country")?
        .parse()
        .map_err(|e: storefront_core::DomainError| corrupt_row(OP, e.to_string()))?;
    let provider = row
        .try_get::<Option<String>, _>("provider")
        .map_err(|e| corrupt_row(OP, e.to_string()))?
        .map(|p| p.parse::<PaymentProvider>())
        .transpose()
        .map_err(|e| corrupt_row(OP, e.to_string()))?;
    let tax: TaxMeta = serde_json::from_value(
        row.try_get::<serde_json::Value, _>("tax")
            .map_err(|e| corrupt_row(OP, e.to_string()))?,
    )
    .map_err(|e| corrupt_row(OP, e.to_string()))?;

    let get_i64 = |column: &str| -> Result<i64, StoreError> {
        row.try_get::<i64, _>(column)
            .map_err(|e| corrupt_row(OP, e.to_string()))
    };
    let totals = Totals {
        subtotal_ex_vat: get_i64("subtotal_ex_vat")?,
        vat_total: get_i64("vat_total")?,
        shipping_ex_vat: get_i64("shipping_ex_vat")?,
        shipping_vat: get_i64("shipping_vat")?,
        total_inc_vat: get_i64("total_inc_vat")?,
    };

    let get_ts = |column: &str| -> Result<Option<DateTime<Utc>>, StoreError> {
        row.try_get::<Option<DateTime<Utc>>, _>(column)
            .map_err(|e| corrupt_row(OP, e.to_string()))
    };

    Ok(Order {
        id: OrderId::from_uuid(id),
        order_number: get_str("order_number")?,
        currency,
        status,
        totals,
        customer_country,
        provider,
        provider_reference: row
            .try_get("provider_reference")
            .map_err(|e| corrupt_row(OP, e.to_string()))?,
        access_token_hash: get_str("access_token_hash")?,
        tax,
        lines,
        voucher_id: row
            .try_get("voucher_id")
            .map_err(|e| corrupt_row(OP, e.to_string()))?,
        placed_at: row
            .try_get("placed_at")
            .map_err(|e| corrupt_row(OP, e.to_string()))?,
        paid_at: get_ts("paid_at")?,
        failed_at: get_ts("failed_at")?,
        refunded_at: get_ts("refunded_at")?,
    })
}

fn decode_line(row: &PgRow) -> Result<OrderLine, StoreError> {
    const OP: &str = "decode_order_line";
    let get_i64 = |column: &str| -> Result<i64, StoreError> {
        row.try_get::<i64, _>(column)
            .map_err(|e| corrupt_row(OP, e.to_string()))
    };
    Ok(OrderLine {
        product_ref: row
            .try_get("product_ref")
            .map_err(|e| corrupt_row(OP, e.to_string()))?,
        quantity: get_i64("quantity")?,
        unit_price_ex_vat: get_i64("unit_price_ex_vat")?,
        vat_rate: row
            .try_get::<Decimal, _>("vat_rate")
            .map_err(|e| corrupt_row(OP, e.to_string()))?,
        line_total_ex_vat: get_i64("line_total_ex_vat")?,
        line_vat: get_i64("line_vat")?,
        line_total_inc_vat: get_i64("line_total_inc_vat")?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_outcome_statuses_carry_timestamps() {
        assert_eq!(stamp_column(OrderStatus::Paid), Some("paid_at"));
        assert_eq!(stamp_column(OrderStatus::Failed), Some("failed_at"));
        assert_eq!(stamp_column(OrderStatus::Refunded), Some("refunded_at"));
        assert_eq!(stamp_column(OrderStatus::AwaitingAction), None);
        assert_eq!(stamp_column(OrderStatus::Cancelled), None);
        assert_eq!(stamp_column(OrderStatus::PendingPayment), None);
    }
}
