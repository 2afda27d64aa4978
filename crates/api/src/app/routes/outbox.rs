//! Pull/acknowledge protocol for the bookkeeping consumer.

use std::sync::Arc;

use axum::{
    extract::{Extension, Query},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;

use storefront_bookkeeping::VoucherKind;
use storefront_core::SyncPayloadId;

use crate::app::services::AppServices;
use crate::app::{dto, errors};

const DEFAULT_BATCH: i64 = 20;
const MAX_BATCH: i64 = 100;

pub fn router() -> Router {
    Router::new()
        .route("/pull", get(pull))
        .route("/ack", post(ack))
}

/// Hands out up to `limit` queued payloads, atomically flipping them to
/// `sent` so a concurrent poll never sees the same batch.
pub async fn pull(
    Extension(services): Extension<Arc<AppServices>>,
    Query(query): Query<dto::PullQuery>,
) -> axum::response::Response {
    let limit = query.limit.unwrap_or(DEFAULT_BATCH).clamp(1, MAX_BATCH);
    match services.outbox.claim_batch(limit, Utc::now()).await {
        Ok(entries) => {
            let payloads: Vec<_> = entries
                .iter()
                .map(dto::OutboxEntryResponse::from_entry)
                .collect();
            Json(serde_json::json!({"payloads": payloads})).into_response()
        }
        Err(e) => errors::store_error_to_response(e),
    }
}

pub async fn ack(
    Extension(services): Extension<Arc<AppServices>>,
    Json(body): Json<dto::AckRequest>,
) -> axum::response::Response {
    let id: SyncPayloadId = match body.id.parse() {
        Ok(v) => v,
        Err(e) => return errors::domain_error_to_response(e),
    };

    if body.ok {
        let Some(voucher_id) = body.voucher_id.as_deref() else {
            return errors::json_error(
                StatusCode::BAD_REQUEST,
                "validation_error",
                "successful ack requires a voucher_id",
            );
        };
        let entry = match services.outbox.ack(id, voucher_id, Utc::now()).await {
            Ok(Some(entry)) => entry,
            Ok(None) => {
                return errors::json_error(
                    StatusCode::NOT_FOUND,
                    "not_found",
                    "no sent payload with that id",
                )
            }
            Err(e) => return errors::store_error_to_response(e),
        };

        // Mirror the external voucher id back onto the order for sale
        // vouchers; refund and payout vouchers live only in the outbox.
        if entry.entity_type == "order" && entry.kind == VoucherKind::Sale {
            match entry.entity_id.parse::<storefront_core::OrderId>() {
                Ok(order_id) => {
                    if let Err(e) = services.orders.set_voucher_id(order_id, voucher_id).await {
                        tracing::warn!(payload_id = %id, error = %e, "voucher id mirror failed");
                    }
                }
                Err(e) => {
                    tracing::warn!(payload_id = %id, error = %e, "outbox entry has a non-order entity id");
                }
            }
        }
        Json(serde_json::json!({"status": "acked"})).into_response()
    } else {
        let message = body.error.as_deref().unwrap_or("unspecified consumer error");
        match services.outbox.fail(id, message).await {
            Ok(Some(_)) => Json(serde_json::json!({"status": "error"})).into_response(),
            Ok(None) => errors::json_error(
                StatusCode::NOT_FOUND,
                "not_found",
                "no sent payload with that id",
            ),
            Err(e) => errors::store_error_to_response(e),
        }
    }
}
