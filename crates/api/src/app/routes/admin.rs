//! Operator endpoints, shared-secret protected.

use std::sync::Arc;

use axum::{
    extract::{Extension, Path},
    http::StatusCode,
    response::IntoResponse,
    routing::post,
    Json, Router,
};
use chrono::Utc;

use storefront_bookkeeping::VoucherKind;
use storefront_core::OrderId;
use storefront_infra::TransitionResult;
use storefront_orders::OrderStatus;

use crate::app::services::AppServices;
use crate::app::{dto, errors};

pub fn router() -> Router {
    Router::new()
        .route("/orders/:id/mark-paid", post(mark_paid))
        .route("/orders/:id/retry-sync", post(retry_sync))
}

/// Manual payment confirmation. Runs through the same guarded transition as
/// a provider event, so it only applies to orders in a payable state.
pub async fn mark_paid(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let order_id: OrderId = match id.parse() {
        Ok(v) => v,
        Err(e) => return errors::domain_error_to_response(e),
    };

    match services
        .transition_with_bookkeeping(order_id, OrderStatus::Paid, Utc::now())
        .await
    {
        Ok(TransitionResult::Applied) => {}
        Ok(TransitionResult::NotApplied) => {
            return errors::json_error(
                StatusCode::CONFLICT,
                "conflict",
                "order is not in a payable state",
            )
        }
        Err(e) => return errors::service_error_to_response(e),
    }

    match services.orders.get(order_id).await {
        Ok(Some(order)) => Json(dto::OrderResponse::from_order(&order)).into_response(),
        Ok(None) => errors::json_error(StatusCode::NOT_FOUND, "not_found", "unknown order"),
        Err(e) => errors::store_error_to_response(e),
    }
}

/// Re-drives bookkeeping for an order: re-enqueues the vouchers its current
/// lifecycle implies (idempotent on the outbox unique key) and resets any
/// errored entries back to `queued`.
pub async fn retry_sync(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let order_id: OrderId = match id.parse() {
        Ok(v) => v,
        Err(e) => return errors::domain_error_to_response(e),
    };

    let order = match services.orders.get(order_id).await {
        Ok(Some(o)) => o,
        Ok(None) => return errors::json_error(StatusCode::NOT_FOUND, "not_found", "unknown order"),
        Err(e) => return errors::store_error_to_response(e),
    };

    let mut kinds = Vec::new();
    if order.paid_at.is_some() {
        kinds.push(VoucherKind::Sale);
    }
    if order.refunded_at.is_some() || order.status == OrderStatus::Refunded {
        kinds.push(VoucherKind::Refund);
    }
    if kinds.is_empty() {
        return errors::json_error(
            StatusCode::CONFLICT,
            "conflict",
            "order has no bookkeepable facts yet",
        );
    }

    let now = Utc::now();
    let mut enqueued = Vec::new();
    for kind in kinds {
        match services.enqueue_order_voucher(order_id, kind, now).await {
            Ok(outcome) => {
                let outcome = match outcome {
                    storefront_infra::EnqueueResult::Queued => "queued",
                    storefront_infra::EnqueueResult::AlreadyQueued => "already_queued",
                };
                enqueued.push(serde_json::json!({"kind": kind.as_str(), "outcome": outcome}));
            }
            Err(e) => return errors::service_error_to_response(e),
        }
    }

    let requeued = match services
        .outbox
        .requeue_entity("order", &order_id.to_string())
        .await
    {
        Ok(n) => n,
        Err(e) => return errors::store_error_to_response(e),
    };

    Json(serde_json::json!({"enqueued": enqueued, "requeued": requeued})).into_response()
}
