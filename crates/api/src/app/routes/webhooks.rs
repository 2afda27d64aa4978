//! Push-provider webhook intake.
//!
//! The raw body is read as bytes and signature-verified before any JSON
//! parsing. Once the event is durably recorded in the ledger the caller
//! always sees a 2xx, even when a downstream side effect (voucher queuing)
//! had to be deferred; only signature and parse failures are 4xx.

use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::Extension,
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    routing::post,
    Json, Router,
};
use chrono::Utc;

use storefront_core::PaymentEventId;
use storefront_infra::{LedgerInsert, NewPaymentEvent};
use storefront_orders::{Order, PaymentProvider};
use storefront_payments::stripe::{
    verify_signature, SignatureHeader, StripeEvent, DEFAULT_TOLERANCE,
};
use storefront_payments::Confirmation;

use crate::app::services::AppServices;
use crate::app::errors;

pub fn router() -> Router {
    Router::new().route("/stripe", post(stripe))
}

pub async fn stripe(
    Extension(services): Extension<Arc<AppServices>>,
    headers: HeaderMap,
    body: Bytes,
) -> axum::response::Response {
    let Some(raw_header) = headers
        .get("stripe-signature")
        .and_then(|v| v.to_str().ok())
    else {
        return errors::json_error(
            StatusCode::BAD_REQUEST,
            "validation_error",
            "missing stripe-signature header",
        );
    };
    let header = match SignatureHeader::parse(raw_header) {
        Ok(h) => h,
        Err(e) => {
            return errors::json_error(StatusCode::BAD_REQUEST, "invalid_signature", e.to_string())
        }
    };
    if let Err(e) = verify_signature(
        services.stripe_webhook_secret(),
        &body,
        &header,
        Utc::now(),
        DEFAULT_TOLERANCE,
    ) {
        return errors::json_error(StatusCode::BAD_REQUEST, "invalid_signature", e.to_string());
    }

    let event = match StripeEvent::parse(&body) {
        Ok(e) => e,
        Err(e) => {
            return errors::json_error(StatusCode::BAD_REQUEST, "validation_error", e.to_string())
        }
    };
    let confirmation = match event.confirmation() {
        Ok(c) => c,
        Err(e) => {
            return errors::json_error(StatusCode::BAD_REQUEST, "validation_error", e.to_string())
        }
    };

    let order = match resolve_order(&services, &event).await {
        Ok(o) => o,
        Err(r) => return r,
    };

    let payload = serde_json::from_slice(&body).unwrap_or(serde_json::Value::Null);
    let ledger_event = NewPaymentEvent {
        id: PaymentEventId::new(),
        provider: PaymentProvider::Stripe,
        external_event_id: event.id.clone(),
        event_type: event.event_type.clone(),
        order_id: order.as_ref().map(|o| o.id),
        payload,
    };
    match services.ledger.record(&ledger_event).await {
        Ok(LedgerInsert::Recorded) => {}
        Ok(LedgerInsert::Replay) => {
            return Json(serde_json::json!({"received": true, "replay": true})).into_response();
        }
        Err(e) => return errors::store_error_to_response(e),
    }

    // The event is durable from here on. Side-effect failures are logged
    // and re-driven out of band; the provider must not keep retrying.
    match (&confirmation, order) {
        (Confirmation::Ignored, _) => {}
        (Confirmation::Payout(settlement), _) => {
            if let Err(e) = services.enqueue_payout_voucher(settlement).await {
                tracing::warn!(reference = %settlement.reference, error = %e, "payout voucher enqueue deferred");
            }
        }
        (confirmation, Some(order)) => {
            if let Some(target) = confirmation.target_status() {
                if let Err(e) = services
                    .transition_with_bookkeeping(order.id, target, Utc::now())
                    .await
                {
                    tracing::warn!(order_id = %order.id, error = %e, "transition deferred after recorded event");
                }
            }
        }
        (_, None) => {
            tracing::warn!(
                event_id = %event.id,
                event_type = %event.event_type,
                "event recorded without a resolvable order"
            );
        }
    }

    Json(serde_json::json!({"received": true})).into_response()
}

/// Prefer the order id carried in event metadata; fall back to the stored
/// provider reference. An unresolvable event is still recorded, unlinked.
async fn resolve_order(
    services: &AppServices,
    event: &StripeEvent,
) -> Result<Option<Order>, axum::response::Response> {
    if let Some(id) = event.order_id() {
        match services.orders.get(id).await {
            Ok(Some(order)) => return Ok(Some(order)),
            Ok(None) => {}
            Err(e) => return Err(errors::store_error_to_response(e)),
        }
    }
    if let Some(reference) = event.provider_reference() {
        match services
            .orders
            .get_by_provider_reference(PaymentProvider::Stripe, reference)
            .await
        {
            Ok(found) => return Ok(found),
            Err(e) => return Err(errors::store_error_to_response(e)),
        }
    }
    Ok(None)
}
