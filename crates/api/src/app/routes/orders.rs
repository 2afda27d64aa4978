//! Checkout and guest verification.

use std::sync::Arc;

use axum::{
    extract::Extension,
    http::StatusCode,
    response::IntoResponse,
    routing::post,
    Json, Router,
};
use chrono::Utc;

use storefront_core::{CountryCode, CurrencyCode, OrderId};
use storefront_infra::{is_unique_violation, StoreError};
use storefront_orders::{
    generate_access_token, hash_access_token, verify_access_token, LineInput, Order, PaymentProvider,
    PlaceOrder,
};
use storefront_shipping::quote;
use storefront_tax::decide;

use crate::app::services::AppServices;
use crate::app::{dto, errors};

pub fn router() -> Router {
    Router::new()
        .route("/", post(checkout))
        .route("/verify", post(verify))
}

/// Places an order: tax decision, shipping quote, totals, and the initial
/// `pending_payment` row. Tax-validator trouble degrades to a conservative
/// B2C treatment and never blocks checkout.
pub async fn checkout(
    Extension(services): Extension<Arc<AppServices>>,
    Json(body): Json<dto::CheckoutRequest>,
) -> axum::response::Response {
    let currency: CurrencyCode = match body.currency.parse() {
        Ok(v) => v,
        Err(e) => return errors::domain_error_to_response(e),
    };
    let customer_country: CountryCode = match body.customer_country.parse() {
        Ok(v) => v,
        Err(e) => return errors::domain_error_to_response(e),
    };
    let provider = match body.provider.as_deref().map(str::parse::<PaymentProvider>) {
        Some(Ok(p)) => Some(p),
        Some(Err(e)) => return errors::domain_error_to_response(e),
        None => None,
    };

    let tax = decide(
        &services.tax,
        customer_country,
        body.vat_id.as_deref(),
        services.validator.as_ref(),
    )
    .await;

    let table = match services.shipping_table() {
        Ok(t) => t,
        Err(e) => return errors::shipping_error_to_response(e),
    };
    let shipping = match quote(&table, body.delivery_method, body.weight_grams) {
        Ok(q) => q,
        Err(e) => return errors::shipping_error_to_response(e),
    };

    let access_token = generate_access_token();
    let lines = body
        .lines
        .into_iter()
        .map(|l| LineInput {
            product_ref: l.product_ref,
            quantity: l.quantity,
            unit_price_ex_vat: l.unit_price_ex_vat,
        })
        .collect();

    let mut order = match Order::place(PlaceOrder {
        order_id: OrderId::new(),
        order_number: body.order_number,
        currency,
        customer_country,
        lines,
        shipping_ex_vat: shipping.amount,
        tax: tax.clone(),
        access_token_hash: hash_access_token(&access_token),
        placed_at: Utc::now(),
    }) {
        Ok(o) => o,
        Err(e) => return errors::domain_error_to_response(e),
    };
    order.provider = provider;
    order.provider_reference = body.provider_reference;

    if let Err(e) = services.orders.insert(&order).await {
        if let StoreError::Database { source, .. } = &e {
            if is_unique_violation(source) {
                return errors::json_error(
                    StatusCode::CONFLICT,
                    "conflict",
                    "order number already exists",
                );
            }
        }
        return errors::store_error_to_response(e);
    }

    (
        StatusCode::CREATED,
        Json(dto::CheckoutResponse {
            order_id: order.id.to_string(),
            order_number: order.order_number.clone(),
            status: order.status.as_str().to_string(),
            totals: order.totals,
            tax_mode: tax.mode.as_str().to_string(),
            vat_rate: tax.vat_rate.to_string(),
            shipping_code: shipping.code,
            access_token,
        }),
    )
        .into_response()
}

/// Token-gated status check. For pull-based providers this triggers a
/// provider lookup and the guarded transition; already-terminal orders
/// short-circuit without a provider call.
pub async fn verify(
    Extension(services): Extension<Arc<AppServices>>,
    Json(body): Json<dto::VerifyRequest>,
) -> axum::response::Response {
    let order_id: OrderId = match body.order_id.parse() {
        Ok(v) => v,
        Err(e) => return errors::domain_error_to_response(e),
    };

    let order = match services.orders.get(order_id).await {
        Ok(Some(o)) => o,
        Ok(None) => return errors::json_error(StatusCode::NOT_FOUND, "not_found", "unknown order"),
        Err(e) => return errors::store_error_to_response(e),
    };

    if !verify_access_token(&body.token, &order.access_token_hash) {
        return errors::json_error(StatusCode::UNAUTHORIZED, "unauthorized", "bad token");
    }

    match services.verify_with_provider(&order, Utc::now()).await {
        Ok(status) => Json(dto::VerifyResponse {
            order_id: order.id.to_string(),
            status: status.as_str().to_string(),
        })
        .into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}
