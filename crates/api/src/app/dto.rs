//! Request/response DTOs.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use storefront_core::Cents;
use storefront_infra::OutboxEntry;
use storefront_orders::{Order, Totals};
use storefront_shipping::DeliveryMethod;

#[derive(Debug, Deserialize)]
pub struct CheckoutLine {
    pub product_ref: String,
    pub quantity: i64,
    pub unit_price_ex_vat: Cents,
}

#[derive(Debug, Deserialize)]
pub struct CheckoutRequest {
    pub order_number: String,
    pub currency: String,
    pub customer_country: String,
    pub vat_id: Option<String>,
    pub lines: Vec<CheckoutLine>,
    pub delivery_method: DeliveryMethod,
    /// Total cart weight in grams, derived from catalog data by the caller.
    pub weight_grams: i64,
    pub provider: Option<String>,
    pub provider_reference: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct CheckoutResponse {
    pub order_id: String,
    pub order_number: String,
    pub status: String,
    pub totals: Totals,
    pub tax_mode: String,
    pub vat_rate: String,
    pub shipping_code: Option<String>,
    /// Plaintext guest-lookup token; only the hash is stored.
    pub access_token: String,
}

#[derive(Debug, Deserialize)]
pub struct VerifyRequest {
    pub order_id: String,
    pub token: String,
}

#[derive(Debug, Serialize)]
pub struct VerifyResponse {
    pub order_id: String,
    pub status: String,
}

#[derive(Debug, Serialize)]
pub struct OrderResponse {
    pub order_id: String,
    pub order_number: String,
    pub status: String,
    pub totals: Totals,
    pub voucher_id: Option<String>,
}

impl OrderResponse {
    pub fn from_order(order: &Order) -> Self {
        Self {
            order_id: order.id.to_string(),
            order_number: order.order_number.clone(),
            status: order.status.as_str().to_string(),
            totals: order.totals,
            voucher_id: order.voucher_id.clone(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct PullQuery {
    pub limit: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct OutboxEntryResponse {
    pub id: String,
    pub entity_type: String,
    pub entity_id: String,
    pub kind: String,
    pub payload: serde_json::Value,
    pub attempts: i32,
    pub queued_at: DateTime<Utc>,
}

impl OutboxEntryResponse {
    pub fn from_entry(entry: &OutboxEntry) -> Self {
        Self {
            id: entry.id.to_string(),
            entity_type: entry.entity_type.clone(),
            entity_id: entry.entity_id.clone(),
            kind: entry.kind.as_str().to_string(),
            payload: entry.payload.clone(),
            attempts: entry.attempts,
            queued_at: entry.queued_at,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct AckRequest {
    pub id: String,
    pub ok: bool,
    pub voucher_id: Option<String>,
    pub error: Option<String>,
}
