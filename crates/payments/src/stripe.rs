//! Stripe webhook verification and event mapping.
//!
//! Events arrive signed with a `Stripe-Signature` header of the form
//! `t=<unix-ts>,v1=<hex-hmac>[,v1=<hex-hmac>...]`. The signature is an
//! HMAC-SHA256 over `"<t>.<raw-body>"` keyed with the endpoint secret.
//! Verification runs against the raw body bytes, before any JSON parsing,
//! and the timestamp must be within [`DEFAULT_TOLERANCE`] of the current
//! clock to bound replay of captured requests.

use chrono::{DateTime, Duration, TimeZone, Utc};
use hmac::{Hmac, Mac};
use serde_json::Value;
use sha2::Sha256;
use storefront_bookkeeping::PayoutSettlement;
use storefront_core::{Cents, CurrencyCode, OrderId};
use storefront_orders::PaymentProvider;

use crate::Confirmation;

type HmacSha256 = Hmac<Sha256>;

/// Maximum accepted skew between the signature timestamp and our clock.
pub const DEFAULT_TOLERANCE: Duration = Duration::minutes(5);

#[derive(Debug, thiserror::Error)]
pub enum WebhookError {
    #[error("malformed signature header: {0}")]
    MalformedHeader(String),
    #[error("signature header carries no timestamp")]
    MissingTimestamp,
    #[error("signature header carries no v1 signature")]
    MissingSignature,
    #[error("signature timestamp outside tolerance")]
    StaleTimestamp,
    #[error("signature does not match payload")]
    SignatureMismatch,
    #[error("unparseable event payload: {0}")]
    Payload(String),
}

/// Parsed `Stripe-Signature` header. Stripe may send several `v1` entries
/// during secret rotation; any one of them matching is sufficient.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignatureHeader {
    pub timestamp: i64,
    pub signatures: Vec<String>,
}

impl SignatureHeader {
    pub fn parse(header: &str) -> Result<Self, WebhookError> {
        let mut timestamp = None;
        let mut signatures = Vec::new();
        for part in header.split(',') {
            let part = part.trim();
            if part.is_empty() {
                continue;
            }
            let (key, value) = part
                .split_once('=')
                .ok_or_else(|| WebhookError::MalformedHeader(part.to_string()))?;
            match key {
                "t" => {
                    let ts: i64 = value
                        .parse()
                        .map_err(|_| WebhookError::MalformedHeader(part.to_string()))?;
                    timestamp = Some(ts);
                }
                "v1" => signatures.push(value.to_string()),
                // v0 and future schemes are ignored, per Stripe's guidance.
                _ => {}
            }
        }
        let timestamp = timestamp.ok_or(WebhookError::MissingTimestamp)?;
        if signatures.is_empty() {
            return Err(WebhookError::MissingSignature);
        }
        Ok(Self {
            timestamp,
            signatures,
        })
    }
}

/// Verifies the header against the raw request body.
///
/// The HMAC comparison goes through [`Mac::verify_slice`], which is
/// constant-time. Timestamp tolerance is checked against `now` so tests can
/// pin the clock.
pub fn verify_signature(
    secret: &str,
    raw_body: &[u8],
    header: &SignatureHeader,
    now: DateTime<Utc>,
    tolerance: Duration,
) -> Result<(), WebhookError> {
    let age = now.timestamp() - header.timestamp;
    if age.abs() > tolerance.num_seconds() {
        return Err(WebhookError::StaleTimestamp);
    }

    for candidate in &header.signatures {
        let Ok(expected) = hex::decode(candidate) else {
            continue;
        };
        let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
            .map_err(|e| WebhookError::MalformedHeader(e.to_string()))?;
        mac.update(header.timestamp.to_string().as_bytes());
        mac.update(b".");
        mac.update(raw_body);
        if mac.verify_slice(&expected).is_ok() {
            return Ok(());
        }
    }
    Err(WebhookError::SignatureMismatch)
}

/// A verified, parsed Stripe event. Only constructed after
/// [`verify_signature`] has accepted the raw body.
#[derive(Debug, Clone)]
pub struct StripeEvent {
    pub id: String,
    pub event_type: String,
    object: Value,
}

impl StripeEvent {
    pub fn parse(raw_body: &[u8]) -> Result<Self, WebhookError> {
        let value: Value =
            serde_json::from_slice(raw_body).map_err(|e| WebhookError::Payload(e.to_string()))?;
        let id = value
            .get("id")
            .and_then(Value::as_str)
            .ok_or_else(|| WebhookError::Payload("event without id".to_string()))?
            .to_string();
        let event_type = value
            .get("type")
            .and_then(Value::as_str)
            .ok_or_else(|| WebhookError::Payload("event without type".to_string()))?
            .to_string();
        let object = value
            .get("data")
            .and_then(|d| d.get("object"))
            .cloned()
            .unwrap_or(Value::Null);
        Ok(Self {
            id,
            event_type,
            object,
        })
    }

    /// The order this event refers to, carried in the payment object's
    /// metadata at checkout time. Absent for payout events and for events
    /// created outside this system (dashboard payments etc.).
    pub fn order_id(&self) -> Option<OrderId> {
        self.object
            .get("metadata")
            .and_then(|m| m.get("order_id"))
            .and_then(Value::as_str)
            .and_then(|s| s.parse().ok())
    }

    /// Stripe's own id for the payment object (`pi_...`, `ch_...`, `po_...`).
    pub fn provider_reference(&self) -> Option<&str> {
        self.object.get("id").and_then(Value::as_str)
    }

    /// Maps the event type onto a lifecycle confirmation. Unrecognized types
    /// from a verified sender are [`Confirmation::Ignored`], never an error.
    pub fn confirmation(&self) -> Result<Confirmation, WebhookError> {
        match self.event_type.as_str() {
            "payment_intent.succeeded" => Ok(Confirmation::Paid),
            "payment_intent.payment_failed" => Ok(Confirmation::Failed),
            "payment_intent.requires_action" => Ok(Confirmation::ActionRequired),
            "charge.refunded" => Ok(Confirmation::Refunded),
            "payout.paid" => Ok(Confirmation::Payout(self.payout_settlement()?)),
            _ => Ok(Confirmation::Ignored),
        }
    }

    /// Builds the settlement summary for a payout event. `amount` is the net
    /// amount that hit the bank; the aggregated fee for the batch rides in
    /// the payout object when reconciliation has filled it in, otherwise it
    /// books as zero and the fee correction lands with the next batch.
    fn payout_settlement(&self) -> Result<PayoutSettlement, WebhookError> {
        let reference = self
            .provider_reference()
            .ok_or_else(|| WebhookError::Payload("payout without object id".to_string()))?
            .to_string();
        let net = self
            .object
            .get("amount")
            .and_then(Value::as_i64)
            .ok_or_else(|| WebhookError::Payload("payout without amount".to_string()))?;
        let fee = self
            .object
            .get("fee")
            .and_then(Value::as_i64)
            .or_else(|| {
                self.object
                    .get("metadata")
                    .and_then(|m| m.get("fee"))
                    .and_then(Value::as_str)
                    .and_then(|s| s.parse().ok())
            })
            .unwrap_or(0);
        let gross: Cents = net
            .checked_add(fee)
            .ok_or_else(|| WebhookError::Payload("payout amount overflow".to_string()))?;
        let currency: CurrencyCode = self
            .object
            .get("currency")
            .and_then(Value::as_str)
            .ok_or_else(|| WebhookError::Payload("payout without currency".to_string()))?
            .parse()
            .map_err(|e: storefront_core::DomainError| WebhookError::Payload(e.to_string()))?;
        let date = self
            .object
            .get("arrival_date")
            .and_then(Value::as_i64)
            .and_then(|ts| Utc.timestamp_opt(ts, 0).single())
            .map(|dt| dt.date_naive())
            .ok_or_else(|| WebhookError::Payload("payout without arrival_date".to_string()))?;
        Ok(PayoutSettlement {
            provider: PaymentProvider::Stripe,
            reference,
            currency,
            gross,
            fee,
            net,
            date,
        })
    }
}
