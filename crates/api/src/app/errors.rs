//! Consistent JSON error responses.

use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde_json::json;

use storefront_core::DomainError;
use storefront_infra::StoreError;
use storefront_shipping::ShippingError;

use crate::app::services::ServiceError;

pub fn json_error(
    status: StatusCode,
    code: &'static str,
    message: impl Into<String>,
) -> axum::response::Response {
    (
        status,
        axum::Json(json!({
            "error": code,
            "message": message.into(),
        })),
    )
        .into_response()
}

pub fn domain_error_to_response(err: DomainError) -> axum::response::Response {
    match err {
        DomainError::Validation(msg) => json_error(StatusCode::BAD_REQUEST, "validation_error", msg),
        DomainError::InvalidId(msg) => json_error(StatusCode::BAD_REQUEST, "invalid_id", msg),
        DomainError::InvariantViolation(msg) => {
            json_error(StatusCode::UNPROCESSABLE_ENTITY, "invariant_violation", msg)
        }
        DomainError::Conflict(msg) => json_error(StatusCode::CONFLICT, "conflict", msg),
        DomainError::NotFound => json_error(StatusCode::NOT_FOUND, "not_found", "not found"),
        DomainError::Unauthorized => {
            json_error(StatusCode::UNAUTHORIZED, "unauthorized", "unauthorized")
        }
        DomainError::ExternalUnavailable(msg) => {
            json_error(StatusCode::BAD_GATEWAY, "external_unavailable", msg)
        }
    }
}

pub fn store_error_to_response(err: StoreError) -> axum::response::Response {
    json_error(
        StatusCode::INTERNAL_SERVER_ERROR,
        "store_error",
        err.to_string(),
    )
}

pub fn service_error_to_response(err: ServiceError) -> axum::response::Response {
    match err {
        ServiceError::Domain(e) => domain_error_to_response(e),
        ServiceError::Store(e) => store_error_to_response(e),
    }
}

pub fn shipping_error_to_response(err: ShippingError) -> axum::response::Response {
    match err {
        ShippingError::InvalidWeight(_) | ShippingError::Overweight { .. } => {
            json_error(StatusCode::BAD_REQUEST, "shipping_error", err.to_string())
        }
        ShippingError::EmptyTable | ShippingError::Malformed(_) => json_error(
            StatusCode::INTERNAL_SERVER_ERROR,
            "shipping_config_error",
            err.to_string(),
        ),
    }
}
