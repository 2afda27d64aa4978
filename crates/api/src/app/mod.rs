//! HTTP API application wiring (Axum router + service wiring).
//!
//! - `services.rs`: store/adapter wiring and orchestration helpers
//! - `routes/`: HTTP routes + handlers (one file per surface)
//! - `dto.rs`: request/response DTOs
//! - `errors.rs`: consistent error responses

use std::sync::Arc;

use axum::{routing::get, Extension, Router};
use sqlx::PgPool;

use crate::config::Config;
use crate::middleware::{self, SecretState};

pub mod dto;
pub mod errors;
pub mod routes;
pub mod services;

/// Build the full HTTP router (public entrypoint used by `main.rs`).
pub fn build_app(config: Config, pool: PgPool) -> anyhow::Result<Router> {
    let outbox_secret = SecretState {
        expected: config.outbox_shared_secret.clone(),
    };
    let admin_secret = SecretState {
        expected: config.admin_shared_secret.clone(),
    };

    let services = Arc::new(services::build_services(config, pool)?);

    let outbox = routes::outbox::router().layer(axum::middleware::from_fn_with_state(
        outbox_secret,
        middleware::shared_secret_middleware,
    ));
    let admin = routes::admin::router().layer(axum::middleware::from_fn_with_state(
        admin_secret,
        middleware::shared_secret_middleware,
    ));

    Ok(Router::new()
        .route("/health", get(routes::system::health))
        .nest("/orders", routes::orders::router())
        .nest("/webhooks", routes::webhooks::router())
        .nest("/outbox", outbox)
        .nest("/admin", admin)
        .layer(Extension(services)))
}
