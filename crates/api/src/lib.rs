//! HTTP surface: checkout, payment webhooks, order verification, the
//! bookkeeping outbox protocol, and shared-secret-protected admin
//! operations.

pub mod app;
pub mod config;
pub mod middleware;
