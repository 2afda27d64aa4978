//! Shared-secret protection for the outbox and admin surfaces.

use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    middleware::Next,
    response::Response,
};

pub const SHARED_SECRET_HEADER: &str = "x-shared-secret";

#[derive(Clone)]
pub struct SecretState {
    pub expected: String,
}

pub async fn shared_secret_middleware(
    State(state): State<SecretState>,
    req: axum::http::Request<axum::body::Body>,
    next: Next,
) -> Result<Response, StatusCode> {
    let presented = extract_secret(req.headers())?;
    if presented != state.expected {
        return Err(StatusCode::UNAUTHORIZED);
    }
    Ok(next.run(req).await)
}

fn extract_secret(headers: &HeaderMap) -> Result<&str, StatusCode> {
    let header = headers
        .get(SHARED_SECRET_HEADER)
        .ok_or(StatusCode::UNAUTHORIZED)?;

    let secret = header.to_str().map_err(|_| StatusCode::UNAUTHORIZED)?.trim();
    if secret.is_empty() {
        return Err(StatusCode::UNAUTHORIZED);
    }
    Ok(secret)
}
