// Handlers module
// HTTP handlers for the REST API

pub mod accounts;
pub mod tweets;

use axum::{http::StatusCode, response::IntoResponse};

/// Health check handler
/// Returns "OK" with 200 status for monitoring purposes
pub async fn health_check() -> impl IntoResponse {
    (StatusCode::OK, "OK")
}
