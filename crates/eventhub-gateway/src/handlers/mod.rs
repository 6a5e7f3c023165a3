//! HTTP handlers.

pub mod events;
pub mod users;

use axum::Json;
use serde_json::{Value, json};

use crate::response::ApiResponse;

/// Greeting at `/`.
pub async fn root() -> Json<ApiResponse<()>> {
    ApiResponse::message("Successfully connected to the server")
}

/// Liveness probe.
pub async fn health() -> Json<Value> {
    Json(json!({
        "status": "healthy",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}
