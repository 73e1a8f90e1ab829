//! The protected resource.

use axum::Json;
use serde::Serialize;

/// Body returned by `GET /hello`.
#[derive(Debug, Serialize)]
pub struct HelloResponse {
    pub message: &'static str,
}

/// Greets any caller that made it past the rate limiter.
pub async fn hello() -> Json<HelloResponse> {
    Json(HelloResponse {
        message: "Hello World",
    })
}
