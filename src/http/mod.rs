//! HTTP transport for the rate limiting service.

mod handler;
mod middleware;
mod server;

use std::sync::Arc;

use axum::routing::any;
use axum::Router;

use crate::ratelimit::Limiter;

pub use handler::{hello, HelloResponse};
pub use middleware::{rate_limit, TOKEN_HEADER};
pub use server::HttpServer;

/// Build the application router with every route behind the rate limiter.
///
/// `/hello` answers every HTTP method.
pub fn router(limiter: Arc<dyn Limiter>) -> Router {
    Router::new()
        .route("/hello", any(hello))
        .layer(axum::middleware::from_fn_with_state(limiter, rate_limit))
}
