//! Admission trait for abstracting the decision engine from the transport.

use async_trait::async_trait;

/// Trait for admission decision implementations.
///
/// The HTTP middleware works against this trait so it can be driven by the
/// real [`RateLimiter`](super::RateLimiter) or by a test double.
#[async_trait]
pub trait Limiter: Send + Sync {
    /// Whether a request from `identity` carrying `token` may proceed.
    async fn allow(&self, identity: &str, token: &str) -> bool;
}
