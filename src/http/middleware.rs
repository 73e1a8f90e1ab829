//! Admission middleware.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::{ConnectInfo, Request, State};
use axum::http::StatusCode;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use tracing::{debug, warn};

use crate::ratelimit::Limiter;

/// Header carrying the client token.
pub const TOKEN_HEADER: &str = "API_KEY";

/// Reject requests the limiter does not admit.
///
/// The identity is the peer IP without its port; the token is the
/// `API_KEY` header, or empty when absent or not valid UTF-8.
pub async fn rate_limit(
    State(limiter): State<Arc<dyn Limiter>>,
    request: Request,
    next: Next,
) -> Response {
    let Some(ConnectInfo(peer)) = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .cloned()
    else {
        warn!("Request has no remote address");
        return (StatusCode::INTERNAL_SERVER_ERROR, "invalid remote address").into_response();
    };

    let identity = peer.ip().to_string();
    let token = request
        .headers()
        .get(TOKEN_HEADER)
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default()
        .to_string();

    if !limiter.allow(&identity, &token).await {
        debug!(identity = %identity, "Request rejected by rate limiter");
        return (StatusCode::TOO_MANY_REQUESTS, "Rate limit exceeded").into_response();
    }

    next.run(request).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::router;
    use async_trait::async_trait;
    use axum::body::Body;
    use axum::http::Request as HttpRequest;
    use parking_lot::Mutex;
    use tower::ServiceExt;

    /// Limiter that records its inputs and answers a fixed decision.
    struct SpyLimiter {
        allow: bool,
        calls: Mutex<Vec<(String, String)>>,
    }

    impl SpyLimiter {
        fn new(allow: bool) -> Arc<Self> {
            Arc::new(Self {
                allow,
                calls: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl Limiter for SpyLimiter {
        async fn allow(&self, identity: &str, token: &str) -> bool {
            self.calls.lock().push((identity.to_string(), token.to_string()));
            self.allow
        }
    }

    fn request_from(peer: Option<&str>, token: Option<&str>) -> HttpRequest<Body> {
        let mut builder = HttpRequest::builder().uri("/hello");
        if let Some(token) = token {
            builder = builder.header(TOKEN_HEADER, token);
        }
        let mut request = builder.body(Body::empty()).unwrap();
        if let Some(peer) = peer {
            let addr: SocketAddr = peer.parse().unwrap();
            request.extensions_mut().insert(ConnectInfo(addr));
        }
        request
    }

    async fn body_text(response: Response) -> String {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[tokio::test]
    async fn test_allowed_request_reaches_handler() {
        let limiter = SpyLimiter::new(true);
        let app = router(limiter.clone());

        let response = app
            .oneshot(request_from(Some("127.0.0.1:12345"), Some("Token20")))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            limiter.calls.lock().as_slice(),
            &[("127.0.0.1".to_string(), "Token20".to_string())]
        );
    }

    #[tokio::test]
    async fn test_rejected_request_gets_429() {
        let limiter = SpyLimiter::new(false);
        let app = router(limiter.clone());

        let response = app
            .oneshot(request_from(Some("10.1.2.3:5555"), None))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(body_text(response).await, "Rate limit exceeded");
        assert_eq!(
            limiter.calls.lock().as_slice(),
            &[("10.1.2.3".to_string(), String::new())]
        );
    }

    #[tokio::test]
    async fn test_hello_answers_any_method() {
        let limiter = SpyLimiter::new(true);
        let app = router(limiter.clone());

        for method in ["POST", "PUT", "DELETE"] {
            let mut request = request_from(Some("127.0.0.1:4000"), None);
            *request.method_mut() = method.parse().unwrap();

            let response = app.clone().oneshot(request).await.unwrap();

            assert_eq!(response.status(), StatusCode::OK, "{} /hello", method);
            assert!(body_text(response).await.contains("Hello World"));
        }
        assert_eq!(limiter.calls.lock().len(), 3);
    }

    #[tokio::test]
    async fn test_ipv6_peer_identity() {
        let limiter = SpyLimiter::new(true);
        let app = router(limiter.clone());

        app.oneshot(request_from(Some("[::1]:8080"), None))
            .await
            .unwrap();

        assert_eq!(limiter.calls.lock()[0].0, "::1");
    }

    #[tokio::test]
    async fn test_missing_remote_address_is_server_error() {
        let limiter = SpyLimiter::new(true);
        let app = router(limiter.clone());

        let response = app.oneshot(request_from(None, None)).await.unwrap();

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body_text(response).await, "invalid remote address");
        assert!(limiter.calls.lock().is_empty());
    }
}
