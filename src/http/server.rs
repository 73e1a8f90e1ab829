//! HTTP server implementation.

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::TcpListener;
use tracing::{error, info};

use super::router;
use crate::error::{RatewardenError, Result};
use crate::ratelimit::Limiter;

/// HTTP server for the rate limited API.
pub struct HttpServer {
    /// Bound listener
    listener: TcpListener,
    /// The admission decision maker
    limiter: Arc<dyn Limiter>,
}

impl HttpServer {
    /// Bind the listening socket.
    pub async fn bind(addr: SocketAddr, limiter: Arc<dyn Limiter>) -> Result<Self> {
        let listener = TcpListener::bind(addr).await?;
        Ok(Self { listener, limiter })
    }

    /// The address actually bound, useful when binding port 0.
    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    /// Serve until `signal` resolves, then drain in-flight requests.
    pub async fn serve_with_shutdown<F>(self, signal: F) -> Result<()>
    where
        F: std::future::Future<Output = ()> + Send + 'static,
    {
        let addr = self.local_addr()?;
        info!(addr = %addr, "Starting HTTP server");

        let app = router(self.limiter).into_make_service_with_connect_info::<SocketAddr>();

        axum::serve(self.listener, app)
            .with_graceful_shutdown(signal)
            .await
            .map_err(|e| {
                error!(error = %e, "HTTP server failed");
                RatewardenError::Server(e.to_string())
            })
    }
}
