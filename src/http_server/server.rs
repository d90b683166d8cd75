//! # HTTP Server
//!
//! Serves the internal endpoints until the shutdown signal fires.

use std::sync::Arc;

use axum::Router;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tower_http::trace::TraceLayer;

use super::config::HttpServerConfig;
use super::internal_routes::{internal_routes, InternalState};
use crate::observability::Event;

/// HTTP server for the internal POD endpoints
pub struct HttpServer {
    config: HttpServerConfig,
    router: Router,
}

impl HttpServer {
    /// Create a server over `state`
    pub fn new(config: HttpServerConfig, state: Arc<InternalState>) -> Self {
        let router = Self::build_router(state);
        Self { config, router }
    }

    /// Build the router with request tracing
    pub fn build_router(state: Arc<InternalState>) -> Router {
        internal_routes(state).layer(TraceLayer::new_for_http())
    }

    /// Get the socket address
    pub fn socket_addr(&self) -> String {
        self.config.socket_addr()
    }

    /// Get the router (for testing)
    pub fn router(self) -> Router {
        self.router
    }

    /// Bind the configured address.
    pub async fn bind(&self) -> std::io::Result<TcpListener> {
        TcpListener::bind(self.config.socket_addr()).await
    }

    /// Serve `router` on `listener` until `shutdown` flips to true.
    pub async fn serve(
        listener: TcpListener,
        router: Router,
        mut shutdown: watch::Receiver<bool>,
    ) -> std::io::Result<()> {
        let addr = listener.local_addr()?;
        tracing::info!(event = %Event::Serving, addr = %addr, "internal endpoints serving");

        axum::serve(listener, router)
            .with_graceful_shutdown(async move {
                let _ = shutdown.wait_for(|stop| *stop).await;
            })
            .await
    }

    /// Bind and serve until `shutdown` flips to true.
    pub async fn start(self, shutdown: watch::Receiver<bool>) -> std::io::Result<()> {
        let listener = self.bind().await?;
        Self::serve(listener, self.router, shutdown).await
    }
}
