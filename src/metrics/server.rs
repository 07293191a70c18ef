//! Scrape endpoint for Prometheus plus a JSON view of the live windows.
//!
//! Routes:
//! - `GET /metrics` refreshes the registry from the engine and encodes it
//! - `GET /health` liveness probe
//! - `GET /live` the current [`LiveStats`](crate::engine::LiveStats)

use crate::engine::Engine;
use crate::metrics::{MetricsRegistry, MetricsSnapshot};
use crate::sensor::StatusHandle;
use axum::{
    extract::State,
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use std::net::SocketAddr;
use std::sync::Arc;
use thiserror::Error;
use tower_http::cors::CorsLayer;

/// Errors raised while serving.
#[derive(Debug, Error)]
pub enum ServerError {
    /// The listener could not be bound.
    #[error("cannot bind {addr}: {source}")]
    Bind {
        /// Requested address.
        addr: SocketAddr,
        /// Underlying bind failure.
        #[source]
        source: std::io::Error,
    },

    /// The server loop exited with an error.
    #[error("server stopped: {0}")]
    Serve(#[from] std::io::Error),
}

/// Where the scrape endpoint listens.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MetricsServerConfig {
    /// Listen address.
    pub bind_addr: SocketAddr,
}

impl MetricsServerConfig {
    /// Listens on all interfaces at `port`.
    pub fn with_port(port: u16) -> Self {
        Self {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], port)),
        }
    }
}

impl Default for MetricsServerConfig {
    fn default() -> Self {
        Self::with_port(9090)
    }
}

/// What the handlers read from.
pub struct MetricsState {
    registry: MetricsRegistry,
    engine: Arc<Engine>,
    driver: Option<StatusHandle>,
}

impl MetricsState {
    /// Pulls a fresh snapshot into the registry.
    pub fn refresh(&self) {
        let driver = self.driver.as_ref().map(|status| status.lock().clone());
        let snapshot = MetricsSnapshot::from_engine(&self.engine, driver.as_ref());
        self.registry.update(&snapshot);
    }

    fn scrape(&self) -> Response {
        self.refresh();
        match self.registry.encode() {
            Ok(body) => (
                [(header::CONTENT_TYPE, "text/plain; version=0.0.4; charset=utf-8")],
                body,
            )
                .into_response(),
            Err(e) => {
                tracing::error!(error = %e, "Metrics encoding failed");
                (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response()
            }
        }
    }
}

/// Serves engine metrics over HTTP.
pub struct MetricsServer {
    config: MetricsServerConfig,
    state: Arc<MetricsState>,
}

impl MetricsServer {
    /// Wraps `engine` (and optionally the sensor driver status).
    pub fn new(
        config: MetricsServerConfig,
        registry: MetricsRegistry,
        engine: Arc<Engine>,
        driver: Option<StatusHandle>,
    ) -> Self {
        let state = Arc::new(MetricsState {
            registry,
            engine,
            driver,
        });
        Self { config, state }
    }

    /// Shared handler state.
    pub fn state(&self) -> Arc<MetricsState> {
        Arc::clone(&self.state)
    }

    /// Serves until the listener fails.
    pub async fn run(self) -> Result<(), ServerError> {
        let addr = self.config.bind_addr;
        let listener = tokio::net::TcpListener::bind(addr)
            .await
            .map_err(|source| ServerError::Bind { addr, source })?;
        tracing::info!(%addr, "Metrics server listening");

        axum::serve(listener, routes(self.state)).await?;
        Ok(())
    }
}

fn routes(state: Arc<MetricsState>) -> Router {
    Router::new()
        .route("/metrics", get(|State(s): State<Arc<MetricsState>>| async move { s.scrape() }))
        .route("/health", get(|| async { "OK" }))
        .route(
            "/live",
            get(|State(s): State<Arc<MetricsState>>| async move { Json(s.engine.get_live_stats()) }),
        )
        .layer(CorsLayer::permissive())
        .with_state(state)
}
