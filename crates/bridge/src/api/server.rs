//! HTTP API server implementation

use crate::app::AppState;
use crate::api::routes;
use anyhow::{Context, Result};
use axum::{extract::DefaultBodyLimit, http::Method, Router};
use std::{net::SocketAddr, sync::Arc, time::Duration};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower_http::{
    cors::{Any, CorsLayer},
    timeout::TimeoutLayer,
    trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer},
};
use tracing::{info, Level};

/// HTTP API server
pub struct ApiServer {
    app: Router,
    addr: SocketAddr,
    shutdown: CancellationToken,
}

impl ApiServer {
    /// Create a new API server
    pub fn new(state: Arc<AppState>) -> Result<Self> {
        let config = &state.config;

        // Parse server address
        let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port)
            .parse()
            .context("Invalid server host/port configuration")?;

        // CNL pages and the browser extension call from arbitrary origins
        let cors = if config.server.cors_enabled {
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods([Method::GET, Method::POST, Method::DELETE, Method::OPTIONS])
                .allow_headers(Any)
        } else {
            CorsLayer::new()
        };

        let mut app = routes::create_routes(&state)
            .layer(DefaultBodyLimit::max(config.server.max_body_size))
            .layer(TimeoutLayer::new(Duration::from_secs(
                config.server.request_timeout_seconds,
            )))
            .layer(cors);

        if config.logging.request_logging {
            app = app.layer(
                TraceLayer::new_for_http()
                    .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                    .on_response(DefaultOnResponse::new().level(Level::INFO)),
            );
        }

        let app = app.with_state(state.clone());

        info!("API server configured for {}", addr);

        Ok(Self {
            app,
            addr,
            shutdown: CancellationToken::new(),
        })
    }

    /// Run the API server until shutdown is requested
    pub async fn run(&mut self) -> Result<()> {
        let listener = TcpListener::bind(self.addr)
            .await
            .context("Failed to bind to server address")?;

        info!("API server listening on {}", self.addr);

        let shutdown = self.shutdown.clone();
        axum::serve(listener, self.app.clone())
            .with_graceful_shutdown(async move { shutdown.cancelled().await })
            .await
            .context("API server error")?;

        Ok(())
    }

    /// Stop accepting connections
    pub async fn shutdown(&mut self) -> Result<()> {
        info!("API server shutdown initiated");
        self.shutdown.cancel();
        Ok(())
    }
}
