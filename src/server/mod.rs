use anyhow::{Context, Result};
use axum::http::{header, Method};
use axum::routing::{get, post};
use axum::Router;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer};
use tracing::Level;

pub mod handlers;

use crate::config::Config;
use crate::proxy::ProxyPool;
use crate::transcript::{ClientFactory, TranscriptError, TranscriptFetcher};
use crate::youtube::YoutubeClientFactory;

/// Shared, read-only context handed to every handler
#[derive(Clone)]
pub struct AppState {
    pool: Arc<ProxyPool>,
    clients: Arc<dyn ClientFactory>,
    languages: Arc<[String]>,
}

impl AppState {
    pub fn new(pool: ProxyPool, clients: Arc<dyn ClientFactory>, languages: Vec<String>) -> Self {
        Self {
            pool: Arc::new(pool),
            clients,
            languages: languages.into(),
        }
    }

    /// Pick a proxy at random and build a client around it
    pub fn make_client(&self) -> Result<Box<dyn TranscriptFetcher>, TranscriptError> {
        let proxy = self.pool.pick(&mut rand::rng()).cloned();
        self.clients.make_client(proxy)
    }

    /// Requested languages, or the configured defaults when none were given
    pub fn languages_or(&self, requested: Option<Vec<String>>) -> Vec<String> {
        requested
            .filter(|languages| !languages.is_empty())
            .unwrap_or_else(|| self.languages.to_vec())
    }
}

/// Build the router with all routes and middleware
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(AllowOrigin::any())
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE])
        .expose_headers([header::CONTENT_TYPE]);

    let trace_layer = TraceLayer::new_for_http()
        .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
        .on_response(DefaultOnResponse::new().level(Level::INFO));

    Router::new()
        .route("/", get(handlers::health_handler))
        .route("/transcript/batch", post(handlers::batch_handler))
        .route("/transcript/{video_id}", get(handlers::transcript_handler))
        .layer(trace_layer)
        .layer(cors)
        .with_state(state)
}

/// Assembled HTTP server
pub struct Server {
    router: Router,
    listen_address: SocketAddr,
}

impl Server {
    /// Build the server around an already loaded proxy pool
    pub fn new(config: &Config, pool: ProxyPool) -> Result<Self> {
        let listen_address = config.listen_address()?;
        let clients = Arc::new(YoutubeClientFactory::new(
            config.upstream.base_url.clone(),
            config.upstream_timeout(),
        ));
        let state = AppState::new(pool, clients, config.upstream.languages.clone());

        Ok(Self {
            router: create_router(state),
            listen_address,
        })
    }

    pub fn listen_address(&self) -> SocketAddr {
        self.listen_address
    }

    /// Serve until Ctrl-C
    pub async fn run(self) -> Result<()> {
        let listener = tokio::net::TcpListener::bind(self.listen_address)
            .await
            .with_context(|| format!("Failed to bind {}", self.listen_address))?;

        tracing::info!("Listening on http://{}", self.listen_address);

        axum::serve(listener, self.router)
            .with_graceful_shutdown(shutdown_signal())
            .await
            .context("Server error")?;

        tracing::info!("Server stopped");
        Ok(())
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
