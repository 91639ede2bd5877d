//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create Axum Router with the dispatch handler
//! - Wire up middleware (access control, tracing, timeout, request ID)
//! - Compile the access engine and proxy router from config
//! - Bind server to listener with graceful shutdown

use axum::{middleware, routing::any, Router};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower_http::{timeout::TimeoutLayer, trace::TraceLayer};

use crate::config::SiteConfig;
use crate::http::dispatch::dispatch;
use crate::http::middleware::access_control_middleware;
use crate::http::proxy::ProxyTransport;
use crate::http::request::{propagate_request_id_layer, set_request_id_layer};
use crate::http::static_files::{ServeDirResponder, StaticResponder};
use crate::observability::{EventSink, TracingSink};
use crate::routing::ProxyRouter;
use crate::security::AccessEngine;

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<AccessEngine>,
    pub router: Arc<ProxyRouter>,
    pub transport: ProxyTransport,
    pub responder: Arc<dyn StaticResponder>,
    pub log_urls: bool,
}

/// HTTP server fronting the static site and proxies.
pub struct HttpServer {
    router: Router,
    config: SiteConfig,
}

impl HttpServer {
    /// Create a new HTTP server with the given configuration.
    pub fn new(config: SiteConfig) -> Self {
        Self::builder(config).build()
    }

    /// Builder for servers with a custom engine, responder or event sink.
    pub fn builder(config: SiteConfig) -> HttpServerBuilder {
        HttpServerBuilder {
            config,
            sink: Arc::new(TracingSink),
            engine: None,
            responder: None,
        }
    }

    /// Build the Axum router with all middleware layers.
    #[allow(deprecated)]
    fn build_router(config: &SiteConfig, state: AppState) -> Router {
        Router::new()
            .route("/{*path}", any(dispatch))
            .route("/", any(dispatch))
            .layer(middleware::from_fn_with_state(
                state.clone(),
                access_control_middleware,
            ))
            .with_state(state)
            .layer(TimeoutLayer::new(Duration::from_secs(config.timeouts.request_secs)))
            .layer(propagate_request_id_layer())
            .layer(TraceLayer::new_for_http())
            .layer(set_request_id_layer())
    }

    /// Run the server until `shutdown` fires.
    pub async fn run(
        self,
        listener: TcpListener,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "HTTP server starting");

        let app = self.router.into_make_service_with_connect_info::<SocketAddr>();

        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
                tracing::info!("Shutdown signal received");
            })
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }

    /// The fully layered router, e.g. for driving requests in tests.
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    /// Get a reference to the config.
    pub fn config(&self) -> &SiteConfig {
        &self.config
    }
}

/// Assembles an [`HttpServer`].
pub struct HttpServerBuilder {
    config: SiteConfig,
    sink: Arc<dyn EventSink>,
    engine: Option<AccessEngine>,
    responder: Option<Arc<dyn StaticResponder>>,
}

impl HttpServerBuilder {
    /// Sink for diagnostics of the engine and router built from config.
    pub fn sink(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.sink = sink;
        self
    }

    /// Use a prebuilt engine instead of the one described by `[access]`.
    pub fn engine(mut self, engine: AccessEngine) -> Self {
        self.engine = Some(engine);
        self
    }

    /// Replace the directory-backed static responder.
    pub fn responder(mut self, responder: Arc<dyn StaticResponder>) -> Self {
        self.responder = Some(responder);
        self
    }

    pub fn build(self) -> HttpServer {
        let config = self.config;
        let sink = self.sink;

        let engine = self
            .engine
            .unwrap_or_else(|| AccessEngine::from_config(&config.access, sink.clone()));
        let router = ProxyRouter::from_config(&config.proxies, sink.as_ref());
        let responder = self.responder.unwrap_or_else(|| {
            Arc::new(
                ServeDirResponder::new(&config.serve.public)
                    .clean_urls(config.serve.clean_urls)
                    .route_prefix(config.serve.route_prefix.clone()),
            )
        });

        let state = AppState {
            engine: Arc::new(engine),
            router: Arc::new(router),
            transport: ProxyTransport::new(),
            responder,
            log_urls: config.logs.url,
        };

        let router = HttpServer::build_router(&config, state);
        HttpServer { router, config }
    }
}
