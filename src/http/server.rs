//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create Axum Router with the relay handler on every path
//! - Wire up middleware (request ID, tracing, timeout)
//! - Adapt wire requests to the pipeline and back
//! - Bind server to listener and drain on shutdown

use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::{
    body::Body,
    extract::State,
    http::Request,
    response::Response,
    routing::get,
    Router,
};
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tracing::Span;
use tower_http::{
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use crate::config::RelayConfig;
use crate::http::request::{into_inbound, request_id};
use crate::http::response::{into_http_response, stream_response};
use crate::lifecycle::shutdown;
use crate::observability::metrics;
use crate::relay::classifier::classify;
use crate::relay::{HttpUpstream, Relay};

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub relay: Arc<Relay<HttpUpstream>>,
    pub streaming: bool,
    pub max_body_size: usize,
}

/// HTTP server for the relay.
pub struct HttpServer {
    router: Router,
    config: RelayConfig,
}

impl HttpServer {
    /// Create a new HTTP server with the given configuration.
    pub fn new(config: RelayConfig) -> Result<Self, reqwest::Error> {
        let upstream = HttpUpstream::new(&config.upstream, &config.timeouts)?;
        let relay = Relay::new(upstream).with_user_agent(config.upstream.user_agent.clone());

        let state = AppState {
            relay: Arc::new(relay),
            streaming: config.response.streaming,
            max_body_size: config.limits.max_body_size,
        };

        let router = Self::build_router(&config, state);
        Ok(Self { router, config })
    }

    /// Build the Axum router with all middleware layers.
    #[allow(deprecated)]
    fn build_router(config: &RelayConfig, state: AppState) -> Router {
        Router::new()
            .route("/healthz", get(|| async { "ok" }))
            .fallback(relay_handler)
            .with_state(state)
            .layer(TimeoutLayer::new(Duration::from_secs(config.timeouts.request_secs)))
            .layer(PropagateRequestIdLayer::x_request_id())
            .layer(TraceLayer::new_for_http().make_span_with(request_span))
            .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
    }

    /// The fully layered router, for driving the server without a socket.
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    /// Run the server until `shutdown_rx` fires, then drain in-flight requests.
    pub async fn run(
        self,
        listener: TcpListener,
        shutdown_rx: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(
            address = %addr,
            streaming = self.config.response.streaming,
            "HTTP server starting"
        );

        axum::serve(listener, self.router)
            .with_graceful_shutdown(shutdown::wait(shutdown_rx))
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }

    /// Get a reference to the config.
    pub fn config(&self) -> &RelayConfig {
        &self.config
    }
}

/// Span for one inbound request, tagged with the id set by
/// `SetRequestIdLayer`.
fn request_span(request: &Request<Body>) -> Span {
    tracing::info_span!(
        "request",
        method = %request.method(),
        uri = %request.uri(),
        request_id = %request_id(request.headers()),
    )
}

/// Relay handler: every path, every method.
async fn relay_handler(State(state): State<AppState>, request: Request<Body>) -> Response {
    let start_time = Instant::now();
    let request_id = request_id(request.headers()).to_string();
    let method = request.method().to_string();

    tracing::debug!(request_id = %request_id, method = %method, uri = %request.uri(), "Relaying request");

    // Method policy comes before the body limit.
    let response = if let Err(e) = classify(Some(method.as_str())) {
        into_http_response(e.into_response())
    } else {
        match into_inbound(request, state.max_body_size).await {
            Ok(inbound) if state.streaming => stream_response(&state.relay, &inbound).await,
            Ok(inbound) => into_http_response(state.relay.handle(&inbound).await),
            Err(e) => into_http_response(e.into_response()),
        }
    };

    let status = response.status().as_u16();
    metrics::record_request(&method, status, start_time);
    tracing::info!(
        request_id = %request_id,
        method = %method,
        status,
        elapsed_ms = start_time.elapsed().as_millis() as u64,
        "Request relayed"
    );

    response
}
