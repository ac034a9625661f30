//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create Axum Router with the proxy handler
//! - Wire up middleware (tracing, request timeout)
//! - Build the observing transport around the upstream client
//! - Bind server to listener and shut down gracefully

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    body::Body,
    extract::{ConnectInfo, State},
    http::{Request, StatusCode},
    response::{IntoResponse, Response},
    Router,
};
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower::{Layer, ServiceExt};
use tower_http::{timeout::TimeoutLayer, trace::TraceLayer};

use crate::config::{ProxyConfig, TranscriptOutput};
use crate::http::request::prepare_request;
use crate::http::response::{error_response, prepare_response};
use crate::http::target::{TargetError, UpstreamTarget};
use crate::transport::{
    ConsoleSink, LogSink, ObservingLayer, ObservingTransport, SequenceCounter, TranscriptSink,
    Upstream,
};

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub target: Arc<UpstreamTarget>,
    pub transport: ObservingTransport<Upstream>,
}

/// HTTP server for the proxy.
pub struct HttpServer {
    router: Router,
    config: ProxyConfig,
    counter: SequenceCounter,
}

impl HttpServer {
    /// Create a server writing transcripts where the config says.
    pub fn new(config: ProxyConfig) -> Result<Self, TargetError> {
        let sink: Arc<dyn TranscriptSink> = match config.transcript.output {
            TranscriptOutput::Stdout => Arc::new(ConsoleSink::stdout()),
            TranscriptOutput::Log => Arc::new(LogSink),
        };
        Self::with_sink(config, sink)
    }

    /// Create a server writing transcripts to `sink`.
    pub fn with_sink(config: ProxyConfig, sink: Arc<dyn TranscriptSink>) -> Result<Self, TargetError> {
        let target = UpstreamTarget::parse(&config.upstream.target)?;
        let upstream = Upstream::new(Duration::from_secs(config.timeouts.connect_secs))?;

        let transport = ObservingLayer::from_shared(sink)
            .with_policy(config.transcript.on_capture_error)
            .layer(upstream);
        let counter = transport.counter().clone();

        let state = AppState {
            target: Arc::new(target),
            transport,
        };

        let router = Self::build_router(&config, state);
        Ok(Self {
            router,
            config,
            counter,
        })
    }

    /// Build the Axum router with all middleware layers.
    #[allow(deprecated)]
    fn build_router(config: &ProxyConfig, state: AppState) -> Router {
        Router::new()
            .fallback(proxy_handler)
            .with_state(state)
            .layer(TimeoutLayer::new(Duration::from_secs(config.timeouts.request_secs)))
            .layer(TraceLayer::new_for_http())
    }

    /// Run the server until `shutdown` fires.
    pub async fn run(
        self,
        listener: TcpListener,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(
            address = %addr,
            target = %self.config.upstream.target,
            "HTTP server starting"
        );

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

    /// Get a reference to the config.
    pub fn config(&self) -> &ProxyConfig {
        &self.config
    }

    /// Counter shared with the transport; ids handed out so far.
    pub fn counter(&self) -> &SequenceCounter {
        &self.counter
    }
}

/// Forward every request to the target through the observing transport.
async fn proxy_handler(
    State(state): State<AppState>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    request: Request<Body>,
) -> Response {
    let method = request.method().clone();
    let path = request.uri().path().to_string();

    let request = match prepare_request(request, &state.target, Some(peer.ip())) {
        Ok(request) => request,
        Err(e) => {
            tracing::warn!(method = %method, path = %path, error = %e, "Cannot rewrite request");
            return (StatusCode::BAD_REQUEST, "Invalid request target").into_response();
        }
    };

    match state.transport.oneshot(request).await {
        Ok(response) => prepare_response(response),
        Err(e) => {
            tracing::error!(method = %method, path = %path, error = %e, "Proxy round trip failed");
            error_response(&e)
        }
    }
}
