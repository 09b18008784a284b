//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create Axum Router with all handlers
//! - Wire up middleware (tracing, request ID, CORS, limits, timeout)
//! - Bind server to listener
//! - Swap in reloaded configuration while serving
//! - Drain in-flight requests on shutdown

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use arc_swap::ArcSwap;
use axum::{
    body::Body,
    error_handling::HandleErrorLayer,
    extract::{ConnectInfo, DefaultBodyLimit, MatchedPath},
    http::{HeaderName, HeaderValue, Method, Request},
    middleware::{self, Next},
    response::Response,
    routing::{any, get},
    Router,
};
use tokio::net::TcpListener;
use tokio::sync::{broadcast, mpsc};
use tower::{timeout::error::Elapsed, timeout::TimeoutLayer, BoxError, ServiceBuilder};
use tower_http::{
    cors::{AllowOrigin, Any, CorsLayer},
    request_id::{PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};

use crate::cache::{reply_cache, response_cache, ReplyCache, ResponseCache, X_CACHE};
use crate::config::{CorsConfig, ProxyConfig};
use crate::http::error::ApiError;
use crate::http::request::{request_id, x_request_id, MakeRequestUuidV4};
use crate::http::{archive, chat, predict, status};
use crate::observability::metrics;
use crate::upstream::{UpstreamClient, UpstreamResult};

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    config: Arc<ArcSwap<ProxyConfig>>,
    /// Request deadline baked into the running middleware stack.
    request_timeout: Duration,
    pub upstream: UpstreamClient,
    pub archive_cache: ResponseCache,
    pub reply_cache: ReplyCache,
}

impl AppState {
    /// Build state with empty caches.
    pub fn new(config: ProxyConfig) -> UpstreamResult<Self> {
        Ok(Self {
            request_timeout: config.timeouts.request(),
            config: Arc::new(ArcSwap::from_pointee(config)),
            upstream: UpstreamClient::new()?,
            archive_cache: response_cache(),
            reply_cache: reply_cache(),
        })
    }

    /// Snapshot of the configuration in effect.
    pub fn config(&self) -> Arc<ProxyConfig> {
        self.config.load_full()
    }

    /// Replace the configuration. Caches are kept.
    ///
    /// A reload whose upstream deadline would outlast the running request
    /// deadline is refused, and `false` is returned.
    pub fn apply_config(&self, new_config: ProxyConfig) -> bool {
        if new_config.timeouts.upstream() > self.request_timeout {
            tracing::error!(
                upstream_secs = new_config.timeouts.upstream_secs,
                running_request_secs = self.request_timeout.as_secs(),
                "Reloaded upstream timeout exceeds the running request timeout, keeping current configuration"
            );
            return false;
        }

        let current = self.config.load();
        if current.listener != new_config.listener
            || current.cors != new_config.cors
            || current.timeouts.request_secs != new_config.timeouts.request_secs
            || current.observability != new_config.observability
        {
            tracing::warn!("Listener, CORS, request timeout and observability changes take effect after restart");
        }
        self.config.store(Arc::new(new_config));
        tracing::info!("Configuration reloaded");
        true
    }
}

/// HTTP server for the proxy.
pub struct HttpServer {
    router: Router,
    state: AppState,
}

impl HttpServer {
    /// Create a new HTTP server with the given configuration.
    pub fn new(config: ProxyConfig) -> UpstreamResult<Self> {
        let state = AppState::new(config)?;
        Ok(Self::with_state(state))
    }

    /// Create a server around existing state.
    pub fn with_state(state: AppState) -> Self {
        let router = Self::build_router(&state.config(), state.clone());
        Self { router, state }
    }

    /// Build the Axum router with all middleware layers.
    fn build_router(config: &ProxyConfig, state: AppState) -> Router {
        let request_secs = state.request_timeout.as_secs();
        let layers = ServiceBuilder::new()
            .layer(SetRequestIdLayer::new(x_request_id(), MakeRequestUuidV4))
            .layer(TraceLayer::new_for_http().make_span_with(|request: &Request<Body>| {
                let peer = request
                    .extensions()
                    .get::<ConnectInfo<SocketAddr>>()
                    .map(|ConnectInfo(addr)| addr.to_string())
                    .unwrap_or_default();
                tracing::info_span!(
                    "request",
                    request_id = %request_id(request.headers()),
                    method = %request.method(),
                    path = %request.uri().path(),
                    peer = %peer,
                )
            }))
            .layer(PropagateRequestIdLayer::new(x_request_id()))
            .layer(cors_layer(&config.cors))
            .layer(DefaultBodyLimit::max(config.listener.max_body_bytes))
            .layer(HandleErrorLayer::new(move |err: BoxError| async move {
                middleware_error(err, request_secs)
            }))
            .layer(TimeoutLayer::new(state.request_timeout));

        Router::new()
            .route("/api/exoplanets", any(archive::proxy_archive))
            .route("/api/predict", any(predict::proxy_predict))
            .route("/api/gemini", any(chat::proxy_chat))
            .route("/api/health", get(status::get_status))
            .route_layer(middleware::from_fn(track_metrics))
            .with_state(state)
            .layer(layers)
    }

    /// Run the server until `shutdown` fires.
    ///
    /// Configurations received on `config_updates` are swapped in while serving.
    pub async fn run(
        self,
        listener: TcpListener,
        mut config_updates: mpsc::UnboundedReceiver<ProxyConfig>,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "HTTP server starting");

        let state = self.state.clone();
        let reloader = tokio::spawn(async move {
            while let Some(new_config) = config_updates.recv().await {
                state.apply_config(new_config);
            }
        });

        let app = self.router.into_make_service_with_connect_info::<SocketAddr>();

        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
                tracing::info!("Shutdown signal received, draining connections");
            })
            .await?;

        reloader.abort();
        tracing::info!("HTTP server stopped");
        Ok(())
    }

    pub fn state(&self) -> &AppState {
        &self.state
    }
}

fn cors_layer(config: &CorsConfig) -> CorsLayer {
    let origin = if config.allowed_origins.iter().any(|o| o == "*") {
        AllowOrigin::any()
    } else {
        let origins: Vec<HeaderValue> = config
            .allowed_origins
            .iter()
            .filter_map(|o| match HeaderValue::from_str(o) {
                Ok(v) => Some(v),
                Err(e) => {
                    tracing::warn!(origin = %o, error = %e, "Ignoring invalid CORS origin");
                    None
                }
            })
            .collect();
        AllowOrigin::list(origins)
    };

    CorsLayer::new()
        .allow_origin(origin)
        .allow_methods([Method::GET, Method::HEAD, Method::POST, Method::OPTIONS])
        .allow_headers(Any)
        .expose_headers([HeaderName::from_static(X_CACHE), x_request_id()])
}

/// Turn middleware failures into the JSON error envelope.
fn middleware_error(err: BoxError, request_secs: u64) -> ApiError {
    if err.is::<Elapsed>() {
        tracing::warn!(request_secs, "Request timed out");
        return ApiError::RequestTimeout(request_secs);
    }
    tracing::error!(error = %err, "Middleware failure");
    ApiError::Proxy
}

/// Count requests and latency per matched route.
async fn track_metrics(request: Request<Body>, next: Next) -> Response {
    let start = Instant::now();
    let route = request
        .extensions()
        .get::<MatchedPath>()
        .map(|path| path.as_str().to_owned())
        .unwrap_or_else(|| "unmatched".to_owned());

    let response = next.run(request).await;
    metrics::record_request(&route, response.status().as_u16(), start);
    response
}
