//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create Axum Router with the proxy handler
//! - Wire up middleware (tracing, timeout, request ID, admission gate)
//! - Bind server to listener
//! - Forward admitted requests to the origin
//! - Apply admission settings from reloaded configs

use std::sync::Arc;
use std::time::{Duration, Instant};

use arc_swap::ArcSwap;
use axum::{
    body::Body,
    extract::State,
    http::{
        uri::{Authority, PathAndQuery, Scheme},
        Request, StatusCode, Uri, Version,
    },
    middleware,
    response::{IntoResponse, Response},
    routing::any,
    Router,
};
use hyper_util::{
    client::legacy::{connect::HttpConnector, Client},
    rt::TokioExecutor,
};
use thiserror::Error;
use tokio::net::TcpListener;
use tokio::sync::{broadcast, mpsc};
use tower::ServiceBuilder;
use tower_http::{
    request_id::{PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use crate::config::validation::ValidationError;
use crate::config::ProxyConfig;
use crate::http::middleware::{admission_middleware, AdmissionState};
use crate::http::request::{request_id, MakeRequestUuid};
use crate::http::response::strip_hop_by_hop;
use crate::lifecycle::shutdown;
use crate::observability::metrics;

/// Errors preventing the server from starting or running.
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("invalid upstream address {0:?}")]
    InvalidUpstream(String),

    #[error("invalid admission settings: {0}")]
    Admission(#[from] ValidationError),

    #[error("server IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub admission: Arc<ArcSwap<AdmissionState>>,
    pub client: Client<HttpConnector, Body>,
    pub upstream: Authority,
}

/// HTTP server for the admission proxy.
pub struct HttpServer {
    router: Router,
    config: ProxyConfig,
    state: AppState,
}

impl HttpServer {
    /// Create a new HTTP server with the given configuration.
    pub fn new(config: ProxyConfig) -> Result<Self, ServerError> {
        let upstream: Authority = config
            .upstream
            .address
            .parse()
            .map_err(|_| ServerError::InvalidUpstream(config.upstream.address.clone()))?;
        let admission = AdmissionState::from_config(&config.admission)?;

        let client = Client::builder(TokioExecutor::new()).build(HttpConnector::new());

        let state = AppState {
            admission: Arc::new(ArcSwap::from_pointee(admission)),
            client,
            upstream,
        };

        let router = Self::build_router(&config, state.clone());
        Ok(Self {
            router,
            config,
            state,
        })
    }

    /// Build the Axum router with all middleware layers.
    #[allow(deprecated)]
    fn build_router(config: &ProxyConfig, state: AppState) -> Router {
        Router::new()
            .route("/{*path}", any(proxy_handler))
            .route("/", any(proxy_handler))
            .layer(middleware::from_fn_with_state(state.clone(), admission_middleware))
            .with_state(state)
            .layer(
                ServiceBuilder::new()
                    .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
                    .layer(TraceLayer::new_for_http())
                    .layer(PropagateRequestIdLayer::x_request_id())
                    .layer(TimeoutLayer::new(Duration::from_secs(config.timeouts.request_secs))),
            )
    }

    /// Run the server, accepting connections on the given listener.
    ///
    /// Configs received on `config_updates` replace the admission settings;
    /// the server drains and returns once `shutdown` fires.
    pub async fn run(
        self,
        listener: TcpListener,
        config_updates: mpsc::UnboundedReceiver<ProxyConfig>,
        shutdown: broadcast::Receiver<()>,
    ) -> Result<(), ServerError> {
        let addr = listener.local_addr()?;
        tracing::info!(
            address = %addr,
            upstream = %self.state.upstream,
            admission_enabled = self.state.admission.load().is_enabled(),
            "HTTP server starting"
        );

        tokio::spawn(reload_loop(
            self.state.admission.clone(),
            self.config.clone(),
            config_updates,
            shutdown.resubscribe(),
        ));

        axum::serve(listener, self.router)
            .with_graceful_shutdown(shutdown::wait_for(shutdown))
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }

    /// Get a reference to the config.
    pub fn config(&self) -> &ProxyConfig {
        &self.config
    }
}

/// Apply reloaded configs until the channel closes or shutdown fires.
async fn reload_loop(
    admission: Arc<ArcSwap<AdmissionState>>,
    mut current: ProxyConfig,
    mut updates: mpsc::UnboundedReceiver<ProxyConfig>,
    mut shutdown: broadcast::Receiver<()>,
) {
    loop {
        tokio::select! {
            update = updates.recv() => match update {
                Some(new_config) => {
                    apply_reload(&admission, &current, &new_config);
                    current = new_config;
                }
                None => break,
            },
            _ = shutdown.recv() => break,
        }
    }
}

fn apply_reload(admission: &ArcSwap<AdmissionState>, current: &ProxyConfig, new_config: &ProxyConfig) {
    if current.listener.bind_address != new_config.listener.bind_address
        || current.upstream.address != new_config.upstream.address
    {
        tracing::warn!("Listener and upstream changes require a restart; ignoring them");
    }

    match AdmissionState::from_config(&new_config.admission) {
        Ok(state) => {
            admission.store(Arc::new(state));
            tracing::info!(
                enabled = new_config.admission.enabled,
                service_url = %new_config.admission.service_url,
                "Admission settings reloaded"
            );
        }
        Err(e) => {
            tracing::error!(error = %e, "Rejected reloaded admission settings, keeping current ones");
        }
    }
}

/// Forward an admitted request to the origin.
async fn proxy_handler(State(state): State<AppState>, request: Request<Body>) -> Response {
    let started = Instant::now();
    let request_id = request_id(&request).unwrap_or("unknown").to_string();
    let method = request.method().clone();

    let (mut parts, body) = request.into_parts();

    let mut uri_parts = parts.uri.clone().into_parts();
    uri_parts.scheme = Some(Scheme::HTTP);
    uri_parts.authority = Some(state.upstream.clone());
    if uri_parts.path_and_query.is_none() {
        uri_parts.path_and_query = Some(PathAndQuery::from_static("/"));
    }
    parts.uri = match Uri::from_parts(uri_parts) {
        Ok(uri) => uri,
        Err(e) => {
            tracing::error!(request_id = %request_id, error = %e, "Failed to build upstream URI");
            metrics::record_request(method.as_str(), 502, started);
            return (StatusCode::BAD_GATEWAY, "Upstream request failed").into_response();
        }
    };
    parts.version = Version::HTTP_11;
    strip_hop_by_hop(&mut parts.headers);

    tracing::debug!(
        request_id = %request_id,
        method = %method,
        uri = %parts.uri,
        "Forwarding admitted request"
    );

    match state.client.request(Request::from_parts(parts, body)).await {
        Ok(response) => {
            let (mut parts, body) = response.into_parts();
            strip_hop_by_hop(&mut parts.headers);
            metrics::record_request(method.as_str(), parts.status.as_u16(), started);
            Response::from_parts(parts, Body::new(body))
        }
        Err(e) => {
            tracing::error!(request_id = %request_id, error = %e, "Upstream error");
            metrics::record_request(method.as_str(), 502, started);
            (StatusCode::BAD_GATEWAY, "Upstream request failed").into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_upstream_rejected() {
        let mut config = ProxyConfig::default();
        config.upstream.address = "not an authority".into();
        assert!(matches!(
            HttpServer::new(config),
            Err(ServerError::InvalidUpstream(_))
        ));
    }

    #[test]
    fn test_invalid_service_url_rejected() {
        let mut config = ProxyConfig::default();
        config.admission.service_url = "ftp://queue.internal".into();
        assert!(matches!(HttpServer::new(config), Err(ServerError::Admission(_))));
    }

    #[tokio::test]
    async fn test_reload_swaps_admission_settings() {
        let config = ProxyConfig::default();
        let server = HttpServer::new(config.clone()).unwrap();
        let admission = server.state.admission.clone();
        assert!(admission.load().is_enabled());

        let mut disabled = config.clone();
        disabled.admission.enabled = false;
        apply_reload(&admission, &config, &disabled);
        assert!(!admission.load().is_enabled());

        let mut broken = config.clone();
        broken.admission.service_url = "nonsense".into();
        apply_reload(&admission, &disabled, &broken);
        assert!(!admission.load().is_enabled(), "invalid reload keeps previous settings");
    }
}
