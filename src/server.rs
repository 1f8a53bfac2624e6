//! Axum server setup, shared application state, and graceful shutdown.
//!
//! Contains [`AppState`] (the `Arc`-shared state holding the backend
//! registry, health store, forwarder, prober and stats), [`build_router`]
//! for constructing the Axum router with middleware layers,
//! [`build_http_client`] for the connection-pooled hyper client, and
//! [`shutdown_signal`] for SIGTERM / Ctrl+C handling.

use std::any::Any;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::extract::State;
use axum::http::Uri;
use axum::routing::get;
use axum::{Json, Router};
use bytes::Bytes;
use http_body_util::Full;
use hyper_util::client::legacy::Client;
use hyper_util::rt::TokioExecutor;
use serde::Serialize;
use tower::ServiceBuilder;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;

use crate::error::ApiError;
use crate::health::health_handler;
use crate::health::prober::Prober;
use crate::health::store::HealthStore;
use crate::proxy;
use crate::proxy::forwarder::Forwarder;
use crate::proxy::retry::RetryPolicy;
use crate::registry::{BackendRegistry, BackendSummary};

#[derive(Debug)]
pub struct Stats {
    pub forwarded: AtomicU64,
    pub failed: AtomicU64,
}

impl Default for Stats {
    fn default() -> Self {
        Self::new()
    }
}

impl Stats {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            forwarded: AtomicU64::new(0),
            failed: AtomicU64::new(0),
        }
    }
}

pub type HttpsConnector =
    hyper_rustls::HttpsConnector<hyper_util::client::legacy::connect::HttpConnector>;
pub type HttpClient = Client<HttpsConnector, Full<Bytes>>;

pub struct AppState {
    pub registry: BackendRegistry,
    pub health: Arc<HealthStore>,
    pub forwarder: Forwarder,
    pub prober: Prober,
    pub start_time: Instant,
    pub stats: Stats,
}

impl AppState {
    /// Wire a fresh health store (every backend `Unknown`) into a
    /// forwarder and prober sharing `http_client`.
    #[must_use]
    pub fn new(registry: BackendRegistry, http_client: HttpClient, policy: RetryPolicy) -> Self {
        let health = Arc::new(HealthStore::new(registry.ids()));
        Self {
            forwarder: Forwarder::new(http_client.clone(), Arc::clone(&health), policy),
            prober: Prober::new(http_client, Arc::clone(&health)),
            registry,
            health,
            start_time: Instant::now(),
            stats: Stats::new(),
        }
    }
}

#[must_use]
pub fn build_http_client() -> HttpClient {
    // When multiple rustls crypto providers are compiled in, rustls cannot
    // auto-detect which one to use. Explicitly install `ring`.
    let _ = rustls::crypto::ring::default_provider().install_default();

    let https = hyper_rustls::HttpsConnectorBuilder::new()
        .with_webpki_roots()
        .https_or_http()
        .enable_http1()
        .build();
    Client::builder(TokioExecutor::new())
        .pool_idle_timeout(Duration::from_secs(30))
        .build(https)
}

pub fn build_router(state: Arc<AppState>, max_body: usize) -> Router {
    Router::new()
        .route("/", get(root_handler).fallback(route_not_found))
        .route("/health", get(health_handler).fallback(route_not_found))
        .fallback(proxy::forward_handler)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CatchPanicLayer::custom(handle_panic))
                .layer(RequestBodyLimitLayer::new(max_body)),
        )
        .with_state(state)
}

#[derive(Serialize)]
pub struct RootResponse {
    pub message: String,
    pub endpoints: BTreeMap<String, String>,
    pub services: BTreeMap<String, BackendSummary>,
    pub stats: StatsResponse,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatsResponse {
    pub uptime_seconds: u64,
    pub requests_forwarded: u64,
    pub requests_failed: u64,
}

pub async fn root_handler(State(state): State<Arc<AppState>>) -> Json<RootResponse> {
    let mut endpoints = BTreeMap::new();
    endpoints.insert("health".to_string(), "/health".to_string());
    for backend in state.registry.iter() {
        endpoints.insert(backend.id.clone(), backend.prefix.clone());
    }

    Json(RootResponse {
        message: "API Gateway is running!".into(),
        endpoints,
        services: state
            .registry
            .iter()
            .map(|b| (b.id.clone(), b.summary()))
            .collect(),
        stats: StatsResponse {
            uptime_seconds: state.start_time.elapsed().as_secs(),
            requests_forwarded: state.stats.forwarded.load(Ordering::Relaxed),
            requests_failed: state.stats.failed.load(Ordering::Relaxed),
        },
    })
}

/// Other methods on `/` and `/health` miss like any unrouted path.
async fn route_not_found(uri: Uri) -> ApiError {
    ApiError::RouteNotFound {
        route: uri
            .path_and_query()
            .map_or_else(|| uri.path().to_string(), ToString::to_string),
    }
}

fn handle_panic(err: Box<dyn Any + Send + 'static>) -> http::Response<Full<Bytes>> {
    let message = err
        .downcast_ref::<String>()
        .cloned()
        .or_else(|| err.downcast_ref::<&str>().map(|s| (*s).to_string()))
        .unwrap_or_else(|| "unknown panic".into());
    tracing::error!(error = %message, "handler panicked");

    let body = serde_json::json!({
        "error": "Internal Gateway Error",
        "message": message,
    });

    let mut response = http::Response::new(Full::new(Bytes::from(body.to_string())));
    *response.status_mut() = http::StatusCode::INTERNAL_SERVER_ERROR;
    response.headers_mut().insert(
        http::header::CONTENT_TYPE,
        http::HeaderValue::from_static("application/json"),
    );
    response
}

pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => tracing::info!("received Ctrl+C"),
        () = terminate => tracing::info!("received SIGTERM"),
    }
}
