//! Shared fixtures: loopback mock backends and an in-process gateway.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use api_gateway::proxy::retry::RetryPolicy;
use api_gateway::registry::{BackendDescriptor, BackendRegistry};
use api_gateway::server::{self, AppState};
use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderMap, Method, StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

/// An axum backend that answers according to the last path segment:
/// `missing` is a 404, `boom` a 500, `slow` a delayed 200, anything
/// else echoes the request back as JSON.
#[derive(Default)]
pub struct MockBackend {
    pub hits: AtomicUsize,
    pub probes: AtomicUsize,
    pub failing_health: AtomicBool,
    pub request_ids: Mutex<Vec<String>>,
}

impl MockBackend {
    pub fn hits(&self) -> usize {
        self.hits.load(Ordering::SeqCst)
    }

    pub fn set_health_failing(&self, failing: bool) {
        self.failing_health.store(failing, Ordering::SeqCst);
    }

    pub fn request_ids(&self) -> Vec<String> {
        self.request_ids.lock().unwrap().clone()
    }
}

pub const SLOW_DELAY: Duration = Duration::from_millis(300);

pub async fn spawn_mock() -> (SocketAddr, Arc<MockBackend>) {
    let mock = Arc::new(MockBackend::default());
    let router = Router::new()
        .route("/health", get(mock_health))
        .fallback(mock_handler)
        .with_state(Arc::clone(&mock));

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    (addr, mock)
}

async fn mock_health(State(mock): State<Arc<MockBackend>>) -> Response {
    mock.probes.fetch_add(1, Ordering::SeqCst);
    if mock.failing_health.load(Ordering::SeqCst) {
        (StatusCode::SERVICE_UNAVAILABLE, Json(serde_json::json!({"status": "down"}))).into_response()
    } else {
        Json(serde_json::json!({"status": "up"})).into_response()
    }
}

async fn mock_handler(
    State(mock): State<Arc<MockBackend>>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    mock.hits.fetch_add(1, Ordering::SeqCst);
    let header = |name: &str| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(String::from)
    };
    if let Some(id) = header("x-request-id") {
        mock.request_ids.lock().unwrap().push(id);
    }

    match uri.path().rsplit('/').next().unwrap_or_default() {
        "missing" => (
            StatusCode::NOT_FOUND,
            Json(serde_json::json!({"message": "not found"})),
        )
            .into_response(),
        "boom" => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(serde_json::json!({"message": "exploded"})),
        )
            .into_response(),
        last => {
            if last == "slow" {
                tokio::time::sleep(SLOW_DELAY).await;
            }
            Json(serde_json::json!({
                "method": method.as_str(),
                "path": uri.path_and_query().map(|pq| pq.as_str()),
                "body": String::from_utf8_lossy(&body),
                "contentType": header("content-type"),
                "authorization": header("authorization"),
                "requestId": header("x-request-id"),
                "cookie": header("cookie"),
                "userAgent": header("user-agent"),
            }))
            .into_response()
        }
    }
}

/// A raw TCP backend for transport-level failures.
#[derive(Default)]
pub struct RawBackend {
    pub attempts: AtomicUsize,
    pub request_ids: Mutex<Vec<String>>,
}

impl RawBackend {
    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }

    pub fn request_ids(&self) -> Vec<String> {
        self.request_ids.lock().unwrap().clone()
    }
}

/// Closes the first `failures` connections right after reading the
/// request head, then answers `200 {"ok":true}`. Pass `usize::MAX` for
/// a backend that never answers.
pub async fn spawn_flaky(failures: usize) -> (SocketAddr, Arc<RawBackend>) {
    spawn_raw(move |n| n >= failures).await
}

/// Accepts and reads requests, then holds the socket open without
/// answering.
pub async fn spawn_silent() -> (SocketAddr, Arc<RawBackend>) {
    let backend = Arc::new(RawBackend::default());
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let shared = Arc::clone(&backend);
    tokio::spawn(async move {
        loop {
            let Ok((mut stream, _)) = listener.accept().await else {
                return;
            };
            let shared = Arc::clone(&shared);
            tokio::spawn(async move {
                if let Some(head) = read_head(&mut stream).await {
                    shared.record(&head);
                    tokio::time::sleep(Duration::from_secs(10)).await;
                }
                drop(stream);
            });
        }
    });
    (addr, backend)
}

async fn spawn_raw<F>(answer: F) -> (SocketAddr, Arc<RawBackend>)
where
    F: Fn(usize) -> bool + Send + Sync + 'static,
{
    let backend = Arc::new(RawBackend::default());
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let shared = Arc::clone(&backend);
    let answer = Arc::new(answer);
    tokio::spawn(async move {
        loop {
            let Ok((mut stream, _)) = listener.accept().await else {
                return;
            };
            let shared = Arc::clone(&shared);
            let answer = Arc::clone(&answer);
            tokio::spawn(async move {
                let Some(head) = read_head(&mut stream).await else {
                    return;
                };
                let n = shared.record(&head);
                if answer(n) {
                    let body = br#"{"ok":true}"#;
                    let head = format!(
                        "HTTP/1.1 200 OK\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n",
                        body.len()
                    );
                    let _ = stream.write_all(head.as_bytes()).await;
                    let _ = stream.write_all(body).await;
                    let _ = stream.shutdown().await;
                }
                drop(stream);
            });
        }
    });
    (addr, backend)
}

impl RawBackend {
    /// Count the attempt and return its zero-based index.
    fn record(&self, head: &str) -> usize {
        if let Some(id) = header_value(head, "x-request-id") {
            self.request_ids.lock().unwrap().push(id);
        }
        self.attempts.fetch_add(1, Ordering::SeqCst)
    }
}

async fn read_head(stream: &mut TcpStream) -> Option<String> {
    let mut buf = Vec::with_capacity(1024);
    let mut chunk = [0u8; 1024];
    loop {
        let n = stream.read(&mut chunk).await.ok()?;
        if n == 0 {
            return None;
        }
        buf.extend_from_slice(&chunk[..n]);
        if buf.windows(4).any(|w| w == b"\r\n\r\n") || buf.len() > 16 * 1024 {
            return Some(String::from_utf8_lossy(&buf).into_owned());
        }
    }
}

fn header_value(head: &str, name: &str) -> Option<String> {
    head.lines().find_map(|line| {
        let (key, value) = line.split_once(':')?;
        key.trim()
            .eq_ignore_ascii_case(name)
            .then(|| value.trim().to_string())
    })
}

/// An address nothing listens on, so connecting is refused.
pub async fn refused_addr() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    addr
}

pub fn backend(
    id: &str,
    name: &str,
    prefix: &str,
    addr: SocketAddr,
    timeout: Duration,
    max_retries: u32,
) -> BackendDescriptor {
    BackendDescriptor::new(id, name, prefix, &format!("http://{addr}"), timeout, max_retries)
}

pub fn gateway_state(backends: Vec<BackendDescriptor>, backoff: Duration) -> Arc<AppState> {
    let registry = BackendRegistry::new(backends).unwrap();
    Arc::new(AppState::new(
        registry,
        server::build_http_client(),
        RetryPolicy::new(backoff),
    ))
}

/// Serve `state` on a loopback port until the returned sender fires.
pub async fn spawn_gateway(state: Arc<AppState>) -> (SocketAddr, tokio::sync::oneshot::Sender<()>) {
    let router = server::build_router(state, 1_048_576);
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel::<()>();
    tokio::spawn(async move {
        axum::serve(listener, router)
            .with_graceful_shutdown(async {
                let _ = shutdown_rx.await;
            })
            .await
            .unwrap();
    });
    (addr, shutdown_tx)
}

pub fn client() -> reqwest::Client {
    reqwest::Client::builder().no_proxy().build().unwrap()
}
