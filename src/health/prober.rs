//! Active health probing.
//!
//! [`Prober::probe`] issues `GET {backend}/health` bounded by the
//! backend's timeout and records the outcome in the
//! [`HealthStore`] whoever the caller is. Probes of different backends
//! run concurrently with no ordering between them.

use std::sync::Arc;

use bytes::Bytes;
use chrono::Utc;
use futures_util::future::join_all;
use http_body_util::Full;
use hyper::StatusCode;

use super::store::{HealthStatus, HealthStore};
use crate::registry::{BackendDescriptor, BackendRegistry};
use crate::server::HttpClient;

pub const HEALTH_PATH: &str = "/health";

#[derive(Clone)]
pub struct Prober {
    client: HttpClient,
    health: Arc<HealthStore>,
}

impl Prober {
    #[must_use]
    pub const fn new(client: HttpClient, health: Arc<HealthStore>) -> Self {
        Self { client, health }
    }

    /// Probe one backend. True only for a 2xx answer within the timeout.
    pub async fn probe(&self, backend: &BackendDescriptor) -> bool {
        let healthy = match self.check(backend).await {
            Ok(status) if status.is_success() => true,
            Ok(status) => {
                tracing::warn!(service = %backend.id, status = %status, "health probe failed: non-success status");
                false
            }
            Err(reason) => {
                tracing::warn!(service = %backend.id, error = %reason, "health probe failed");
                false
            }
        };

        let status = if healthy {
            HealthStatus::Healthy
        } else {
            HealthStatus::Unhealthy
        };
        self.health.set(&backend.id, status, Utc::now());
        healthy
    }

    /// Probe every registered backend concurrently.
    pub async fn probe_all(&self, registry: &BackendRegistry) -> Vec<(String, bool)> {
        join_all(registry.iter().map(|backend| async move {
            (backend.id.clone(), self.probe(backend).await)
        }))
        .await
    }

    async fn check(&self, backend: &BackendDescriptor) -> Result<StatusCode, String> {
        let req = hyper::Request::builder()
            .method(hyper::Method::GET)
            .uri(format!("{}{HEALTH_PATH}", backend.url))
            .header(hyper::header::USER_AGENT, "api-gateway-health-check")
            .body(Full::new(Bytes::new()))
            .map_err(|e| e.to_string())?;

        match tokio::time::timeout(backend.timeout, self.client.request(req)).await {
            Ok(Ok(response)) => Ok(response.status()),
            Ok(Err(e)) => Err(e.to_string()),
            Err(_) => Err(format!(
                "timeout of {}ms exceeded",
                backend.timeout.as_millis()
            )),
        }
    }
}
