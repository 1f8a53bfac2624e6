//! Proxied calls with per-attempt timeout and bounded linear retry.
//!
//! [`Forwarder::forward`] sends one logical request to a backend. Every
//! received upstream response, whatever its status, is relayed as-is
//! and marks the backend healthy. Transport failures are retried
//! sequentially with the same correlation id until the backend's retry
//! budget is spent; connection refusals end the loop immediately. A
//! terminal failure marks the backend unhealthy and is turned into a
//! JSON error response, never into an `Err`.

use std::sync::Arc;
use std::time::Instant;

use axum::http::{HeaderMap, Method};
use axum::response::{IntoResponse, Response};
use axum::Json;
use bytes::Bytes;
use chrono::Utc;
use http_body_util::{BodyExt, Full};
use hyper::StatusCode;
use serde::Serialize;

use super::headers::{build_forwarded_headers, strip_response_hop_by_hop, REQUEST_ID};
use super::retry::{RetryPolicy, TransportError};
use crate::error::GatewayError;
use crate::health::store::{HealthStatus, HealthStore};
use crate::registry::BackendDescriptor;
use crate::server::HttpClient;

/// One logical inbound request on its way to a backend.
#[derive(Debug, Clone)]
pub struct ForwardAttempt {
    pub method: Method,
    /// Path plus optional query, forwarded unchanged.
    pub path_and_query: String,
    pub headers: HeaderMap,
    pub body: Bytes,
    /// Stable across every retry of this request.
    pub correlation_id: String,
    /// Retries performed so far; never exceeds the backend's `max_retries`.
    pub retries: u32,
}

impl ForwardAttempt {
    #[must_use]
    pub fn new(
        method: Method,
        path_and_query: impl Into<String>,
        headers: HeaderMap,
        body: Bytes,
        correlation_id: impl Into<String>,
    ) -> Self {
        Self {
            method,
            path_and_query: path_and_query.into(),
            headers,
            body,
            correlation_id: correlation_id.into(),
            retries: 0,
        }
    }
}

#[derive(Debug)]
pub struct UpstreamResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
}

/// Error body returned once retries are exhausted or the backend refused.
#[derive(Debug, Clone, Serialize)]
pub struct ForwardFailure {
    #[serde(skip)]
    pub status: StatusCode,
    pub error: String,
    pub message: String,
    pub service: String,
    pub retries: u32,
}

#[derive(Debug)]
pub enum ForwardOutcome {
    Relayed {
        response: UpstreamResponse,
        correlation_id: String,
    },
    Failed {
        failure: ForwardFailure,
        correlation_id: String,
    },
}

impl ForwardOutcome {
    #[must_use]
    pub const fn status(&self) -> StatusCode {
        match self {
            Self::Relayed { response, .. } => response.status,
            Self::Failed { failure, .. } => failure.status,
        }
    }

    #[must_use]
    pub const fn is_relayed(&self) -> bool {
        matches!(self, Self::Relayed { .. })
    }
}

impl IntoResponse for ForwardOutcome {
    fn into_response(self) -> Response {
        match self {
            Self::Relayed {
                response,
                correlation_id,
            } => {
                let mut headers = response.headers;
                strip_response_hop_by_hop(&mut headers);
                headers.remove(REQUEST_ID);
                let mut builder = Response::builder().status(response.status);
                for (key, value) in &headers {
                    builder = builder.header(key, value);
                }
                builder
                    .header(REQUEST_ID, &correlation_id)
                    .body(axum::body::Body::from(response.body))
                    .unwrap_or_else(|e| {
                        tracing::error!(
                            correlation_id = %correlation_id,
                            error = %e,
                            "failed to build response"
                        );
                        crate::error::ApiError::Internal(e.to_string()).into_response()
                    })
            }
            Self::Failed {
                failure,
                correlation_id,
            } => {
                let status = failure.status;
                let mut response = (status, Json(failure)).into_response();
                if let Ok(value) = correlation_id.parse() {
                    response.headers_mut().insert(REQUEST_ID, value);
                }
                response
            }
        }
    }
}

#[derive(Clone)]
pub struct Forwarder {
    client: HttpClient,
    health: Arc<HealthStore>,
    policy: RetryPolicy,
}

impl Forwarder {
    #[must_use]
    pub const fn new(client: HttpClient, health: Arc<HealthStore>, policy: RetryPolicy) -> Self {
        Self {
            client,
            health,
            policy,
        }
    }

    /// Forward `attempt` to `backend`, retrying transport failures.
    ///
    /// Returns `Err` only when the gateway itself cannot build the
    /// outbound request; every backend-side failure is folded into
    /// [`ForwardOutcome::Failed`].
    pub async fn forward(
        &self,
        backend: &BackendDescriptor,
        mut attempt: ForwardAttempt,
    ) -> Result<ForwardOutcome, GatewayError> {
        let url = format!("{}{}", backend.url, attempt.path_and_query);
        let uri: hyper::Uri = url.parse().map_err(
            |e: hyper::http::uri::InvalidUri| GatewayError::UriParse {
                source: Box::new(e),
            },
        )?;
        let headers = build_forwarded_headers(&attempt.headers, &attempt.correlation_id);

        loop {
            let start = Instant::now();
            let result = self.send_once(backend, &attempt, &uri, &headers).await?;
            let latency_ms = u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX);

            let err = match result {
                Ok(response) => {
                    self.health
                        .set(&backend.id, HealthStatus::Healthy, Utc::now());
                    tracing::info!(
                        correlation_id = %attempt.correlation_id,
                        service = %backend.id,
                        status = response.status.as_u16(),
                        retries = attempt.retries,
                        latency_ms,
                        "upstream responded"
                    );
                    return Ok(ForwardOutcome::Relayed {
                        response,
                        correlation_id: attempt.correlation_id,
                    });
                }
                Err(err) => err,
            };

            tracing::warn!(
                correlation_id = %attempt.correlation_id,
                service = %backend.id,
                error = %err,
                kind = ?err.kind,
                latency_ms,
                "error forwarding to {}",
                backend.name
            );

            if err.is_retryable() && attempt.retries < backend.max_retries {
                let delay = self.policy.delay(attempt.retries);
                tracing::info!(
                    correlation_id = %attempt.correlation_id,
                    service = %backend.id,
                    attempt = attempt.retries + 1,
                    max_retries = backend.max_retries,
                    delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                    "retrying request"
                );
                tokio::time::sleep(delay).await;
                attempt.retries += 1;
                continue;
            }

            self.health
                .set(&backend.id, HealthStatus::Unhealthy, Utc::now());
            tracing::error!(
                correlation_id = %attempt.correlation_id,
                service = %backend.id,
                retries = attempt.retries,
                error = %err,
                "forwarding failed"
            );
            return Ok(ForwardOutcome::Failed {
                failure: ForwardFailure {
                    status: err.response_status(),
                    error: format!("Error communicating with {}", backend.name),
                    message: err.message,
                    service: backend.name.clone(),
                    retries: attempt.retries,
                },
                correlation_id: attempt.correlation_id,
            });
        }
    }

    /// One bounded attempt. The outer `Result` is a gateway fault, the
    /// inner one a transport failure.
    async fn send_once(
        &self,
        backend: &BackendDescriptor,
        attempt: &ForwardAttempt,
        uri: &hyper::Uri,
        headers: &HeaderMap,
    ) -> Result<Result<UpstreamResponse, TransportError>, GatewayError> {
        let mut req_builder = hyper::Request::builder()
            .method(attempt.method.clone())
            .uri(uri.clone());
        for (key, value) in headers {
            req_builder = req_builder.header(key, value);
        }
        let req = req_builder
            .body(Full::new(attempt.body.clone()))
            .map_err(|e| GatewayError::HttpRequest {
                source: Box::new(e),
            })?;

        let call = async {
            let response = self
                .client
                .request(req)
                .await
                .map_err(|e| TransportError::from_client(&e))?;
            let status = response.status();
            let headers = response.headers().clone();
            let body = response
                .into_body()
                .collect()
                .await
                .map_err(|e| TransportError::body(status, &e))?
                .to_bytes();
            Ok::<_, TransportError>(UpstreamResponse {
                status,
                headers,
                body,
            })
        };

        Ok(tokio::time::timeout(backend.timeout, call)
            .await
            .unwrap_or_else(|_| Err(TransportError::timeout(backend.timeout))))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn failure_body_has_expected_fields() {
        let failure = ForwardFailure {
            status: StatusCode::SERVICE_UNAVAILABLE,
            error: "Error communicating with User Service".into(),
            message: "connection refused".into(),
            service: "User Service".into(),
            retries: 0,
        };
        let json = serde_json::to_value(&failure).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "error": "Error communicating with User Service",
                "message": "connection refused",
                "service": "User Service",
                "retries": 0
            })
        );
    }

    #[test]
    fn failed_outcome_renders_json_with_correlation_id() {
        let outcome = ForwardOutcome::Failed {
            failure: ForwardFailure {
                status: StatusCode::SERVICE_UNAVAILABLE,
                error: "Error communicating with User Service".into(),
                message: "timeout of 5000ms exceeded".into(),
                service: "User Service".into(),
                retries: 3,
            },
            correlation_id: "req-9".into(),
        };
        assert!(!outcome.is_relayed());
        let response = outcome.into_response();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(response.headers().get("x-request-id").unwrap(), "req-9");
    }

    #[test]
    fn relayed_outcome_keeps_status_and_strips_framing() {
        let mut headers = HeaderMap::new();
        headers.insert("content-type", "application/json".parse().unwrap());
        headers.insert("transfer-encoding", "chunked".parse().unwrap());
        let outcome = ForwardOutcome::Relayed {
            response: UpstreamResponse {
                status: StatusCode::NOT_FOUND,
                headers,
                body: Bytes::from_static(b"{\"error\":\"no such user\"}"),
            },
            correlation_id: "req-10".into(),
        };
        assert_eq!(outcome.status(), StatusCode::NOT_FOUND);
        let response = outcome.into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert!(response.headers().get("transfer-encoding").is_none());
        assert_eq!(response.headers().get("x-request-id").unwrap(), "req-10");
    }
}
