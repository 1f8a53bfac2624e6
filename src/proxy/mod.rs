//! Core HTTP request forwarding handler.
//!
//! The [`forward_handler`] function is the Axum fallback that receives
//! every request not claimed by `/` or `/health`, resolves it against
//! the [`BackendRegistry`](crate::registry::BackendRegistry), and
//! delegates to the [`Forwarder`](forwarder::Forwarder). Submodules
//! handle header construction ([`headers`]), the retry loop
//! ([`forwarder`]) and failure classification ([`retry`]).

pub mod forwarder;
pub mod headers;
pub mod retry;

use std::sync::atomic::Ordering;
use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderMap, Method, Uri};
use axum::response::{IntoResponse, Response};

use crate::error::ApiError;
use crate::server::AppState;
use forwarder::ForwardAttempt;

pub async fn forward_handler(
    State(state): State<Arc<AppState>>,
    method: Method,
    uri: Uri,
    req_headers: HeaderMap,
    body: Bytes,
) -> Response {
    let path = uri.path();
    let path_and_query = uri
        .path_and_query()
        .map_or(path, axum::http::uri::PathAndQuery::as_str);
    let correlation_id = headers::correlation_id(&req_headers);

    let Some(backend) = state.registry.resolve(path) else {
        tracing::warn!(
            correlation_id = %correlation_id,
            method = %method,
            path = %path,
            "no route matched"
        );
        return ApiError::RouteNotFound {
            route: path_and_query.to_string(),
        }
        .into_response();
    };

    tracing::info!(
        correlation_id = %correlation_id,
        method = %method,
        path = %path,
        service = %backend.id,
        "request received"
    );

    let attempt = ForwardAttempt::new(
        method,
        path_and_query,
        req_headers,
        body,
        correlation_id,
    );

    match state.forwarder.forward(backend, attempt).await {
        Ok(outcome) => {
            if outcome.is_relayed() {
                state.stats.forwarded.fetch_add(1, Ordering::Relaxed);
            } else {
                state.stats.failed.fetch_add(1, Ordering::Relaxed);
            }
            outcome.into_response()
        }
        Err(e) => {
            state.stats.failed.fetch_add(1, Ordering::Relaxed);
            ApiError::from(e).into_response()
        }
    }
}
