//! Unified error types for the gateway.
//!
//! Defines [`GatewayError`] (the main crate error enum),
//! [`ValidationError`] for config validation failures, and [`ApiError`]
//! for the JSON error bodies returned to HTTP callers. Transport
//! failures seen while talking to a backend live in
//! [`proxy::retry`](crate::proxy::retry) because the forwarder absorbs
//! them instead of propagating them.

use std::path::PathBuf;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

#[derive(Debug, Clone)]
pub struct ValidationError {
    pub backend: String,
    pub field: String,
    pub message: String,
    pub suggestion: Option<String>,
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "  backend {}: {}: {}",
            self.backend, self.field, self.message
        )?;
        if let Some(ref suggestion) = self.suggestion {
            write!(f, " ({suggestion})")?;
        }
        Ok(())
    }
}

impl std::error::Error for ValidationError {}

fn format_errors(errors: &[ValidationError]) -> String {
    use std::fmt::Write;
    let mut buf = String::new();
    for (i, e) in errors.iter().enumerate() {
        if i > 0 {
            buf.push('\n');
        }
        // write! to String is infallible (only fails on OOM which is unrecoverable)
        let _ = write!(buf, "{e}");
    }
    buf
}

#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum GatewayError {
    #[error("Config file not found: {}", path.display())]
    ConfigFileNotFound { path: PathBuf },

    #[error("Config parse error in {path}:\n  {source}")]
    ConfigParse {
        path: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("Config validation failed:\n{}", format_errors(.errors))]
    ConfigValidation { errors: Vec<ValidationError> },

    #[error("Unsupported config format: '{0}'")]
    UnsupportedFormat(String),

    #[error("Invalid backend registry: {0}")]
    InvalidRegistry(String),

    #[error("Invalid address: {0}")]
    AddressParse(#[from] std::net::AddrParseError),

    #[error("Invalid URI: {source}")]
    UriParse {
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("HTTP request failed: {source}")]
    HttpRequest {
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("{0}")]
    Io(#[from] std::io::Error),

    #[error("Health check failed with status {0}")]
    HealthCheckFailed(hyper::StatusCode),

    #[error("Gateway is degraded, unhealthy backends: {}", .unhealthy.join(", "))]
    Degraded { unhealthy: Vec<String> },
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
    message: String,
}

/// Failures surfaced directly to the HTTP caller.
#[derive(Debug)]
pub enum ApiError {
    RouteNotFound { route: String },
    Internal(String),
}

impl ApiError {
    #[must_use]
    pub const fn status(&self) -> StatusCode {
        match self {
            Self::RouteNotFound { .. } => StatusCode::NOT_FOUND,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<GatewayError> for ApiError {
    fn from(err: GatewayError) -> Self {
        Self::Internal(err.to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = match self {
            Self::RouteNotFound { route } => ErrorBody {
                error: "Route not found".into(),
                message: format!("The route {route} does not exist"),
            },
            Self::Internal(message) => {
                tracing::error!(error = %message, "internal gateway error");
                ErrorBody {
                    error: "Internal Gateway Error".into(),
                    message,
                }
            }
        };
        (status, Json(body)).into_response()
    }
}
