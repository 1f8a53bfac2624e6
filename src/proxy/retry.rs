//! Transport failure classification and the linear backoff schedule.
//!
//! A [`TransportError`] is anything that kept the gateway from receiving
//! a complete upstream response. Every kind is retryable except
//! [`TransportErrorKind::ConnectionRefused`]: a refused connection means
//! the backend process is down and will not recover within the retry
//! window.

use std::time::Duration;

use hyper::StatusCode;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportErrorKind {
    Timeout,
    ConnectionRefused,
    Connect,
    Other,
}

#[derive(Debug, Clone, thiserror::Error)]
#[error("{message}")]
pub struct TransportError {
    pub kind: TransportErrorKind,
    /// Upstream status, when headers arrived before the failure.
    pub status: Option<StatusCode>,
    pub message: String,
}

impl TransportError {
    #[must_use]
    pub fn timeout(after: Duration) -> Self {
        Self {
            kind: TransportErrorKind::Timeout,
            status: None,
            message: format!("timeout of {}ms exceeded", after.as_millis()),
        }
    }

    /// Classify an error returned by the pooled hyper client.
    #[must_use]
    pub fn from_client(err: &hyper_util::client::legacy::Error) -> Self {
        let kind = if is_connection_refused(err) {
            TransportErrorKind::ConnectionRefused
        } else if err.is_connect() {
            TransportErrorKind::Connect
        } else {
            TransportErrorKind::Other
        };
        Self {
            kind,
            status: None,
            message: error_chain_message(err),
        }
    }

    /// The response head arrived but the body could not be read.
    #[must_use]
    pub fn body(status: StatusCode, err: &hyper::Error) -> Self {
        Self {
            kind: TransportErrorKind::Other,
            status: Some(status),
            message: format!("failed to read response body: {err}"),
        }
    }

    #[must_use]
    pub fn is_retryable(&self) -> bool {
        self.kind != TransportErrorKind::ConnectionRefused
    }

    /// Status to report to the caller: the upstream error status if one
    /// was seen, otherwise 503.
    #[must_use]
    pub fn response_status(&self) -> StatusCode {
        self.status
            .filter(|s| s.is_client_error() || s.is_server_error())
            .unwrap_or(StatusCode::SERVICE_UNAVAILABLE)
    }
}

fn is_connection_refused(err: &(dyn std::error::Error + 'static)) -> bool {
    let mut current = Some(err);
    while let Some(e) = current {
        if let Some(io) = e.downcast_ref::<std::io::Error>() {
            if io.kind() == std::io::ErrorKind::ConnectionRefused {
                return true;
            }
        }
        current = e.source();
    }
    false
}

fn error_chain_message(err: &(dyn std::error::Error + 'static)) -> String {
    let mut message = err.to_string();
    let mut current = err.source();
    while let Some(e) = current {
        let text = e.to_string();
        if !message.contains(&text) {
            message.push_str(": ");
            message.push_str(&text);
        }
        current = e.source();
    }
    message
}

/// Linear backoff: retry `n` (zero-based) waits `base * (n + 1)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub backoff_base: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(Duration::from_millis(1000))
    }
}

impl RetryPolicy {
    #[must_use]
    pub const fn new(backoff_base: Duration) -> Self {
        Self { backoff_base }
    }

    #[must_use]
    pub fn delay(&self, retry_count: u32) -> Duration {
        self.backoff_base.saturating_mul(retry_count.saturating_add(1))
    }

    /// Worst-case added delay when all `max_retries` retries are used.
    #[must_use]
    pub fn worst_case(&self, max_retries: u32) -> Duration {
        (0..max_retries).map(|n| self.delay(n)).sum()
    }
}
