//! Forwarded header allowlist and response hop-by-hop stripping.
//!
//! Only `Content-Type`, `Authorization` and the correlation id travel
//! from the caller to the backend. Upstream response headers are relayed
//! minus hop-by-hop headers and `content-length`.

use std::sync::LazyLock;

use axum::http::{header, HeaderMap, HeaderName, HeaderValue};

/// Header carrying the correlation id in both directions.
pub const REQUEST_ID: HeaderName = HeaderName::from_static("x-request-id");

static HOP_BY_HOP: LazyLock<Vec<HeaderName>> = LazyLock::new(|| {
    [
        "connection",
        "keep-alive",
        "transfer-encoding",
        "te",
        "trailer",
        "upgrade",
        "proxy-authorization",
        "proxy-authenticate",
    ]
    .iter()
    .filter_map(|name| name.parse::<HeaderName>().ok())
    .collect()
});

/// Use the caller's `x-request-id` when it is valid, otherwise mint a fresh one.
#[must_use]
pub fn correlation_id(headers: &HeaderMap) -> String {
    headers
        .get(&REQUEST_ID)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map_or_else(|| uuid::Uuid::new_v4().to_string(), String::from)
}

/// Strip hop-by-hop headers and `content-length` from an upstream response.
///
/// The body has already been fully collected by the forwarder, so the
/// origin's framing headers are no longer accurate. Axum sets the
/// correct `content-length` from the relayed bytes.
pub fn strip_response_hop_by_hop(headers: &mut HeaderMap) {
    for name in HOP_BY_HOP.iter() {
        headers.remove(name);
    }
    headers.remove(header::CONTENT_LENGTH);
}

#[must_use]
pub fn build_forwarded_headers(inbound: &HeaderMap, correlation_id: &str) -> HeaderMap {
    let mut headers = HeaderMap::new();

    for name in [header::CONTENT_TYPE, header::AUTHORIZATION] {
        if let Some(value) = inbound.get(&name) {
            headers.insert(name, value.clone());
        }
    }

    match HeaderValue::from_str(correlation_id) {
        Ok(val) => {
            headers.insert(REQUEST_ID, val);
        }
        Err(_) => {
            tracing::warn!(correlation_id = %correlation_id, "correlation id is not a valid header value, not forwarded");
        }
    }

    headers
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_allowlisted_headers_are_forwarded() {
        let mut inbound = HeaderMap::new();
        inbound.insert("content-type", "application/json".parse().unwrap());
        inbound.insert("authorization", "Bearer abc".parse().unwrap());
        inbound.insert("cookie", "session=1".parse().unwrap());
        inbound.insert("x-forwarded-for", "1.2.3.4".parse().unwrap());
        inbound.insert("connection", "keep-alive".parse().unwrap());

        let result = build_forwarded_headers(&inbound, "req-1");

        assert_eq!(result.len(), 3);
        assert_eq!(result.get("content-type").unwrap(), "application/json");
        assert_eq!(result.get("authorization").unwrap(), "Bearer abc");
        assert_eq!(result.get("x-request-id").unwrap(), "req-1");
        assert!(result.get("cookie").is_none());
    }

    #[test]
    fn absent_optional_headers_stay_absent() {
        let result = build_forwarded_headers(&HeaderMap::new(), "req-2");
        assert_eq!(result.len(), 1);
        assert!(result.get("authorization").is_none());
    }

    #[test]
    fn correlation_id_is_propagated_or_generated() {
        let mut headers = HeaderMap::new();
        headers.insert("x-request-id", "abc-123".parse().unwrap());
        assert_eq!(correlation_id(&headers), "abc-123");

        let generated = correlation_id(&HeaderMap::new());
        assert!(uuid::Uuid::parse_str(&generated).is_ok());
        assert_ne!(generated, correlation_id(&HeaderMap::new()));
    }

    #[test]
    fn response_framing_headers_are_stripped() {
        let mut headers = HeaderMap::new();
        headers.insert("transfer-encoding", "chunked".parse().unwrap());
        headers.insert("content-length", "12".parse().unwrap());
        headers.insert("content-type", "application/json".parse().unwrap());

        strip_response_hop_by_hop(&mut headers);

        assert!(headers.get("transfer-encoding").is_none());
        assert!(headers.get("content-length").is_none());
        assert!(headers.get("content-type").is_some());
    }
}
