//! `api-gateway health`: check the health of a running gateway.
//!
//! Sends a `GET /health` request to the specified URL and displays the
//! per-backend records as formatted text or raw JSON. Exits with an
//! error when the gateway is unreachable or reports `DEGRADED`.

use std::time::Duration;

use http_body_util::BodyExt;
use hyper_util::client::legacy::Client;
use hyper_util::rt::TokioExecutor;

use crate::cli::HealthArgs;
use crate::error::GatewayError;
use crate::health::{AggregateHealth, OverallStatus};

pub async fn execute(args: HealthArgs) -> Result<(), GatewayError> {
    let url = format!("{}/health", args.url.trim_end_matches('/'));
    let uri: hyper::Uri =
        url.parse().map_err(
            |e: hyper::http::uri::InvalidUri| GatewayError::UriParse {
                source: Box::new(e),
            },
        )?;

    let connector = hyper_util::client::legacy::connect::HttpConnector::new();
    let client = Client::builder(TokioExecutor::new()).build(connector);

    let req = hyper::Request::builder()
        .uri(uri)
        .body(http_body_util::Full::new(bytes::Bytes::new()))
        .map_err(|e| GatewayError::HttpRequest {
            source: Box::new(e),
        })?;

    let response = tokio::time::timeout(Duration::from_secs(args.timeout), client.request(req))
        .await
        .map_err(|_| GatewayError::HttpRequest {
            source: format!("health check timed out after {}s", args.timeout).into(),
        })?
        .map_err(|e| GatewayError::HttpRequest {
            source: Box::new(e),
        })?;

    let status = response.status();
    let body = response
        .into_body()
        .collect()
        .await
        .map_err(|e| GatewayError::HttpRequest {
            source: Box::new(e),
        })?
        .to_bytes();

    if !status.is_success() {
        return Err(GatewayError::HealthCheckFailed(status));
    }

    let report: AggregateHealth =
        serde_json::from_slice(&body).map_err(|e| GatewayError::HttpRequest {
            source: Box::new(e),
        })?;

    if args.json {
        println!("{}", String::from_utf8_lossy(&body));
    } else {
        print_report(&args.url, &report);
    }

    match report.status {
        OverallStatus::Operational => Ok(()),
        OverallStatus::Degraded => Err(GatewayError::Degraded {
            unhealthy: report.unhealthy(),
        }),
    }
}

fn print_report(url: &str, report: &AggregateHealth) {
    let mark = match report.status {
        OverallStatus::Operational => "\u{2713}",
        OverallStatus::Degraded => "\u{2717}",
    };
    let label = match report.status {
        OverallStatus::Operational => "operational",
        OverallStatus::Degraded => "degraded",
    };
    println!("{mark} gateway is {label} ({url})");
    println!("  checked at: {}", report.timestamp.to_rfc3339());

    let width = report.services.iter().map(String::len).max().unwrap_or(0);
    for id in &report.services {
        let record = report.service_health.get(id).copied().unwrap_or_default();
        let status = record.status.as_str();
        let last_check = record
            .last_check
            .map_or_else(|| "never".to_string(), |t| t.to_rfc3339());
        println!("  {id:<width$}  {status:<9}  last check: {last_check}");
    }
}
