//! Backend health tracking and the `GET /health` endpoint.
//!
//! - [`store`]: the shared [`HealthStore`](store::HealthStore) of
//!   per-backend records.
//! - [`prober`]: active probes against each backend's `/health`.
//!
//! [`aggregate`] probes every backend synchronously and then reads the
//! store back, so a health response always reflects a check made
//! during the same call.

pub mod prober;
pub mod store;

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use axum::extract::State;
use axum::Json;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::registry::BackendRegistry;
use crate::server::AppState;
use prober::Prober;
use store::{HealthRecord, HealthStore};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OverallStatus {
    #[serde(rename = "OK")]
    Operational,
    #[serde(rename = "DEGRADED")]
    Degraded,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AggregateHealth {
    pub status: OverallStatus,
    pub timestamp: DateTime<Utc>,
    pub gateway: String,
    pub services: Vec<String>,
    pub service_health: BTreeMap<String, HealthRecord>,
}

impl AggregateHealth {
    /// Backends whose last record is not healthy.
    #[must_use]
    pub fn unhealthy(&self) -> Vec<String> {
        self.service_health
            .iter()
            .filter(|(_, r)| r.status != store::HealthStatus::Healthy)
            .map(|(id, _)| id.clone())
            .collect()
    }
}

pub async fn aggregate(
    registry: &BackendRegistry,
    prober: &Prober,
    health: &HealthStore,
) -> AggregateHealth {
    let results = prober.probe_all(registry).await;
    let status = if results.iter().all(|(_, ok)| *ok) {
        OverallStatus::Operational
    } else {
        OverallStatus::Degraded
    };

    let snapshot = health.snapshot();
    let service_health = registry
        .ids()
        .map(|id| (id.to_string(), snapshot.get(id).copied().unwrap_or_default()))
        .collect();

    AggregateHealth {
        status,
        timestamp: Utc::now(),
        gateway: "Running".into(),
        services: registry.ids().map(String::from).collect(),
        service_health,
    }
}

pub async fn health_handler(State(state): State<Arc<AppState>>) -> Json<AggregateHealth> {
    let report = aggregate(&state.registry, &state.prober, &state.health).await;
    if report.status == OverallStatus::Degraded {
        tracing::warn!(unhealthy = ?report.unhealthy(), "gateway degraded");
    }
    Json(report)
}

/// Probe every backend each `period` until `shutdown` flips.
///
/// The first round runs immediately, so records leave `Unknown` without
/// waiting for a `/health` call.
pub async fn probe_loop(
    state: Arc<AppState>,
    period: Duration,
    mut shutdown: tokio::sync::watch::Receiver<bool>,
) {
    let mut interval = tokio::time::interval(period);
    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = interval.tick() => {}
            _ = shutdown.changed() => {
                tracing::debug!("probe loop shutting down");
                return;
            }
        }

        let report = aggregate(&state.registry, &state.prober, &state.health).await;
        tracing::debug!(status = ?report.status, "background probe finished");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn overall_status_uses_wire_names() {
        assert_eq!(
            serde_json::to_value(OverallStatus::Operational).unwrap(),
            "OK"
        );
        assert_eq!(
            serde_json::to_value(OverallStatus::Degraded).unwrap(),
            "DEGRADED"
        );
    }

    #[test]
    fn aggregate_serializes_camel_case() {
        let mut service_health = BTreeMap::new();
        service_health.insert("userService".to_string(), HealthRecord::default());
        let report = AggregateHealth {
            status: OverallStatus::Degraded,
            timestamp: Utc::now(),
            gateway: "Running".into(),
            services: vec!["userService".into()],
            service_health,
        };
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["status"], "DEGRADED");
        assert_eq!(json["serviceHealth"]["userService"]["status"], "unknown");
        assert_eq!(report.unhealthy(), vec!["userService".to_string()]);
    }
}
