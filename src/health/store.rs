//! Shared per-backend health records.
//!
//! The [`HealthStore`] is the only shared mutable state in the gateway.
//! Both the forwarder (passive signal) and the prober (active signal)
//! write to it. Each write is a single short critical section taken
//! after the network call has completed, and a write whose timestamp
//! is older than the stored one is dropped, so the newest observation
//! always wins.

use std::collections::{BTreeMap, HashMap};
use std::sync::{PoisonError, RwLock};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    #[default]
    Unknown,
    Healthy,
    Unhealthy,
}

impl HealthStatus {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Unknown => "unknown",
            Self::Healthy => "healthy",
            Self::Unhealthy => "unhealthy",
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthRecord {
    pub status: HealthStatus,
    pub last_check: Option<DateTime<Utc>>,
}

#[derive(Debug, Default)]
pub struct HealthStore {
    records: RwLock<HashMap<String, HealthRecord>>,
}

impl HealthStore {
    /// Create a store with an `Unknown` record for every id.
    pub fn new<I, S>(ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let records = ids
            .into_iter()
            .map(|id| (id.into(), HealthRecord::default()))
            .collect();
        Self {
            records: RwLock::new(records),
        }
    }

    #[must_use]
    pub fn get(&self, id: &str) -> Option<HealthRecord> {
        // A panicked writer cannot leave a record half-written, so poison is ignored.
        let records = self.records.read().unwrap_or_else(PoisonError::into_inner);
        records.get(id).copied()
    }

    /// Record an observation taken at `at`. Older observations never
    /// replace newer ones.
    pub fn set(&self, id: &str, status: HealthStatus, at: DateTime<Utc>) {
        let mut records = self.records.write().unwrap_or_else(PoisonError::into_inner);
        let record = records.entry(id.to_string()).or_default();
        if record.last_check.is_some_and(|prev| prev > at) {
            tracing::trace!(backend = %id, "dropping stale health observation");
            return;
        }
        if record.status != status {
            tracing::info!(backend = %id, from = ?record.status, to = ?status, "backend health changed");
        }
        *record = HealthRecord {
            status,
            last_check: Some(at),
        };
    }

    #[must_use]
    pub fn snapshot(&self) -> BTreeMap<String, HealthRecord> {
        let records = self.records.read().unwrap_or_else(PoisonError::into_inner);
        records.iter().map(|(k, v)| (k.clone(), *v)).collect()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chrono::TimeDelta;

    use super::*;

    #[test]
    fn starts_unknown_for_every_backend() {
        let store = HealthStore::new(["userService", "productService"]);
        let record = store.get("userService").unwrap();
        assert_eq!(record.status, HealthStatus::Unknown);
        assert!(record.last_check.is_none());
        assert_eq!(store.snapshot().len(), 2);
        assert!(store.get("missing").is_none());
    }

    #[test]
    fn newer_write_replaces_older() {
        let store = HealthStore::new(["a"]);
        let t0 = Utc::now();
        store.set("a", HealthStatus::Unhealthy, t0);
        store.set("a", HealthStatus::Healthy, t0 + TimeDelta::milliseconds(5));
        let record = store.get("a").unwrap();
        assert_eq!(record.status, HealthStatus::Healthy);
        assert_eq!(record.last_check, Some(t0 + TimeDelta::milliseconds(5)));
    }

    #[test]
    fn stale_write_is_dropped() {
        let store = HealthStore::new(["a"]);
        let t0 = Utc::now();
        store.set("a", HealthStatus::Healthy, t0);
        store.set("a", HealthStatus::Unhealthy, t0 - TimeDelta::seconds(1));
        assert_eq!(store.get("a").unwrap().status, HealthStatus::Healthy);
    }

    #[test]
    fn concurrent_writers_keep_newest_observation() {
        let store = Arc::new(HealthStore::new(["a", "b"]));
        let base = Utc::now();

        let handles: Vec<_> = (0..64i64)
            .map(|i| {
                let store = Arc::clone(&store);
                std::thread::spawn(move || {
                    let status = if i % 2 == 0 {
                        HealthStatus::Healthy
                    } else {
                        HealthStatus::Unhealthy
                    };
                    let id = if i % 3 == 0 { "b" } else { "a" };
                    store.set(id, status, base + TimeDelta::milliseconds(i));
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        // Newest write to "a" is i = 62 (even, not divisible by 3).
        let a = store.get("a").unwrap();
        assert_eq!(a.last_check, Some(base + TimeDelta::milliseconds(62)));
        assert_eq!(a.status, HealthStatus::Healthy);

        // Newest write to "b" is i = 63 (odd).
        let b = store.get("b").unwrap();
        assert_eq!(b.last_check, Some(base + TimeDelta::milliseconds(63)));
        assert_eq!(b.status, HealthStatus::Unhealthy);
    }

    #[test]
    fn records_serialize_like_the_health_endpoint() {
        let json = serde_json::to_value(HealthRecord::default()).unwrap();
        assert_eq!(json, serde_json::json!({"status": "unknown", "lastCheck": null}));
    }
}
