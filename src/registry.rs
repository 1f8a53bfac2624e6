//! Static mapping from route prefix to backend.
//!
//! [`BackendRegistry`] is built once at startup and is read-only
//! afterwards. Prefixes match on segment boundaries (`/api/users`
//! matches `/api/users` and `/api/users/42` but not `/api/usersx`), and
//! overlapping prefixes are rejected at construction so at most one
//! backend can ever match a path.

use std::collections::HashSet;
use std::time::Duration;

use serde::Serialize;

use crate::config::model::Config;
use crate::config::validation::validate;
use crate::error::GatewayError;

/// Immutable description of one downstream service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackendDescriptor {
    pub id: String,
    pub name: String,
    pub prefix: String,
    /// Scheme, host and port, without a trailing slash.
    pub url: String,
    pub timeout: Duration,
    pub max_retries: u32,
}

impl BackendDescriptor {
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        prefix: impl Into<String>,
        url: &str,
        timeout: Duration,
        max_retries: u32,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            prefix: prefix.into(),
            url: url.trim_end_matches('/').to_string(),
            timeout,
            max_retries,
        }
    }

    #[must_use]
    pub fn matches(&self, path: &str) -> bool {
        path_has_prefix(path, &self.prefix)
    }

    #[must_use]
    pub fn summary(&self) -> BackendSummary {
        BackendSummary {
            url: self.url.clone(),
            name: self.name.clone(),
            prefix: self.prefix.clone(),
            timeout: u64::try_from(self.timeout.as_millis()).unwrap_or(u64::MAX),
            retries: self.max_retries,
        }
    }
}

/// Public view of a backend for the `GET /` listing.
#[derive(Debug, Clone, Serialize)]
pub struct BackendSummary {
    pub url: String,
    pub name: String,
    pub prefix: String,
    pub timeout: u64,
    pub retries: u32,
}

fn path_has_prefix(path: &str, prefix: &str) -> bool {
    path.strip_prefix(prefix)
        .is_some_and(|rest| rest.is_empty() || rest.starts_with('/'))
}

/// Two prefixes overlap when either one would match a path routed to the other.
#[must_use]
pub fn prefixes_overlap(a: &str, b: &str) -> bool {
    path_has_prefix(a, b) || path_has_prefix(b, a)
}

#[derive(Debug, Clone)]
pub struct BackendRegistry {
    backends: Vec<BackendDescriptor>,
}

impl BackendRegistry {
    /// Build a registry, failing on the first broken invariant.
    pub fn new(backends: Vec<BackendDescriptor>) -> Result<Self, GatewayError> {
        let mut ids = HashSet::new();
        for (i, backend) in backends.iter().enumerate() {
            if backend.id.is_empty() {
                return Err(GatewayError::InvalidRegistry(format!(
                    "backend #{i} has an empty id"
                )));
            }
            if !ids.insert(backend.id.as_str()) {
                return Err(GatewayError::InvalidRegistry(format!(
                    "duplicate backend id '{}'",
                    backend.id
                )));
            }
            if backend.timeout.is_zero() {
                return Err(GatewayError::InvalidRegistry(format!(
                    "backend '{}' has a zero timeout",
                    backend.id
                )));
            }
            if !backend.prefix.starts_with('/') {
                return Err(GatewayError::InvalidRegistry(format!(
                    "backend '{}' prefix '{}' must start with '/'",
                    backend.id, backend.prefix
                )));
            }
            if let Some(other) = backends[..i]
                .iter()
                .find(|b| prefixes_overlap(&b.prefix, &backend.prefix))
            {
                return Err(GatewayError::InvalidRegistry(format!(
                    "prefix '{}' of '{}' overlaps with prefix '{}' of '{}'",
                    backend.prefix, backend.id, other.prefix, other.id
                )));
            }
        }
        Ok(Self { backends })
    }

    /// Validate `config` and build the registry from its backends.
    pub fn from_config(config: &Config) -> Result<Self, GatewayError> {
        validate(config).map_err(|errors| GatewayError::ConfigValidation { errors })?;

        let backends = config
            .backends
            .iter()
            .map(|b| {
                BackendDescriptor::new(
                    b.id.clone(),
                    b.name.clone(),
                    b.prefix.clone(),
                    &b.url,
                    Duration::from_millis(config.effective_timeout(b)),
                    config.effective_retries(b),
                )
            })
            .collect();

        Self::new(backends)
    }

    /// Find the backend whose prefix matches `path`.
    #[must_use]
    pub fn resolve(&self, path: &str) -> Option<&BackendDescriptor> {
        self.backends.iter().find(|b| b.matches(path))
    }

    #[must_use]
    pub fn get(&self, id: &str) -> Option<&BackendDescriptor> {
        self.backends.iter().find(|b| b.id == id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &BackendDescriptor> {
        self.backends.iter()
    }

    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.backends.iter().map(|b| b.id.as_str())
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.backends.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.backends.is_empty()
    }
}
