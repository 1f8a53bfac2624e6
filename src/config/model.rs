//! Serde data structures for the gateway configuration file.
//!
//! Contains [`Config`] (the root), [`Defaults`] and [`BackendConfig`].
//! All types derive `Serialize` and `Deserialize` with
//! `deny_unknown_fields` for strict parsing.

use serde::{Deserialize, Serialize};

const fn default_timeout() -> u64 {
    5000
}

const fn default_retries() -> u32 {
    3
}

const fn default_backoff() -> u64 {
    1000
}

fn is_default_defaults(v: &Defaults) -> bool {
    v.timeout == default_timeout() && v.retries == default_retries() && v.backoff == default_backoff()
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    #[serde(default, skip_serializing_if = "is_default_defaults")]
    pub defaults: Defaults,

    pub backends: Vec<BackendConfig>,
}

impl Config {
    /// The two-service layout used when no config file is present.
    #[must_use]
    pub fn builtin() -> Self {
        Self {
            defaults: Defaults::default(),
            backends: vec![
                BackendConfig {
                    id: "userService".into(),
                    name: "User Service".into(),
                    prefix: "/api/users".into(),
                    url: "http://localhost:3001".into(),
                    timeout: None,
                    retries: None,
                },
                BackendConfig {
                    id: "productService".into(),
                    name: "Product Service".into(),
                    prefix: "/api/products".into(),
                    url: "http://localhost:3002".into(),
                    timeout: None,
                    retries: None,
                },
            ],
        }
    }

    #[must_use]
    pub fn effective_timeout(&self, backend: &BackendConfig) -> u64 {
        backend.timeout.unwrap_or(self.defaults.timeout)
    }

    #[must_use]
    pub fn effective_retries(&self, backend: &BackendConfig) -> u32 {
        backend.retries.unwrap_or(self.defaults.retries)
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct Defaults {
    /// Per-attempt timeout in milliseconds.
    #[serde(default = "default_timeout")]
    pub timeout: u64,

    #[serde(default = "default_retries")]
    pub retries: u32,

    /// Base delay in milliseconds; retry `n` waits `backoff * (n + 1)`.
    #[serde(default = "default_backoff")]
    pub backoff: u64,
}

impl Default for Defaults {
    fn default() -> Self {
        Self {
            timeout: default_timeout(),
            retries: default_retries(),
            backoff: default_backoff(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct BackendConfig {
    pub id: String,

    pub name: String,

    pub prefix: String,

    pub url: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout: Option<u64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retries: Option<u32>,
}
