//! A reverse-proxy gateway in front of a small set of backend services.
//!
//! Incoming requests are matched by path prefix to one backend and
//! forwarded with a per-attempt timeout. Transport failures are retried
//! with linear backoff, connection refusals fail fast, and every outcome
//! feeds a shared per-backend health record. `GET /health` probes every
//! backend and reports an aggregate `OK` / `DEGRADED` status.
//!
//! # Architecture
//!
//! - [`cli`] -- Command-line argument parsing with clap derive macros.
//! - [`cmd`] -- Subcommand dispatch and execution (run, validate, health).
//! - [`config`] -- Config file model, sources, environment overrides and
//!   validation.
//! - [`error`] -- Unified error types using `thiserror`.
//! - [`health`] -- Health store, active prober and the aggregate
//!   `GET /health` handler.
//! - [`logging`] -- Structured tracing setup with JSON and pretty-print output.
//! - [`proxy`] -- Request forwarding: header allowlist, retry loop and
//!   transport failure classification.
//! - [`registry`] -- Prefix-to-backend mapping, fixed at startup.
//! - [`server`] -- Axum server setup, shared application state, HTTP client,
//!   and graceful shutdown.
//!
//! # Feature Flags
//!
//! | Feature | Description |
//! |---------|-------------|
//! | `yaml` | YAML config file support _(enabled by default)_ |
//! | `json` | JSON config file support |
//! | `toml` | TOML config file support |

// Binary crate: public functions are internal, not consumed by external users.
#![allow(clippy::missing_errors_doc)]

pub mod cli;
pub mod cmd;
pub mod config;
pub mod error;
pub mod health;
pub mod logging;
pub mod proxy;
pub mod registry;
pub mod server;
