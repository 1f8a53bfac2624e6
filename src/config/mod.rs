//! Configuration loading, validation, and environment overrides.
//!
//! Defines the [`ConfigSource`] trait for pluggable config sources and
//! the [`resolve_source`] helper that picks a file source (explicit or
//! auto-detected) or falls back to the built-in backend layout.
//! Submodules provide the data model, validation logic, environment
//! overrides and concrete source implementations.

pub mod env;
pub mod model;
pub mod sources;
pub mod validation;

use std::path::{Path, PathBuf};

use async_trait::async_trait;

use crate::error::GatewayError;
use model::Config;
#[cfg(any(feature = "yaml", feature = "json", feature = "toml"))]
use sources::FileSource;

// async_trait is required here because ConfigSource is used as Box<dyn ConfigSource>
// and native async fn in traits (Rust 1.75+) does not support dyn dispatch.
#[async_trait]
pub trait ConfigSource: Send + Sync {
    fn name(&self) -> &'static str;
    async fn load(&self) -> Result<Config, GatewayError>;
}

/// Serves [`Config::builtin`] when no file is available.
pub struct BuiltinSource;

#[async_trait]
impl ConfigSource for BuiltinSource {
    fn name(&self) -> &'static str {
        "builtin"
    }

    async fn load(&self) -> Result<Config, GatewayError> {
        Ok(Config::builtin())
    }
}

const CANDIDATES: [&str; 4] = [
    "gateway.yaml",
    "gateway.yml",
    "gateway.json",
    "gateway.toml",
];

pub async fn resolve_source(
    explicit: Option<&Path>,
) -> Result<Box<dyn ConfigSource>, GatewayError> {
    if let Some(path) = explicit {
        return create_file_source(path);
    }

    for name in &CANDIDATES {
        let path = PathBuf::from(name);
        if tokio::fs::try_exists(&path).await.unwrap_or(false) {
            tracing::info!(path = %path.display(), "auto-detected config file");
            return create_file_source(&path);
        }
    }

    tracing::info!("no config file found, using built-in backends");
    Ok(Box::new(BuiltinSource))
}

pub fn create_file_source(path: &Path) -> Result<Box<dyn ConfigSource>, GatewayError> {
    let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");

    match ext {
        #[cfg(feature = "yaml")]
        "yaml" | "yml" => Ok(Box::new(FileSource::yaml(path.to_path_buf()))),

        #[cfg(feature = "json")]
        "json" => Ok(Box::new(FileSource::json(path.to_path_buf()))),

        #[cfg(feature = "toml")]
        "toml" => Ok(Box::new(FileSource::toml(path.to_path_buf()))),

        other => Err(GatewayError::UnsupportedFormat(other.to_string())),
    }
}
